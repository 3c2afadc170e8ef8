//! Tenant-scoped data access.
//!
//! Every read composes the active tenant's predicate with whatever the caller
//! asked for, and every mutation checks ownership against the active tenant
//! before touching storage. Without an active tenant nothing is read or written.

pub mod page;
pub mod scoped;

use std::fmt;
use std::hash::Hash;

use tenantry_core::{Row, TenantId, Value};

pub use page::{Page, PageRequest, Sort};
pub use scoped::TenantScopedRepository;

/// An entity owned by exactly one tenant.
pub trait TenantOwned: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static;

    /// Name used in log fields.
    const ENTITY: &'static str;

    fn id(&self) -> &Self::Id;

    /// Owning tenant, or `None` for an entity not yet saved.
    fn tenant_id(&self) -> Option<TenantId>;

    fn assign_tenant(&mut self, tenant: TenantId);

    /// Value of a named attribute, used by filter expressions and sorting.
    fn field(&self, name: &str) -> Option<Value>;
}

/// Adapts an entity to [`Row`], answering the tenant column from
/// [`TenantOwned::tenant_id`].
pub(crate) struct EntityRow<'a, E> {
    pub(crate) entity: &'a E,
    pub(crate) tenant_column: &'a str,
}

impl<E: TenantOwned> Row for EntityRow<'_, E> {
    fn column(&self, name: &str) -> Option<Value> {
        if name == self.tenant_column {
            self.entity.tenant_id().map(Value::from)
        } else {
            self.entity.field(name)
        }
    }
}
