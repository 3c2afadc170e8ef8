//! [`TenantScopedRepository`]: the object-level isolation layer.

use std::marker::PhantomData;
use std::sync::Arc;

use tenantry_core::{Expr, Tenant, TenantId};
use tracing::{debug, warn};

use super::page::{Page, PageRequest, Sort};
use super::{EntityRow, TenantOwned};
use crate::storage::engine::StorageEngine;
use crate::storage::engines::hashmap::HashMapStorage;
use crate::tenancy::{TenantContextStore, TenantError};

/// Repository whose every operation is restricted to the active tenant.
///
/// Reads AND the tenant predicate onto the caller's filter; a filter can
/// narrow the result but never widen it past the tenant boundary. Mutations
/// verify ownership first and fail with [`TenantError::AccessDenied`] without
/// modifying anything.
pub struct TenantScopedRepository<E, S = HashMapStorage<<E as TenantOwned>::Id, E>>
where
    E: TenantOwned,
{
    storage: Arc<S>,
    tenant_column: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Clone for TenantScopedRepository<E, S>
where
    E: TenantOwned,
{
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            tenant_column: self.tenant_column.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> TenantScopedRepository<E>
where
    E: TenantOwned,
{
    /// Repository over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(HashMapStorage::new()))
    }
}

impl<E, S> TenantScopedRepository<E, S>
where
    E: TenantOwned,
    S: StorageEngine<E::Id, E>,
{
    #[must_use]
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            tenant_column: "tenant_id".to_string(),
            _entity: PhantomData,
        }
    }

    /// Overrides the name the tenant predicate uses for the owner attribute.
    #[must_use]
    pub fn with_tenant_column(mut self, column: impl Into<String>) -> Self {
        self.tenant_column = column.into();
        self
    }

    #[must_use]
    pub fn tenant_column(&self) -> &str {
        &self.tenant_column
    }

    /// Unscoped access to the underlying store, for seeding and inspection.
    #[must_use]
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    // ---- reads ----

    pub fn find_all_for_current_tenant(&self) -> Result<Vec<E>, TenantError> {
        self.find_all_matching(&Expr::True)
    }

    pub fn find_all_for_current_tenant_sorted(&self, sort: &Sort) -> Result<Vec<E>, TenantError> {
        let (_, filter) = self.scoped_filter(Expr::True)?;
        Ok(self.select(&filter, sort))
    }

    pub fn find_page_for_current_tenant(
        &self,
        request: &PageRequest,
    ) -> Result<Page<E>, TenantError> {
        self.find_page_matching(&Expr::True, request)
    }

    /// All of the active tenant's entities that also satisfy `predicate`.
    pub fn find_all_matching(&self, predicate: &Expr) -> Result<Vec<E>, TenantError> {
        let (_, filter) = self.scoped_filter(predicate.clone())?;
        Ok(self.select(&filter, &Sort::unsorted()))
    }

    pub fn find_page_matching(
        &self,
        predicate: &Expr,
        request: &PageRequest,
    ) -> Result<Page<E>, TenantError> {
        let (_, filter) = self.scoped_filter(predicate.clone())?;
        Ok(Page::slice(self.select(&filter, &request.sort), request))
    }

    pub fn find_one_matching(&self, predicate: &Expr) -> Result<Option<E>, TenantError> {
        Ok(self.find_all_matching(predicate)?.into_iter().next())
    }

    pub fn count_matching(&self, predicate: &Expr) -> Result<u64, TenantError> {
        let (_, filter) = self.scoped_filter(predicate.clone())?;
        let count = self
            .storage
            .snapshot()
            .iter()
            .filter(|e| filter.evaluate(&self.row(e)))
            .count();
        Ok(count as u64)
    }

    pub fn exists_matching(&self, predicate: &Expr) -> Result<bool, TenantError> {
        let (_, filter) = self.scoped_filter(predicate.clone())?;
        Ok(self
            .storage
            .snapshot()
            .iter()
            .any(|e| filter.evaluate(&self.row(e))))
    }

    pub fn count_for_current_tenant(&self) -> Result<u64, TenantError> {
        self.count_matching(&Expr::True)
    }

    /// The entity with `id` if it belongs to the active tenant. Another
    /// tenant's entity is indistinguishable from a missing one.
    pub fn find_by_id_for_current_tenant(&self, id: &E::Id) -> Result<Option<E>, TenantError> {
        let (_, filter) = self.scoped_filter(Expr::True)?;
        Ok(self
            .storage
            .get(id)
            .filter(|e| filter.evaluate(&self.row(e))))
    }

    pub fn exists_by_id_for_current_tenant(&self, id: &E::Id) -> Result<bool, TenantError> {
        Ok(self.find_by_id_for_current_tenant(id)?.is_some())
    }

    // ---- mutations ----

    /// Removes the entity with `id` if the active tenant owns it. Returns
    /// whether anything was removed.
    pub fn delete_by_id_for_current_tenant(&self, id: &E::Id) -> Result<bool, TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        let removed = self.remove_owned(&tenant, id);
        if removed {
            debug!(entity = E::ENTITY, id = ?id, "deleted by id");
        }
        Ok(removed)
    }

    /// Removes every entity the active tenant owns, one at a time. Returns
    /// the number removed.
    pub fn delete_all_for_current_tenant(&self) -> Result<usize, TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        let owned = self.find_all_for_current_tenant()?;
        let mut removed = 0;
        for entity in &owned {
            if self.remove_owned(&tenant, entity.id()) {
                removed += 1;
            }
        }
        debug!(entity = E::ENTITY, removed, "deleted all for tenant");
        Ok(removed)
    }

    /// Removes `entity`, which must belong to the active tenant.
    pub fn delete(&self, entity: &E) -> Result<(), TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        self.check_owned(&tenant, entity)?;
        self.remove_owned(&tenant, entity.id());
        Ok(())
    }

    /// Removes all of `entities`. Ownership of every item is verified before
    /// the first removal, so a single foreign entity leaves storage untouched.
    pub fn delete_all(&self, entities: &[E]) -> Result<(), TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        for entity in entities {
            self.check_owned(&tenant, entity)?;
        }
        for entity in entities {
            self.remove_owned(&tenant, entity.id());
        }
        Ok(())
    }

    /// Stores `entity` on behalf of the active tenant.
    ///
    /// An entity without an owner is assigned to the active tenant. An entity
    /// owned by another tenant, or whose id is already held by another
    /// tenant's entity, is rejected.
    pub fn save_for_current_tenant(&self, mut entity: E) -> Result<E, TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        match entity.tenant_id() {
            None => entity.assign_tenant(tenant.id),
            Some(owner) if owner != tenant.id => {
                return Err(self.denied(&tenant, Some(owner), entity.id()));
            }
            Some(_) => {}
        }
        let claimed = self.storage.put_unless(
            entity.id().clone(),
            entity.clone(),
            &|stored: &E| stored.tenant_id() != Some(tenant.id),
        );
        if let Err(existing) = claimed {
            return Err(self.denied(&tenant, existing.tenant_id(), entity.id()));
        }
        debug!(entity = E::ENTITY, id = ?entity.id(), tenant = %tenant.tenant_key, "saved");
        Ok(entity)
    }

    // ---- internals ----

    /// Active tenant plus `tenant_column = id AND predicate`.
    fn scoped_filter(&self, predicate: Expr) -> Result<(Arc<Tenant>, Expr), TenantError> {
        let tenant = TenantContextStore::current_or_fail()?;
        let filter = Expr::eq(self.tenant_column.as_str(), tenant.id).and(predicate);
        debug!(entity = E::ENTITY, tenant = %tenant.tenant_key, filter = %filter, "scoped read");
        Ok((tenant, filter))
    }

    fn select(&self, filter: &Expr, sort: &Sort) -> Vec<E> {
        let mut matched: Vec<E> = self
            .storage
            .snapshot()
            .into_iter()
            .filter(|e| filter.evaluate(&self.row(e)))
            .collect();
        matched.sort_by(|a, b| {
            sort.compare(&self.row(a), &self.row(b))
                .then_with(|| a.id().cmp(b.id()))
        });
        matched
    }

    fn remove_owned(&self, tenant: &Tenant, id: &E::Id) -> bool {
        self.storage
            .remove_if(id, &|stored: &E| stored.tenant_id() == Some(tenant.id))
            .is_some()
    }

    fn check_owned(&self, tenant: &Tenant, entity: &E) -> Result<(), TenantError> {
        let owner = entity.tenant_id();
        if owner != Some(tenant.id) {
            return Err(self.denied(tenant, owner, entity.id()));
        }
        // The caller's copy may be stale or forged; the stored row decides.
        if let Some(stored) = self.storage.get(entity.id()) {
            let stored_owner = stored.tenant_id();
            if stored_owner != Some(tenant.id) {
                return Err(self.denied(tenant, stored_owner, entity.id()));
            }
        }
        Ok(())
    }

    fn denied(&self, tenant: &Tenant, owner: Option<TenantId>, id: &E::Id) -> TenantError {
        warn!(
            entity = E::ENTITY,
            id = ?id,
            active = %tenant.tenant_key,
            owner = ?owner,
            "cross-tenant access denied"
        );
        metrics::counter!("tenantry_access_denied_total", "entity" => E::ENTITY).increment(1);
        TenantError::AccessDenied {
            active: tenant.id,
            owner,
        }
    }

    fn row<'a>(&'a self, entity: &'a E) -> EntityRow<'a, E> {
        EntityRow {
            entity,
            tenant_column: &self.tenant_column,
        }
    }
}
