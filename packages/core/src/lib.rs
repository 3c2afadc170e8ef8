//! Tenantry core: tenant identity, tenant context values, filter expressions,
//! and the structured statement model shared by the server's enforcement layers.

pub mod context;
pub mod expr;
pub mod statement;
pub mod tenant;
pub mod types;

pub use context::TenantContext;
pub use expr::{ColumnRef, CompareOp, Expr, Row};
pub use statement::{
    Delete, Insert, OrderBy, Select, SortDirection, Statement, StatementKind, TableRef, Update,
};
pub use tenant::{InvalidTenantKey, Tenant, TenantId, TenantKey, TenantQuota, TenantStatus};
pub use types::Value;
