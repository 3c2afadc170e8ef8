//! Statement guard middleware.
//!
//! Rewrites every structured statement so it only touches the active tenant's
//! rows, independently of whatever scoping the caller already applied:
//!
//! - select/update/delete get `<tenant column> = <id>` ANDed onto their
//!   filter (one is created when absent), qualified by the table alias if any
//! - updates that assign the tenant column are rejected; ownership is fixed
//!   at insert time
//! - inserts get the tenant column and value added to every row unless the
//!   column list already names it
//! - raw text classified as DML is rejected, since it cannot be rewritten
//! - everything else passes through
//!
//! Without an active tenant the statement passes through unmodified.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tenantry_core::{Expr, Insert, Statement, StatementKind, Tenant, TenantKey, Value};
use tower::{Layer, Service};
use tracing::debug;

use crate::service::statement::{ExecutionError, QueryOutput};
use crate::tenancy::{TenantContextStore, TenantError};

/// What the guard did to a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    /// Tenant predicate added to the filter.
    Scoped,
    /// Tenant column injected into an insert.
    Injected,
    /// Insert already named the tenant column; left alone.
    Preserved,
    /// Forwarded unmodified.
    Passthrough,
}

impl GuardAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Injected => "injected",
            Self::Preserved => "preserved",
            Self::Passthrough => "passthrough",
        }
    }

    #[must_use]
    pub fn rewrote(self) -> bool {
        matches!(self, Self::Scoped | Self::Injected)
    }
}

/// The rewrite rules, usable without the tower plumbing.
#[derive(Debug, Clone)]
pub struct StatementGuard {
    tenant_column: Arc<str>,
}

impl StatementGuard {
    #[must_use]
    pub fn new(tenant_column: &str) -> Self {
        Self {
            tenant_column: Arc::from(tenant_column),
        }
    }

    #[must_use]
    pub fn tenant_column(&self) -> &str {
        &self.tenant_column
    }

    /// Applies the rules for the tenant in the current context.
    ///
    /// # Errors
    ///
    /// As [`Self::apply_for`] with the active tenant.
    pub fn apply(&self, statement: Statement) -> Result<(Statement, GuardAction), TenantError> {
        let tenant = TenantContextStore::current();
        if tenant.is_none() {
            if let Some(key) = TenantContextStore::current_key() {
                log_unresolved(&key);
            }
        }
        self.apply_for(tenant.as_deref(), statement)
    }

    /// Applies the rules for an explicit tenant.
    ///
    /// # Errors
    ///
    /// [`TenantError::UnscopedStatement`] for raw DML and
    /// [`TenantError::AccessDenied`] for an update assigning the tenant
    /// column, both only when `tenant` is set.
    pub fn apply_for(
        &self,
        tenant: Option<&Tenant>,
        statement: Statement,
    ) -> Result<(Statement, GuardAction), TenantError> {
        let Some(tenant) = tenant else {
            return Ok((statement, GuardAction::Passthrough));
        };
        let id = Value::from(tenant.id);
        let column = &*self.tenant_column;

        let rewritten = match statement {
            Statement::Select(mut select) => {
                let predicate = Expr::eq(select.table.column(column), id);
                select.filter = Some(scope(select.filter.take(), predicate));
                (Statement::Select(select), GuardAction::Scoped)
            }
            Statement::Update(mut update) => {
                if update
                    .assignments
                    .iter()
                    .any(|(c, _)| c.eq_ignore_ascii_case(column))
                {
                    return Err(TenantError::AccessDenied {
                        active: tenant.id,
                        owner: None,
                    });
                }
                let predicate = Expr::eq(update.table.column(column), id);
                update.filter = Some(scope(update.filter.take(), predicate));
                (Statement::Update(update), GuardAction::Scoped)
            }
            Statement::Delete(mut delete) => {
                let predicate = Expr::eq(delete.table.column(column), id);
                delete.filter = Some(scope(delete.filter.take(), predicate));
                (Statement::Delete(delete), GuardAction::Scoped)
            }
            Statement::Insert(insert) => inject(insert, column, &id),
            Statement::Raw(sql) => {
                let kind = StatementKind::classify(&sql);
                if kind.is_data() {
                    return Err(TenantError::UnscopedStatement {
                        kind: kind.as_str(),
                    });
                }
                (Statement::Raw(sql), GuardAction::Passthrough)
            }
        };
        Ok(rewritten)
    }
}

fn scope(existing: Option<Expr>, predicate: Expr) -> Expr {
    match existing {
        Some(filter) => filter.and(predicate),
        None => predicate,
    }
}

fn inject(mut insert: Insert, column: &str, id: &Value) -> (Statement, GuardAction) {
    if insert
        .columns
        .iter()
        .any(|c| c.eq_ignore_ascii_case(column))
    {
        return (Statement::Insert(insert), GuardAction::Preserved);
    }
    insert.columns.push(column.to_string());
    for row in &mut insert.rows {
        row.push(id.clone());
    }
    (Statement::Insert(insert), GuardAction::Injected)
}

fn log_unresolved(key: &TenantKey) {
    debug!(tenant_key = %key, "tenant key without resolved tenant; statement not scoped");
}

// ---------------------------------------------------------------------------
// StatementGuardLayer
// ---------------------------------------------------------------------------

/// Tower layer that runs [`StatementGuard`] in front of a statement service.
#[derive(Debug, Clone)]
pub struct StatementGuardLayer {
    guard: StatementGuard,
}

impl StatementGuardLayer {
    #[must_use]
    pub fn new(tenant_column: &str) -> Self {
        Self {
            guard: StatementGuard::new(tenant_column),
        }
    }
}

impl<S> Layer<S> for StatementGuardLayer {
    type Service = StatementGuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatementGuardService {
            inner,
            guard: self.guard.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// StatementGuardService
// ---------------------------------------------------------------------------

/// Service wrapper that rewrites or rejects statements before forwarding.
///
/// The tenant is read in `call`, on the task issuing the statement.
#[derive(Debug, Clone)]
pub struct StatementGuardService<S> {
    inner: S,
    guard: StatementGuard,
}

impl<S> Service<Statement> for StatementGuardService<S>
where
    S: Service<Statement, Response = QueryOutput, Error = ExecutionError> + Send,
    S::Future: Send + 'static,
{
    type Response = QueryOutput;
    type Error = ExecutionError;
    type Future = Pin<Box<dyn Future<Output = Result<QueryOutput, ExecutionError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, statement: Statement) -> Self::Future {
        let kind = statement.kind().as_str();
        match self.guard.apply(statement) {
            Ok((statement, action)) => {
                metrics::counter!(
                    "tenantry_statements_total",
                    "kind" => kind,
                    "action" => action.as_str()
                )
                .increment(1);
                tracing::Span::current().record("rewritten", action.rewrote());
                debug!(kind, action = action.as_str(), statement = %statement, "statement guarded");
                Box::pin(self.inner.call(statement))
            }
            Err(err) => {
                metrics::counter!(
                    "tenantry_statements_total",
                    "kind" => kind,
                    "action" => "rejected"
                )
                .increment(1);
                tracing::warn!(kind, error = %err, "statement rejected");
                Box::pin(async move { Err(ExecutionError::Rejected(err)) })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tenantry_core::{Delete, Select, TableRef, TenantContext, Update};
    use tower::ServiceExt;

    use super::*;
    use crate::storage::database::MemoryDatabase;

    fn acme() -> Arc<Tenant> {
        Arc::new(Tenant::new(TenantKey::parse("acme").unwrap(), "Acme"))
    }

    fn guard() -> StatementGuard {
        StatementGuard::new("tenant_id")
    }

    #[test]
    fn select_without_filter_gains_one() {
        let tenant = acme();
        let stmt = Select::from_table(TableRef::new("orders")).into();
        let (out, action) = guard().apply_for(Some(&tenant), stmt).unwrap();
        assert_eq!(action, GuardAction::Scoped);
        assert_eq!(
            out.to_string(),
            format!("SELECT * FROM orders WHERE tenant_id = '{}'", tenant.id)
        );
    }

    #[test]
    fn existing_filter_is_kept_and_conjoined() {
        let tenant = acme();
        let stmt = Select::from_table(TableRef::aliased("orders", "o"))
            .filter(Expr::eq("status", "open").or(Expr::gt("qty", 5)))
            .into();
        let (out, _) = guard().apply_for(Some(&tenant), stmt).unwrap();
        let Statement::Select(select) = out else {
            panic!("expected select");
        };
        let Some(Expr::And(terms)) = select.filter else {
            panic!("expected conjunction");
        };
        assert_eq!(terms.len(), 2);
        assert!(matches!(terms[0], Expr::Or(_)));
        assert_eq!(terms[1].to_string(), format!("o.tenant_id = '{}'", tenant.id));
    }

    #[test]
    fn update_and_delete_are_scoped() {
        let tenant = acme();
        for stmt in [
            Update::table(TableRef::new("orders")).set("qty", 1).into(),
            Delete::from_table(TableRef::new("orders")).into(),
        ] {
            let (out, action) = guard().apply_for(Some(&tenant), stmt).unwrap();
            assert_eq!(action, GuardAction::Scoped);
            assert!(out.to_string().ends_with(&format!("WHERE tenant_id = '{}'", tenant.id)));
        }
    }

    #[test]
    fn update_cannot_reassign_the_owner() {
        let tenant = acme();
        let other = Tenant::new(TenantKey::parse("globex").unwrap(), "Globex");
        let stmt: Statement = Update::table(TableRef::new("notes"))
            .set("body", "moved")
            .set("Tenant_Id", other.id)
            .into();
        let err = guard().apply_for(Some(&tenant), stmt.clone()).unwrap_err();
        assert!(matches!(
            err,
            TenantError::AccessDenied { active, owner: None } if active == tenant.id
        ));

        let (out, action) = guard().apply_for(None, stmt.clone()).unwrap();
        assert_eq!(action, GuardAction::Passthrough);
        assert_eq!(out, stmt);
    }

    #[test]
    fn insert_gets_tenant_column_in_every_row() {
        let tenant = acme();
        let stmt = Insert::into_table("orders", &["id", "item"])
            .values(vec![1.into(), "bolt".into()])
            .values(vec![2.into(), "nut".into()])
            .into();
        let (out, action) = guard().apply_for(Some(&tenant), stmt).unwrap();
        assert_eq!(action, GuardAction::Injected);
        let Statement::Insert(insert) = out else {
            panic!("expected insert");
        };
        assert_eq!(insert.columns, vec!["id", "item", "tenant_id"]);
        assert!(insert
            .rows
            .iter()
            .all(|r| r.len() == 3 && r[2] == Value::from(tenant.id)));
    }

    #[test]
    fn explicit_tenant_value_is_preserved() {
        let tenant = acme();
        let stmt: Statement = Insert::into_table("orders", &["id", "TENANT_ID"])
            .values(vec![1.into(), "someone-else".into()])
            .into();
        let (out, action) = guard().apply_for(Some(&tenant), stmt.clone()).unwrap();
        assert_eq!(action, GuardAction::Preserved);
        assert_eq!(out, stmt);
    }

    #[test]
    fn no_tenant_passes_everything_through() {
        let stmts: Vec<Statement> = vec![
            Select::from_table(TableRef::new("orders")).into(),
            Statement::Raw("DELETE FROM orders".into()),
        ];
        for stmt in stmts {
            let (out, action) = guard().apply_for(None, stmt.clone()).unwrap();
            assert_eq!(action, GuardAction::Passthrough);
            assert_eq!(out, stmt);
        }
    }

    #[test]
    fn raw_statements_under_tenant() {
        let tenant = acme();
        let ddl = Statement::Raw("CREATE INDEX idx ON orders (item)".into());
        let (out, action) = guard().apply_for(Some(&tenant), ddl.clone()).unwrap();
        assert_eq!(action, GuardAction::Passthrough);
        assert_eq!(out, ddl);

        let dml = Statement::Raw("  /* hint */ update orders set qty = 0".into());
        let err = guard().apply_for(Some(&tenant), dml).unwrap_err();
        assert!(matches!(err, TenantError::UnscopedStatement { kind: "update" }));
    }

    #[test]
    fn unresolved_key_passes_through() {
        let key = TenantKey::parse("acme").unwrap();
        let stmt: Statement = Delete::from_table(TableRef::new("orders")).into();
        let (out, action) = TenantContextStore::sync_scope(
            Some(TenantContext::Unresolved(key)),
            || guard().apply(stmt.clone()),
        )
        .unwrap();
        assert_eq!(action, GuardAction::Passthrough);
        assert_eq!(out, stmt);
    }

    #[tokio::test]
    async fn layer_scopes_execution_against_the_database() {
        let db = MemoryDatabase::new();
        let svc = StatementGuardLayer::new("tenant_id").layer(db.clone());
        let acme = acme();
        let globex = Arc::new(Tenant::new(TenantKey::parse("globex").unwrap(), "Globex"));

        for (tenant, item) in [(&acme, "bolt"), (&acme, "nut"), (&globex, "gear")] {
            let insert = Insert::into_table("orders", &["item"]).values(vec![item.into()]);
            TenantContextStore::scope(
                Some(TenantContext::Resolved(Arc::clone(tenant))),
                svc.clone().oneshot(Statement::from(insert)),
            )
            .await
            .unwrap();
        }
        assert_eq!(db.table_rows("orders").len(), 3);

        let out = TenantContextStore::scope(
            Some(TenantContext::Resolved(Arc::clone(&globex))),
            svc.clone()
                .oneshot(Statement::from(Delete::from_table(TableRef::new("orders")))),
        )
        .await
        .unwrap();
        assert_eq!(out.affected, 1);

        let out = TenantContextStore::scope(
            Some(TenantContext::Resolved(acme)),
            svc.clone()
                .oneshot(Statement::from(Select::from_table(TableRef::new("orders")))),
        )
        .await
        .unwrap();
        assert_eq!(out.rows.len(), 2);
    }

    #[tokio::test]
    async fn layer_rejects_raw_dml_with_tenant() {
        let svc = StatementGuardLayer::new("tenant_id").layer(MemoryDatabase::new());
        let err = TenantContextStore::scope(
            Some(TenantContext::resolved(Tenant::new(
                TenantKey::parse("acme").unwrap(),
                "Acme",
            ))),
            svc.oneshot(Statement::Raw("DELETE FROM orders".into())),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Rejected(TenantError::UnscopedStatement { kind: "delete" })
        ));
    }

    #[tokio::test]
    async fn layer_keeps_rows_with_their_owner() {
        let db = MemoryDatabase::new();
        let svc = StatementGuardLayer::new("tenant_id").layer(db.clone());
        let acme = TenantContext::Resolved(acme());
        let globex = Arc::new(Tenant::new(TenantKey::parse("globex").unwrap(), "Globex"));

        let insert = Insert::into_table("notes", &["body"]).values(vec!["secret".into()]);
        TenantContextStore::scope(Some(acme.clone()), svc.clone().oneshot(Statement::from(insert)))
            .await
            .unwrap();

        let handover = Update::table(TableRef::new("notes")).set("tenant_id", globex.id);
        let err = TenantContextStore::scope(
            Some(acme),
            svc.clone().oneshot(Statement::from(handover)),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Rejected(TenantError::AccessDenied { .. })
        ));

        let seen = TenantContextStore::scope(
            Some(TenantContext::Resolved(globex)),
            svc.oneshot(Statement::from(Select::from_table(TableRef::new("notes")))),
        )
        .await
        .unwrap();
        assert!(seen.rows.is_empty());
        assert_eq!(db.table_rows("notes").len(), 1);
    }
}
