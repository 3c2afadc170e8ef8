//! Task-local tenant context store.
//!
//! Every logical unit of work (an HTTP request, a pooled task, a blocking
//! closure) opens its own slot with [`TenantContextStore::scope`] or
//! [`TenantContextStore::sync_scope`]. The slot lives exactly as long as that
//! scope: when the scoped future completes, errors, panics or is dropped, the
//! slot goes away with it. Slots are never inherited by spawned tasks; carrying
//! a context into another unit is the job of
//! [`ContextPropagator`](super::ContextPropagator).

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use tenantry_core::{Tenant, TenantContext, TenantKey};

use super::error::TenantError;

tokio::task_local! {
    static ACTIVE_TENANT: RefCell<Option<TenantContext>>;
}

/// Accessors for the tenant context of the currently executing unit of work.
///
/// All operations act on the innermost enclosing scope. Reads outside any
/// scope observe "absent"; writes outside any scope fail with
/// [`TenantError::NoActiveScope`].
pub struct TenantContextStore;

impl TenantContextStore {
    /// Runs `fut` as a unit of work with its own slot, seeded with `initial`.
    pub async fn scope<F>(initial: Option<TenantContext>, fut: F) -> F::Output
    where
        F: Future,
    {
        ACTIVE_TENANT.scope(RefCell::new(initial), fut).await
    }

    /// Runs the closure `f` as a unit of work with its own slot.
    pub fn sync_scope<F, R>(initial: Option<TenantContext>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        ACTIVE_TENANT.sync_scope(RefCell::new(initial), f)
    }

    /// Whether the caller runs inside a unit-of-work scope.
    #[must_use]
    pub fn in_scope() -> bool {
        ACTIVE_TENANT.try_with(|_| ()).is_ok()
    }

    /// Installs a resolved tenant. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoActiveScope`] outside any scope.
    pub fn set(tenant: Arc<Tenant>) -> Result<(), TenantError> {
        Self::install(TenantContext::Resolved(tenant))
    }

    /// Installs a bare tenant key (degraded context). Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoActiveScope`] outside any scope.
    pub fn set_key(key: TenantKey) -> Result<(), TenantError> {
        Self::install(TenantContext::Unresolved(key))
    }

    /// Installs `context`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoActiveScope`] outside any scope.
    pub fn install(context: TenantContext) -> Result<(), TenantError> {
        Self::replace(Some(context)).map(|_| ())
    }

    /// Swaps the slot contents, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoActiveScope`] outside any scope.
    pub fn replace(context: Option<TenantContext>) -> Result<Option<TenantContext>, TenantError> {
        ACTIVE_TENANT
            .try_with(|slot| slot.replace(context))
            .map_err(|_| TenantError::NoActiveScope)
    }

    /// Installs `context` in the current slot until the returned guard drops,
    /// then restores whatever the slot held before.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoActiveScope`] outside any scope.
    pub fn enter(context: Option<TenantContext>) -> Result<RestoreOnDrop, TenantError> {
        let previous = Self::replace(context)?;
        Ok(RestoreOnDrop { previous })
    }

    /// Full context of the current unit, resolved or not.
    #[must_use]
    pub fn snapshot() -> Option<TenantContext> {
        ACTIVE_TENANT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// The resolved tenant, if one is installed.
    #[must_use]
    pub fn current() -> Option<Arc<Tenant>> {
        Self::snapshot().and_then(|ctx| ctx.tenant().cloned())
    }

    /// The active tenant key, taken from the resolved tenant or the bare key.
    #[must_use]
    pub fn current_key() -> Option<TenantKey> {
        Self::snapshot().map(|ctx| ctx.key().clone())
    }

    /// # Errors
    ///
    /// Returns [`TenantError::ContextMissing`] when no resolved tenant is
    /// installed. A bare key does not count: data scoping needs the id.
    pub fn current_or_fail() -> Result<Arc<Tenant>, TenantError> {
        Self::current().ok_or(TenantError::ContextMissing)
    }

    /// # Errors
    ///
    /// Returns [`TenantError::ContextMissing`] when nothing is installed.
    pub fn current_key_or_fail() -> Result<TenantKey, TenantError> {
        Self::current_key().ok_or(TenantError::ContextMissing)
    }

    #[must_use]
    pub fn is_present() -> bool {
        Self::snapshot().is_some()
    }

    /// Removes any installed context. Idempotent, and a no-op outside a scope.
    pub fn clear() {
        let _ = ACTIVE_TENANT.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Puts back the slot contents it displaced when dropped, on every exit path.
///
/// Obtained from [`TenantContextStore::enter`].
#[derive(Debug)]
#[must_use = "the previous context is restored as soon as the guard drops"]
pub struct RestoreOnDrop {
    previous: Option<TenantContext>,
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let _ = TenantContextStore::replace(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(key: &str) -> Arc<Tenant> {
        Arc::new(Tenant::new(TenantKey::parse(key).unwrap(), key))
    }

    #[test]
    fn outside_scope_reads_absent_and_writes_fail() {
        assert!(!TenantContextStore::in_scope());
        assert!(TenantContextStore::current().is_none());
        assert!(!TenantContextStore::is_present());
        assert!(matches!(
            TenantContextStore::set(tenant("acme")),
            Err(TenantError::NoActiveScope)
        ));
        // clear outside a scope is harmless
        TenantContextStore::clear();
    }

    #[test]
    fn set_then_read_then_clear() {
        TenantContextStore::sync_scope(None, || {
            assert!(TenantContextStore::in_scope());
            assert!(!TenantContextStore::is_present());

            let acme = tenant("acme");
            TenantContextStore::set(Arc::clone(&acme)).unwrap();
            assert_eq!(TenantContextStore::current().unwrap().id, acme.id);
            assert_eq!(TenantContextStore::current_key().unwrap().as_str(), "acme");

            TenantContextStore::clear();
            assert!(!TenantContextStore::is_present());
            assert!(matches!(
                TenantContextStore::current_or_fail(),
                Err(TenantError::ContextMissing)
            ));
        });
    }

    #[test]
    fn clear_is_idempotent() {
        TenantContextStore::sync_scope(Some(TenantContext::Resolved(tenant("acme"))), || {
            TenantContextStore::clear();
            TenantContextStore::clear();
            TenantContextStore::clear();
            assert!(!TenantContextStore::is_present());
        });
        TenantContextStore::sync_scope(None, || {
            TenantContextStore::clear();
            assert!(!TenantContextStore::is_present());
        });
    }

    #[test]
    fn last_write_wins() {
        TenantContextStore::sync_scope(None, || {
            TenantContextStore::set(tenant("acme")).unwrap();
            TenantContextStore::set(tenant("globex")).unwrap();
            assert_eq!(TenantContextStore::current_key().unwrap().as_str(), "globex");

            TenantContextStore::set_key(TenantKey::parse("initech").unwrap()).unwrap();
            assert!(TenantContextStore::current().is_none());
            assert_eq!(
                TenantContextStore::current_key_or_fail().unwrap().as_str(),
                "initech"
            );
        });
    }

    #[test]
    fn bare_key_does_not_satisfy_current_or_fail() {
        let key = TenantKey::parse("acme").unwrap();
        TenantContextStore::sync_scope(Some(TenantContext::Unresolved(key)), || {
            assert!(TenantContextStore::is_present());
            assert!(matches!(
                TenantContextStore::current_or_fail(),
                Err(TenantError::ContextMissing)
            ));
        });
    }

    #[test]
    fn entered_context_is_undone_during_unwind() {
        TenantContextStore::sync_scope(Some(TenantContext::Resolved(tenant("acme"))), || {
            let result = std::panic::catch_unwind(|| {
                let _guard =
                    TenantContextStore::enter(Some(TenantContext::Resolved(tenant("globex"))))
                        .unwrap();
                assert_eq!(TenantContextStore::current().unwrap().tenant_key.as_str(), "globex");
                panic!("task body failed");
            });
            assert!(result.is_err());
            assert_eq!(TenantContextStore::current().unwrap().tenant_key.as_str(), "acme");
        });
    }

    #[test]
    fn enter_outside_scope_fails() {
        assert!(matches!(
            TenantContextStore::enter(None),
            Err(TenantError::NoActiveScope)
        ));
    }

    #[tokio::test]
    async fn spawned_tasks_do_not_inherit_the_slot() {
        let acme = tenant("acme");
        TenantContextStore::scope(Some(TenantContext::Resolved(acme)), async {
            assert!(TenantContextStore::is_present());
            let seen = tokio::spawn(async { TenantContextStore::is_present() })
                .await
                .unwrap();
            assert!(!seen);
        })
        .await;
        assert!(!TenantContextStore::in_scope());
    }

    #[tokio::test]
    async fn concurrent_scopes_are_isolated() {
        let mut handles = Vec::new();
        for key in ["acme", "globex", "initech", "umbrella"] {
            let t = tenant(key);
            handles.push(tokio::spawn(TenantContextStore::scope(
                Some(TenantContext::Resolved(t)),
                async move {
                    for _ in 0..10 {
                        tokio::task::yield_now().await;
                        assert_eq!(TenantContextStore::current_key().unwrap().as_str(), key);
                    }
                },
            )));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
