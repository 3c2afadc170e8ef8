//! Carries a tenant context across execution-unit boundaries.
//!
//! Context is captured when work is wrapped, installed when the work starts
//! running, and taken out again when it stops, whether it returned, panicked
//! or was dropped mid-flight. The slot goes back to what it held before the
//! task: empty on a pooled worker, so no tenant identity reaches the next
//! task, and the caller's own context when a wrapped future is awaited inline.

use std::future::Future;

use tenantry_core::TenantContext;

use super::store::TenantContextStore;

/// Wraps tasks so they run under the tenant context of whoever wrapped them.
pub struct ContextPropagator;

impl ContextPropagator {
    /// Captures the caller's context now and returns a future that runs
    /// `task` under it.
    ///
    /// When polled inside an existing unit-of-work scope (a pooled worker),
    /// the captured context replaces the worker's slot for the duration of the
    /// task and the previous contents come back afterwards. When polled
    /// outside any scope (a bare `tokio::spawn`), the task gets a fresh scope
    /// of its own.
    pub fn wrap<F>(task: F) -> impl Future<Output = F::Output> + Send
    where
        F: Future + Send,
    {
        Self::wrap_with(TenantContextStore::snapshot(), task)
    }

    /// Like [`wrap`](Self::wrap) with an explicitly supplied context.
    pub fn wrap_with<F>(
        captured: Option<TenantContext>,
        task: F,
    ) -> impl Future<Output = F::Output> + Send
    where
        F: Future + Send,
    {
        async move {
            match TenantContextStore::enter(captured.clone()) {
                Ok(_restore) => task.await,
                Err(_) => TenantContextStore::scope(captured, task).await,
            }
        }
    }

    /// Captures the caller's context now and returns a closure that runs `f`
    /// under it, for `spawn_blocking` or plain threads.
    pub fn wrap_blocking<F, R>(f: F) -> impl FnOnce() -> R + Send
    where
        F: FnOnce() -> R + Send,
    {
        let captured = TenantContextStore::snapshot();
        move || TenantContextStore::sync_scope(captured, f)
    }
}
