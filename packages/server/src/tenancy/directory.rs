//! Tenant lookup sources.
//!
//! The directory is shared by every request and is read-only from the
//! isolation layer's point of view; tenants are provisioned elsewhere.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use quick_cache::sync::Cache;
use tenantry_core::{Tenant, TenantKey};

/// Lookup of tenant records by external key.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Find the tenant registered under `key`, or `None` if unknown.
    async fn find_by_key(&self, key: &TenantKey) -> anyhow::Result<Option<Arc<Tenant>>>;
}

/// In-memory directory backed by [`DashMap`].
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    tenants: DashMap<TenantKey, Arc<Tenant>>,
}

impl InMemoryTenantDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a tenant, returning the shared record.
    pub fn insert(&self, tenant: Tenant) -> Arc<Tenant> {
        let tenant = Arc::new(tenant);
        self.tenants
            .insert(tenant.tenant_key.clone(), Arc::clone(&tenant));
        tenant
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Loads a JSON array of tenant records.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid array of
    /// tenants.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading tenant seed file {}", path.display()))?;
        let tenants: Vec<Tenant> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing tenant seed file {}", path.display()))?;
        let directory = Self::new();
        for tenant in tenants {
            directory.insert(tenant);
        }
        Ok(directory)
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_key(&self, key: &TenantKey) -> anyhow::Result<Option<Arc<Tenant>>> {
        Ok(self.tenants.get(key).map(|t| Arc::clone(t.value())))
    }
}

/// Read-through cache in front of a slower directory.
///
/// Only hits are cached, so a tenant provisioned after a miss becomes visible
/// on the next lookup.
pub struct CachingTenantDirectory<D> {
    inner: D,
    cache: Cache<TenantKey, Arc<Tenant>>,
}

impl<D: TenantDirectory> CachingTenantDirectory<D> {
    #[must_use]
    pub fn new(inner: D, capacity: usize) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }

    /// Drops a cached record, e.g. after the tenant was suspended.
    pub fn invalidate(&self, key: &TenantKey) {
        self.cache.remove(key);
    }
}

#[async_trait]
impl<D: TenantDirectory> TenantDirectory for CachingTenantDirectory<D> {
    async fn find_by_key(&self, key: &TenantKey) -> anyhow::Result<Option<Arc<Tenant>>> {
        if let Some(hit) = self.cache.get(key) {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_key(key).await?;
        if let Some(tenant) = &found {
            self.cache.insert(key.clone(), Arc::clone(tenant));
        }
        Ok(found)
    }
}
