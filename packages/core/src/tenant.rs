//! Tenant identity records.
//!
//! A [`Tenant`] is created by provisioning (outside this workspace) and is
//! read-only from here on. Tenant-owned rows reference it through its
//! internal [`TenantId`]; inbound requests name it through its external
//! [`TenantKey`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Accepted tenant key shape: alphanumeric first character, then up to 63
/// alphanumerics, `_`, `-` or `.`.
static TENANT_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,63}$").expect("tenant key pattern is valid")
});

/// Internal tenant identifier, stored in the tenant column of owned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub Uuid);

impl TenantId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// External, stable tenant identifier carried by requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantKey(String);

impl TenantKey {
    /// Parses a key, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTenantKey`] when the trimmed input is empty or does
    /// not match the accepted key shape.
    pub fn parse(raw: &str) -> Result<Self, InvalidTenantKey> {
        let trimmed = raw.trim();
        if TENANT_KEY_PATTERN.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidTenantKey(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantKey {
    type Error = InvalidTenantKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantKey> for String {
    fn from(key: TenantKey) -> Self {
        key.0
    }
}

/// A tenant key string that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTenantKey(pub String);

impl fmt::Display for InvalidTenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tenant key: {:?}", self.0)
    }
}

impl std::error::Error for InvalidTenantKey {}

/// Lifecycle status of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Trial,
    Expired,
}

impl TenantStatus {
    /// Whether requests for this tenant may operate on its data.
    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, Self::Active | Self::Trial)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Trial => "trial",
            Self::Expired => "expired",
        }
    }
}

/// Resource ceilings granted to a tenant. Zero means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuota {
    pub max_users: u32,
    pub max_resources: u32,
    pub max_storage_gb: u32,
}

/// Identity record of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub tenant_key: TenantKey,
    pub tenant_name: String,
    pub status: TenantStatus,
    #[serde(default)]
    pub quota: TenantQuota,
}

impl Tenant {
    /// Builds an active tenant with a fresh id and no quota limits.
    #[must_use]
    pub fn new(key: TenantKey, name: impl Into<String>) -> Self {
        Self {
            id: TenantId::random(),
            tenant_key: key,
            tenant_name: name.into(),
            status: TenantStatus::Active,
            quota: TenantQuota::default(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_quota(mut self, quota: TenantQuota) -> Self {
        self.quota = quota;
        self
    }
}
