//! Request/response types for the statement pipeline.

use std::collections::BTreeMap;

use serde::Serialize;
use tenantry_core::Value;

use crate::tenancy::TenantError;

/// A single result row keyed by column name.
pub type Record = BTreeMap<String, Value>;

/// Result of executing one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOutput {
    /// Rows produced by a select; empty for other statements.
    pub rows: Vec<Record>,
    /// Rows inserted, updated or deleted.
    pub affected: u64,
}

impl QueryOutput {
    #[must_use]
    pub fn rows(rows: Vec<Record>) -> Self {
        Self { rows, affected: 0 }
    }

    #[must_use]
    pub fn affected(affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected,
        }
    }
}

/// Errors from the statement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The guard refused the statement.
    #[error(transparent)]
    Rejected(#[from] TenantError),

    #[error("unsupported statement: {0}")]
    Unsupported(String),

    #[error("invalid statement: {0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
