//! Statement execution and background work.
//!
//! 1. **Statements** (`statement`): request/response types for the statement pipeline
//! 2. **Middleware** (`middleware`): Tower layers (statement guard, metrics)
//! 3. **Background workers** (`worker`): bounded pool with tenant propagation

pub mod config;
pub mod middleware;
pub mod statement;
pub mod worker;

// Re-export key types for convenient access.
pub use config::{ServerConfig, WorkerPoolConfig};
pub use middleware::{build_statement_pipeline, StatementGuard, StatementGuardLayer};
pub use statement::{ExecutionError, QueryOutput, Record};
pub use worker::WorkerPool;
