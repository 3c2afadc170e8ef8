//! Storage underneath the isolation layers.
//!
//! - **Entity storage** ([`StorageEngine`]): typed key-value store behind the
//!   tenant-scoped repository, with a [`DashMap`](dashmap::DashMap) engine
//! - **Statement engine** ([`MemoryDatabase`]): executes structured statements
//!   behind the statement guard
//!
//! Neither layer knows about tenants.

pub mod database;
pub mod engine;

pub mod engines {
    pub mod hashmap;

    pub use hashmap::HashMapStorage;
}

pub use database::MemoryDatabase;
pub use engine::StorageEngine;
pub use engines::HashMapStorage;
