//! Persistence for the few pieces of state that survive a restart.
//!
//! Layout:
//! - `models.rs`: row struct for the key/value table
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: sqlx-backed store
//! - `memory.rs`: in-process store for tests and ephemeral sessions
//! - `persist.rs`: ordered write-behind queue in front of any store

pub mod memory;
pub mod models;
pub mod persist;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use models::DbEntry;
pub use persist::Persister;
pub use schema::SQLITE_INIT;
pub use sqlite::{SqlitePool, SqliteStore};

use crate::error::SyncError;

/// Persist and retrieve a string by key.
#[ractor::async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;
    async fn remove(&self, key: &str) -> Result<(), SyncError>;
}
