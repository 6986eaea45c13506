//! SQL DDL for initializing the key/value storage.

/// SQLite schema with:
/// - `key` TEXT PRIMARY KEY
/// - `value` TEXT, opaque to the store
/// - `updated_at` RFC 3339 timestamp of the last write
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
