pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod service;
pub mod types;

pub use context::AppContext;
pub use error::{ApiError, SyncError};
