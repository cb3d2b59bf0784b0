//! Storage abstraction for keyloft.
//!
//! Backend crates (e.g., keyloft-store-sqlite) implement the repository traits
//! so `keyloft-core` doesn't depend on any specific database engine or schema
//! details.

use thiserror::Error;

mod store;
mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("version conflict")]
    VersionConflict,
    #[error("backend error: {0}")]
    Backend(String),
}
