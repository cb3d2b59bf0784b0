//! Error taxonomy for the vault core.
//!
//! Every operation returns one of these; the caller (e.g., an HTTP layer) maps
//! them to transport-level responses. The core never catches and discards
//! them, with one deliberate exception: malformed stored tag data decodes to
//! "no tags" because tags are non-authoritative display metadata.

use keyloft_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Uniqueness violation (duplicate key name, duplicate secret name within
    /// an environment).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An active encryption key was required but the referenced key is
    /// missing, retired, or deleted.
    #[error("encryption key not found or not active")]
    KeyNotFound,

    /// AEAD tag verification failed: tampering, wrong key, wrong IV, or
    /// corrupted storage. Security-relevant; never masked as "not found" and
    /// never retried automatically.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Stored data violates an invariant the write paths are supposed to
    /// uphold (e.g., a secret referencing a key record that no longer exists).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Lost the race on an atomic read-modify-write; the caller may retry.
    #[error("concurrent modification")]
    ConcurrentModification,

    /// Rotation to the key the secret is already encrypted under.
    #[error("secret is already encrypted with this key")]
    SameKey,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
