//! Secret records (ciphertext + IV + key reference); no plaintext in storage.

use chrono::{DateTime, Utc};

use super::{EnvironmentId, KeyId, SecretId};

/// Stored secret. `ciphertext` is the AEAD output with the 16-byte tag
/// appended; `iv` is the 12-byte GCM IV; `encryption_key_id` names the key the
/// current ciphertext was produced under.
#[derive(Clone, Debug)]
pub struct Secret {
    pub id: SecretId,
    pub environment_id: EnvironmentId,
    pub name: String,
    pub description: Option<String>,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    /// Serialized tag list (JSON array); NULL means "no tags present", which
    /// is distinct from an empty list.
    pub tags: Option<String>,
    pub version: i64,
    pub encryption_key_id: KeyId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a secret (Version starts at 1).
#[derive(Clone, Debug)]
pub struct CreateSecretParams {
    pub id: SecretId,
    pub environment_id: EnvironmentId,
    pub name: String,
    pub description: Option<String>,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub tags: Option<String>,
    pub encryption_key_id: KeyId,
}

/// Replacement encryption fields. Ciphertext, IV, and key reference are only
/// ever written together; splitting them would leave the record undecryptable.
#[derive(Clone, Debug)]
pub struct EncryptionUpdate {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub encryption_key_id: KeyId,
}

/// Partial update of a secret. `None` fields keep their stored value; every
/// update increments the version and restamps `updated_at`.
#[derive(Clone, Debug)]
pub struct UpdateSecretParams {
    pub id: SecretId,
    pub description: Option<String>,
    pub tags: Option<String>,
    pub encryption: Option<EncryptionUpdate>,
}

/// Listing filter. Search matches substrings of name or description; case
/// sensitivity is whatever the backend's collation does.
#[derive(Clone, Debug, Default)]
pub struct SecretFilter {
    pub search: Option<String>,
}
