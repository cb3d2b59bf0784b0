//! Encryption key records.

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use super::KeyId;

/// Lifecycle state of an encryption key.
///
/// `Retired` keys stay resolvable for decrypting data already encrypted under
/// them, but may not encrypt anything new. `Deleted` keys are hidden from all
/// listing and lookup paths; their bytes are retained so legacy ciphertext
/// remains decryptable until it is rotated away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyState {
    Active,
    Retired,
    Deleted,
}

impl KeyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyState::Active => "active",
            KeyState::Retired => "retired",
            KeyState::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(KeyState::Active),
            "retired" => Some(KeyState::Retired),
            "deleted" => Some(KeyState::Deleted),
            _ => None,
        }
    }
}

/// Encryption key metadata. Key bytes are never part of this record; backends
/// hand them out only through `KeyRepository::load_key_bytes`.
#[derive(Clone, Debug)]
pub struct EncryptionKey {
    pub id: KeyId,
    pub name: String,
    pub description: Option<String>,
    pub state: KeyState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for persisting a newly generated key.
#[derive(Clone)]
pub struct CreateKeyParams {
    pub id: KeyId,
    pub name: String,
    pub description: Option<String>,
    /// 32 bytes of freshly generated key material.
    pub key_bytes: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for CreateKeyParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateKeyParams")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("key_bytes", &"<redacted>")
            .finish()
    }
}
