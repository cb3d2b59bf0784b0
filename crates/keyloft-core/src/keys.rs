//! Encryption key management.
//!
//! `KeyStore` owns key generation and the active/retired/deleted lifecycle.
//! Key bytes cross its boundary only as [`KeyMaterial`], and only toward the
//! encrypt/decrypt paths; listing and lookup surface metadata alone.

use std::sync::Arc;

use keyloft_crypto::KeyMaterial;
use keyloft_storage::{
    CreateKeyParams, EncryptionKey, KeyId, KeyRepository, KeyState, StoreError,
};
use tracing::info;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::VaultError;

const MAX_KEY_DESCRIPTION_LEN: usize = 300;

#[derive(Clone)]
pub struct KeyStore {
    repo: Arc<dyn KeyRepository>,
}

impl KeyStore {
    pub fn new(repo: Arc<dyn KeyRepository>) -> Self {
        Self { repo }
    }

    /// Generate 32 bytes of fresh key material and persist it as a new active
    /// key. Name uniqueness (among non-deleted keys) is enforced by the store.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<EncryptionKey, VaultError> {
        if name.trim().is_empty() {
            return Err(VaultError::InvalidInput("key name is required".into()));
        }
        if let Some(desc) = description {
            if desc.len() > MAX_KEY_DESCRIPTION_LEN {
                return Err(VaultError::InvalidInput(format!(
                    "key description exceeds {MAX_KEY_DESCRIPTION_LEN} characters"
                )));
            }
        }

        let material = keyloft_crypto::generate_key();
        let params = CreateKeyParams {
            id: KeyId(Uuid::now_v7()),
            name: name.to_string(),
            description: description.map(str::to_string),
            key_bytes: Zeroizing::new(material.as_bytes().to_vec()),
        };

        let key = match self.repo.insert_key(&params).await {
            Ok(key) => key,
            Err(StoreError::AlreadyExists) => {
                return Err(VaultError::Conflict(format!(
                    "encryption key '{name}' already exists"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        info!(key_id = %key.id, name = %key.name, "encryption key created");
        Ok(key)
    }

    /// Key metadata by id; deleted keys are not addressable here.
    pub async fn get(&self, id: &KeyId) -> Result<EncryptionKey, VaultError> {
        let key = match self.repo.get_key(id).await {
            Ok(key) => key,
            Err(StoreError::NotFound) => return Err(VaultError::NotFound("encryption key")),
            Err(e) => return Err(e.into()),
        };
        if key.state == KeyState::Deleted {
            return Err(VaultError::NotFound("encryption key"));
        }
        Ok(key)
    }

    /// Key metadata newest-first, excluding deleted keys. Retired keys appear
    /// only when `include_retired` is set.
    pub async fn list(&self, include_retired: bool) -> Result<Vec<EncryptionKey>, VaultError> {
        Ok(self.repo.list_keys(include_retired).await?)
    }

    /// Take an active key out of service for new encryption. Existing
    /// ciphertext under it stays decryptable.
    pub async fn retire(&self, id: &KeyId) -> Result<(), VaultError> {
        let key = self.get(id).await?;
        self.repo.set_key_state(&key.id, KeyState::Retired).await?;
        info!(key_id = %key.id, "encryption key retired");
        Ok(())
    }

    /// Soft-delete a key. The record (and its bytes) is retained so secrets
    /// still referencing it remain decryptable until they are rotated away,
    /// but it disappears from every listing and lookup path.
    pub async fn remove(&self, id: &KeyId) -> Result<(), VaultError> {
        let key = self.get(id).await?;
        self.repo.set_key_state(&key.id, KeyState::Deleted).await?;
        info!(key_id = %key.id, "encryption key deleted");
        Ok(())
    }

    /// Resolve key material for encrypting *new* data. Only active keys
    /// qualify; a missing, retired, or deleted key is `KeyNotFound`.
    pub async fn resolve_active(&self, id: &KeyId) -> Result<KeyMaterial, VaultError> {
        let (state, bytes) = match self.repo.load_key_bytes(id).await {
            Ok(loaded) => loaded,
            Err(StoreError::NotFound) => return Err(VaultError::KeyNotFound),
            Err(e) => return Err(e.into()),
        };
        if state != KeyState::Active {
            return Err(VaultError::KeyNotFound);
        }
        material_from_bytes(id, &bytes)
    }

    /// Resolve key material for decrypting existing ciphertext. Works for any
    /// state, deleted included; only a vanished key record fails, and that is
    /// an integrity violation because write paths never drop key rows.
    pub async fn resolve_any(&self, id: &KeyId) -> Result<KeyMaterial, VaultError> {
        let (_, bytes) = match self.repo.load_key_bytes(id).await {
            Ok(loaded) => loaded,
            Err(StoreError::NotFound) => {
                return Err(VaultError::Integrity(format!(
                    "referenced encryption key {id} does not exist"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        material_from_bytes(id, &bytes)
    }
}

fn material_from_bytes(id: &KeyId, bytes: &[u8]) -> Result<KeyMaterial, VaultError> {
    KeyMaterial::from_bytes(bytes)
        .map_err(|_| VaultError::Integrity(format!("stored key {id} is not 32 bytes")))
}
