//! Orchestration of KeyStore + AEAD + SecretStore: encrypt-on-write,
//! decrypt-on-read, and key rotation.
//!
//! Plaintext exists only inside these methods, held in zeroizing buffers for
//! the duration of the encrypt/decrypt call. Nothing here logs or returns it
//! except `reveal_secret`, whose whole purpose is returning it.

use chrono::{DateTime, Utc};
use keyloft_crypto::{DecryptError, EncryptError, Iv};
use keyloft_storage::{
    CreateSecretParams, EncryptionUpdate, EnvironmentId, KeyId, Secret, SecretId,
    UpdateSecretParams,
};
use tracing::info;
use uuid::Uuid;

use crate::error::VaultError;
use crate::keys::KeyStore;
use crate::secrets::{decode_tags, encode_tags, SecretStore};

/// Request to create a secret.
#[derive(Clone)]
pub struct CreateSecret {
    pub name: String,
    pub description: Option<String>,
    pub value: String,
    pub tags: Option<Vec<String>>,
    pub environment_id: EnvironmentId,
    pub encryption_key_id: KeyId,
}

/// Partial update of a secret; `None` fields are left alone. A provided value
/// is re-encrypted under the secret's current key.
#[derive(Clone, Debug, Default)]
pub struct UpdateSecret {
    pub value: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Address a secret within an environment by id or by name.
#[derive(Clone, Debug)]
pub enum SecretLookup {
    Id(SecretId),
    Name(String),
}

/// Secret metadata returned to callers. Never carries the decrypted value.
#[derive(Clone, Debug)]
pub struct SecretSummary {
    pub id: SecretId,
    pub name: String,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub version: i64,
    pub environment_id: EnvironmentId,
    pub encryption_key_id: KeyId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SecretCryptoService {
    keys: KeyStore,
    secrets: SecretStore,
}

impl SecretCryptoService {
    pub fn new(keys: KeyStore, secrets: SecretStore) -> Self {
        Self { keys, secrets }
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Encrypt-on-write: resolve the chosen key (it must be active), encrypt
    /// the value under a fresh IV, persist ciphertext + IV + key reference
    /// with version 1.
    pub async fn create_secret(&self, req: CreateSecret) -> Result<SecretSummary, VaultError> {
        if self.secrets.exists(&req.environment_id, &req.name).await? {
            return Err(VaultError::Conflict(format!(
                "secret '{}' already exists in this environment",
                req.name
            )));
        }

        let material = self.keys.resolve_active(&req.encryption_key_id).await?;
        let (iv, ciphertext) =
            keyloft_crypto::encrypt(req.value.as_bytes(), &material).map_err(map_encrypt)?;

        let secret = self
            .secrets
            .create(CreateSecretParams {
                id: SecretId(Uuid::now_v7()),
                environment_id: req.environment_id.clone(),
                name: req.name.clone(),
                description: req.description.clone(),
                ciphertext: ciphertext.0,
                iv: iv.0.to_vec(),
                tags: encode_tags(req.tags.as_deref()),
                encryption_key_id: req.encryption_key_id.clone(),
            })
            .await?;

        Ok(summarize(secret))
    }

    /// Decrypt-on-read. The key reference on the record is load-bearing: the
    /// key is resolved whatever its state (deleted included), and a failed tag
    /// check surfaces as `AuthenticationFailed`, never as "not found".
    pub async fn reveal_secret(
        &self,
        environment_id: &EnvironmentId,
        lookup: &SecretLookup,
    ) -> Result<String, VaultError> {
        let secret = self.load(environment_id, lookup).await?;

        let material = self.keys.resolve_any(&secret.encryption_key_id).await?;
        let iv = parse_stored_iv(&secret.iv)?;
        let plaintext =
            keyloft_crypto::decrypt(&secret.ciphertext, &iv, &material).map_err(map_decrypt)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| VaultError::Integrity("secret value is not valid UTF-8".into()))
    }

    /// Secret metadata without the value.
    pub async fn get_secret(
        &self,
        environment_id: &EnvironmentId,
        lookup: &SecretLookup,
    ) -> Result<SecretSummary, VaultError> {
        Ok(summarize(self.load(environment_id, lookup).await?))
    }

    /// Summaries of the environment's secrets ordered by name, optionally
    /// narrowed by exact tag and/or name/description substring search.
    pub async fn list_secrets(
        &self,
        environment_id: &EnvironmentId,
        tag: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<SecretSummary>, VaultError> {
        let secrets = self.secrets.list(environment_id, tag, search).await?;
        Ok(secrets.into_iter().map(summarize).collect())
    }

    /// Update value and/or metadata. A new value is re-encrypted under the
    /// secret's current key, which must still be active — writing fresh
    /// ciphertext under a retired key is refused; rotate first. Every update,
    /// metadata-only included, increments the version.
    pub async fn update_secret(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
        update: UpdateSecret,
    ) -> Result<SecretSummary, VaultError> {
        let secret = self.secrets.find_by_name(environment_id, name).await?;

        let encryption = match &update.value {
            None => None,
            Some(value) => {
                let material = self.keys.resolve_active(&secret.encryption_key_id).await?;
                let (iv, ciphertext) =
                    keyloft_crypto::encrypt(value.as_bytes(), &material).map_err(map_encrypt)?;
                Some(EncryptionUpdate {
                    ciphertext: ciphertext.0,
                    iv: iv.0.to_vec(),
                    // Value updates keep the current key; only rotation may
                    // change the reference.
                    encryption_key_id: secret.encryption_key_id.clone(),
                })
            }
        };

        let updated = self
            .secrets
            .update(
                UpdateSecretParams {
                    id: secret.id.clone(),
                    description: update.description.clone(),
                    tags: encode_tags(update.tags.as_deref()),
                    encryption,
                },
                secret.version,
            )
            .await?;

        Ok(summarize(updated))
    }

    /// Re-encrypt a secret under a different key: decrypt under the old key,
    /// encrypt under the new one, and replace ciphertext, IV, and key
    /// reference in one atomic versioned write. Any failure before that write
    /// leaves the secret untouched; plaintext is dropped before returning.
    pub async fn rotate_key(
        &self,
        secret_id: &SecretId,
        new_key_id: &KeyId,
    ) -> Result<SecretSummary, VaultError> {
        let secret = self.secrets.find(secret_id).await?;

        if &secret.encryption_key_id == new_key_id {
            return Err(VaultError::SameKey);
        }

        let new_material = self.keys.resolve_active(new_key_id).await?;
        let old_material = self.keys.resolve_any(&secret.encryption_key_id).await?;

        let iv = parse_stored_iv(&secret.iv)?;
        let plaintext =
            keyloft_crypto::decrypt(&secret.ciphertext, &iv, &old_material).map_err(map_decrypt)?;
        let (new_iv, new_ciphertext) =
            keyloft_crypto::encrypt(&plaintext, &new_material).map_err(map_encrypt)?;
        drop(plaintext);

        let updated = self
            .secrets
            .update(
                UpdateSecretParams {
                    id: secret.id.clone(),
                    description: None,
                    tags: None,
                    encryption: Some(EncryptionUpdate {
                        ciphertext: new_ciphertext.0,
                        iv: new_iv.0.to_vec(),
                        encryption_key_id: new_key_id.clone(),
                    }),
                },
                secret.version,
            )
            .await?;

        info!(
            secret_id = %updated.id,
            old_key_id = %secret.encryption_key_id,
            new_key_id = %new_key_id,
            "secret rotated to new encryption key"
        );
        Ok(summarize(updated))
    }

    pub async fn delete_secret(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, VaultError> {
        self.secrets.delete(environment_id, name).await
    }

    async fn load(
        &self,
        environment_id: &EnvironmentId,
        lookup: &SecretLookup,
    ) -> Result<Secret, VaultError> {
        match lookup {
            SecretLookup::Id(id) => self.secrets.find_by_id(environment_id, id).await,
            SecretLookup::Name(name) => self.secrets.find_by_name(environment_id, name).await,
        }
    }
}

fn summarize(secret: Secret) -> SecretSummary {
    SecretSummary {
        id: secret.id,
        name: secret.name,
        description: secret.description,
        tags: decode_tags(secret.tags.as_deref()),
        version: secret.version,
        environment_id: secret.environment_id,
        encryption_key_id: secret.encryption_key_id,
        created_at: secret.created_at,
        updated_at: secret.updated_at,
    }
}

fn parse_stored_iv(iv: &[u8]) -> Result<Iv, VaultError> {
    Iv::from_slice(iv).map_err(|_| VaultError::Integrity("stored IV is not 12 bytes".into()))
}

fn map_encrypt(e: EncryptError) -> VaultError {
    match e {
        EncryptError::EmptyPlaintext => {
            VaultError::InvalidInput("secret value must not be empty".into())
        }
        EncryptError::AeadFailed(_) => VaultError::Integrity("AEAD encryption failed".into()),
    }
}

fn map_decrypt(e: DecryptError) -> VaultError {
    match e {
        DecryptError::AuthenticationFailed => VaultError::AuthenticationFailed,
        DecryptError::TooShort => {
            VaultError::Integrity("stored ciphertext shorter than authentication tag".into())
        }
    }
}
