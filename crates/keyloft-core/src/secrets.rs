//! Secret record CRUD, independent of cryptography.
//!
//! `SecretStore` validates inputs, maps store errors onto the vault taxonomy,
//! and owns the tag codec. It never sees plaintext; ciphertext and IV arrive
//! already produced by the service layer.

use std::sync::Arc;

use keyloft_storage::{
    CreateSecretParams, EnvironmentId, Secret, SecretFilter, SecretId, SecretRepository,
    StoreError, UpdateSecretParams,
};
use tracing::info;

use crate::error::VaultError;

pub(crate) const MAX_SECRET_NAME_LEN: usize = 255;
pub(crate) const MAX_SECRET_DESCRIPTION_LEN: usize = 1000;

/// Serialize a tag list for storage. No tags and an empty list both encode to
/// "no tags present" (NULL in the store).
pub fn encode_tags(tags: Option<&[String]>) -> Option<String> {
    match tags {
        None => None,
        Some([]) => None,
        Some(list) => serde_json::to_string(list).ok(),
    }
}

/// Decode stored tag data. Malformed data decodes to "no tags" instead of
/// propagating a parse error: tags are non-authoritative display metadata and
/// a corrupt tag blob must not make the secret itself unreadable.
pub fn decode_tags(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    serde_json::from_str(raw).ok()
}

#[derive(Clone)]
pub struct SecretStore {
    repo: Arc<dyn SecretRepository>,
}

impl SecretStore {
    pub fn new(repo: Arc<dyn SecretRepository>) -> Self {
        Self { repo }
    }

    pub(crate) fn validate_name(name: &str) -> Result<(), VaultError> {
        if name.trim().is_empty() {
            return Err(VaultError::InvalidInput("secret name is required".into()));
        }
        if name.len() > MAX_SECRET_NAME_LEN {
            return Err(VaultError::InvalidInput(format!(
                "secret name exceeds {MAX_SECRET_NAME_LEN} characters"
            )));
        }
        Ok(())
    }

    pub(crate) fn validate_description(description: Option<&str>) -> Result<(), VaultError> {
        if let Some(desc) = description {
            if desc.len() > MAX_SECRET_DESCRIPTION_LEN {
                return Err(VaultError::InvalidInput(format!(
                    "secret description exceeds {MAX_SECRET_DESCRIPTION_LEN} characters"
                )));
            }
        }
        Ok(())
    }

    pub async fn exists(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, VaultError> {
        Ok(self.repo.secret_exists(environment_id, name).await?)
    }

    /// Persist a new secret. The (name, environment) pair must be free; a
    /// concurrent create of the same pair is resolved by the store's unique
    /// index, so the loser surfaces as `Conflict` here.
    pub async fn create(&self, params: CreateSecretParams) -> Result<Secret, VaultError> {
        Self::validate_name(&params.name)?;
        Self::validate_description(params.description.as_deref())?;

        let secret = match self.repo.insert_secret(&params).await {
            Ok(secret) => secret,
            Err(StoreError::AlreadyExists) => {
                return Err(VaultError::Conflict(format!(
                    "secret '{}' already exists in this environment",
                    params.name
                )))
            }
            Err(e) => return Err(e.into()),
        };

        info!(secret_id = %secret.id, environment_id = %secret.environment_id, "secret created");
        Ok(secret)
    }

    /// Secret by id alone; rotation addresses secrets this way.
    pub async fn find(&self, id: &SecretId) -> Result<Secret, VaultError> {
        match self.repo.get_secret(id).await {
            Ok(secret) => Ok(secret),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("secret")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(
        &self,
        environment_id: &EnvironmentId,
        id: &SecretId,
    ) -> Result<Secret, VaultError> {
        match self.repo.get_secret_in_env(environment_id, id).await {
            Ok(secret) => Ok(secret),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("secret")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_name(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<Secret, VaultError> {
        match self.repo.get_secret_by_name(environment_id, name).await {
            Ok(secret) => Ok(secret),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("secret")),
            Err(e) => Err(e.into()),
        }
    }

    /// Secrets in an environment ordered by name. `search` is matched by the
    /// store as a substring of name or description; `tag` must match one of
    /// the decoded tags exactly.
    pub async fn list(
        &self,
        environment_id: &EnvironmentId,
        tag: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Secret>, VaultError> {
        let filter = SecretFilter {
            search: search.map(str::to_string),
        };
        let mut secrets = self.repo.list_secrets(environment_id, &filter).await?;

        if let Some(tag) = tag {
            secrets.retain(|s| {
                decode_tags(s.tags.as_deref())
                    .is_some_and(|tags| tags.iter().any(|t| t == tag))
            });
        }

        Ok(secrets)
    }

    /// Atomic partial update against an expected version.
    pub async fn update(
        &self,
        params: UpdateSecretParams,
        expected_version: i64,
    ) -> Result<Secret, VaultError> {
        Self::validate_description(params.description.as_deref())?;

        match self.repo.update_secret(&params, expected_version).await {
            Ok(secret) => Ok(secret),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("secret")),
            Err(StoreError::VersionConflict) => Err(VaultError::ConcurrentModification),
            Err(e) => Err(e.into()),
        }
    }

    /// Hard delete; `false` when the secret was not there.
    pub async fn delete(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, VaultError> {
        let deleted = self.repo.delete_secret(environment_id, name).await?;
        if deleted {
            info!(environment_id = %environment_id, "secret deleted");
        }
        Ok(deleted)
    }
}
