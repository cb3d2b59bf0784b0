//! The repository traits that backends implement.

use zeroize::Zeroizing;

use crate::types::*;
use crate::StoreError;

/// Encryption key persistence.
///
/// Key bytes leave the backend only through [`KeyRepository::load_key_bytes`];
/// every other method deals in metadata.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait KeyRepository: Send + Sync {
    /// Persist a new key. Fails `AlreadyExists` when a non-deleted key with
    /// the same name exists; backends must enforce this atomically (unique
    /// index), not with a read-then-insert.
    async fn insert_key(&self, params: &CreateKeyParams) -> Result<EncryptionKey, StoreError>;

    /// Get key metadata by id, whatever its state (deleted included).
    async fn get_key(&self, id: &KeyId) -> Result<EncryptionKey, StoreError>;

    /// Load the raw key bytes together with the key's current state.
    /// Deleted keys are still loadable: their bytes must remain available for
    /// decrypting legacy ciphertext until it is rotated away.
    async fn load_key_bytes(
        &self,
        id: &KeyId,
    ) -> Result<(KeyState, Zeroizing<Vec<u8>>), StoreError>;

    /// List key metadata newest-first, excluding deleted keys. Retired keys
    /// are included only when `include_retired` is set.
    async fn list_keys(&self, include_retired: bool) -> Result<Vec<EncryptionKey>, StoreError>;

    /// Transition a key's lifecycle state, restamping `updated_at`.
    async fn set_key_state(&self, id: &KeyId, state: KeyState) -> Result<(), StoreError>;
}

/// Environment persistence.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait EnvironmentRepository: Send + Sync {
    /// Persist a new environment. Fails `AlreadyExists` on a duplicate name.
    async fn insert_environment(
        &self,
        params: &CreateEnvironmentParams,
    ) -> Result<Environment, StoreError>;

    /// Get an environment by id.
    async fn get_environment(&self, id: &EnvironmentId) -> Result<Environment, StoreError>;

    /// Get an environment by name.
    async fn get_environment_by_name(&self, name: &str) -> Result<Environment, StoreError>;

    /// List all environments, oldest-first.
    async fn list_environments(&self) -> Result<Vec<Environment>, StoreError>;
}

/// Secret persistence, keyed by (environment, name) or (environment, id).
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait SecretRepository: Send + Sync {
    /// Persist a new secret with version 1. Fails `AlreadyExists` when the
    /// (environment, name) pair is taken; enforced atomically by the backend.
    async fn insert_secret(&self, params: &CreateSecretParams) -> Result<Secret, StoreError>;

    /// Get a secret by id alone (rotation is addressed by secret id).
    async fn get_secret(&self, id: &SecretId) -> Result<Secret, StoreError>;

    /// Get a secret by id within an environment.
    async fn get_secret_in_env(
        &self,
        environment_id: &EnvironmentId,
        id: &SecretId,
    ) -> Result<Secret, StoreError>;

    /// Get a secret by name within an environment.
    async fn get_secret_by_name(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<Secret, StoreError>;

    /// Whether a secret with this name exists in the environment.
    async fn secret_exists(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, StoreError>;

    /// List secrets in an environment ordered by name, applying the filter's
    /// search term in the backend.
    async fn list_secrets(
        &self,
        environment_id: &EnvironmentId,
        filter: &SecretFilter,
    ) -> Result<Vec<Secret>, StoreError>;

    /// Apply a partial update as a single atomic read-modify-write: the row is
    /// only written when its version still equals `expected_version`, and the
    /// write bumps the version and restamps `updated_at`. Losing the race is
    /// `VersionConflict`.
    async fn update_secret(
        &self,
        params: &UpdateSecretParams,
        expected_version: i64,
    ) -> Result<Secret, StoreError>;

    /// Hard-delete a secret. Returns `false` when it was not there.
    async fn delete_secret(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    // Tiny compile-time smoke test for trait object usage.
    struct NoopKeys;

    #[async_trait::async_trait]
    impl KeyRepository for NoopKeys {
        async fn insert_key(&self, params: &CreateKeyParams) -> Result<EncryptionKey, StoreError> {
            Ok(EncryptionKey {
                id: params.id.clone(),
                name: params.name.clone(),
                description: params.description.clone(),
                state: KeyState::Active,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
        }

        async fn get_key(&self, _id: &KeyId) -> Result<EncryptionKey, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn load_key_bytes(
            &self,
            _id: &KeyId,
        ) -> Result<(KeyState, Zeroizing<Vec<u8>>), StoreError> {
            Err(StoreError::NotFound)
        }

        async fn list_keys(
            &self,
            _include_retired: bool,
        ) -> Result<Vec<EncryptionKey>, StoreError> {
            Ok(vec![])
        }

        async fn set_key_state(&self, _id: &KeyId, _state: KeyState) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn trait_object_smoke() {
        let repo: Box<dyn KeyRepository> = Box::new(NoopKeys);
        let key = repo
            .insert_key(&CreateKeyParams {
                id: KeyId(Uuid::now_v7()),
                name: "primary".into(),
                description: None,
                key_bytes: Zeroizing::new(vec![0u8; 32]),
            })
            .await
            .unwrap();
        assert_eq!(key.state, KeyState::Active);
        assert!(repo.list_keys(true).await.unwrap().is_empty());
    }

    #[test]
    fn key_state_round_trips_as_str() {
        for state in [KeyState::Active, KeyState::Retired, KeyState::Deleted] {
            assert_eq!(KeyState::parse(state.as_str()), Some(state));
        }
        assert_eq!(KeyState::parse("archived"), None);
    }

    #[test]
    fn create_key_params_debug_redacts_bytes() {
        let params = CreateKeyParams {
            id: KeyId(Uuid::now_v7()),
            name: "primary".into(),
            description: None,
            key_bytes: Zeroizing::new(vec![0xAB; 32]),
        };
        let rendered = format!("{params:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("171")); // 0xAB
    }
}
