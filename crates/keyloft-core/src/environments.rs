//! Environment management. Environments only scope secrets; they carry no
//! cryptographic state of their own.

use std::sync::Arc;

use keyloft_storage::{
    CreateEnvironmentParams, Environment, EnvironmentId, EnvironmentRepository, StoreError,
};
use tracing::info;
use uuid::Uuid;

use crate::error::VaultError;

const MAX_ENV_NAME_LEN: usize = 100;
const MAX_ENV_DESCRIPTION_LEN: usize = 500;

#[derive(Clone)]
pub struct EnvironmentStore {
    repo: Arc<dyn EnvironmentRepository>,
}

impl EnvironmentStore {
    pub fn new(repo: Arc<dyn EnvironmentRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Environment, VaultError> {
        if name.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "environment name is required".into(),
            ));
        }
        if name.len() > MAX_ENV_NAME_LEN {
            return Err(VaultError::InvalidInput(format!(
                "environment name exceeds {MAX_ENV_NAME_LEN} characters"
            )));
        }
        if let Some(desc) = description {
            if desc.len() > MAX_ENV_DESCRIPTION_LEN {
                return Err(VaultError::InvalidInput(format!(
                    "environment description exceeds {MAX_ENV_DESCRIPTION_LEN} characters"
                )));
            }
        }

        let params = CreateEnvironmentParams {
            id: EnvironmentId(Uuid::now_v7()),
            name: name.to_string(),
            description: description.map(str::to_string),
        };

        let env = match self.repo.insert_environment(&params).await {
            Ok(env) => env,
            Err(StoreError::AlreadyExists) => {
                return Err(VaultError::Conflict(format!(
                    "environment '{name}' already exists"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        info!(environment_id = %env.id, name = %env.name, "environment created");
        Ok(env)
    }

    pub async fn get(&self, id: &EnvironmentId) -> Result<Environment, VaultError> {
        match self.repo.get_environment(id).await {
            Ok(env) => Ok(env),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("environment")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Environment, VaultError> {
        match self.repo.get_environment_by_name(name).await {
            Ok(env) => Ok(env),
            Err(StoreError::NotFound) => Err(VaultError::NotFound("environment")),
            Err(e) => Err(e.into()),
        }
    }

    /// All environments, oldest-first.
    pub async fn list(&self) -> Result<Vec<Environment>, VaultError> {
        Ok(self.repo.list_environments().await?)
    }
}
