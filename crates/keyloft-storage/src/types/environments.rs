//! Environment records. Environments are pure scoping containers for secrets.

use chrono::{DateTime, Utc};

use super::EnvironmentId;

/// Environment record
#[derive(Clone, Debug)]
pub struct Environment {
    pub id: EnvironmentId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating an environment
#[derive(Clone, Debug)]
pub struct CreateEnvironmentParams {
    pub id: EnvironmentId,
    pub name: String,
    pub description: Option<String>,
}
