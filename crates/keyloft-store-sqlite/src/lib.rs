//! SQLite backend for keyloft's repository traits.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;
use zeroize::Zeroizing;

use keyloft_storage::{
    CreateEnvironmentParams, CreateKeyParams, CreateSecretParams, EncryptionKey, Environment,
    EnvironmentId, EnvironmentRepository, KeyId, KeyRepository, KeyState, Secret, SecretFilter,
    SecretId, SecretRepository, StoreError, UpdateSecretParams,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.keyloft/store.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".keyloft");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("store.db");
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Backend(e.to_string()),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn parse_ts(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Backend(format!("bad timestamp {secs}")))
}

fn parse_state(s: &str) -> Result<KeyState, StoreError> {
    KeyState::parse(s).ok_or_else(|| StoreError::Backend(format!("unknown key state '{s}'")))
}

// Row tuples in column order; converted with the helpers below.
type KeyRow = (String, String, Option<String>, String, i64, i64);
type SecretRow = (
    String,
    String,
    String,
    Option<String>,
    Vec<u8>,
    Vec<u8>,
    Option<String>,
    i64,
    String,
    i64,
    i64,
);

fn key_from_row(row: KeyRow) -> Result<EncryptionKey, StoreError> {
    let (id, name, description, state, created_at, updated_at) = row;
    Ok(EncryptionKey {
        id: KeyId(parse_uuid(&id)?),
        name,
        description,
        state: parse_state(&state)?,
        created_at: parse_ts(created_at)?,
        updated_at: parse_ts(updated_at)?,
    })
}

fn secret_from_row(row: SecretRow) -> Result<Secret, StoreError> {
    let (id, env_id, name, description, ciphertext, iv, tags, version, key_id, created_at, updated_at) =
        row;
    Ok(Secret {
        id: SecretId(parse_uuid(&id)?),
        environment_id: EnvironmentId(parse_uuid(&env_id)?),
        name,
        description,
        ciphertext,
        iv,
        tags,
        version,
        encryption_key_id: KeyId(parse_uuid(&key_id)?),
        created_at: parse_ts(created_at)?,
        updated_at: parse_ts(updated_at)?,
    })
}

const SECRET_COLS: &str =
    "id, environment_id, name, description, ciphertext, iv, tags, version, encryption_key_id, created_at, updated_at";

#[async_trait::async_trait]
impl KeyRepository for SqliteStore {
    async fn insert_key(&self, params: &CreateKeyParams) -> Result<EncryptionKey, StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO encryption_keys(id, name, description, key_bytes, state, created_at, updated_at)
             VALUES(?,?,?,?,'active',?,?)",
        )
        .bind(params.id.0.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(&params.key_bytes[..])
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(EncryptionKey {
            id: params.id.clone(),
            name: params.name.clone(),
            description: params.description.clone(),
            state: KeyState::Active,
            created_at: parse_ts(now)?,
            updated_at: parse_ts(now)?,
        })
    }

    async fn get_key(&self, id: &KeyId) -> Result<EncryptionKey, StoreError> {
        let row = sqlx::query_as::<_, KeyRow>(
            "SELECT id, name, description, state, created_at, updated_at
             FROM encryption_keys WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => key_from_row(row),
        }
    }

    async fn load_key_bytes(
        &self,
        id: &KeyId,
    ) -> Result<(KeyState, Zeroizing<Vec<u8>>), StoreError> {
        let row = sqlx::query_as::<_, (String, Vec<u8>)>(
            "SELECT state, key_bytes FROM encryption_keys WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((state, bytes)) => Ok((parse_state(&state)?, Zeroizing::new(bytes))),
        }
    }

    async fn list_keys(&self, include_retired: bool) -> Result<Vec<EncryptionKey>, StoreError> {
        let sql = if include_retired {
            "SELECT id, name, description, state, created_at, updated_at
             FROM encryption_keys WHERE state != 'deleted'
             ORDER BY created_at DESC, id DESC"
        } else {
            "SELECT id, name, description, state, created_at, updated_at
             FROM encryption_keys WHERE state = 'active'
             ORDER BY created_at DESC, id DESC"
        };
        let rows = sqlx::query_as::<_, KeyRow>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.into_iter().map(key_from_row).collect()
    }

    async fn set_key_state(&self, id: &KeyId, state: KeyState) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE encryption_keys SET state=?, updated_at=? WHERE id=?")
            .bind(state.as_str())
            .bind(Utc::now().timestamp())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EnvironmentRepository for SqliteStore {
    async fn insert_environment(
        &self,
        params: &CreateEnvironmentParams,
    ) -> Result<Environment, StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO environments(id, name, description, created_at, updated_at)
             VALUES(?,?,?,?,?)",
        )
        .bind(params.id.0.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Environment {
            id: params.id.clone(),
            name: params.name.clone(),
            description: params.description.clone(),
            created_at: parse_ts(now)?,
            updated_at: parse_ts(now)?,
        })
    }

    async fn get_environment(&self, id: &EnvironmentId) -> Result<Environment, StoreError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, i64, i64)>(
            "SELECT id, name, description, created_at, updated_at FROM environments WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, name, description, created_at, updated_at)) => Ok(Environment {
                id: EnvironmentId(parse_uuid(&id)?),
                name,
                description,
                created_at: parse_ts(created_at)?,
                updated_at: parse_ts(updated_at)?,
            }),
        }
    }

    async fn get_environment_by_name(&self, name: &str) -> Result<Environment, StoreError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, i64, i64)>(
            "SELECT id, name, description, created_at, updated_at FROM environments WHERE name=?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((id, name, description, created_at, updated_at)) => Ok(Environment {
                id: EnvironmentId(parse_uuid(&id)?),
                name,
                description,
                created_at: parse_ts(created_at)?,
                updated_at: parse_ts(updated_at)?,
            }),
        }
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, i64, i64)>(
            "SELECT id, name, description, created_at, updated_at FROM environments
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|(id, name, description, created_at, updated_at)| {
                Ok(Environment {
                    id: EnvironmentId(parse_uuid(&id)?),
                    name,
                    description,
                    created_at: parse_ts(created_at)?,
                    updated_at: parse_ts(updated_at)?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SecretRepository for SqliteStore {
    async fn insert_secret(&self, params: &CreateSecretParams) -> Result<Secret, StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO secrets(id, environment_id, name, description, ciphertext, iv, tags,
                                 version, encryption_key_id, created_at, updated_at)
             VALUES(?,?,?,?,?,?,?,1,?,?,?)",
        )
        .bind(params.id.0.to_string())
        .bind(params.environment_id.0.to_string())
        .bind(&params.name)
        .bind(&params.description)
        .bind(&params.ciphertext[..])
        .bind(&params.iv[..])
        .bind(&params.tags)
        .bind(params.encryption_key_id.0.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(Secret {
            id: params.id.clone(),
            environment_id: params.environment_id.clone(),
            name: params.name.clone(),
            description: params.description.clone(),
            ciphertext: params.ciphertext.clone(),
            iv: params.iv.clone(),
            tags: params.tags.clone(),
            version: 1,
            encryption_key_id: params.encryption_key_id.clone(),
            created_at: parse_ts(now)?,
            updated_at: parse_ts(now)?,
        })
    }

    async fn get_secret(&self, id: &SecretId) -> Result<Secret, StoreError> {
        let row = sqlx::query_as::<_, SecretRow>(&format!(
            "SELECT {SECRET_COLS} FROM secrets WHERE id=?"
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => secret_from_row(row),
        }
    }

    async fn get_secret_in_env(
        &self,
        environment_id: &EnvironmentId,
        id: &SecretId,
    ) -> Result<Secret, StoreError> {
        let row = sqlx::query_as::<_, SecretRow>(&format!(
            "SELECT {SECRET_COLS} FROM secrets WHERE environment_id=? AND id=?"
        ))
        .bind(environment_id.0.to_string())
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => secret_from_row(row),
        }
    }

    async fn get_secret_by_name(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<Secret, StoreError> {
        let row = sqlx::query_as::<_, SecretRow>(&format!(
            "SELECT {SECRET_COLS} FROM secrets WHERE environment_id=? AND name=?"
        ))
        .bind(environment_id.0.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => secret_from_row(row),
        }
    }

    async fn secret_exists(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "SELECT 1 FROM secrets WHERE environment_id=? AND name=? LIMIT 1",
        )
        .bind(environment_id.0.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.is_some())
    }

    async fn list_secrets(
        &self,
        environment_id: &EnvironmentId,
        filter: &SecretFilter,
    ) -> Result<Vec<Secret>, StoreError> {
        let rows = match &filter.search {
            None => {
                sqlx::query_as::<_, SecretRow>(&format!(
                    "SELECT {SECRET_COLS} FROM secrets WHERE environment_id=? ORDER BY name"
                ))
                .bind(environment_id.0.to_string())
                .fetch_all(&self.pool)
                .await
            }
            Some(search) => {
                let pattern = format!("%{search}%");
                sqlx::query_as::<_, SecretRow>(&format!(
                    "SELECT {SECRET_COLS} FROM secrets
                     WHERE environment_id=? AND (name LIKE ? OR description LIKE ?)
                     ORDER BY name"
                ))
                .bind(environment_id.0.to_string())
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx)?;

        rows.into_iter().map(secret_from_row).collect()
    }

    async fn update_secret(
        &self,
        params: &UpdateSecretParams,
        expected_version: i64,
    ) -> Result<Secret, StoreError> {
        let (ciphertext, iv, key_id) = match &params.encryption {
            Some(e) => (
                Some(e.ciphertext.clone()),
                Some(e.iv.clone()),
                Some(e.encryption_key_id.0.to_string()),
            ),
            None => (None, None, None),
        };

        // Version compare-and-swap: the write applies only when the row still
        // carries the version the caller read.
        let res = sqlx::query(
            "UPDATE secrets SET
                 description = COALESCE(?, description),
                 tags = COALESCE(?, tags),
                 ciphertext = COALESCE(?, ciphertext),
                 iv = COALESCE(?, iv),
                 encryption_key_id = COALESCE(?, encryption_key_id),
                 version = version + 1,
                 updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&params.description)
        .bind(&params.tags)
        .bind(&ciphertext)
        .bind(&iv)
        .bind(&key_id)
        .bind(Utc::now().timestamp())
        .bind(params.id.0.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query_as::<_, (i64,)>("SELECT version FROM secrets WHERE id=?")
                .bind(params.id.0.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
            return Err(match exists {
                None => StoreError::NotFound,
                Some(_) => StoreError::VersionConflict,
            });
        }

        self.get_secret(&params.id).await
    }

    async fn delete_secret(
        &self,
        environment_id: &EnvironmentId,
        name: &str,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM secrets WHERE environment_id=? AND name=?")
            .bind(environment_id.0.to_string())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(res.rows_affected() > 0)
    }
}
