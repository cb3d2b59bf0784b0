use keyloft_storage::{
    CreateEnvironmentParams, CreateKeyParams, CreateSecretParams, EncryptionUpdate, EnvironmentId,
    EnvironmentRepository, KeyId, KeyRepository, KeyState, SecretFilter, SecretId,
    SecretRepository, StoreError, UpdateSecretParams,
};
use keyloft_store_sqlite::SqliteStore;
use uuid::Uuid;
use zeroize::Zeroizing;

fn key_params(name: &str) -> CreateKeyParams {
    CreateKeyParams {
        id: KeyId(Uuid::now_v7()),
        name: name.to_string(),
        description: None,
        key_bytes: Zeroizing::new(vec![0x42; 32]),
    }
}

fn env_params(name: &str) -> CreateEnvironmentParams {
    CreateEnvironmentParams {
        id: EnvironmentId(Uuid::now_v7()),
        name: name.to_string(),
        description: None,
    }
}

fn secret_params(env: &EnvironmentId, key: &KeyId, name: &str) -> CreateSecretParams {
    CreateSecretParams {
        id: SecretId(Uuid::now_v7()),
        environment_id: env.clone(),
        name: name.to_string(),
        description: Some("a test secret".to_string()),
        ciphertext: vec![8u8; 32],
        iv: vec![7u8; 12],
        tags: None,
        encryption_key_id: key.clone(),
    }
}

#[tokio::test]
async fn environments_round_trip_and_unique_name() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let env = s.insert_environment(&env_params("prod")).await.unwrap();
    let by_name = s.get_environment_by_name("prod").await.unwrap();
    assert_eq!(by_name.id, env.id);
    let by_id = s.get_environment(&env.id).await.unwrap();
    assert_eq!(by_id.name, "prod");

    assert!(matches!(
        s.insert_environment(&env_params("prod")).await,
        Err(StoreError::AlreadyExists)
    ));

    s.insert_environment(&env_params("staging")).await.unwrap();
    let all = s.list_environments().await.unwrap();
    assert_eq!(all.len(), 2);

    assert!(matches!(
        s.get_environment_by_name("missing").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn key_lifecycle_and_listing() {
    let s = SqliteStore::open_in_memory().await.unwrap();

    let k1 = s.insert_key(&key_params("primary")).await.unwrap();
    assert_eq!(k1.state, KeyState::Active);

    // live name uniqueness
    assert!(matches!(
        s.insert_key(&key_params("primary")).await,
        Err(StoreError::AlreadyExists)
    ));

    s.insert_key(&key_params("secondary")).await.unwrap();

    // active only by default
    let active = s.list_keys(false).await.unwrap();
    assert_eq!(active.len(), 2);

    s.set_key_state(&k1.id, KeyState::Retired).await.unwrap();
    let active = s.list_keys(false).await.unwrap();
    assert_eq!(active.len(), 1);
    let with_retired = s.list_keys(true).await.unwrap();
    assert_eq!(with_retired.len(), 2);

    // soft delete hides the key from listings but keeps the record
    s.set_key_state(&k1.id, KeyState::Deleted).await.unwrap();
    let with_retired = s.list_keys(true).await.unwrap();
    assert_eq!(with_retired.len(), 1);
    let gone = s.get_key(&k1.id).await.unwrap();
    assert_eq!(gone.state, KeyState::Deleted);

    // bytes of a deleted key stay loadable for legacy ciphertext
    let (state, bytes) = s.load_key_bytes(&k1.id).await.unwrap();
    assert_eq!(state, KeyState::Deleted);
    assert_eq!(bytes.len(), 32);

    // the name is reusable once the previous holder is deleted
    s.insert_key(&key_params("primary")).await.unwrap();

    assert!(matches!(
        s.set_key_state(&KeyId(Uuid::now_v7()), KeyState::Retired)
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn secret_uniqueness_is_scoped_to_environment() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let key = s.insert_key(&key_params("k")).await.unwrap();
    let prod = s.insert_environment(&env_params("prod")).await.unwrap();
    let dev = s.insert_environment(&env_params("dev")).await.unwrap();

    s.insert_secret(&secret_params(&prod.id, &key.id, "db/password"))
        .await
        .unwrap();
    assert!(matches!(
        s.insert_secret(&secret_params(&prod.id, &key.id, "db/password"))
            .await,
        Err(StoreError::AlreadyExists)
    ));

    // same name in a different environment is fine
    s.insert_secret(&secret_params(&dev.id, &key.id, "db/password"))
        .await
        .unwrap();

    assert!(s.secret_exists(&prod.id, "db/password").await.unwrap());
    assert!(!s.secret_exists(&prod.id, "db/user").await.unwrap());
}

#[tokio::test]
async fn secret_lookup_listing_and_search() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let key = s.insert_key(&key_params("k")).await.unwrap();
    let env = s.insert_environment(&env_params("prod")).await.unwrap();

    let created = s
        .insert_secret(&secret_params(&env.id, &key.id, "db/password"))
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    let by_name = s.get_secret_by_name(&env.id, "db/password").await.unwrap();
    assert_eq!(by_name.id, created.id);
    let by_id = s.get_secret_in_env(&env.id, &created.id).await.unwrap();
    assert_eq!(by_id.name, "db/password");
    let global = s.get_secret(&created.id).await.unwrap();
    assert_eq!(global.environment_id, env.id);

    s.insert_secret(&secret_params(&env.id, &key.id, "api-token"))
        .await
        .unwrap();
    s.insert_secret(&secret_params(&env.id, &key.id, "smtp/password"))
        .await
        .unwrap();

    let all = s
        .list_secrets(&env.id, &SecretFilter::default())
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["api-token", "db/password", "smtp/password"],
        "listing is ordered by name"
    );

    let filter = SecretFilter {
        search: Some("password".to_string()),
    };
    let hits = s.list_secrets(&env.id, &filter).await.unwrap();
    assert_eq!(hits.len(), 2);

    // search also matches descriptions
    let filter = SecretFilter {
        search: Some("test secret".to_string()),
    };
    let hits = s.list_secrets(&env.id, &filter).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn secret_update_is_versioned_compare_and_swap() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let key = s.insert_key(&key_params("k")).await.unwrap();
    let new_key = s.insert_key(&key_params("k2")).await.unwrap();
    let env = s.insert_environment(&env_params("prod")).await.unwrap();
    let created = s
        .insert_secret(&secret_params(&env.id, &key.id, "db/password"))
        .await
        .unwrap();

    let rotate = UpdateSecretParams {
        id: created.id.clone(),
        description: None,
        tags: None,
        encryption: Some(EncryptionUpdate {
            ciphertext: vec![9u8; 40],
            iv: vec![1u8; 12],
            encryption_key_id: new_key.id.clone(),
        }),
    };

    let updated = s.update_secret(&rotate, created.version).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.encryption_key_id, new_key.id);
    assert_eq!(updated.ciphertext, vec![9u8; 40]);
    assert_eq!(updated.iv, vec![1u8; 12]);
    // untouched fields survive a partial update
    assert_eq!(updated.description.as_deref(), Some("a test secret"));

    // stale version loses the race
    assert!(matches!(
        s.update_secret(&rotate, created.version).await,
        Err(StoreError::VersionConflict)
    ));

    // metadata-only update still bumps the version
    let meta = UpdateSecretParams {
        id: created.id.clone(),
        description: Some("rotated".to_string()),
        tags: Some("[\"db\"]".to_string()),
        encryption: None,
    };
    let updated = s.update_secret(&meta, 2).await.unwrap();
    assert_eq!(updated.version, 3);
    assert_eq!(updated.description.as_deref(), Some("rotated"));
    assert_eq!(updated.tags.as_deref(), Some("[\"db\"]"));
    assert_eq!(updated.ciphertext, vec![9u8; 40], "encryption fields kept");

    // unknown id is NotFound, not a version conflict
    let missing = UpdateSecretParams {
        id: SecretId(Uuid::now_v7()),
        description: Some("x".to_string()),
        tags: None,
        encryption: None,
    };
    assert!(matches!(
        s.update_secret(&missing, 1).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn secret_delete_reports_presence() {
    let s = SqliteStore::open_in_memory().await.unwrap();
    let key = s.insert_key(&key_params("k")).await.unwrap();
    let env = s.insert_environment(&env_params("prod")).await.unwrap();
    s.insert_secret(&secret_params(&env.id, &key.id, "db/password"))
        .await
        .unwrap();

    assert!(s.delete_secret(&env.id, "db/password").await.unwrap());
    assert!(!s.delete_secret(&env.id, "db/password").await.unwrap());
    assert!(matches!(
        s.get_secret_by_name(&env.id, "db/password").await,
        Err(StoreError::NotFound)
    ));
}
