use settlement_engine::SqliteDatabase;

/// Fresh, migrated, throwaway database per test so tests can run concurrently.
pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let path = std::env::temp_dir().join(format!("spg_test_{}.db", rand::random::<u64>()));
    let url = format!("sqlite://{}", path.display());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to test database");
    db.migrate().await.expect("Error running DB migrations");
    db
}
