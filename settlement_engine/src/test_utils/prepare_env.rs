use log::*;

use crate::SqliteDatabase;

/// A throwaway SQLite database file in the system temp directory.
pub fn random_db_url() -> String {
    let path = std::env::temp_dir().join(format!("spg_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Creates a fresh, migrated database for a test. Each test gets its own file so tests can run
/// concurrently.
pub async fn prepare_test_db() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to test database");
    db.migrate().await.expect("Error running DB migrations");
    debug!("🚀️ Test database ready at {url}");
    db
}
