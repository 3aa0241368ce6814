use log::*;
use pos_engine::SqliteDatabase;
use tempfile::TempDir;

/// A throwaway database. The file lives as long as the returned directory.
pub struct TestDb {
    _dir: TempDir,
    pub url: String,
}

pub fn prepare_test_env() -> TestDb {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temp dir");
    let url = format!("sqlite://{}", dir.path().join("pending.db").display());
    debug!("🚀️ Test database at {url}");
    TestDb { _dir: dir, url }
}

impl TestDb {
    pub async fn open(&self) -> SqliteDatabase {
        SqliteDatabase::new_with_url(&self.url, 5).await.expect("Error creating database")
    }
}
