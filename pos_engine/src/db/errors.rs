use thiserror::Error;

#[derive(Debug, Error)]
pub enum PendingStoreError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Could not (de)serialize a stored transaction intent: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Stored request {0} is corrupt: {1}")]
    CorruptRecord(String, String),
}
