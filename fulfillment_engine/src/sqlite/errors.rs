use thiserror::Error;

/// Errors setting up the SQLite backend. Errors from the backend's normal operation are reported through the error
/// types of the traits it implements.
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}
