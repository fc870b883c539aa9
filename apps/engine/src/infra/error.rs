use thiserror::Error;

/// Infrastructure errors that can occur during startup.
///
/// Display messages are safe for logs. Debug output includes the #[source]
/// chain, which may contain the connection string; log with `%e`, not `?e`.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Database connection failed. Check DATABASE_URL and ensure the database is running.")]
    DatabaseConnection(#[source] sqlx::Error),

    #[error("Configuration error: {var} has invalid value {value:?}")]
    ConfigInvalid { var: &'static str, value: String },
}

impl From<sqlx::Error> for InfraError {
    fn from(e: sqlx::Error) -> Self {
        InfraError::DatabaseConnection(e)
    }
}
