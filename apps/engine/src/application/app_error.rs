use recurring_types::{ErrorCode, ParseEnumError, PeriodError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Not found")]
    NotFound,

    #[error("Billing failed for subscription {subscription_id}: {message}")]
    BillingFailed {
        subscription_id: Uuid,
        message: String,
    },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Not supported by payment channel: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::InvalidInput(_) | AppError::PaymentDeclined(_) | AppError::Unsupported(_) => {
                ErrorCode::InvalidInput
            }
            AppError::Configuration(_) => ErrorCode::InvalidConfiguration,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::BillingFailed { .. } => ErrorCode::BillingFailed,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<PeriodError> for AppError {
    fn from(err: PeriodError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
