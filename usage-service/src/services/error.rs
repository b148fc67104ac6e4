use service_core::error::AppError;
use thiserror::Error;

use crate::models::InvalidReading;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error(transparent)]
    InvalidReading(#[from] InvalidReading),

    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Invalid credentials")]
    CredentialMismatch,

    #[error("Store error: {0}")]
    Persistence(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(err: mongodb::error::Error) -> Self {
        ServiceError::Persistence(anyhow::Error::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for ServiceError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        ServiceError::Persistence(anyhow::Error::new(err))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MissingParameter(name) => AppError::BadRequest(anyhow::anyhow!(
                "Invalid request. {} is required.",
                name
            )),
            ServiceError::InvalidReading(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::DuplicateUsername => {
                AppError::Conflict(anyhow::anyhow!("Username already exists"))
            }
            ServiceError::CredentialMismatch => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::Persistence(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
