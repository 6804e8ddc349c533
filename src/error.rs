use gutenshelf_common::InvalidInput;

/// Failures of the catalog, progress and account services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Storage(gutenshelf_storage::Error),
}

impl From<gutenshelf_storage::Error> for ServiceError {
    fn from(err: gutenshelf_storage::Error) -> Self {
        match err {
            gutenshelf_storage::Error::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<InvalidInput> for ServiceError {
    fn from(err: InvalidInput) -> Self {
        ServiceError::Validation(err.0)
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
