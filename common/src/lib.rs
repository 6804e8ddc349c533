// Re-export models
pub use crate::models::*;

pub mod genre;
pub mod import;
pub mod models;
pub mod progress;
pub mod utils;

/// Input that fails validation: a missing title, a non-integer id, an unknown status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
