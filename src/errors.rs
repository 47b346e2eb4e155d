//! Typed error hierarchy for the Solo console.
//!
//! `ServiceError` is the single error every management operation returns.
//! Whatever goes wrong inside an operation (validation, a missing entity,
//! a failing statement) the surrounding transaction is rolled back first
//! and the failure surfaces as one of these variants. The HTTP layer maps
//! them onto the JSON failure envelope in `blog::api::ApiError`.

use thiserror::Error;

/// Errors from the page, article and comment management services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid permalink format: {permalink}")]
    InvalidPermalinkFormat { permalink: String },

    #[error("Duplicated permalink: {permalink}")]
    DuplicatePermalink { permalink: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Persistence failure: {0:#}")]
    Persistence(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(anyhow::Error::new(err))
    }
}
