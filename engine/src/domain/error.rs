//! Domain-level errors
//! Every failure the core can report to a caller or an event subscriber

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Unknown watchlist entry or a service name the controller cannot resolve
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("service '{0}' is already in the watchlist")]
    AlreadyExists(String),

    /// Live snapshot temporarily unavailable
    #[error("failed to query service '{service}': {reason}")]
    TransientQuery { service: String, reason: String },

    /// The in-memory mutation was applied but the snapshot could not be written
    #[error("failed to persist watchlist: {0}")]
    Persistence(String),

    #[error("failed to control service '{service}': {reason}")]
    Control { service: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl DomainError {
    pub fn query(service: impl Into<String>, reason: impl ToString) -> Self {
        DomainError::TransientQuery {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn control(service: impl Into<String>, reason: impl ToString) -> Self {
        DomainError::Control {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
