use crate::domain::DomainError;
use crate::ports::{ConfigError, PhotoError, RepositoryError};
use thiserror::Error;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Domain(#[from] DomainError),

    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),

    #[error("Application error: {0}")]
    Application(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("No project selected")]
    ProjectNotSelected,
}

impl AppError {
    /// Text for the blocking alert shown to the user: the backend's own
    /// message when there is one, otherwise a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Repository(e) => match (e.detail(), e) {
                (Some(detail), _) => detail.to_string(),
                (None, RepositoryError::Network(_)) => {
                    "Could not reach the server. Check your connection and try again.".to_string()
                }
                (None, RepositoryError::RateLimit(secs)) => {
                    format!("Too many requests. Try again in {secs} seconds.")
                }
                (None, _) => GENERIC_FAILURE.to_string(),
            },
            AppError::Domain(DomainError::MissingField(field)) => format!("Please enter a {field}."),
            AppError::Domain(e) => e.to_string(),
            AppError::Photo(e) => e.to_string(),
            AppError::Config(e) => e.to_string(),
            AppError::Application(msg) => msg.clone(),
            AppError::AuthenticationRequired => "Please sign in first.".to_string(),
            AppError::ProjectNotSelected => "Select a project first.".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_detail_wins() {
        let err = AppError::from(RepositoryError::Api {
            status: 400,
            detail: Some("Photo too large".to_string()),
        });
        assert_eq!(err.user_message(), "Photo too large");
    }

    #[test]
    fn falls_back_to_generic_message() {
        let err = AppError::from(RepositoryError::Api {
            status: 500,
            detail: None,
        });
        assert_eq!(err.user_message(), GENERIC_FAILURE);

        let err = AppError::from(RepositoryError::Serialization("bad json".to_string()));
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }

    #[test]
    fn missing_title_reads_naturally() {
        let err = AppError::from(DomainError::MissingField("title"));
        assert_eq!(err.user_message(), "Please enter a title.");
    }
}
