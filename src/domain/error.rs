use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Required field missing: {0}")]
    MissingField(&'static str),

    #[error("Photo limit reached: at most {0} photos per status update")]
    PhotoLimit(usize),

    #[error("No photo at position {0}")]
    PhotoIndex(usize),
}

pub type DomainResult<T> = Result<T, DomainError>;
