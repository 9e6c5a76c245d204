use thiserror::Error;

/// Top-level error type for Reflectify.
///
/// Covers configuration and value parsing. The client and engine crates
/// define their own error types for transport and interaction failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReflectifyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ReflectifyError {
    fn from(err: toml::de::Error) -> Self {
        ReflectifyError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ReflectifyError {
    fn from(err: toml::ser::Error) -> Self {
        ReflectifyError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Reflectify operations.
pub type Result<T> = std::result::Result<T, ReflectifyError>;
