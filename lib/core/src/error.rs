use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the recommendation core.
///
/// A title that does not resolve is not an error: lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum Error {
    /// Artifacts are unusable; the engine must not reach a ready state.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Artifacts drifted apart (e.g. an id the matrices or the index don't know).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing an artifact failed (offline index build)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the error means the process must not keep serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::InvariantViolation(_))
    }
}
