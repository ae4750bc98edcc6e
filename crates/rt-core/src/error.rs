//! Error types for roottools

use thiserror::Error;

/// roottools error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument or inconsistent shapes
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller built a context, mapper or factory incorrectly.
    ///
    /// These cannot be recovered from mid-run and are expected to terminate the analysis.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Config("no dimension specified".into());
        assert_eq!(e.to_string(), "Configuration error: no dimension specified");
    }

    #[test]
    fn test_io_conversion() {
        fn open() -> Result<()> {
            std::fs::File::open("/definitely/not/here.json")?;
            Ok(())
        }
        assert!(matches!(open(), Err(Error::Io(_))));
    }
}
