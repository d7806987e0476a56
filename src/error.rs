//! Error types for sms-relay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Error reported by the carrier API, passed through as received
    #[error("Carrier error: {message}")]
    Provider {
        status: Option<u16>,
        code: Option<i64>,
        message: String,
    },

    /// Relay buffer lock could not be taken (poisoned by a panicking holder)
    #[error("Relay buffer unavailable: {0}")]
    BufferUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by bad caller input rather than the relay or carrier
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation("missing body".to_string());
        assert!(err.to_string().contains("missing body"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_provider_error_display() {
        let err = Error::Provider {
            status: Some(400),
            code: Some(21211),
            message: "The 'To' number is not a valid phone number.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Carrier error: The 'To' number is not a valid phone number."
        );
    }
}
