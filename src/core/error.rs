/*!
Error handling for the attestation server.

Errors carry as little detail as possible about cryptographic failures so
that nothing derived from key material ends up in a log line or in a
response sent back to the client.
*/

use std::io;
use thiserror::Error;

/// Result type for the attestation server
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the attestation server
#[derive(Error, Debug)]
pub enum Error {
    /// Startup configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No live session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    /// Message delivered to a session in the wrong state
    #[error("Session not in correct state: expected {expected}, but was {actual}")]
    InvalidState {
        expected: String,
        actual: String,
    },

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    /// Cryptographic error (limited details for security)
    #[error("Cryptographic operation failed")]
    Crypto(#[source] CryptoError),

    /// Key exchange error (limited details for security)
    #[error("Key exchange failed")]
    KeyExchange(#[source] KeyExchangeError),

    /// The attestation authority could not be reached or answered garbage
    #[error("Attestation authority error: {0}")]
    Authority(String),

    /// The system random number generator failed
    #[error("Random number generation failed")]
    Randomness,

    /// Timeout error
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),
}

/// Cryptographic errors with limited details to prevent leaking information
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Generic encryption error
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Key derivation error
    #[error("Key derivation failed")]
    KeyDerivationFailed,

    /// Signing with the long-term key failed
    #[error("Signing failed")]
    SigningFailed,

    /// A coordinate does not fit the 32-byte wire field
    #[error("Coordinate exceeds 32 bytes")]
    CoordinateTooLarge,
}

/// Key exchange errors with limited details to prevent leaking information
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeError {
    /// Peer key is not a valid P-256 point
    #[error("Invalid public key")]
    InvalidPublicKey,
}

/// Startup configuration errors. These are fatal: the server must not start.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configured file or directory could not be read
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid JSON
    #[error("could not parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A hex-encoded field could not be decoded
    #[error("invalid hex in {field}: {source}")]
    Hex {
        field: String,
        #[source]
        source: hex::FromHexError,
    },

    /// A decoded field has the wrong length
    #[error("{field} should contain {expected} bytes, but instead got {actual}")]
    Length {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// The long-term key could not be parsed
    #[error("could not parse the long-term key")]
    InvalidKey,

    /// A field holds a value outside its allowed range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}

/// Create an invalid state error
#[macro_export]
macro_rules! invalid_state_err {
    ($expected:expr, $actual:expr) => {
        Err($crate::core::error::Error::InvalidState {
            expected: $expected.to_string(),
            actual: $actual.to_string(),
        })
    };
}

/// Create an invalid format error
#[macro_export]
macro_rules! format_err {
    ($msg:expr) => {
        Err($crate::core::error::Error::InvalidFormat($msg.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::core::error::Error::InvalidFormat(format!($fmt, $($arg)*)))
    };
}

impl Error {
    /// Whether this error originated outside the server (authority or timeout)
    /// rather than in the client's messages.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Error::Authority(_) | Error::Timeout(_))
    }
}

/// Convert from Error to io::Error (for transports that speak io::Error)
impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Config(err) => io::Error::new(io::ErrorKind::InvalidInput, err.to_string()),
            Error::SessionNotFound(id) => {
                io::Error::new(io::ErrorKind::NotFound, format!("Session not found: {}", id))
            }
            Error::InvalidState { expected, actual } => io::Error::new(
                io::ErrorKind::NotConnected,
                format!("Invalid state: expected {}, but was {}", expected, actual),
            ),
            Error::InvalidFormat(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            Error::Crypto(_) => io::Error::new(io::ErrorKind::Other, "Cryptographic error"),
            Error::KeyExchange(_) => {
                io::Error::new(io::ErrorKind::InvalidData, "Key exchange error")
            }
            Error::Authority(msg) => io::Error::new(io::ErrorKind::Other, msg),
            Error::Randomness => io::Error::new(io::ErrorKind::Other, "Randomness failure"),
            Error::Timeout(ms) => io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Operation timed out after {} ms", ms),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SessionNotFound(42);
        assert_eq!(format!("{}", err), "Session not found: 42");

        let err = Error::Crypto(CryptoError::KeyDerivationFailed);
        assert_eq!(format!("{}", err), "Cryptographic operation failed");

        let err = Error::Timeout(1500);
        assert_eq!(format!("{}", err), "Operation timed out after 1500 ms");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Length {
            field: "spid".into(),
            expected: 16,
            actual: 15,
        };
        assert_eq!(
            format!("{}", err),
            "spid should contain 16 bytes, but instead got 15"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::from(Error::SessionNotFound(7));
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let io_err = io::Error::from(Error::Timeout(10));
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_collaborator_failure() {
        assert!(Error::Authority("down".into()).is_collaborator_failure());
        assert!(Error::Timeout(1).is_collaborator_failure());
        assert!(!Error::SessionNotFound(1).is_collaborator_failure());
    }
}
