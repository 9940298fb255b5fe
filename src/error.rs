//! Error types

use std::io;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the connection manager and the wire backend
///
/// Rejected credentials are not an error: they surface as `Ok(false)` from
/// [`ConnectionManager::init`](crate::ConnectionManager::init) and
/// [`ConnectionManager::bind`](crate::ConnectionManager::bind).
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying socket
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration, rejected before any network activity
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed or unexpected protocol data
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No directory server could be reached, or StartTLS failed
    ///
    /// The message names the host that was being contacted.
    #[error("server not available: {0}")]
    ServerUnavailable(String),

    /// TLS setup or handshake failure
    #[error("tls error: {0}")]
    Tls(String),

    /// Server closed the connection
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Operation exceeded the configured network timeout
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },
}

impl Error {
    /// Whether this error means the server could not be talked to at all
    ///
    /// A connect error of this kind makes the manager fall over to the other
    /// configured host; any other connect error is returned as is.
    pub fn is_server_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ServerUnavailable(_)
                | Error::ConnectionClosed
                | Error::Timeout(_)
                | Error::Protocol(_)
        )
    }

    /// Whether this error is a configuration problem
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_transport_errors_are_server_unavailable() {
        let io_err = Error::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(io_err.is_server_unavailable());
        assert!(Error::ConnectionClosed.is_server_unavailable());
        assert!(Error::Timeout(Duration::from_secs(1)).is_server_unavailable());
    }

    #[test]
    fn test_config_and_tls_errors_are_not_server_unavailable() {
        assert!(!Error::Config("no host".into()).is_server_unavailable());
        assert!(!Error::Tls("bad cert".into()).is_server_unavailable());
        assert!(Error::Config("no host".into()).is_config());
    }

    #[test]
    fn test_server_unavailable_message_names_host() {
        let err = Error::ServerUnavailable(
            "Start TLS failed, when connecting to LDAP host ldap://nixda.ldap.".into(),
        );
        assert!(err.to_string().contains("ldap://nixda.ldap"));
    }
}
