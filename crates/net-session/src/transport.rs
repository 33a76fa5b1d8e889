//! Transport collaborator seam

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use netprov_core::{ConnectionError, DeviceProfile};

/// Failures reported by a raw command channel
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("authentication rejected: {0}")]
    Authentication(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    /// Whether a failed connect may be retried once over telnet: the
    /// device did not answer, or nothing listens on the SSH port
    pub fn allows_fallback(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
            ),
            other => other.is_timeout(),
        }
    }

    /// Map into the session-level taxonomy for `host`
    pub fn into_connection_error(self, host: &str) -> ConnectionError {
        match self {
            TransportError::Authentication(_) => ConnectionError::Authentication {
                host: host.to_string(),
            },
            ref e if e.is_timeout() => ConnectionError::Timeout {
                host: host.to_string(),
            },
            other => ConnectionError::Transport {
                host: host.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// One live command channel to a device. Calls are strictly serial.
#[async_trait]
pub trait Transport: Send {
    /// Run a read-only command and return its raw output
    async fn send_command(&mut self, command: &str, timeout: Duration)
        -> Result<String, TransportError>;

    /// Enter configuration mode, send `commands` in order and leave it again
    async fn send_config_set(
        &mut self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<String, TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

/// Opens transports for a device profile.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, profile: &DeviceProfile) -> Result<Box<dyn Transport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let auth = TransportError::Authentication("bad password".into());
        assert!(matches!(
            auth.into_connection_error("r1"),
            ConnectionError::Authentication { host } if host == "r1"
        ));

        let io_timeout = TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out",
        ));
        assert!(io_timeout.is_timeout());
        assert!(matches!(
            io_timeout.into_connection_error("r1"),
            ConnectionError::Timeout { .. }
        ));

        let refused = TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(refused.allows_fallback());
        assert!(matches!(
            refused.into_connection_error("r1"),
            ConnectionError::Transport { .. }
        ));

        assert!(TransportError::Timeout("connect".into()).allows_fallback());
        assert!(!TransportError::Authentication("admin".into()).allows_fallback());
        assert!(!TransportError::Protocol("banner".into()).allows_fallback());
    }
}
