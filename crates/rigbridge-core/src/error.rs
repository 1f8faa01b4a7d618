//! Error types for rigbridge.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! control-plane errors are all captured here.
//!
//! Discovery silence (a device aging out of the registry) is deliberately
//! not an error variant: it is informational and surfaces as a
//! `DeviceRemoved` event, never as a failure.

/// The error type for all rigbridge operations.
///
/// The supervisor is the sole authority translating these into connection
/// state transitions: `ConnectFailed`, `Timeout`, and `ConnectionLost` are
/// retried with backoff; `Protocol` and `AuthRequired` are surfaced
/// immediately without automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level connection refusal or failure during connect.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// A well-formed transport carried a semantically invalid exchange
    /// (bad handshake line, unknown response shape, non-zero status code).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote end rejected the connection for lack of a valid
    /// credential. Surfaced distinctly so a UI can prompt instead of
    /// silently retrying.
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// A discovery or digital-mode datagram could not be parsed.
    ///
    /// Listeners count these and keep running; a malformed frame is never
    /// fatal to the receive loop.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Timed out waiting for a response from the device.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the device has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// The requested operation is not supported by this device.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A transport-level error on an established connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the supervisor should retry this error with backoff.
    ///
    /// Protocol and authentication errors are not retried automatically:
    /// replaying a malformed exchange rarely self-heals, and retrying a
    /// rejected credential just locks accounts.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectFailed(_) | Error::Timeout | Error::ConnectionLost | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_connect_failed() {
        let e = Error::ConnectFailed("connection refused".into());
        assert_eq!(e.to_string(), "connect failed: connection refused");
    }

    #[test]
    fn display_protocol() {
        let e = Error::Protocol("unexpected handshake line".into());
        assert_eq!(e.to_string(), "protocol error: unexpected handshake line");
    }

    #[test]
    fn display_auth_required() {
        let e = Error::AuthRequired("station password rejected".into());
        assert_eq!(
            e.to_string(),
            "authentication required: station password rejected"
        );
    }

    #[test]
    fn display_malformed_frame() {
        let e = Error::MalformedFrame("bad magic".into());
        assert_eq!(e.to_string(), "malformed frame: bad magic");
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::ConnectFailed("refused".into()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(Error::ConnectionLost.is_retryable());
        assert!(!Error::Protocol("bad".into()).is_retryable());
        assert!(!Error::AuthRequired("no".into()).is_retryable());
        assert!(!Error::Unsupported("nope".into()).is_retryable());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
