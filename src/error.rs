//! Error types for SILTA

use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, SiltaError>;

/// Main error type for the proxy
///
/// Startup errors (`Config`, `Credentials`, `Io`, `Transport`) are fatal:
/// the process logs them and exits before serving a single call. Everything
/// that happens after the listener is up is scoped to one call and travels
/// as a [`tonic::Status`] instead.
#[derive(Error, Debug)]
pub enum SiltaError {
    /// Configuration error (bad listen address, bad backend URI)
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential material could not be loaded or is malformed
    #[error("credential error: {0}")]
    Credentials(String),

    /// gRPC transport error
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC status error
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    /// IO error (listener bind, credential file reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration error
    #[error("metrics error: {0}")]
    Metrics(String),
}

impl From<SiltaError> for tonic::Status {
    fn from(err: SiltaError) -> Self {
        match err {
            SiltaError::Config(msg) => tonic::Status::invalid_argument(msg),
            SiltaError::Credentials(msg) => tonic::Status::unauthenticated(msg),
            SiltaError::Transport(e) => tonic::Status::unavailable(e.to_string()),
            SiltaError::Grpc(status) => status,
            SiltaError::Io(e) => tonic::Status::internal(e.to_string()),
            SiltaError::Metrics(msg) => tonic::Status::internal(msg),
        }
    }
}
