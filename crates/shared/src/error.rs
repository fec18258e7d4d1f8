//! Error taxonomy for the transport, connection, and channel layers.

use thiserror::Error;

/// Socket-level failures reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("endpoint is not a valid websocket URL: {0}")]
    InvalidEndpoint(String),

    #[error("failed to open transport: {0}")]
    Connect(String),

    #[error("transport closed before it became ready")]
    ClosedBeforeOpen,

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("error while closing transport: {0}")]
    Close(String),
}

/// Failures surfaced by `ServiceConnection::connect`.
///
/// `Clone` because a single in-flight attempt fans its outcome out to every
/// concurrent caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("Error connecting to {service}: {reason}")]
    Transport { service: String, reason: String },

    #[error("{service} connection closed")]
    Closed { service: String },

    #[error("{service} handshake failed: {reason}")]
    Handshake { service: String, reason: String },

    #[error("{service} channel setup rejected: {reason}")]
    Adapter { service: String, reason: String },
}

impl ConnectError {
    /// The service name the failing connection was configured with.
    pub fn service(&self) -> &str {
        match self {
            ConnectError::Transport { service, .. }
            | ConnectError::Closed { service }
            | ConnectError::Handshake { service, .. }
            | ConnectError::Adapter { service, .. } => service,
        }
    }
}

/// Failures surfaced by `ServiceConnection::disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    #[error("error closing connection to {service}: {reason}")]
    Close { service: String, reason: String },
}

/// Failures inside an object-channel implementation.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel handshake failed: {0}")]
    Handshake(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invocation of {object}.{method} failed: {reason}")]
    Invoke {
        object: String,
        method: String,
        reason: String,
    },
}
