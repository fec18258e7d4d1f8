//! Object-channel wire contract.
//!
//! The client core never encodes or decodes these messages itself; the
//! object-channel layer that sits on the transport does. The tags and the
//! call-response envelope are defined here so channel implementations and
//! the client agree on one vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Integer tag carried by every message on the object channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Server-side signal emission.
    Signal,
    /// Cached-property update pushed by the server.
    PropertyUpdate,
    /// Channel handshake / object metadata.
    Init,
    /// Keepalive.
    Idle,
    Debug,
    /// Client-initiated method invocation.
    InvokeMethod,
    ConnectToSignal,
    DisconnectFromSignal,
    SetProperty,
    /// Response to a prior invocation.
    Response,
}

impl MessageKind {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageKind::Signal => 1,
            MessageKind::PropertyUpdate => 2,
            MessageKind::Init => 3,
            MessageKind::Idle => 4,
            MessageKind::Debug => 5,
            MessageKind::InvokeMethod => 6,
            MessageKind::ConnectToSignal => 7,
            MessageKind::DisconnectFromSignal => 8,
            MessageKind::SetProperty => 9,
            MessageKind::Response => 10,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(MessageKind::Signal),
            2 => Some(MessageKind::PropertyUpdate),
            3 => Some(MessageKind::Init),
            4 => Some(MessageKind::Idle),
            5 => Some(MessageKind::Debug),
            6 => Some(MessageKind::InvokeMethod),
            7 => Some(MessageKind::ConnectToSignal),
            8 => Some(MessageKind::DisconnectFromSignal),
            9 => Some(MessageKind::SetProperty),
            10 => Some(MessageKind::Response),
            _ => None,
        }
    }

    /// True for kinds the server pushes without a client request.
    pub fn is_server_push(self) -> bool {
        matches!(
            self,
            MessageKind::Signal
                | MessageKind::PropertyUpdate
                | MessageKind::Idle
                | MessageKind::Debug
        )
    }
}

/// Payload every remote operation resolves with.
///
/// A transport-level success can still carry a domain failure in `error`;
/// callers inspect the payload rather than matching on a failed future.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Human-readable success indicator ("ok", "yes", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    /// Domain error message, if the operation failed server-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CallResponse {
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
