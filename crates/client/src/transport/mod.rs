//! Transport abstraction over a duplex, message-oriented socket.
//!
//! A dialed transport is split in two: a control handle (liveness, send,
//! graceful close) kept by the connection manager, and the incoming frame
//! stream handed to the object-channel layer for decoding.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use webchannel_shared::TransportError;

/// Incoming text frames. The stream ends when the transport closes.
pub type MessageStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Control half of a dialed transport.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Live readiness as reported by the socket itself, not by any cached
    /// bookkeeping above it.
    fn is_open(&self) -> bool;

    /// Queue a text frame for sending.
    fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Graceful close (normal-closure code). Resolves once the close has
    /// been written; closing an already-dead transport is a no-op.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A successfully dialed transport.
pub struct DialedTransport {
    pub handle: Arc<dyn TransportHandle>,
    pub incoming: MessageStream,
}

impl fmt::Debug for DialedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The frame stream has no useful representation; report liveness.
        f.debug_struct("DialedTransport")
            .field("open", &self.handle.is_open())
            .finish_non_exhaustive()
    }
}

/// Opens transports to an endpoint. One dial per `connect()` attempt; the
/// connection manager never reuses a dialed transport across attempts.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<DialedTransport, TransportError>;
}

mod native;
pub use native::WsTransportFactory;
