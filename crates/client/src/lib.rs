//! Client core for a remote-object channel over a single socket.
//!
//! A backend process exposes named objects with properties, signals, and
//! callable operations. An external object-channel layer performs the
//! handshake on a transport and decodes traffic into [`RemoteObject`]
//! proxies; this crate owns everything around that layer:
//!
//! - connection lifecycle ([`ServiceConnection`]): idempotent, single-flight
//!   `connect()` / `disconnect()` over one transport per service,
//! - subscription bookkeeping ([`SubscriptionLedger`]): manual and
//!   convention-based signal bindings with deterministic reverse-order
//!   teardown,
//! - a flat local store ([`ValueStore`]) the ledger mirrors remote state into.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              ServiceConnection                   │
//! │  connect() / disconnect() / is_connected()       │
//! └──────────────────────────────────────────────────┘
//!        │ dial                 │ handshake
//!        ▼                      ▼
//! ┌──────────────┐    ┌─────────────────────┐
//! │  Transport   │───▶│   ObjectChannel     │  (external layer)
//! │  (WebSocket) │    │  objects: name →    │
//! └──────────────┘    │  RemoteObject       │
//!                     └─────────────────────┘
//!                                │ proxies, captured once by the
//!                                ▼ on_channel_ready hook
//!                     ┌─────────────────────┐
//!                     │ SubscriptionLedger  │
//!                     │  bind / auto_bind   │──▶ ValueStore
//!                     │  disconnect_all     │
//!                     └─────────────────────┘
//! ```
//!
//! # Teardown sequencing
//!
//! The ledger has no visibility into connection state. Callers must tear
//! down bindings (`disconnect_all`) *before* calling `disconnect()` on the
//! owning connection, and must not touch proxies after `disconnect()`
//! resolves.

pub mod channel;
pub mod connection;
pub mod ledger;
pub mod store;
pub mod transport;

pub use channel::{
    ChannelFactory, MethodInvoker, ObjectChannel, RemoteObject, RemoteObjectBuilder, Signal,
    SignalHandle, SignalListener, SubscriptionId,
};
pub use connection::{
    on_channel_ready, ChannelReadyHook, ConnectionState, ServiceConfig, ServiceConnection,
};
pub use ledger::SubscriptionLedger;
pub use store::ValueStore;
pub use transport::{
    DialedTransport, MessageStream, TransportFactory, TransportHandle, WsTransportFactory,
};

pub use webchannel_shared::{
    CallResponse, ChannelError, ConnectError, DisconnectError, MessageKind, TransportError,
};
