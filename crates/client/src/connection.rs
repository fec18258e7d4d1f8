//! Connection lifecycle for one backend service.
//!
//! A [`ServiceConnection`] owns at most one live transport and one object
//! channel at a time. `connect()` is idempotent and single-flight: callers
//! arriving while an attempt is in flight join it and observe the same
//! outcome instead of racing a second handshake.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use webchannel_shared::{ConnectError, DisconnectError, TransportError};

use crate::channel::{ChannelFactory, ObjectChannel};
use crate::transport::{DialedTransport, TransportFactory, TransportHandle};

/// Lifecycle state of a [`ServiceConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }
}

/// Fixed per-connection configuration. The service name appears only in
/// diagnostics and error messages.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub service_name: String,
}

impl ServiceConfig {
    pub fn new(endpoint: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_name: service_name.into(),
        }
    }
}

/// Hook invoked once per successful handshake, before `connect()` resolves,
/// so a service adapter can capture the proxies it needs. Its rejection
/// fails the whole attempt.
pub type ChannelReadyHook =
    Arc<dyn Fn(Arc<dyn ObjectChannel>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Box an async closure into a [`ChannelReadyHook`].
pub fn on_channel_ready<F, Fut>(hook: F) -> ChannelReadyHook
where
    F: Fn(Arc<dyn ObjectChannel>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |channel| hook(channel).boxed())
}

type PendingConnect = Shared<BoxFuture<'static, Result<(), ConnectError>>>;

enum Phase {
    Disconnected,
    Connecting(PendingConnect),
    Connected(Link),
    Disconnecting,
}

struct Link {
    transport: Arc<dyn TransportHandle>,
    channel: Arc<dyn ObjectChannel>,
}

/// The logical, single-transport link between local code and one
/// backend-exposed service.
#[derive(Clone)]
pub struct ServiceConnection {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServiceConfig,
    transports: Arc<dyn TransportFactory>,
    channels: Arc<dyn ChannelFactory>,
    on_ready: ChannelReadyHook,
    // Single mutation point for the lifecycle; never held across an await.
    phase: Mutex<Phase>,
}

impl ServiceConnection {
    pub fn new(
        config: ServiceConfig,
        transports: Arc<dyn TransportFactory>,
        channels: Arc<dyn ChannelFactory>,
        on_ready: ChannelReadyHook,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transports,
                channels,
                on_ready,
                phase: Mutex::new(Phase::Disconnected),
            }),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Connect to the configured endpoint and run the channel handshake.
    ///
    /// Already connected: resolves immediately without I/O. An attempt in
    /// flight: joins it. Otherwise a fresh transport is dialed, the channel
    /// handshake runs on it, and the `on_channel_ready` hook fires before
    /// this resolves. On any failure the state returns to disconnected and
    /// a later call may retry.
    ///
    /// There is no mid-flight cancellation; the attempt makes progress only
    /// while at least one caller awaits it.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let pending = {
            let mut phase = self.inner.lock_phase();
            match &*phase {
                Phase::Connected(link) if link.transport.is_open() => return Ok(()),
                Phase::Connecting(pending) => pending.clone(),
                // Disconnected, Disconnecting, or a Connected phase whose
                // transport silently died: start a fresh attempt.
                _ => {
                    let inner = Arc::clone(&self.inner);
                    let pending: PendingConnect =
                        async move { Inner::establish(inner).await }.boxed().shared();
                    *phase = Phase::Connecting(pending.clone());
                    tracing::info!(
                        service = %self.inner.config.service_name,
                        endpoint = %self.inner.config.endpoint,
                        "connecting"
                    );
                    pending
                }
            }
        };
        pending.await
    }

    /// Gracefully close the transport.
    ///
    /// No-op when not connected. Every remote proxy obtained from this
    /// connection is invalid once this resolves; callers must have torn
    /// down their ledger bindings first.
    pub async fn disconnect(&self) -> Result<(), DisconnectError> {
        let link = {
            let mut phase = self.inner.lock_phase();
            match std::mem::replace(&mut *phase, Phase::Disconnecting) {
                Phase::Connected(link) => link,
                other => {
                    *phase = other;
                    return Ok(());
                }
            }
        };

        tracing::info!(service = %self.inner.config.service_name, "disconnecting");
        let result = link.transport.close().await;
        drop(link);
        {
            let mut phase = self.inner.lock_phase();
            // A caller racing connect() against disconnect() may already
            // have replaced the phase; only finish our own transition.
            if matches!(&*phase, Phase::Disconnecting) {
                *phase = Phase::Disconnected;
            }
        }

        result.map_err(|err| DisconnectError::Close {
            service: self.inner.config.service_name.clone(),
            reason: err.to_string(),
        })
    }

    /// True iff the lifecycle says connected *and* the transport itself
    /// still reports open; the socket's live flag wins over the cached
    /// phase when they disagree.
    pub fn is_connected(&self) -> bool {
        match &*self.inner.lock_phase() {
            Phase::Connected(link) => link.transport.is_open(),
            _ => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &*self.inner.lock_phase() {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connecting(_) => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
            Phase::Disconnecting => ConnectionState::Disconnecting,
        }
    }

    /// The live channel, while connected.
    pub fn channel(&self) -> Option<Arc<dyn ObjectChannel>> {
        match &*self.inner.lock_phase() {
            Phase::Connected(link) => Some(Arc::clone(&link.channel)),
            _ => None,
        }
    }
}

impl fmt::Debug for ServiceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnection")
            .field("service", &self.inner.config.service_name)
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn establish(inner: Arc<Inner>) -> Result<(), ConnectError> {
        let result = Inner::try_establish(&inner).await;
        let mut phase = inner.lock_phase();
        match result {
            Ok(link) => {
                tracing::info!(service = %inner.config.service_name, "connected");
                *phase = Phase::Connected(link);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(service = %inner.config.service_name, %err, "connect failed");
                *phase = Phase::Disconnected;
                Err(err)
            }
        }
    }

    async fn try_establish(inner: &Inner) -> Result<Link, ConnectError> {
        let service = &inner.config.service_name;

        let DialedTransport { handle, incoming } = inner
            .transports
            .dial(&inner.config.endpoint)
            .await
            .map_err(|err| match err {
                TransportError::ClosedBeforeOpen => ConnectError::Closed {
                    service: service.clone(),
                },
                other => ConnectError::Transport {
                    service: service.clone(),
                    reason: other.to_string(),
                },
            })?;

        let setup = async {
            let channel = inner
                .channels
                .handshake(Arc::clone(&handle), incoming)
                .await
                .map_err(|err| ConnectError::Handshake {
                    service: service.clone(),
                    reason: err.to_string(),
                })?;
            (inner.on_ready)(Arc::clone(&channel))
                .await
                .map_err(|err| ConnectError::Adapter {
                    service: service.clone(),
                    reason: err.to_string(),
                })?;
            Ok(channel)
        };

        match setup.await {
            Ok(channel) => Ok(Link {
                transport: handle,
                channel,
            }),
            Err(err) => {
                // At most one live transport per connection: shut the
                // dialed socket before the attempt settles as failed.
                if let Err(close_err) = handle.close().await {
                    tracing::debug!(
                        service = %service,
                        "close after failed handshake: {close_err}"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(!ConnectionState::Disconnecting.is_connecting());
    }

    #[test]
    fn config_holds_endpoint_and_name() {
        let config = ServiceConfig::new("ws://localhost:9000", "Command Transfer Service");
        assert_eq!(config.endpoint, "ws://localhost:9000");
        assert_eq!(config.service_name, "Command Transfer Service");
    }
}
