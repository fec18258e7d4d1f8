//! Consumed surface of the external object-channel layer.
//!
//! The channel layer owns the wire protocol (handshake, call correlation,
//! property-update decoding). This module defines what it hands the client:
//! named [`RemoteObject`] proxies with cached properties, [`SignalHandle`]
//! event sources, and awaitable method invocations resolving to a
//! [`CallResponse`] payload.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use webchannel_shared::{CallResponse, ChannelError};

use crate::transport::{MessageStream, TransportHandle};

/// Listener invoked with a signal's positional arguments.
pub type SignalListener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Identity of one active subscription on a signal.
///
/// Listeners are closures without identity of their own, so unsubscribe
/// goes through the id returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Anything exposing the subscribe/unsubscribe capability pair.
pub trait Signal {
    fn subscribe(&self, listener: SignalListener) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// A remote event source.
///
/// Cheap to clone; clones share one listener registry. Channel
/// implementations call [`emit`](SignalHandle::emit) when the wire carries a
/// signal-emission message.
#[derive(Clone, Default)]
pub struct SignalHandle {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, SignalListener)>>,
}

impl SignalHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; active once this returns.
    pub fn connect(&self, listener: impl Fn(&[Value]) + Send + Sync + 'static) -> SubscriptionId {
        Signal::subscribe(self, Arc::new(listener))
    }

    /// Invoke every listener, in subscription order.
    pub fn emit(&self, args: &[Value]) {
        // Snapshot outside the lock so a listener may bind or unbind.
        let listeners: Vec<SignalListener> = {
            let guard = self
                .inner
                .listeners
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            guard.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(args);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Signal for SignalHandle {
    fn subscribe(&self, listener: SignalListener) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|(sub, _)| *sub != id);
        guard.len() < before
    }
}

impl fmt::Debug for SignalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHandle")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Dispatches method invocations onto the wire. Implemented by the channel
/// layer; the client only awaits the result.
#[async_trait]
pub trait MethodInvoker: Send + Sync {
    async fn invoke(
        &self,
        object: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<CallResponse, ChannelError>;
}

/// Local proxy for one backend-exposed object.
///
/// Valid only while its owning connection is connected. Cheap to clone;
/// the channel layer updates the shared property cache as the server pushes
/// changes.
#[derive(Clone)]
pub struct RemoteObject {
    inner: Arc<RemoteObjectInner>,
}

struct RemoteObjectInner {
    name: String,
    properties: RwLock<BTreeMap<String, Value>>,
    signals: HashMap<String, SignalHandle>,
    invoker: Option<Arc<dyn MethodInvoker>>,
}

impl RemoteObject {
    pub fn builder(name: impl Into<String>) -> RemoteObjectBuilder {
        RemoteObjectBuilder {
            name: name.into(),
            properties: BTreeMap::new(),
            signals: HashMap::new(),
            invoker: None,
        }
    }

    /// Backend-assigned object name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current cached value of a property.
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner
            .properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Overwrite a cached property. Called by the channel layer when the
    /// server pushes a property update.
    pub fn set_property(&self, key: impl Into<String>, value: Value) {
        self.inner
            .properties
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value);
    }

    /// Look up a signal by its wire name.
    pub fn signal(&self, name: &str) -> Option<SignalHandle> {
        self.inner.signals.get(name).cloned()
    }

    /// The `<field>Changed` companion signal of a property, if the backend
    /// declared one.
    pub fn changed_signal(&self, field: &str) -> Option<SignalHandle> {
        self.signal(&format!("{field}Changed"))
    }

    /// Invoke a callable operation on the backend object.
    ///
    /// A resolved response may still carry a domain failure in its `error`
    /// field; callers inspect the payload.
    pub async fn invoke(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<CallResponse, ChannelError> {
        match &self.inner.invoker {
            Some(invoker) => invoker.invoke(&self.inner.name, method, args).await,
            None => Err(ChannelError::Invoke {
                object: self.inner.name.clone(),
                method: method.to_string(),
                reason: "object has no invoker".to_string(),
            }),
        }
    }
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("name", &self.inner.name)
            .field("signals", &self.inner.signals.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder used by channel implementations (and tests) to assemble proxies
/// from handshake metadata.
pub struct RemoteObjectBuilder {
    name: String,
    properties: BTreeMap<String, Value>,
    signals: HashMap<String, SignalHandle>,
    invoker: Option<Arc<dyn MethodInvoker>>,
}

impl RemoteObjectBuilder {
    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Declare a signal, creating a fresh handle.
    pub fn signal(self, name: impl Into<String>) -> Self {
        self.signal_handle(name, SignalHandle::new())
    }

    /// Declare a signal backed by an existing handle (the channel layer
    /// keeps its own clone for emitting).
    pub fn signal_handle(mut self, name: impl Into<String>, handle: SignalHandle) -> Self {
        self.signals.insert(name.into(), handle);
        self
    }

    pub fn invoker(mut self, invoker: Arc<dyn MethodInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    pub fn build(self) -> RemoteObject {
        RemoteObject {
            inner: Arc::new(RemoteObjectInner {
                name: self.name,
                properties: RwLock::new(self.properties),
                signals: self.signals,
                invoker: self.invoker,
            }),
        }
    }
}

/// A completed handshake: the backend's objects, keyed by name.
pub trait ObjectChannel: Send + Sync {
    fn objects(&self) -> &HashMap<String, RemoteObject>;

    fn object(&self, name: &str) -> Option<RemoteObject> {
        self.objects().get(name).cloned()
    }
}

/// Performs the object-channel handshake over a freshly dialed transport.
///
/// Implemented by the external channel layer; stubbed in tests.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn handshake(
        &self,
        transport: Arc<dyn TransportHandle>,
        incoming: MessageStream,
    ) -> Result<Arc<dyn ObjectChannel>, ChannelError>;
}
