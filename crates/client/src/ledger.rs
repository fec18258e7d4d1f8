//! Subscription ledger: tracked signal bindings with deterministic teardown.

use std::sync::Arc;

use serde_json::Value;

use crate::channel::{RemoteObject, Signal, SignalListener};
use crate::store::ValueStore;

struct Teardown {
    label: Option<String>,
    undo: Box<dyn FnOnce() + Send>,
}

/// Registry of active signal bindings.
///
/// Each binding records the undo for its subscription; `disconnect_all`
/// replays the undos in reverse creation order, so a binding that depends
/// on state set up by an earlier one is gone before its dependency is.
///
/// The ledger does not own the underlying connection and cannot see its
/// state; tear bindings down before disconnecting the connection.
#[derive(Default)]
pub struct SubscriptionLedger {
    teardowns: Vec<Teardown>,
}

impl SubscriptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.teardowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teardowns.is_empty()
    }

    /// Subscribe `listener` to `signal` and record the matching undo.
    ///
    /// The subscription is active before this returns; an eager source may
    /// fire the listener during the call.
    pub fn bind<S>(&mut self, signal: S, listener: impl Fn(&[Value]) + Send + Sync + 'static)
    where
        S: Signal + Send + 'static,
    {
        self.record(signal, Arc::new(listener), None);
    }

    /// Like [`bind`](Self::bind), with a diagnostic label carried into
    /// teardown logs. The label is never interpreted.
    pub fn bind_labeled<S>(
        &mut self,
        signal: S,
        listener: impl Fn(&[Value]) + Send + Sync + 'static,
        label: impl Into<String>,
    ) where
        S: Signal + Send + 'static,
    {
        self.record(signal, Arc::new(listener), Some(label.into()));
    }

    fn record<S>(&mut self, signal: S, listener: SignalListener, label: Option<String>)
    where
        S: Signal + Send + 'static,
    {
        let id = signal.subscribe(listener);
        tracing::trace!(label = label.as_deref().unwrap_or(""), "bound signal listener");
        self.teardowns.push(Teardown {
            label,
            undo: Box::new(move || {
                signal.unsubscribe(id);
            }),
        });
    }

    /// Wire every declared store field to a same-named `<field>Changed`
    /// signal on `remote`, then copy the remote's current value in as a
    /// one-time initial snapshot.
    ///
    /// Fields without a remote companion signal get no binding; fields
    /// without a remote value get no snapshot. Both are silently skipped,
    /// so local-only derived fields cost nothing.
    pub fn auto_bind(&mut self, store: &ValueStore, remote: &RemoteObject) {
        for field in store.fields() {
            if let Some(signal) = remote.changed_signal(&field) {
                let store = store.clone();
                let target = field.clone();
                let label = format!("{}.{}Changed", remote.name(), field);
                self.bind_labeled(
                    signal,
                    move |args| {
                        if let Some(value) = args.first() {
                            store.set(&target, value.clone());
                        }
                    },
                    label,
                );
            }
            // Initial snapshot; happens once and is not itself a binding.
            if let Some(value) = remote.property(&field) {
                store.set(&field, value);
            }
        }
    }

    /// Undo every binding in reverse creation order, then clear the ledger.
    /// Idempotent; a second call finds nothing to undo.
    pub fn disconnect_all(&mut self) {
        while let Some(teardown) = self.teardowns.pop() {
            tracing::trace!(
                label = teardown.label.as_deref().unwrap_or(""),
                "unbinding signal listener"
            );
            (teardown.undo)();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{SignalHandle, SubscriptionId};
    use serde_json::json;
    use std::sync::Mutex;

    /// Signal stub that records unsubscribe order into a shared log.
    #[derive(Clone)]
    struct RecordingSignal {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        backing: SignalHandle,
    }

    impl RecordingSignal {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                backing: SignalHandle::new(),
            }
        }
    }

    impl Signal for RecordingSignal {
        fn subscribe(&self, listener: SignalListener) -> SubscriptionId {
            self.backing.subscribe(listener)
        }

        fn unsubscribe(&self, id: SubscriptionId) -> bool {
            self.log.lock().unwrap().push(self.name);
            self.backing.unsubscribe(id)
        }
    }

    #[test]
    fn teardown_runs_in_reverse_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ledger = SubscriptionLedger::new();

        for name in ["a", "b", "c"] {
            ledger.bind(RecordingSignal::new(name, &log), |_| {});
        }
        assert_eq!(ledger.len(), 3);

        ledger.disconnect_all();
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn disconnect_all_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ledger = SubscriptionLedger::new();
        ledger.bind(RecordingSignal::new("only", &log), |_| {});

        ledger.disconnect_all();
        ledger.disconnect_all();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn disconnect_all_on_empty_ledger_is_safe() {
        SubscriptionLedger::new().disconnect_all();
    }

    #[test]
    fn bind_subscribes_immediately() {
        let signal = SignalHandle::new();
        let mut ledger = SubscriptionLedger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        ledger.bind_labeled(
            signal.clone(),
            move |args| sink.lock().unwrap().push(args.to_vec()),
            "TodoController.onAdd",
        );
        assert_eq!(signal.listener_count(), 1);

        signal.emit(&[json!("todo")]);
        assert_eq!(seen.lock().unwrap().len(), 1);

        ledger.disconnect_all();
        assert_eq!(signal.listener_count(), 0);

        // Emitting after teardown reaches nobody.
        signal.emit(&[json!("late")]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn auto_bind_snapshots_then_tracks_changes() {
        let store = ValueStore::with_fields([("count", json!(0))]);
        let remote = RemoteObject::builder("Counter")
            .property("count", json!(7))
            .signal("countChanged")
            .build();
        let mut ledger = SubscriptionLedger::new();

        ledger.auto_bind(&store, &remote);

        // Initial snapshot applied once.
        assert_eq!(store.get("count"), Some(json!(7)));
        assert_eq!(ledger.len(), 1);

        remote
            .changed_signal("count")
            .unwrap()
            .emit(&[json!(9)]);
        assert_eq!(store.get("count"), Some(json!(9)));

        ledger.disconnect_all();
        remote
            .changed_signal("count")
            .unwrap()
            .emit(&[json!(11)]);
        assert_eq!(store.get("count"), Some(json!(9)));
    }

    #[test]
    fn auto_bind_skips_fields_without_remote_counterpart() {
        // "filterText" is local-only; the remote has neither the property
        // nor a companion signal.
        let store = ValueStore::with_fields([("count", json!(0)), ("filterText", json!(""))]);
        let remote = RemoteObject::builder("Counter")
            .property("count", json!(1))
            .signal("countChanged")
            .build();
        let mut ledger = SubscriptionLedger::new();

        ledger.auto_bind(&store, &remote);

        assert_eq!(ledger.len(), 1);
        assert_eq!(store.get("filterText"), Some(json!("")));
    }

    #[test]
    fn auto_bind_probes_only_declared_fields() {
        // The remote also exposes `refreshChanged`, but the store declares
        // no `refresh` field (refresh is a method on the surrounding type),
        // so that signal must never be touched.
        let store = ValueStore::with_fields([("count", json!(0))]);
        let remote = RemoteObject::builder("Counter")
            .property("count", json!(7))
            .signal("countChanged")
            .signal("refreshChanged")
            .build();
        let mut ledger = SubscriptionLedger::new();

        ledger.auto_bind(&store, &remote);

        assert_eq!(ledger.len(), 1);
        assert_eq!(store.get("count"), Some(json!(7)));
        assert_eq!(remote.signal("refreshChanged").unwrap().listener_count(), 0);
        assert_eq!(store.get("refresh"), None);
    }

    #[test]
    fn auto_bind_takes_snapshot_even_without_signal() {
        // Property present, companion signal absent: snapshot only.
        let store = ValueStore::with_fields([("version", json!(null))]);
        let remote = RemoteObject::builder("Meta")
            .property("version", json!("1.2.0"))
            .build();
        let mut ledger = SubscriptionLedger::new();

        ledger.auto_bind(&store, &remote);

        assert!(ledger.is_empty());
        assert_eq!(store.get("version"), Some(json!("1.2.0")));
    }
}
