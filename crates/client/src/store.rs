//! Flat local state store mirrored from remote objects.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// A flat `field -> value` map with explicitly declared fields.
///
/// Declaring fields up front is what drives auto-binding: the ledger probes
/// the remote object for a `<field>Changed` signal per declared field and
/// for nothing else, so store mutator methods live on surrounding types and
/// are never mistaken for bindable state.
///
/// Cheap to clone; clones share the underlying map, so a signal listener
/// holding a clone writes through to every reader.
#[derive(Debug, Clone, Default)]
pub struct ValueStore {
    inner: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fields with initial values.
    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Declared field names, in stable (sorted) order.
    pub fn fields(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().get(field).cloned()
    }

    /// Overwrite a field's value, declaring it if absent.
    pub fn set(&self, field: &str, value: Value) {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(field.to_string(), value);
    }

    /// A point-in-time copy of the whole store.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}
