use crate::error::{StoreError, StoreResult};
use crate::runtime::ReactiveRuntime;
use crate::store::ModulePath;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Slot {
    Leaf(Value),
    // Nested object that came in with a state template or a `set`.
    Object(ReactiveObject),
    // Subtree attached through `declare`; owned by another module.
    Mount(ReactiveObject),
}

struct ObjectInner {
    id: usize,
    entries: RwLock<IndexMap<String, Slot>>,
}

/// An observable JSON-like object.
///
/// Reads (`get`, `child`, `snapshot`, ...) are recorded against the current
/// observer; writes (`set`, `update`, `declare`) re-run every observer that
/// read this object. Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Arc<ObjectInner>,
}

/// Make a plain JSON object observable, nested objects included.
pub fn make_reactive(state: Map<String, Value>) -> ReactiveObject {
    let entries = state
        .into_iter()
        .map(|(key, value)| (key, Slot::from_value(value)))
        .collect();
    ReactiveObject::with_entries(entries)
}

impl Slot {
    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Slot::Object(make_reactive(map)),
            other => Slot::Leaf(other),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Slot::Leaf(value) => value.clone(),
            Slot::Object(obj) | Slot::Mount(obj) => obj.snapshot(),
        }
    }
}

impl ReactiveObject {
    fn with_entries(entries: IndexMap<String, Slot>) -> Self {
        let id = ReactiveRuntime::current().next_id();
        Self {
            inner: Arc::new(ObjectInner {
                id,
                entries: RwLock::new(entries),
            }),
        }
    }

    /// An empty observable object.
    pub fn new() -> Self {
        Self::with_entries(IndexMap::new())
    }

    /// Make a JSON value observable; anything but an object is rejected.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Ok(make_reactive(map)),
            other => Err(StoreError::structural(
                &ModulePath::root(),
                format!("state must be an object, got {other}"),
            )),
        }
    }

    /// Identifier this object is tracked under in the reactive runtime.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// True when both handles point at the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn track(&self) {
        ReactiveRuntime::current().track_read(self.inner.id);
    }

    fn notify(&self) {
        ReactiveRuntime::current().notify_observers(self.inner.id);
    }

    fn slot(&self, key: &str) -> Option<Slot> {
        self.track();
        self.inner.entries.read().get(key).cloned()
    }

    /// Read a property as JSON; nested objects are rendered as snapshots.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.slot(key).map(|slot| slot.to_value())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_owned))
    }

    /// Handle to a nested object, if `key` holds one.
    pub fn child(&self, key: &str) -> Option<ReactiveObject> {
        match self.slot(key)? {
            Slot::Object(obj) | Slot::Mount(obj) => Some(obj),
            Slot::Leaf(_) => None,
        }
    }

    /// Walk `path` one child at a time; the empty path is `self`.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<ReactiveObject> {
        path.iter()
            .try_fold(self.clone(), |cur, key| cur.child(key.as_ref()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.track();
        self.inner.entries.read().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.track();
        self.inner.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.track();
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a property and notify observers.
    ///
    /// Object values become nested reactive objects. Properties holding a
    /// declared subtree belong to another module and are left untouched.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        {
            let mut entries = self.inner.entries.write();
            if let Some(Slot::Mount(_)) = entries.get(&key) {
                tracing::warn!(key = %key, "refusing to overwrite a declared subtree");
                return;
            }
            entries.insert(key, Slot::from_value(value.into()));
        }
        self.notify();
    }

    /// Modify a property in place; a missing property starts as `null`.
    ///
    /// Returns `false` without writing when `key` holds a declared subtree.
    pub fn update(&self, key: impl Into<String>, f: impl FnOnce(&mut Value)) -> bool {
        let key = key.into();
        let current = match self.inner.entries.read().get(&key) {
            Some(Slot::Mount(_)) => {
                tracing::warn!(key = %key, "refusing to update a declared subtree");
                return false;
            }
            Some(slot) => ReactiveRuntime::current().untracked(|| slot.to_value()),
            None => Value::Null,
        };
        let mut value = current;
        f(&mut value);
        self.inner
            .entries
            .write()
            .insert(key, Slot::from_value(value));
        self.notify();
        true
    }

    /// Remove a plain property. Declared subtrees cannot be removed.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = {
            let mut entries = self.inner.entries.write();
            if matches!(entries.get(key), Some(Slot::Mount(_)) | None) {
                return None;
            }
            entries.shift_remove(key)
        };
        self.notify();
        removed.map(|slot| ReactiveRuntime::current().untracked(|| slot.to_value()))
    }

    /// Attach `subtree` at `key` so it is observable through this object.
    ///
    /// This is the only way a module's state joins the tree; the property is
    /// then protected from `set`, `update` and `remove`.
    pub fn declare(&self, key: impl Into<String>, subtree: ReactiveObject) {
        self.inner
            .entries
            .write()
            .insert(key.into(), Slot::Mount(subtree));
        self.notify();
    }

    /// Render the whole object, nested objects included, as JSON.
    pub fn snapshot(&self) -> Value {
        self.track();
        let slots: Vec<(String, Slot)> = self
            .inner
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(
            slots
                .into_iter()
                .map(|(key, slot)| (key, slot.to_value()))
                .collect(),
        )
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = ReactiveRuntime::current().untracked(|| self.snapshot());
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("state", &snapshot)
            .finish()
    }
}
