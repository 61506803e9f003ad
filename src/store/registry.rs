use super::module::{ActionFn, GetterFn, MutationFn};
use super::path::ModulePath;
use crate::config::OrphanPolicy;
use crate::error::{HandlerKind, StoreError, StoreResult};
use crate::reactive::ReactiveObject;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
struct GetterEntry {
    owner: ModulePath,
    local: ReactiveObject,
    getter: GetterFn,
}

struct GettersInner {
    root: ReactiveObject,
    entries: RwLock<IndexMap<String, GetterEntry>>,
}

/// Read-only view of every registered getter.
///
/// Getters are recomputed on each read; nothing is cached, so a read always
/// reflects the current state. Getter functions receive this handle and may
/// read sibling getters through it.
#[derive(Clone)]
pub struct Getters {
    inner: Arc<GettersInner>,
}

impl Getters {
    pub(crate) fn new(root: ReactiveObject) -> Self {
        Self {
            inner: Arc::new(GettersInner {
                root,
                entries: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Evaluate a getter against current state.
    pub fn get(&self, name: &str) -> StoreResult<Value> {
        let entry = self
            .inner
            .entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::lookup(HandlerKind::Getter, name))?;
        Ok((entry.getter)(&entry.local, self, &self.inner.root))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.entries.read().contains_key(name)
    }

    /// Registered getter names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// Path of the module whose definition currently answers for `name`.
    pub fn owner(&self, name: &str) -> Option<ModulePath> {
        self.inner
            .entries
            .read()
            .get(name)
            .map(|entry| entry.owner.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install a getter, returning the owner of any definition it replaced.
    pub(crate) fn install(
        &self,
        name: &str,
        owner: ModulePath,
        local: ReactiveObject,
        getter: GetterFn,
    ) -> Option<ModulePath> {
        self.inner
            .entries
            .write()
            .insert(
                name.to_owned(),
                GetterEntry {
                    owner,
                    local,
                    getter,
                },
            )
            .map(|previous| previous.owner)
    }
}

/// A mutation bound to the state slice of the module that declared it.
#[derive(Clone)]
pub(crate) struct MutationHandler {
    pub(crate) owner: ModulePath,
    pub(crate) local: ReactiveObject,
    pub(crate) mutation: MutationFn,
}

impl MutationHandler {
    pub(crate) fn invoke(&self, payload: &Value) {
        (self.mutation)(&self.local, payload)
    }
}

/// An action together with the module it was declared in.
#[derive(Clone)]
pub(crate) struct ActionHandler {
    pub(crate) owner: ModulePath,
    pub(crate) local: ReactiveObject,
    pub(crate) action: ActionFn,
}

/// Name to ordered handler list, one entry per declaring module.
pub(crate) struct FanOut<H> {
    entries: RwLock<IndexMap<String, Vec<H>>>,
}

impl<H: Clone> FanOut<H> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Start an entry list for a root-declared name.
    pub(crate) fn seed(&self, name: &str, handler: H) {
        self.entries.write().insert(name.to_owned(), vec![handler]);
    }

    /// Append a module handler. Returns `false` when the handler was dropped
    /// because no entry exists and the policy does not create one.
    pub(crate) fn append(&self, name: &str, handler: H, policy: OrphanPolicy) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(name) {
            Some(handlers) => {
                handlers.push(handler);
                true
            }
            None => match policy {
                OrphanPolicy::Drop => false,
                OrphanPolicy::Register => {
                    entries.insert(name.to_owned(), vec![handler]);
                    true
                }
            },
        }
    }

    /// Snapshot of the handlers for `name`, taken so none of them runs
    /// while the registry is locked.
    pub(crate) fn handlers(&self, name: &str) -> Option<Vec<H>> {
        self.entries.read().get(name).cloned()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fan_out_appends_only_to_existing_entries_by_default() {
        let registry: FanOut<&str> = FanOut::new();
        registry.seed("increment", "root");

        assert!(registry.append("increment", "a", OrphanPolicy::Drop));
        assert!(!registry.append("reset", "a", OrphanPolicy::Drop));
        assert_eq!(registry.handlers("increment"), Some(vec!["root", "a"]));
        assert_eq!(registry.handlers("reset"), None);

        assert!(registry.append("reset", "a", OrphanPolicy::Register));
        assert_eq!(registry.handlers("reset"), Some(vec!["a"]));
        assert_eq!(registry.names(), vec!["increment", "reset"]);
    }

    #[test]
    fn getters_are_recomputed_on_every_read() {
        let root = ReactiveObject::from_value(json!({ "count": 1 })).unwrap();
        let getters = Getters::new(root.clone());
        getters.install(
            "doubleCount",
            ModulePath::root(),
            root.clone(),
            Arc::new(|state: &ReactiveObject, _: &Getters, _: &ReactiveObject| json!(state.get_i64("count").unwrap_or(0) * 2)),
        );

        assert_eq!(getters.get("doubleCount").unwrap(), json!(2));
        root.set("count", 21);
        assert_eq!(getters.get("doubleCount").unwrap(), json!(42));
    }

    #[test]
    fn getters_can_read_siblings() {
        let root = ReactiveObject::from_value(json!({ "count": 3 })).unwrap();
        let getters = Getters::new(root.clone());
        getters.install(
            "doubleCount",
            ModulePath::root(),
            root.clone(),
            Arc::new(|state: &ReactiveObject, _: &Getters, _: &ReactiveObject| json!(state.get_i64("count").unwrap_or(0) * 2)),
        );
        getters.install(
            "quadrupleCount",
            ModulePath::root(),
            root.clone(),
            Arc::new(|_: &ReactiveObject, getters: &Getters, _: &ReactiveObject| {
                let double = getters.get("doubleCount").ok().and_then(|v| v.as_i64());
                json!(double.unwrap_or(0) * 2)
            }),
        );
        assert_eq!(getters.get("quadrupleCount").unwrap(), json!(12));
    }

    #[test]
    fn install_reports_the_replaced_owner() {
        let root = ReactiveObject::new();
        let getters = Getters::new(root.clone());
        let getter: GetterFn =
            Arc::new(|_: &ReactiveObject, _: &Getters, _: &ReactiveObject| json!(null));

        assert!(getters
            .install("total", ModulePath::from(vec!["a"]), root.clone(), getter.clone())
            .is_none());
        let replaced = getters.install("total", ModulePath::from(vec!["b"]), root, getter);
        assert_eq!(replaced, Some(ModulePath::from(vec!["a"])));
        assert_eq!(getters.owner("total"), Some(ModulePath::from(vec!["b"])));
    }

    #[test]
    fn unknown_getter_is_a_lookup_error() {
        let getters = Getters::new(ReactiveObject::new());
        assert!(getters.get("missing").unwrap_err().is_lookup());
    }
}
