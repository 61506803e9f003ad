use super::context::ActionContext;
use super::module::{ActionFn, Module, Modules};
use super::path::ModulePath;
use super::registry::{ActionHandler, FanOut, Getters, MutationHandler};
use crate::config::{DispatchMode, GetterCollision, StoreConfig};
use crate::error::{HandlerKind, StoreError, StoreResult};
use crate::reactive::{make_reactive, ReactiveObject};
use crate::runtime::ReactiveRuntime;
use crate::task::Scheduler;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Subscriber = Arc<dyn Fn(&MutationEvent, &ReactiveObject) + Send + Sync>;

/// A committed mutation, as reported to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub name: String,
    pub payload: Value,
}

struct StoreInner {
    config: StoreConfig,
    state: ReactiveObject,
    getters: Getters,
    mutations: FanOut<MutationHandler>,
    actions: FanOut<ActionHandler>,
    root_actions: IndexMap<String, ActionFn>,
    subscribers: RwLock<Vec<(u64, Subscriber)>>,
    next_subscriber: AtomicU64,
    scheduler: Scheduler,
}

/// Centralized state container.
///
/// A store owns one reactive state tree built from a root [`Module`] and its
/// nested modules. State changes go through named mutations (`commit`),
/// workflows through named actions (`dispatch`), and derived values through
/// named getters. Cloning yields another handle to the same store.
///
/// # Examples
///
/// ```
/// use larder::store::{Module, Store};
/// use serde_json::json;
///
/// fn add(key: &'static str) -> impl Fn(&larder::ReactiveObject, &serde_json::Value) {
///     move |state, payload| {
///         let by = payload["value"].as_i64().unwrap_or(0);
///         state.update(key, |n| *n = json!(n.as_i64().unwrap_or(0) + by));
///     }
/// }
///
/// let store = Store::new(
///     Module::new()
///         .state(json!({ "count": 0 }))
///         .mutation("increment", add("count"))
///         .module("a", Module::new()
///             .state(json!({ "aCount": 100 }))
///             .mutation("increment", add("aCount"))),
/// )?;
///
/// store.commit("increment", json!({ "value": 5 }))?;
/// assert_eq!(store.snapshot(), json!({ "count": 5, "a": { "aCount": 105 } }));
/// # Ok::<(), larder::StoreError>(())
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Non-owning store handle held by deferred work.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl Store {
    /// Build a store with the default configuration.
    pub fn new(root: Module) -> StoreResult<Self> {
        Self::with_config(root, StoreConfig::default())
    }

    /// Build a store from a root module.
    ///
    /// Root state becomes reactive first, then root getters, mutations and
    /// actions are installed, then nested modules are registered depth-first.
    pub fn with_config(root: Module, config: StoreConfig) -> StoreResult<Self> {
        let root_path = ModulePath::root();
        let state = make_reactive(state_map(root.state_template(), &root_path)?);
        let getters = Getters::new(state.clone());

        for (name, getter) in root.getters() {
            getters.install(name, root_path.clone(), state.clone(), Arc::clone(getter));
        }

        let mutations = FanOut::new();
        for (name, mutation) in root.mutations() {
            mutations.seed(
                name,
                MutationHandler {
                    owner: root_path.clone(),
                    local: state.clone(),
                    mutation: Arc::clone(mutation),
                },
            );
        }

        let actions = FanOut::new();
        for (name, action) in root.actions() {
            actions.seed(
                name,
                ActionHandler {
                    owner: root_path.clone(),
                    local: state.clone(),
                    action: Arc::clone(action),
                },
            );
        }

        let store = Self {
            inner: Arc::new(StoreInner {
                config,
                state,
                getters,
                mutations,
                actions,
                root_actions: root.actions().clone(),
                subscribers: RwLock::new(Vec::new()),
                next_subscriber: AtomicU64::new(0),
                scheduler: Scheduler::new(),
            }),
        };

        store.register(root.modules(), &root_path)?;
        tracing::debug!(
            getters = store.inner.getters.len(),
            mutations = store.inner.mutations.names().len(),
            actions = store.inner.actions.names().len(),
            "store constructed"
        );
        Ok(store)
    }

    /// Attach more modules below `path` after construction.
    ///
    /// The result is the same as if the modules had been part of the tree
    /// passed to [`Store::new`]. Nothing is applied if any module is
    /// malformed.
    pub fn register_module<P, I, K>(&self, path: P, modules: I) -> StoreResult<()>
    where
        P: Into<ModulePath>,
        I: IntoIterator<Item = (K, Module)>,
        K: Into<String>,
    {
        let modules: Modules = modules
            .into_iter()
            .map(|(key, module)| (key.into(), module))
            .collect();
        self.register(&modules, &path.into())
    }

    fn register(&self, modules: &Modules, path: &ModulePath) -> StoreResult<()> {
        let parent = self.module_state(path.clone())?;
        if modules.is_empty() {
            return Ok(());
        }
        let runtime = ReactiveRuntime::current();

        let mut getter_owners: HashMap<String, ModulePath> = runtime.untracked(|| {
            let getters = &self.inner.getters;
            getters
                .names()
                .into_iter()
                .filter_map(|name| getters.owner(&name).map(|owner| (name, owner)))
                .collect()
        });
        runtime.untracked(|| {
            self.validate(
                modules,
                path,
                &|key: &str| parent.contains_key(key),
                &mut getter_owners,
            )
        })?;

        self.install(&parent, modules, path);
        tracing::debug!(path = %path, modules = modules.len(), "modules registered");
        Ok(())
    }

    fn validate(
        &self,
        modules: &Modules,
        path: &ModulePath,
        parent_has: &dyn Fn(&str) -> bool,
        getter_owners: &mut HashMap<String, ModulePath>,
    ) -> StoreResult<()> {
        for (key, module) in modules {
            let module_path = path.join(key);
            let template = state_map(module.state_template(), &module_path)?;

            if parent_has(key) {
                return Err(StoreError::structural(
                    &module_path,
                    format!("parent state at {path} already has a `{key}` property"),
                ));
            }

            for name in module.getter_names() {
                if let Some(owner) = getter_owners.insert(name.to_owned(), module_path.clone()) {
                    if self.inner.config.getter_collision == GetterCollision::Reject {
                        return Err(StoreError::structural(
                            &module_path,
                            format!("getter `{name}` is already defined by {owner}"),
                        ));
                    }
                }
            }

            self.validate(
                module.modules(),
                &module_path,
                &|child: &str| template.contains_key(child),
                getter_owners,
            )?;
        }
        Ok(())
    }

    fn install(&self, parent: &ReactiveObject, modules: &Modules, path: &ModulePath) {
        let inner = &self.inner;
        for (key, module) in modules {
            let module_path = path.join(key);
            // Validated already; a non-object template cannot reach this point.
            let template = module.state_template().as_object().cloned().unwrap_or_default();
            let local = make_reactive(template);
            parent.declare(key.as_str(), local.clone());

            for (name, getter) in module.getters() {
                let replaced =
                    inner
                        .getters
                        .install(name, module_path.clone(), local.clone(), Arc::clone(getter));
                if let Some(previous) = replaced {
                    tracing::warn!(
                        getter = %name,
                        previous = %previous,
                        module = %module_path,
                        "getter redefined, last registration wins"
                    );
                }
            }

            for (name, mutation) in module.mutations() {
                let handler = MutationHandler {
                    owner: module_path.clone(),
                    local: local.clone(),
                    mutation: Arc::clone(mutation),
                };
                if !inner.mutations.append(name, handler, inner.config.orphan_handlers) {
                    tracing::debug!(
                        mutation = %name,
                        module = %module_path,
                        "no root or ancestor entry, module mutation dropped"
                    );
                }
            }

            for (name, action) in module.actions() {
                let handler = ActionHandler {
                    owner: module_path.clone(),
                    local: local.clone(),
                    action: Arc::clone(action),
                };
                if !inner.actions.append(name, handler, inner.config.orphan_handlers) {
                    tracing::debug!(
                        action = %name,
                        module = %module_path,
                        "no root or ancestor entry, module action dropped"
                    );
                }
            }

            tracing::trace!(module = %module_path, "module installed");
            self.install(&local, module.modules(), &module_path);
        }
    }

    /// Run every handler registered for mutation `name`, in registration order.
    pub fn commit(&self, name: &str, payload: Value) -> StoreResult<()> {
        let handlers = self
            .inner
            .mutations
            .handlers(name)
            .ok_or_else(|| StoreError::lookup(HandlerKind::Mutation, name))?;

        tracing::debug!(mutation = name, handlers = handlers.len(), "commit");
        for handler in &handlers {
            tracing::trace!(mutation = name, module = %handler.owner, "mutation handler");
            handler.invoke(&payload);
        }

        self.notify_subscribers(MutationEvent {
            name: name.to_owned(),
            payload,
        });
        Ok(())
    }

    /// Run action `name`.
    ///
    /// With [`DispatchMode::RootOnly`] only the root-declared action runs;
    /// with [`DispatchMode::FanOut`] every registered action of that name
    /// runs in order and the first error stops the rest.
    pub fn dispatch(&self, name: &str, payload: Value) -> StoreResult<()> {
        match self.inner.config.dispatch {
            DispatchMode::RootOnly => {
                let action = self
                    .inner
                    .root_actions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StoreError::lookup(HandlerKind::Action, name))?;
                tracing::debug!(action = name, "dispatch");
                let context =
                    ActionContext::new(self.clone(), ModulePath::root(), self.inner.state.clone());
                action(&context, &payload)
            }
            DispatchMode::FanOut => {
                let handlers = self
                    .inner
                    .actions
                    .handlers(name)
                    .ok_or_else(|| StoreError::lookup(HandlerKind::Action, name))?;
                tracing::debug!(action = name, handlers = handlers.len(), "dispatch");
                for handler in handlers {
                    tracing::trace!(action = name, module = %handler.owner, "action handler");
                    let context = ActionContext::new(self.clone(), handler.owner, handler.local);
                    (handler.action)(&context, &payload)?;
                }
                Ok(())
            }
        }
    }

    /// Evaluate getter `name` against current state.
    pub fn getter(&self, name: &str) -> StoreResult<Value> {
        self.inner.getters.get(name)
    }

    pub fn getters(&self) -> &Getters {
        &self.inner.getters
    }

    /// The root state object.
    pub fn state(&self) -> &ReactiveObject {
        &self.inner.state
    }

    /// The state slice of the module at `path`.
    pub fn module_state(&self, path: impl Into<ModulePath>) -> StoreResult<ReactiveObject> {
        let path = path.into();
        self.inner
            .state
            .resolve(path.segments())
            .ok_or_else(|| StoreError::structural(&path, "path does not resolve to a state object"))
    }

    /// The whole state tree as JSON.
    pub fn snapshot(&self) -> Value {
        self.inner.state.snapshot()
    }

    /// Mutation names in registration order.
    pub fn mutation_names(&self) -> Vec<String> {
        self.inner.mutations.names()
    }

    /// Number of handlers a commit of `name` runs.
    pub fn mutation_fan_out(&self, name: &str) -> usize {
        self.inner.mutations.handlers(name).map_or(0, |h| h.len())
    }

    /// Modules whose handlers a commit of `name` runs, in order.
    pub fn mutation_owners(&self, name: &str) -> Vec<ModulePath> {
        self.inner
            .mutations
            .handlers(name)
            .unwrap_or_default()
            .into_iter()
            .map(|handler| handler.owner)
            .collect()
    }

    /// Modules whose actions a fan-out dispatch of `name` runs, in order.
    pub fn action_owners(&self, name: &str) -> Vec<ModulePath> {
        self.inner
            .actions
            .handlers(name)
            .unwrap_or_default()
            .into_iter()
            .map(|handler| handler.owner)
            .collect()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Timer queue deferred action work runs on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True when both handles point at the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Call `callback` after every successful commit.
    ///
    /// The subscription lasts until the returned guard is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&MutationEvent, &ReactiveObject) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.write().push((id, Arc::new(callback)));
        Subscription {
            id,
            store: self.downgrade(),
        }
    }

    fn notify_subscribers(&self, event: MutationEvent) {
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&event, &self.inner.state);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.inner.config)
            .field("state", &self.inner.state)
            .field("getters", &self.inner.getters.names())
            .field("mutations", &self.inner.mutations.names())
            .field("actions", &self.inner.actions.names())
            .finish()
    }
}

/// RAII guard for a commit subscription.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: WeakStore,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store
                .inner
                .subscribers
                .write()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

fn state_map(template: &Value, path: &ModulePath) -> StoreResult<Map<String, Value>> {
    match template {
        Value::Object(map) => Ok(map.clone()),
        other => Err(StoreError::structural(
            path,
            format!("module state must be an object, got {other}"),
        )),
    }
}
