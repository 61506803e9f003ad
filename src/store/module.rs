use super::context::ActionContext;
use super::registry::Getters;
use crate::error::StoreResult;
use crate::reactive::ReactiveObject;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Derived value of `(local_state, getters, root_state)`.
pub type GetterFn = Arc<dyn Fn(&ReactiveObject, &Getters, &ReactiveObject) -> Value + Send + Sync>;

/// Synchronous write of `payload` into the owning module's state.
pub type MutationFn = Arc<dyn Fn(&ReactiveObject, &Value) + Send + Sync>;

/// Workflow that commits mutations, possibly later through scheduled tasks.
pub type ActionFn = Arc<dyn Fn(&ActionContext, &Value) -> StoreResult<()> + Send + Sync>;

/// Child modules keyed by the property their state is attached under.
pub type Modules = IndexMap<String, Module>;

/// Declarative description of one slice of the store.
///
/// Modules are plain data: registering one copies its state template into a
/// fresh reactive object, so the same descriptor can be registered at several
/// paths without the copies sharing state. Declaration order is kept and
/// decides fan-out order.
///
/// ```
/// use larder::store::Module;
/// use serde_json::json;
///
/// let counter = Module::new()
///     .state(json!({ "count": 0 }))
///     .getter("doubleCount", |state, _getters, _root| {
///         json!(state.get_i64("count").unwrap_or(0) * 2)
///     })
///     .mutation("increment", |state, payload| {
///         let by = payload["value"].as_i64().unwrap_or(0);
///         state.update("count", |count| *count = json!(count.as_i64().unwrap_or(0) + by));
///     })
///     .action("incrementLater", |ctx, payload| ctx.commit("increment", payload.clone()));
/// assert_eq!(counter.getter_names().collect::<Vec<_>>(), ["doubleCount"]);
/// assert_eq!(counter.mutation_names().collect::<Vec<_>>(), ["increment"]);
/// assert_eq!(counter.action_names().collect::<Vec<_>>(), ["incrementLater"]);
/// ```
#[derive(Clone)]
pub struct Module {
    state: Value,
    getters: IndexMap<String, GetterFn>,
    mutations: IndexMap<String, MutationFn>,
    actions: IndexMap<String, ActionFn>,
    modules: Modules,
}

impl Module {
    pub fn new() -> Self {
        Self {
            state: Value::Object(Map::new()),
            getters: IndexMap::new(),
            mutations: IndexMap::new(),
            actions: IndexMap::new(),
            modules: IndexMap::new(),
        }
    }

    /// Initial state. Must be a JSON object; this is checked at registration.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&ReactiveObject, &Getters, &ReactiveObject) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&ReactiveObject, &Value) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(mutation));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ActionContext, &Value) -> StoreResult<()> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Nest `module` under `key`; its state lands at `state[key]`.
    pub fn module(mut self, key: impl Into<String>, module: Module) -> Self {
        self.modules.insert(key.into(), module);
        self
    }

    pub fn state_template(&self) -> &Value {
        &self.state
    }

    pub fn getter_names(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(String::as_str)
    }

    pub fn mutation_names(&self) -> impl Iterator<Item = &str> {
        self.mutations.keys().map(String::as_str)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn modules(&self) -> &Modules {
        &self.modules
    }

    pub(crate) fn getters(&self) -> &IndexMap<String, GetterFn> {
        &self.getters
    }

    pub(crate) fn mutations(&self) -> &IndexMap<String, MutationFn> {
        &self.mutations
    }

    pub(crate) fn actions(&self) -> &IndexMap<String, ActionFn> {
        &self.actions
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("state", &self.state)
            .field("getters", &self.getter_names().collect::<Vec<_>>())
            .field("mutations", &self.mutation_names().collect::<Vec<_>>())
            .field("actions", &self.action_names().collect::<Vec<_>>())
            .field("modules", &self.modules)
            .finish()
    }
}
