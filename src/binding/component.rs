use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use std::fmt;

/// Per-component configuration relevant to store binding.
#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub name: Option<String>,
    pub store: Option<Store>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Bind `store` to the component and, through inheritance, its subtree.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }
}

/// A node of the component tree with its resolved store reference.
///
/// The store is resolved when the component is created, before any setup
/// code runs: the component's own configured store if it has one, otherwise
/// its parent's. Children are created through their parent, so the parent's
/// store is always passed explicitly.
pub struct Component {
    name: Option<String>,
    store: Option<Store>,
    children: Vec<Component>,
}

impl Component {
    /// Create a top-level component.
    pub fn root(options: ComponentOptions) -> Self {
        Self::create(None, options)
    }

    fn create(inherited: Option<&Store>, options: ComponentOptions) -> Self {
        let store = options.store.or_else(|| inherited.cloned());
        tracing::trace!(
            component = options.name.as_deref().unwrap_or("<anonymous>"),
            has_store = store.is_some(),
            "component created"
        );
        Self {
            name: options.name,
            store,
            children: Vec::new(),
        }
    }

    /// Create a child component and attach it to this one.
    pub fn child(&mut self, options: ComponentOptions) -> &mut Component {
        self.child_with_setup(options, |_| {})
    }

    /// Create a child, run `setup` on it once its store is resolved, and
    /// attach it to this one.
    pub fn child_with_setup<F>(&mut self, options: ComponentOptions, setup: F) -> &mut Component
    where
        F: FnOnce(&mut Component),
    {
        let mut child = Self::create(self.store.as_ref(), options);
        setup(&mut child);
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The store this component resolved, if any.
    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    /// The store this component resolved, or [`StoreError::MissingStore`].
    pub fn expect_store(&self) -> StoreResult<&Store> {
        self.store.as_ref().ok_or(StoreError::MissingStore)
    }

    pub fn children(&self) -> &[Component] {
        &self.children
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("has_store", &self.store.is_some())
            .field("children", &self.children)
            .finish()
    }
}

/// Installs a store at the top of a component tree.
pub struct StorePlugin;

impl StorePlugin {
    /// Create the root component with `store` bound, so every descendant
    /// inherits it unless it configures its own.
    pub fn install(store: &Store, options: ComponentOptions) -> Component {
        tracing::debug!("store plugin installed");
        Component::root(options.with_store(store.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Module;
    use serde_json::json;

    fn store(count: i64) -> Store {
        Store::new(Module::new().state(json!({ "count": count }))).unwrap()
    }

    #[test]
    fn children_inherit_the_nearest_store() {
        let outer = store(1);
        let mut root = StorePlugin::install(&outer, ComponentOptions::new().named("app"));

        let child = root.child(ComponentOptions::new().named("list"));
        let grandchild = child.child(ComponentOptions::new().named("item"));
        assert!(grandchild.store().unwrap().ptr_eq(&outer));
    }

    #[test]
    fn own_store_overrides_inheritance() {
        let outer = store(1);
        let inner = store(2);
        let mut root = StorePlugin::install(&outer, ComponentOptions::new());

        let island = root.child(ComponentOptions::new().with_store(inner.clone()));
        let leaf = island.child(ComponentOptions::new());
        assert!(leaf.store().unwrap().ptr_eq(&inner));
        assert!(root.store().unwrap().ptr_eq(&outer));
    }

    #[test]
    fn store_is_resolved_before_setup_runs() {
        let outer = store(7);
        let mut root = StorePlugin::install(&outer, ComponentOptions::new());

        let mut seen = None;
        root.child_with_setup(ComponentOptions::new(), |child| {
            seen = child
                .expect_store()
                .ok()
                .and_then(|store| store.state().get_i64("count"));
        });
        assert_eq!(seen, Some(7));
    }

    #[test]
    fn unbound_trees_report_a_missing_store() {
        let mut root = Component::root(ComponentOptions::new());
        let child = root.child(ComponentOptions::new());
        assert!(child.store().is_none());
        assert!(matches!(child.expect_store(), Err(StoreError::MissingStore)));
    }
}
