use crate::runtime::{ReactiveRuntime, RuntimeInner};
use std::sync::{Arc, Weak};

/// A side effect that re-runs when state it read changes.
///
/// This is how a view observes the store: the effect runs immediately to
/// record which state objects it reads, then again after any of them is
/// written. Dropping the effect unsubscribes it.
///
/// # Examples
///
/// ```
/// use larder::reactive::{Effect, ReactiveObject};
/// use serde_json::json;
/// use std::sync::{Arc, atomic::{AtomicI64, Ordering}};
///
/// let state = ReactiveObject::from_value(json!({ "count": 5 })).unwrap();
/// let seen = Arc::new(AtomicI64::new(0));
///
/// let _effect = Effect::new({
///     let state = state.clone();
///     let seen = seen.clone();
///     move || seen.store(state.get_i64("count").unwrap_or(0), Ordering::SeqCst)
/// });
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
///
/// state.set("count", 10);
/// assert_eq!(seen.load(Ordering::SeqCst), 10);
/// ```
pub struct Effect {
    id: usize,
    runtime: Weak<RuntimeInner>,
}

impl Effect {
    /// Create an effect and run it once to establish its dependencies.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();
        let effect = Arc::new(effect);
        let effect_clone = Arc::clone(&effect);

        runtime.create_observer(id, move || {
            effect_clone();
        });

        runtime.run_observer(id, || {
            effect();
        });

        Self {
            id,
            runtime: Arc::downgrade(&runtime.inner()),
        }
    }

    /// Observer ID this effect is registered under.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_observer(self.id);
        }
    }
}

/// Create a new effect that runs when dependencies change.
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}
