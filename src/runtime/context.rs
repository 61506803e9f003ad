use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

type ObserverFn = Arc<dyn Fn() + Send + Sync>;

/// Dependency graph between reactive sources and the observers reading them.
struct ReactiveContext {
    current_observer: Option<usize>,
    // Map from source ID to set of observer IDs that depend on it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of source IDs it depends on
    observer_deps: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to the function re-run on change
    observers: HashMap<usize, ObserverFn>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            current_observer: None,
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            observers: HashMap::new(),
        }
    }

    fn forget_dependencies(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                    if deps.is_empty() {
                        self.dependencies.remove(&source_id);
                    }
                }
            }
        }
    }

    fn clear(&mut self) {
        self.current_observer = None;
        self.dependencies.clear();
        self.observer_deps.clear();
        self.observers.clear();
    }
}

/// Inner runtime state shared with RAII guards.
pub struct RuntimeInner {
    context: Mutex<ReactiveContext>,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            context: Mutex::new(ReactiveContext::new()),
        }
    }

    /// Drop an observer and every dependency edge pointing at it.
    pub fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.lock();
        ctx.observers.remove(&observer_id);
        ctx.forget_dependencies(observer_id);
    }

    fn clear(&self) {
        self.context.lock().clear();
    }
}

/// Reactive runtime tracking which observers read which state objects.
///
/// Supports both a global runtime (default) and scoped runtimes for isolation.
/// Every [`ReactiveObject`](crate::reactive::ReactiveObject) read inside an
/// observer records an edge; every write re-runs the observers on that edge.
///
/// # Examples
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use larder::runtime::ReactiveRuntime;
/// use larder::reactive::ReactiveObject;
/// use serde_json::json;
///
/// ReactiveRuntime::scope(|| {
///     let state = ReactiveObject::from_value(json!({ "count": 0 })).unwrap();
///     assert_eq!(state.get_i64("count"), Some(0));
/// });
/// // Runtime and all its state is dropped here
/// ```
pub struct ReactiveRuntime {
    inner: Arc<RuntimeInner>,
}

// Shared by every runtime: objects outlive scopes and `clear`, so an id is
// never handed out twice in a process.
static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            inner: Arc::new(RuntimeInner::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is cleaned up when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current reactive runtime (scoped or global fallback).
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Clear all observers and dependencies.
    ///
    /// Ids already handed out stay taken.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Get a reference to the inner runtime state.
    pub fn inner(&self) -> Arc<RuntimeInner> {
        Arc::clone(&self.inner)
    }

    /// Generate the next unique ID for a reactive source or observer.
    pub fn next_id(&self) -> usize {
        NEXT_ID.fetch_add(1, Ordering::SeqCst)
    }

    /// Track a read of a source by the current observer.
    pub fn track_read(&self, source_id: usize) {
        let mut ctx = self.inner.context.lock();
        if let Some(current_observer) = ctx.current_observer {
            ctx.dependencies
                .entry(source_id)
                .or_default()
                .insert(current_observer);
            ctx.observer_deps
                .entry(current_observer)
                .or_default()
                .insert(source_id);
        }
    }

    /// Re-run every observer that depends on a source.
    ///
    /// Observers are collected first and run with the lock released, so they
    /// may read or write reactive state themselves.
    pub fn notify_observers(&self, source_id: usize) {
        let pending: Vec<(usize, ObserverFn)> = {
            let ctx = self.inner.context.lock();
            match ctx.dependencies.get(&source_id) {
                Some(observers) => {
                    let mut ids: Vec<usize> = observers.iter().copied().collect();
                    ids.sort_unstable();
                    ids.into_iter()
                        .filter_map(|id| ctx.observers.get(&id).map(|f| (id, Arc::clone(f))))
                        .collect()
                }
                None => Vec::new(),
            }
        };

        for (observer_id, observer) in pending {
            // Skip observers already running further up the stack.
            if self.is_current_observer(observer_id) {
                continue;
            }
            self.run_observer(observer_id, || observer());
        }
    }

    fn is_current_observer(&self, observer_id: usize) -> bool {
        self.inner.context.lock().current_observer == Some(observer_id)
    }

    /// Register the function re-run when an observer's dependencies change.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ctx = self.inner.context.lock();
        ctx.forget_dependencies(observer_id);
        ctx.observers.insert(observer_id, Arc::new(f));
    }

    /// Run `f` as an observer, re-collecting its dependencies from scratch.
    pub fn run_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.inner.context.lock().forget_dependencies(observer_id);
        self.with_observer(observer_id, f)
    }

    /// Run a function with a specific observer as the current context.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let prev = self.inner.context.lock().current_observer.replace(observer_id);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        self.inner.context.lock().current_observer = prev;

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Run a function without recording any reads.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let prev = self.inner.context.lock().current_observer.take();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        self.inner.context.lock().current_observer = prev;

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Number of observers currently depending on a source.
    pub fn observer_count(&self, source_id: usize) -> usize {
        self.inner
            .context
            .lock()
            .dependencies
            .get(&source_id)
            .map_or(0, HashSet::len)
    }
}
