use super::path::ModulePath;
use super::registry::Getters;
use super::store::Store;
use crate::error::StoreResult;
use crate::reactive::ReactiveObject;
use crate::task::TaskHandle;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// What an action body sees of the store.
///
/// `state` is always the full root state, even for actions declared in a
/// nested module; `local_state` is the declaring module's own slice.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    owner: ModulePath,
    local: ReactiveObject,
}

impl ActionContext {
    pub(crate) fn new(store: Store, owner: ModulePath, local: ReactiveObject) -> Self {
        Self {
            store,
            owner,
            local,
        }
    }

    pub fn state(&self) -> &ReactiveObject {
        self.store.state()
    }

    pub fn root_state(&self) -> &ReactiveObject {
        self.store.state()
    }

    pub fn local_state(&self) -> &ReactiveObject {
        &self.local
    }

    pub fn getters(&self) -> &Getters {
        self.store.getters()
    }

    /// Path of the module that declared the running action.
    pub fn owner(&self) -> &ModulePath {
        &self.owner
    }

    pub fn commit(&self, name: &str, payload: Value) -> StoreResult<()> {
        self.store.commit(name, payload)
    }

    pub fn dispatch(&self, name: &str, payload: Value) -> StoreResult<()> {
        self.store.dispatch(name, payload)
    }

    /// Run `callback` once after `delay` on the store's scheduler.
    ///
    /// The callback gets the store only if it is still alive when the task
    /// fires; otherwise the task is skipped.
    pub fn schedule<F>(&self, delay: Duration, mut callback: F) -> TaskHandle
    where
        F: FnMut(&Store) -> StoreResult<()> + Send + 'static,
    {
        let weak = self.store.downgrade();
        self.store.scheduler().schedule(delay, move || match weak.upgrade() {
            Some(store) => callback(&store),
            None => {
                tracing::debug!("store dropped before deferred task fired");
                Ok(())
            }
        })
    }

    /// Run `callback` every `interval` while the store is alive.
    ///
    /// Once the store is gone the task cancels itself.
    pub fn schedule_every<F>(&self, interval: Duration, mut callback: F) -> TaskHandle
    where
        F: FnMut(&Store) -> StoreResult<()> + Send + 'static,
    {
        let weak = self.store.downgrade();
        let scheduler = self.store.scheduler();
        let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
        let handle = scheduler.schedule_every(interval, {
            let slot = slot.clone();
            move || match weak.upgrade() {
                Some(store) => callback(&store),
                None => {
                    tracing::debug!("store dropped, cancelling repeating task");
                    if let Some(handle) = slot.lock().as_ref() {
                        handle.cancel();
                    }
                    Ok(())
                }
            }
        });
        *slot.lock() = Some(handle.clone());
        handle
    }
}
