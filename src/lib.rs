//! # Larder
//!
//! A centralized, modular state store built on fine-grained reactivity.
//!
//! Larder keeps an application's state in one reactive tree and gives every
//! consumer the same controlled ways of working with it:
//!
//! ## Store (the engine)
//!
//! - `Store` - owns the state tree, built from a tree of `Module`s
//! - Mutations - named synchronous writes; one name fans out to every module declaring it
//! - Actions - named workflows that commit mutations, now or through scheduled tasks
//! - Getters - named derived values, recomputed on every read
//!
//! ## Reactivity (the substrate)
//!
//! - `ReactiveObject` - observable JSON-like objects; reads are tracked, writes notify
//! - `Effect` - re-runs whenever state it read changes
//!
//! ## Binding
//!
//! - `Component` - explicit store context passing down a component tree
//!
//! ```
//! use larder::{Module, Store};
//! use serde_json::json;
//!
//! let store = Store::new(
//!     Module::new()
//!         .state(json!({ "count": 0 }))
//!         .getter("doubleCount", |state, _, _| json!(state.get_i64("count").unwrap_or(0) * 2))
//!         .mutation("increment", |state, payload| {
//!             let by = payload["value"].as_i64().unwrap_or(0);
//!             state.update("count", |n| *n = json!(n.as_i64().unwrap_or(0) + by));
//!         }),
//! )?;
//!
//! store.commit("increment", json!({ "value": 5 }))?;
//! assert_eq!(store.getter("doubleCount")?, json!(10));
//! # Ok::<(), larder::StoreError>(())
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod reactive;
pub mod runtime;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use binding::{Component, ComponentOptions, StorePlugin};
pub use config::StoreConfig;
pub use error::{HandlerKind, StoreError, StoreResult};
pub use reactive::{create_effect, make_reactive, Effect, ReactiveObject};
pub use store::{ActionContext, Getters, Module, ModulePath, MutationEvent, Store};
pub use task::{Scheduler, TaskHandle};
