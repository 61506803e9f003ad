//! The store engine.
//!
//! A [`Store`] is built from a tree of [`Module`] descriptors. Each module's
//! state is attached to the root state at the path mirroring its position,
//! and its getters, mutations and actions are merged into flat registries
//! where one name can fan out to several modules.

mod context;
mod module;
mod path;
mod registry;
mod store;

pub use context::ActionContext;
pub use module::{ActionFn, GetterFn, Module, Modules, MutationFn};
pub use path::ModulePath;
pub use registry::Getters;
pub use store::{MutationEvent, Store, Subscription, WeakStore};
