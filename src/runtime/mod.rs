//! Runtime support for reactive state.
//!
//! This module provides the infrastructure for dependency tracking
//! between state objects and the observers (effects, views) reading them.

mod context;

pub use context::{ReactiveRuntime, RuntimeInner};
