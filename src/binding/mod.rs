//! Store binding for component trees.
//!
//! Every component gets a reference to the nearest store: its own, if it was
//! configured with one, otherwise its parent's.

mod component;

pub use component::{Component, ComponentOptions, StorePlugin};
