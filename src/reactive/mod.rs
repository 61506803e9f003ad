//! Observable state objects.
//!
//! - `make_reactive` turns a plain JSON object into a tracked object graph
//! - `ReactiveObject::declare` attaches a new tracked subtree to an existing object
//! - `Effect` re-runs whenever an object it read is written

mod effect;
mod object;

pub use effect::{create_effect, Effect};
pub use object::{make_reactive, ReactiveObject};
