//! Deferred work for actions.
//!
//! Actions often need to commit later (polling, debouncing, timers). Work is
//! queued on a [`Scheduler`] and every queued callback is reachable through a
//! revocable [`TaskHandle`].

mod scheduler;

pub use scheduler::{Scheduler, TaskHandle, MIN_INTERVAL};
