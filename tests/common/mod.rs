//! Counter app modules shared by the integration tests.

#![allow(dead_code)]

use larder::{ActionContext, Module, ReactiveObject, StoreResult};
use serde_json::{json, Value};
use std::time::Duration;

pub const TICK: Duration = Duration::from_secs(3);

/// Mutation adding `payload.value` to the integer at `key`.
pub fn add_to(key: &'static str) -> impl Fn(&ReactiveObject, &Value) + Send + Sync + 'static {
    move |state, payload| {
        let by = payload["value"].as_i64().unwrap_or(0);
        state.update(key, |n| *n = json!(n.as_i64().unwrap_or(0) + by));
    }
}

/// Action committing `increment` with its payload every [`TICK`].
pub fn increment_every_tick(ctx: &ActionContext, payload: &Value) -> StoreResult<()> {
    let payload = payload.clone();
    ctx.schedule_every(TICK, move |store| store.commit("increment", payload.clone()));
    Ok(())
}

pub fn module_c() -> Module {
    Module::new().state(json!({ "cCount": 300 }))
}

pub fn module_a() -> Module {
    Module::new()
        .state(json!({ "aCount": 100 }))
        .getter("aCountPlusCount", |state, _, root| {
            json!(root.get_i64("count").unwrap_or(0) + state.get_i64("aCount").unwrap_or(0))
        })
        .mutation("increment", add_to("aCount"))
        .action("incrementAsync", increment_every_tick)
        .module("c", module_c())
}

pub fn module_b() -> Module {
    Module::new().state(json!({ "bCount": 200 }))
}

/// Root module without children.
pub fn root_only() -> Module {
    Module::new()
        .state(json!({ "count": 0 }))
        .getter("doubleCount", |state, _, _| {
            json!(state.get_i64("count").unwrap_or(0) * 2)
        })
        .mutation("increment", add_to("count"))
        .action("incrementAsync", increment_every_tick)
}

/// The full counter app: root with modules `a` (holding `c`) and `b`.
pub fn counter_app() -> Module {
    root_only().module("a", module_a()).module("b", module_b())
}
