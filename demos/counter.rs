//! Counter app: nested modules, fan-out mutations and a repeating action

use larder::{
    create_effect, ComponentOptions, Module, ReactiveObject, Store, StorePlugin, StoreResult,
};
use serde_json::{json, Value};
use std::time::Duration;

fn add_to(key: &'static str) -> impl Fn(&ReactiveObject, &Value) + Send + Sync + 'static {
    move |state, payload| {
        let by = payload["value"].as_i64().unwrap_or(0);
        state.update(key, |n| *n = json!(n.as_i64().unwrap_or(0) + by));
    }
}

fn app() -> Module {
    Module::new()
        .state(json!({ "count": 0 }))
        .getter("doubleCount", |state, _, _| {
            json!(state.get_i64("count").unwrap_or(0) * 2)
        })
        .mutation("increment", add_to("count"))
        .action("incrementAsync", |ctx, payload| {
            let payload = payload.clone();
            ctx.schedule_every(Duration::from_secs(3), move |store| {
                store.commit("increment", payload.clone())
            });
            Ok(())
        })
        .module(
            "a",
            Module::new()
                .state(json!({ "aCount": 100 }))
                .getter("aCountPlusCount", |state, _, root| {
                    json!(root.get_i64("count").unwrap_or(0) + state.get_i64("aCount").unwrap_or(0))
                })
                .mutation("increment", add_to("aCount"))
                .module("c", Module::new().state(json!({ "cCount": 300 }))),
        )
        .module("b", Module::new().state(json!({ "bCount": 200 })))
}

fn main() -> StoreResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Store Example: Counter App ===\n");

    let store = Store::new(app())?;
    println!("1. Initial state: {}", store.snapshot());

    // A "view" that re-renders whenever what it reads changes
    let _view = create_effect({
        let store = store.clone();
        move || {
            let double = store.getter("doubleCount").unwrap_or(Value::Null);
            println!("   [View] doubleCount = {double}");
        }
    });

    println!("\n2. Committing increment {{ value: 5 }}");
    store.commit("increment", json!({ "value": 5 }))?;
    println!("   State: {}", store.snapshot());
    println!("   aCountPlusCount = {}", store.getter("aCountPlusCount")?);

    println!("\n3. Mounting the store into a component tree");
    let mut root = StorePlugin::install(&store, ComponentOptions::new().named("app"));
    let counter = root.child(ComponentOptions::new().named("counter"));
    counter.expect_store()?.dispatch("incrementAsync", json!({ "value": 1 }))?;

    println!("\n4. Advancing the clock by 9 seconds");
    let fired = store.scheduler().advance(Duration::from_secs(9));
    println!("   {fired} deferred commits ran");
    println!("   State: {}", store.snapshot());

    println!("\n5. Typos are errors");
    if let Err(err) = store.commit("increament", Value::Null) {
        println!("   {err}");
    }

    Ok(())
}
