//! Integration tests for Larder

mod common;

use common::{counter_app, module_a, module_b, root_only, TICK};
use larder::config::DispatchMode;
use larder::runtime::ReactiveRuntime;
use larder::{
    create_effect, Component, ComponentOptions, HandlerKind, Module, ModulePath, Store,
    StoreConfig, StoreError, StorePlugin,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicI64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

#[test]
fn nested_module_state_is_reachable_at_its_path() {
    let store = Store::new(counter_app()).unwrap();

    let c = store.state().resolve(&["a", "c"]).unwrap();
    assert_eq!(c.get_i64("cCount"), Some(300));
    assert_eq!(
        store.snapshot(),
        json!({
            "count": 0,
            "a": { "aCount": 100, "c": { "cCount": 300 } },
            "b": { "bCount": 200 }
        })
    );
}

#[test]
fn increment_fans_out_to_root_and_module() {
    let store = Store::new(counter_app()).unwrap();

    store.commit("increment", json!({ "value": 5 })).unwrap();

    assert_eq!(store.state().get_i64("count"), Some(5));
    assert_eq!(
        store.module_state(vec!["a"]).unwrap().get_i64("aCount"),
        Some(105)
    );
    assert_eq!(
        store.module_state(vec!["b"]).unwrap().get_i64("bCount"),
        Some(200)
    );
}

#[test]
fn getters_reflect_the_latest_commit() {
    let store = Store::new(counter_app()).unwrap();

    assert_eq!(store.getter("doubleCount").unwrap(), json!(0));
    store.commit("increment", json!({ "value": 5 })).unwrap();
    assert_eq!(store.getter("doubleCount").unwrap(), json!(10));
    assert_eq!(store.getter("aCountPlusCount").unwrap(), json!(110));
}

#[test]
fn typos_are_lookup_errors() {
    let store = Store::new(counter_app()).unwrap();

    let err = store.commit("increament", Value::Null).unwrap_err();
    assert_eq!(err.to_string(), "unknown mutation: increament");
    assert!(matches!(
        store.dispatch("increamentAsync", Value::Null),
        Err(StoreError::Lookup {
            kind: HandlerKind::Action,
            ..
        })
    ));
}

#[test]
fn register_module_later_matches_construction() {
    let eager = Store::new(counter_app()).unwrap();

    let lazy = Store::new(root_only()).unwrap();
    lazy.register_module(ModulePath::root(), [("a", module_a()), ("b", module_b())])
        .unwrap();

    assert_eq!(lazy.snapshot(), eager.snapshot());
    assert_eq!(lazy.getters().names(), eager.getters().names());
    assert_eq!(lazy.mutation_names(), eager.mutation_names());
    assert_eq!(
        lazy.mutation_owners("increment"),
        eager.mutation_owners("increment")
    );

    lazy.commit("increment", json!({ "value": 1 })).unwrap();
    eager.commit("increment", json!({ "value": 1 })).unwrap();
    assert_eq!(lazy.snapshot(), eager.snapshot());
}

#[test]
fn register_module_nests_below_an_existing_module() {
    let store = Store::new(counter_app()).unwrap();
    store
        .register_module(
            vec!["a", "c"],
            [(
                "d",
                Module::new()
                    .state(json!({ "dCount": 1 }))
                    .mutation("increment", common::add_to("dCount")),
            )],
        )
        .unwrap();

    store.commit("increment", json!({ "value": 2 })).unwrap();
    assert_eq!(
        store.state().resolve(&["a", "c", "d"]).unwrap().get_i64("dCount"),
        Some(3)
    );
    assert_eq!(
        store.mutation_owners("increment"),
        vec![
            ModulePath::root(),
            ModulePath::from(vec!["a"]),
            ModulePath::from(vec!["a", "c", "d"]),
        ]
    );
}

#[test]
fn root_dispatch_schedules_repeating_commits() {
    let store = Store::new(counter_app()).unwrap();

    store
        .dispatch("incrementAsync", json!({ "value": 1 }))
        .unwrap();
    assert_eq!(store.state().get_i64("count"), Some(0));

    store.scheduler().advance(TICK * 2);
    assert_eq!(store.state().get_i64("count"), Some(2));
    // Module `a` shares the `increment` name, so its state follows along.
    assert_eq!(
        store.module_state(vec!["a"]).unwrap().get_i64("aCount"),
        Some(102)
    );
}

#[test]
fn fan_out_dispatch_runs_module_actions_too() {
    let config = StoreConfig::default().with_dispatch(DispatchMode::FanOut);
    let store = Store::with_config(counter_app(), config).unwrap();

    store
        .dispatch("incrementAsync", json!({ "value": 1 }))
        .unwrap();
    store.scheduler().advance(TICK);

    // Two tasks each commit once; every commit reaches root and `a`.
    assert_eq!(store.state().get_i64("count"), Some(2));
    assert_eq!(
        store.module_state(vec!["a"]).unwrap().get_i64("aCount"),
        Some(102)
    );
}

#[test]
fn cancelled_tasks_stop_writing() {
    let store = Store::new(
        root_only().action("tickOnce", |ctx, payload| {
            let payload = payload.clone();
            let handle = ctx.schedule_every(TICK, move |store| {
                store.commit("increment", payload.clone())
            });
            ctx.state().set("lastTask", handle.id());
            Ok(())
        }),
    )
    .unwrap();

    store.dispatch("tickOnce", json!({ "value": 1 })).unwrap();
    store.scheduler().advance(TICK);
    store.scheduler().cancel_all();
    store.scheduler().advance(TICK * 10);

    assert_eq!(store.state().get_i64("count"), Some(1));
    assert_eq!(store.scheduler().pending(), 0);
}

#[test]
fn views_rerender_when_committed_state_changes() {
    ReactiveRuntime::scope(|| {
        let store = Store::new(counter_app()).unwrap();
        let rendered = Arc::new(AtomicI64::new(-1));
        let renders = Arc::new(AtomicUsize::new(0));

        let _view = create_effect({
            let store = store.clone();
            let rendered = rendered.clone();
            let renders = renders.clone();
            move || {
                if let Ok(value) = store.getter("doubleCount") {
                    rendered.store(value.as_i64().unwrap_or(-1), Ordering::SeqCst);
                }
                renders.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(rendered.load(Ordering::SeqCst), 0);

        store.commit("increment", json!({ "value": 5 })).unwrap();
        assert_eq!(rendered.load(Ordering::SeqCst), 10);
        assert!(renders.load(Ordering::SeqCst) >= 2);
    });
}

#[test]
fn components_share_the_installed_store() {
    let store = Store::new(counter_app()).unwrap();
    let mut app = StorePlugin::install(&store, ComponentOptions::new().named("app"));

    let counter = app.child(ComponentOptions::new().named("counter"));
    let counter_store = counter.expect_store().unwrap();
    counter_store
        .commit("increment", json!({ "value": 1 }))
        .unwrap();

    assert_eq!(store.state().get_i64("count"), Some(1));
    assert!(app.store().unwrap().ptr_eq(&store));

    let orphan = Component::root(ComponentOptions::new());
    assert!(matches!(orphan.expect_store(), Err(StoreError::MissingStore)));
}

#[test]
fn commits_from_deferred_callbacks_can_nest() {
    let store = Store::new(root_only().action("chain", |ctx, _| {
        ctx.schedule(Duration::from_millis(10), |store| {
            store.commit("increment", json!({ "value": 1 }))?;
            store.dispatch("incrementAsync", json!({ "value": 10 }))
        });
        Ok(())
    }))
    .unwrap();

    store.dispatch("chain", Value::Null).unwrap();
    store.scheduler().advance(Duration::from_millis(10));
    assert_eq!(store.state().get_i64("count"), Some(1));

    store.scheduler().advance(TICK);
    assert_eq!(store.state().get_i64("count"), Some(11));
}
