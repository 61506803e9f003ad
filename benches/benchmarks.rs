use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::hint::black_box;

use larder::{Module, ReactiveObject, Store};

fn add_to(key: &'static str) -> impl Fn(&ReactiveObject, &Value) + Send + Sync + 'static {
    move |state, payload| {
        let by = payload["value"].as_i64().unwrap_or(0);
        state.update(key, |n| *n = json!(n.as_i64().unwrap_or(0) + by));
    }
}

fn counter_store(modules: usize) -> Store {
    let mut root = Module::new()
        .state(json!({ "count": 0 }))
        .getter("doubleCount", |state, _, _| {
            json!(state.get_i64("count").unwrap_or(0) * 2)
        })
        .mutation("increment", add_to("count"));
    for i in 0..modules {
        root = root.module(
            format!("m{i}"),
            Module::new()
                .state(json!({ "count": 0 }))
                .mutation("increment", add_to("count")),
        );
    }
    Store::new(root).expect("benchmark store")
}

fn store_construction_benchmark(c: &mut Criterion) {
    c.bench_function("store_construction", |b| {
        b.iter(|| black_box(counter_store(black_box(10))));
    });
}

fn getter_read_benchmark(c: &mut Criterion) {
    let store = counter_store(0);

    c.bench_function("getter_read", |b| {
        b.iter(|| {
            black_box(store.getter("doubleCount").ok());
        });
    });
}

fn commit_fan_out_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_fan_out");

    for modules in [0, 10, 100].iter() {
        let store = counter_store(*modules);
        let payload = json!({ "value": 1 });

        group.bench_with_input(BenchmarkId::from_parameter(modules), modules, |b, _| {
            b.iter(|| {
                store
                    .commit("increment", black_box(payload.clone()))
                    .ok();
            });
        });
    }
    group.finish();
}

fn subscriber_notify_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_subscribers");

    for subscriber_count in [1, 10, 100].iter() {
        let store = counter_store(0);
        let _subscriptions: Vec<_> = (0..*subscriber_count)
            .map(|_| store.subscribe(|_, _| {}))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                b.iter(|| {
                    store.commit("increment", json!({ "value": 1 })).ok();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_construction_benchmark,
    getter_read_benchmark,
    commit_fan_out_benchmark,
    subscriber_notify_benchmark,
);
criterion_main!(benches);
