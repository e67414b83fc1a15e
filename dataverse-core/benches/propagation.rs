//! Benchmarks for change propagation and pointer resolution.
//!
//! Run with: cargo bench -p dataverse-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dataverse_core::{pointer, Derivation, DictAtom, Value, ValueBox};
use serde_json::json;
use std::hint::black_box;

/// A chain of `depth` derivations, each adding one to the previous.
fn make_chain(source: &ValueBox<i64>, depth: usize) -> Derivation<i64> {
    (0..depth).fold(source.derivation(), |previous, _| previous.map(|n| n + 1))
}

fn bench_chain_pull(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/chain_pull");

    for depth in [1, 10, 100] {
        let source = ValueBox::new(0);
        let tail = make_chain(&source, depth);
        tail.get_value();

        let mut next = 0;
        group.bench_with_input(BenchmarkId::new("set_then_read", depth), &depth, |b, _| {
            b.iter(|| {
                next += 1;
                source.set(next);
                black_box(tail.get_value())
            })
        });
    }

    group.finish();
}

fn bench_fan_out_listeners(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/fan_out");

    for width in [10i64, 100, 1000] {
        let source = ValueBox::new(0i64);
        let derived: Vec<Derivation<i64>> = (0..width)
            .map(|i| source.derivation().map(move |n| n * i))
            .collect();
        let _subs: Vec<_> = derived
            .iter()
            .map(|d| d.on_change(|value| {
                black_box(value);
            }))
            .collect();

        let mut next = 0;
        group.bench_with_input(BenchmarkId::new("listened", width), &width, |b, _| {
            b.iter(|| {
                next += 1;
                source.set(next);
            })
        });
    }

    group.finish();
}

fn bench_pointer_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation/pointer");

    let Value::Dict(root) = Value::atomify(json!({"a": {"b": {"c": {"d": 1}}}})) else {
        unreachable!()
    };
    let leaf = pointer(root.clone()).prop("a").prop("b").prop("c").prop("d");
    leaf.get_value();

    group.bench_function("cached_read", |b| b.iter(|| black_box(leaf.get_value())));

    group.bench_function("replace_subtree_then_read", |b| {
        let mut next = 0;
        b.iter(|| {
            next += 1;
            root.set_prop("a", Value::atomify(json!({"b": {"c": {"d": next}}})));
            black_box(leaf.get_value())
        })
    });

    group.bench_function("unrelated_write_then_read", |b| {
        let mut next = 0;
        b.iter(|| {
            next += 1;
            root.set_prop("other", next);
            black_box(leaf.get_value())
        })
    });

    group.finish();
}

fn bench_dict_prop_fan_out(c: &mut Criterion) {
    let atom = DictAtom::from_entries((0..256).map(|i| (format!("k{i}"), i)));
    let props: Vec<Derivation<Value>> = (0..256).map(|i| atom.prop(&format!("k{i}"))).collect();
    let _subs: Vec<_> = props.iter().map(|d| d.on_change(|_| {})).collect();

    let mut next = 0;
    c.bench_function("propagation/dict_single_key_write", |b| {
        b.iter(|| {
            next += 1;
            atom.set_prop("k0", next);
        })
    });
}

criterion_group!(
    benches,
    bench_chain_pull,
    bench_fan_out_listeners,
    bench_pointer_resolution,
    bench_dict_prop_fan_out
);
criterion_main!(benches);
