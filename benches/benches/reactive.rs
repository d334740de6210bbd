// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_reactive`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Once;

use understory_reactive::{
    BindTarget, Class, ClassBuilder, Object, Property, PropertyMetadata, PropertyPath,
    PropertyRegistry, Slot,
};

struct Fixture {
    class: Class,
    value: Property<f64>,
    linked: Property<f64>,
    doubled: Property<f64>,
}

fn fixture() -> Fixture {
    let mut props = PropertyRegistry::new();
    let value = props.reactive("value", PropertyMetadata::new(1.0_f64));
    let linked = props.bindable("linked", PropertyMetadata::new(0.0_f64));
    let doubled = props.cached("doubled", [PropertyPath::from(value)], move |object| {
        Ok(object.get(value)? * 2.0)
    });
    let class = ClassBuilder::new("Bench").registry(props).build().unwrap();
    Fixture {
        class,
        value,
        linked,
        doubled,
    }
}

/// A class nesting `depth` members, each with a reactive `leaf`.
fn nested(depth: usize) -> Class {
    let mut class: Option<Class> = None;
    for _ in 0..depth {
        let mut props = PropertyRegistry::new();
        props.reactive("leaf", PropertyMetadata::new(0_u32));
        let mut builder = ClassBuilder::new("Level")
            .registry(props)
            .parent_reference("parent");
        if let Some(child) = &class {
            builder = builder.compose("child", child);
        }
        class = Some(builder.build().unwrap());
    }
    class.unwrap()
}

fn bench_reactive(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: Object={} Slot={} ErasedValue={}",
            core::mem::size_of::<Object>(),
            core::mem::size_of::<Slot>(),
            core::mem::size_of::<understory_reactive::ErasedValue>(),
        );
    });

    let Fixture {
        class,
        value,
        linked,
        doubled,
    } = fixture();

    let mut group = c.benchmark_group("reactive/read");

    group.bench_function("reactive", |b| {
        let object = Object::new(&class).unwrap();
        b.iter(|| black_box(object.get(value).unwrap()))
    });

    group.bench_function("cached/valid", |b| {
        let object = Object::new(&class).unwrap();
        object.get(doubled).unwrap();
        b.iter(|| black_box(object.get(doubled).unwrap()))
    });

    group.bench_function("cached/invalidated", |b| {
        let object = Object::new(&class).unwrap();
        let mut next = 0.0;
        b.iter(|| {
            next += 1.0;
            object.set(value, next).unwrap();
            black_box(object.get(doubled).unwrap())
        })
    });

    group.bench_function("bindable/bound", |b| {
        let object = Object::new(&class).unwrap();
        let target = object.slot("value").unwrap();
        object.bind(linked, &target).unwrap();
        b.iter(|| black_box(object.get(linked).unwrap()))
    });

    group.finish();

    let mut group = c.benchmark_group("reactive/write");

    for observers in [0_usize, 1, 8] {
        group.bench_function(BenchmarkId::new("set", observers), |b| {
            let object = Object::new(&class).unwrap();
            for _ in 0..observers {
                object.add_callback(value, |_| Ok(()), None).unwrap();
            }
            let mut next = 0.0;
            b.iter(|| {
                next += 1.0;
                object.set(value, black_box(next)).unwrap();
            })
        });
    }

    group.bench_function("bind/literal", |b| {
        let object = Object::new(&class).unwrap();
        b.iter(|| {
            object.bind(linked, BindTarget::value(2.0_f64)).unwrap();
            object.bind(linked, BindTarget::Default).unwrap();
        })
    });

    group.finish();

    let mut group = c.benchmark_group("reactive/compose");

    for depth in [1_usize, 4, 16] {
        let class = nested(depth);
        let path: Vec<&'static str> = core::iter::repeat_n("child", depth - 1).collect();
        group.bench_function(BenchmarkId::new("materialize", depth), |b| {
            b.iter_batched(
                || Object::new(&class).unwrap(),
                |object| {
                    let leaf = path
                        .iter()
                        .try_fold(object.clone(), |object, &member| object.member(member))
                        .unwrap();
                    black_box(leaf.slot("leaf").unwrap())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reactive);
criterion_main!(benches);
