//! Benchmarks for the hot paths a long-running simulation leans on: entity
//! creation, component attach/overwrite, and single-type queries at scale.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chronicle_ecs::prelude::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

fn populated_world(n: usize) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    world.register_component::<Position>("Position");
    let mut entities = Vec::with_capacity(n);
    for i in 0..n {
        let e = world.create_entity();
        world.add_component(e, Position { x: i as f32, y: i as f32 }).unwrap();
        entities.push(e);
    }
    (world, entities)
}

fn bench_create_entity(c: &mut Criterion) {
    c.bench_function("create_entity", |b| {
        let mut world = World::new();
        b.iter(|| black_box(world.create_entity()));
    });
}

fn bench_add_component(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_component");
    for n in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                world.register_component::<Position>("Position");
                for i in 0..n {
                    let e = world.create_entity();
                    world.add_component(e, Position { x: i as f32, y: i as f32 }).unwrap();
                }
                black_box(world.entity_count())
            });
        });
    }
    group.finish();
}

fn bench_component_overwrite(c: &mut Criterion) {
    let (mut world, entities) = populated_world(10_000);
    c.bench_function("component_overwrite_in_place", |b| {
        b.iter(|| {
            for &e in &entities {
                world.add_component(e, Position { x: 1.0, y: 1.0 }).unwrap();
            }
        });
    });
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_single_type");
    for n in [100usize, 1_000, 10_000] {
        let (world, _entities) = populated_world(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let sum: f32 = world.query::<Position>().map(|(_, p)| p.x).sum();
                black_box(sum)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_create_entity, bench_add_component, bench_component_overwrite, bench_query);
criterion_main!(benches);
