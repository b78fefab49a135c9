//! Property tests for ECS operations.
//!
//! These tests use `proptest` to generate random sequences of ECS operations
//! and verify that world invariants hold after each sequence.

use chronicle_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Pos {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Vel {
    dx: f32,
    dy: f32,
}

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum EcsOp {
    SpawnPos(f32, f32),
    SpawnPosVel(f32, f32, f32, f32),
    Destroy(usize),
    InsertVel(usize, f32, f32),
    RemoveVel(usize),
    QueryPos,
    QueryPosVel,
}

/// Strategy that generates finite (non-NaN, non-Inf) f32 values.
fn finite_f32() -> impl Strategy<Value = f32> {
    // Use i32 range mapped to f32 to avoid NaN/Inf issues in comparisons
    (-1_000_000i32..1_000_000i32).prop_map(|v| v as f32 * 0.01)
}

fn ecs_op_strategy() -> impl Strategy<Value = EcsOp> {
    prop_oneof![
        (finite_f32(), finite_f32()).prop_map(|(x, y)| EcsOp::SpawnPos(x, y)),
        (finite_f32(), finite_f32(), finite_f32(), finite_f32())
            .prop_map(|(x, y, dx, dy)| EcsOp::SpawnPosVel(x, y, dx, dy)),
        (0..100usize).prop_map(EcsOp::Destroy),
        (0..100usize, finite_f32(), finite_f32())
            .prop_map(|(i, dx, dy)| EcsOp::InsertVel(i, dx, dy)),
        (0..100usize).prop_map(EcsOp::RemoveVel),
        Just(EcsOp::QueryPos),
        Just(EcsOp::QueryPosVel),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(10_000))]

    #[test]
    fn ecs_random_ops_preserve_invariants(ops in prop::collection::vec(ecs_op_strategy(), 1..50)) {
        let mut world = World::new();
        world.register_component::<Pos>("pos");
        world.register_component::<Vel>("vel");

        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                EcsOp::SpawnPos(x, y) => {
                    let e = world.create_entity();
                    world.add_component(e, Pos { x, y }).unwrap();
                    alive.push(e);
                }
                EcsOp::SpawnPosVel(x, y, dx, dy) => {
                    let e = world.create_entity();
                    world.add_component(e, Pos { x, y }).unwrap();
                    world.add_component(e, Vel { dx, dy }).unwrap();
                    alive.push(e);
                }
                EcsOp::Destroy(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let e = alive.remove(idx);
                        let _ = world.destroy_entity(e);
                    }
                }
                EcsOp::InsertVel(idx, dx, dy) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let _ = world.add_component(alive[idx], Vel { dx, dy });
                    }
                }
                EcsOp::RemoveVel(idx) => {
                    if !alive.is_empty() {
                        let idx = idx % alive.len();
                        let _ = world.remove_component::<Vel>(alive[idx]);
                    }
                }
                EcsOp::QueryPos => {
                    let count = world.query::<Pos>().count();
                    prop_assert!(count <= alive.len());
                }
                EcsOp::QueryPosVel => {
                    let count = world.query::<Vel>().count();
                    prop_assert!(count <= alive.len());
                }
            }

            // Invariant: entity_count matches our tracking.
            prop_assert_eq!(world.entity_count(), alive.len());

            // Invariant: all alive entities are really alive.
            for &e in &alive {
                prop_assert!(world.is_alive(e));
            }
        }
    }

    /// Verify that ids are never reused and a destroyed id is never
    /// reported alive again, even after further spawns.
    #[test]
    fn destroyed_ids_stay_dead_after_further_spawns(
        spawn_count in 1..20usize,
        destroy_indices in prop::collection::vec(0..20usize, 1..10),
    ) {
        let mut world = World::new();
        world.register_component::<Pos>("pos");

        let mut entities: Vec<EntityId> = Vec::new();
        for i in 0..spawn_count {
            let e = world.create_entity();
            world.add_component(e, Pos { x: i as f32, y: 0.0 }).unwrap();
            entities.push(e);
        }

        let mut dead_ids: Vec<EntityId> = Vec::new();

        for &idx in &destroy_indices {
            if !entities.is_empty() {
                let idx = idx % entities.len();
                let e = entities.remove(idx);
                let _ = world.destroy_entity(e);
                dead_ids.push(e);
            }
        }

        // Spawn fresh entities; ids are monotonic so none can collide with a
        // dead one even though the dead id's slot is gone from `alive`.
        for _ in 0..dead_ids.len() {
            let new_e = world.create_entity();
            world.add_component(new_e, Pos { x: 999.0, y: 999.0 }).unwrap();
            entities.push(new_e);
        }

        for &dead in &dead_ids {
            prop_assert!(!world.is_alive(dead));
            prop_assert_eq!(world.get_component::<Pos>(dead), None);
            prop_assert!(!entities.contains(&dead));
        }

        for &e in &entities {
            prop_assert!(world.is_alive(e));
            prop_assert!(world.get_component::<Pos>(e).is_some());
        }
    }

    /// Verify that inserting or removing one component type never disturbs
    /// another component type already attached to the same entity -- each
    /// type lives in its own store, so there is no shared table to corrupt.
    #[test]
    fn unrelated_component_insert_and_remove_preserves_other_components(
        initial_x in finite_f32(),
        initial_y in finite_f32(),
        vel_dx in finite_f32(),
        vel_dy in finite_f32(),
        do_remove in proptest::bool::ANY,
    ) {
        let mut world = World::new();
        world.register_component::<Pos>("pos");
        world.register_component::<Vel>("vel");

        let e = world.create_entity();
        world.add_component(e, Pos { x: initial_x, y: initial_y }).unwrap();

        world.add_component(e, Vel { dx: vel_dx, dy: vel_dy }).unwrap();

        let pos = world.get_component::<Pos>(e).unwrap();
        prop_assert_eq!(pos.x, initial_x);
        prop_assert_eq!(pos.y, initial_y);

        let vel = world.get_component::<Vel>(e).unwrap();
        prop_assert_eq!(vel.dx, vel_dx);
        prop_assert_eq!(vel.dy, vel_dy);

        if do_remove {
            world.remove_component::<Vel>(e).unwrap();

            let pos = world.get_component::<Pos>(e).unwrap();
            prop_assert_eq!(pos.x, initial_x);
            prop_assert_eq!(pos.y, initial_y);

            prop_assert!(!world.has_component::<Vel>(e));
        }
    }

    /// Verify that multiple entities of the same component type maintain
    /// independent data and that destroying one leaves the rest untouched.
    #[test]
    fn multiple_entities_independent_data(
        count in 2..50usize,
    ) {
        let mut world = World::new();
        world.register_component::<Pos>("pos");

        let mut entities = Vec::new();
        for i in 0..count {
            let e = world.create_entity();
            world.add_component(e, Pos { x: i as f32, y: (i * 2) as f32 }).unwrap();
            entities.push(e);
        }

        for (i, &e) in entities.iter().enumerate() {
            let pos = world.get_component::<Pos>(e).unwrap();
            prop_assert_eq!(pos.x, i as f32);
            prop_assert_eq!(pos.y, (i * 2) as f32);
        }

        if count > 2 {
            let mid = count / 2;
            let mid_e = entities.remove(mid);
            world.destroy_entity(mid_e);

            prop_assert_eq!(world.entity_count(), entities.len());

            for &e in &entities {
                prop_assert!(world.is_alive(e));
                prop_assert!(world.get_component::<Pos>(e).is_some());
            }
        }
    }
}
