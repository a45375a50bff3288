#![cfg(feature = "memory-store")]

mod common;

use catalog_gate::{
    ActionKind, Bootstrap, Decision, GateBuilder, MembershipGraph, MemoryStore, ResourceType,
    RoleName, RoleRegistry,
};
use common::{register, register_with_roles, seeded_store};
use futures::executor::block_on;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

const REPEATS: usize = 5;

fn run_parallel<F>(threads: usize, op_factory: F)
where
    F: Fn(usize) -> Box<dyn FnOnce() + Send> + Send + Sync + 'static,
{
    let joins: Vec<_> = (0..threads)
        .map(|index| std::thread::spawn(op_factory(index)))
        .collect();
    for join in joins {
        join.join().expect("worker panicked");
    }
}

fn benchmark_parallel<F>(name: &str, threads: usize, iterations_per_thread: usize, op_factory: F)
where
    F: Fn() -> Box<dyn FnMut() + Send> + Send + Sync + 'static,
{
    let op_factory = Arc::new(op_factory);
    let mut samples = Vec::with_capacity(REPEATS);

    for _ in 0..REPEATS {
        let start = Instant::now();
        let mut joins = Vec::with_capacity(threads);
        for _ in 0..threads {
            let factory = Arc::clone(&op_factory);
            joins.push(std::thread::spawn(move || {
                let mut op = factory();
                for _ in 0..iterations_per_thread {
                    op();
                }
            }));
        }
        for join in joins {
            join.join().expect("benchmark worker panicked");
        }
        samples.push(start.elapsed());
    }

    samples.sort_unstable();
    let median = samples[REPEATS / 2];
    let total_ops = threads * iterations_per_thread;
    let total_ms = median.as_secs_f64() * 1_000.0;
    let ns_per_op = median.as_secs_f64() * 1_000_000_000.0 / total_ops as f64;
    let ops_per_sec = total_ops as f64 / median.as_secs_f64();

    println!(
        "{name}: median={total_ms:.3} ms, ns/op={ns_per_op:.1}, ops/s={ops_per_sec:.0} (threads={threads}, total_ops={total_ops}, repeats={REPEATS})"
    );
}

#[test]
fn concurrent_bootstrap_creates_each_role_once() {
    let store = MemoryStore::new();
    let shared = store.clone();
    run_parallel(8, move |_| {
        let store = shared.clone();
        Box::new(move || {
            block_on(Bootstrap::library().run(&store)).unwrap();
        })
    });

    let roles = block_on(RoleRegistry::new(store).roles()).unwrap();
    let names: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
    assert_eq!(names, vec!["Admins", "Editors", "Viewers"]);
    assert_eq!(roles[0].permissions.len(), 4);
}

#[test]
fn concurrent_assign_keeps_single_edge() {
    let store = seeded_store();
    let alice = register(&store, "alice");
    let shared = store.clone();
    let id = alice.id;
    run_parallel(8, move |_| {
        let graph = MembershipGraph::new(shared.clone());
        Box::new(move || {
            let viewers = RoleName::try_from("Viewers").unwrap();
            block_on(graph.assign(&id, &viewers)).unwrap();
        })
    });

    let graph = MembershipGraph::new(store);
    assert_eq!(block_on(graph.roles_of(&alice.id)).unwrap().len(), 1);
}

#[test]
fn concurrent_authorize_calls_agree() {
    let store = seeded_store();
    let bob = register_with_roles(&store, "bob", &["Editors"]);
    let gate = Arc::new(GateBuilder::new(store).build());
    let id = bob.id;

    run_parallel(8, move |index| {
        let gate = Arc::clone(&gate);
        Box::new(move || {
            let book = ResourceType::try_from("book").unwrap();
            for _ in 0..100 {
                let edit = block_on(gate.authorize(Some(&id), &book, ActionKind::Edit)).unwrap();
                let delete =
                    block_on(gate.authorize(Some(&id), &book, ActionKind::Delete)).unwrap();
                assert_eq!(edit, Decision::Allow, "worker {index}");
                assert!(!delete.is_allowed(), "worker {index}");
            }
        })
    });
}

#[test]
#[ignore = "manual performance test; run with --ignored --nocapture"]
fn perf_authorize_parallel() {
    let store = seeded_store();
    let bob = register_with_roles(&store, "bob", &["Viewers", "Editors"]);
    let gate = Arc::new(GateBuilder::new(store).build());
    let threads = std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4);
    let id = bob.id;

    benchmark_parallel("authorize_two_roles_parallel", threads, 50_000, move || {
        let gate = Arc::clone(&gate);
        let book = ResourceType::try_from("book").unwrap();
        Box::new(move || {
            let decision = block_on(gate.authorize(Some(&id), &book, ActionKind::Edit)).unwrap();
            black_box(decision);
        })
    });
}
