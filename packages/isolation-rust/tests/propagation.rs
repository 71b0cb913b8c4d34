//! End-to-end propagation through a reused single-thread pool.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{fresh_store, SingleThreadExecutor};
use proptest::prelude::*;
use scopehop_core::{ScopeAttribute, ScopeStore};
use scopehop_isolation::{executor, ConcurrencyStrategy, ScopePropagatingStrategy};

fn gtid_in_pool(pool: &SingleThreadExecutor) -> Option<String> {
    pool.probe().map(|a| a.gtid.clone())
}

#[test]
fn user_and_gtid_reach_the_pool_thread() {
    let store = fresh_store();
    store.set(ScopeAttribute::new("testGTID-1234").with_user_id("testUser"));
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();

    let wrapped = strategy.wrap_callable(move || store.get());
    let seen = pool.call(wrapped).unwrap().expect("attribute installed");

    assert_eq!(seen.user_id.as_deref(), Some("testUser"));
    assert_eq!(seen.gtid, "testGTID-1234");
    assert_eq!(gtid_in_pool(&pool), None);
}

#[test]
fn pool_thread_is_distinct_from_submitter() {
    let pool = SingleThreadExecutor::new();
    assert_ne!(pool.thread_id(), std::thread::current().id());
}

#[test]
fn sequential_units_do_not_see_each_other() {
    let store = fresh_store();
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();

    store.set(ScopeAttribute::new("A"));
    let first = strategy.wrap_callable(move || store.get().map(|a| a.gtid.clone()));
    store.set(ScopeAttribute::new("B"));
    let second = strategy.wrap_callable(move || store.get().map(|a| a.gtid.clone()));
    store.clear();

    assert_eq!(pool.call(first).unwrap().as_deref(), Some("A"));
    assert_eq!(gtid_in_pool(&pool), None);
    assert_eq!(pool.call(second).unwrap().as_deref(), Some("B"));
    assert_eq!(gtid_in_pool(&pool), None);
}

#[test]
fn leftover_pool_state_survives_a_wrapped_unit() {
    let store = fresh_store();
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();
    pool.plant(Some(Arc::new(ScopeAttribute::new("leftover"))));

    store.set(ScopeAttribute::new("request"));
    let wrapped = strategy.wrap_callable(move || store.get().map(|a| a.gtid.clone()));
    store.clear();

    assert_eq!(pool.call(wrapped).unwrap().as_deref(), Some("request"));
    assert_eq!(gtid_in_pool(&pool).as_deref(), Some("leftover"));
}

#[test]
fn absent_capture_runs_with_empty_slot() {
    let store = fresh_store();
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();

    let wrapped = strategy.wrap_callable(move || store.get());
    assert!(pool.call(wrapped).unwrap().is_none());
    assert_eq!(gtid_in_pool(&pool), None);
}

#[test]
fn error_result_reaches_caller_and_slot_is_restored() {
    let store = fresh_store();
    store.set(ScopeAttribute::new("failing"));
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();

    let wrapped = strategy.wrap_callable(|| "not-a-number".parse::<i64>());
    let result = pool.call(wrapped).unwrap();

    assert!(result.is_err());
    assert_eq!(gtid_in_pool(&pool), None);
}

#[test]
fn panic_reaches_caller_and_slot_is_restored() {
    let store = fresh_store();
    store.set(ScopeAttribute::new("panicking"));
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();

    let wrapped = strategy.wrap_runnable(|| panic!("unit of work failed"));
    let payload = pool.call(wrapped).unwrap_err();

    assert_eq!(payload.downcast_ref::<&str>(), Some(&"unit of work failed"));
    assert_eq!(gtid_in_pool(&pool), None);
}

#[test]
fn cancelled_unit_leaves_pool_leftover_untouched() {
    let store = fresh_store();
    let strategy = ScopePropagatingStrategy::new();
    let pool = SingleThreadExecutor::new();
    pool.plant(Some(Arc::new(ScopeAttribute::new("leftover"))));

    // Hold the pool thread so the wrapped unit is still queued when cancelled.
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let blocker = pool.submit(move || {
        let _ = release_rx.recv();
    });

    store.set(ScopeAttribute::new("never-ran"));
    let wrapped = strategy.wrap_callable(move || store.get());
    store.clear();
    let (cancelled, outcome) = pool.submit_cancellable(wrapped);
    cancelled.store(true, Ordering::SeqCst);
    release_tx.send(()).unwrap();

    blocker.blocking_recv().unwrap().unwrap();
    assert!(outcome.blocking_recv().is_err());
    assert_eq!(gtid_in_pool(&pool).as_deref(), Some("leftover"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_keep_their_own_scope() {
    let store = fresh_store();
    let strategy = ScopePropagatingStrategy::new();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            store.set(ScopeAttribute::new(format!("gtid-{i}")));
            executor::spawn_blocking(&strategy, move || {
                std::thread::yield_now();
                store.get().map(|a| a.gtid.clone())
            })
        })
        .collect();
    store.clear();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(format!("gtid-{i}")));
    }
}

fn arb_attribute() -> impl Strategy<Value = ScopeAttribute> {
    ("[a-zA-Z0-9-]{1,16}", proptest::option::of("[a-z]{1,8}")).prop_map(|(gtid, user)| {
        let attr = ScopeAttribute::new(gtid);
        match user {
            Some(user) => attr.with_user_id(user),
            None => attr,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn captured_attribute_is_observed_inside(attr in arb_attribute()) {
        let store = fresh_store();
        store.set(attr.clone());
        let strategy = ScopePropagatingStrategy::new();
        let pool = SingleThreadExecutor::new();

        let wrapped = strategy.wrap_callable(move || store.get());
        let seen = pool.call(wrapped).unwrap();

        prop_assert_eq!(seen.as_deref(), Some(&attr));
    }

    #[test]
    fn reused_thread_never_leaks(
        leftover in proptest::option::of(arb_attribute()),
        submitted in proptest::collection::vec(proptest::option::of(arb_attribute()), 1..8),
    ) {
        let store = fresh_store();
        let strategy = ScopePropagatingStrategy::new();
        let pool = SingleThreadExecutor::new();
        let leftover = leftover.map(Arc::new);
        pool.plant(leftover.clone());

        for attr in submitted {
            match &attr {
                Some(attr) => store.set(attr.clone()),
                None => store.clear(),
            }
            let wrapped = strategy.wrap_callable(move || store.get());
            let seen = pool.call(wrapped).unwrap();

            match &attr {
                Some(attr) => prop_assert_eq!(seen.as_deref(), Some(attr)),
                None => prop_assert_eq!(seen, leftover.clone()),
            }
            prop_assert_eq!(pool.probe(), leftover.clone());
        }
    }
}
