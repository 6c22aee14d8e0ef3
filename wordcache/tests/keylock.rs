use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wordcache::keylock::*;
use wordcache::LockError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_exclusion_same_key() {
    let table = KeyLockTable::new();
    let occupied = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let table = table.clone();
        let occupied = Arc::clone(&occupied);
        let entered = Arc::clone(&entered);
        tasks.push(tokio::spawn(async move {
            for _ in 0..50 {
                let guard = table.lock("shared").await;
                assert!(
                    !occupied.swap(true, Ordering::SeqCst),
                    "two holders of the same key"
                );
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                occupied.store(false, Ordering::SeqCst);
                guard.unlock().unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(entered.load(Ordering::SeqCst), 16 * 50);
    assert!(table.is_empty(), "entries must be removed once unlocked");
}

#[tokio::test]
async fn test_second_locker_waits_for_unlock() {
    let table = KeyLockTable::new();
    let first = table.lock("x").await;

    let (acquired_tx, mut acquired_rx) = tokio::sync::oneshot::channel();
    let table_clone = table.clone();
    let second = tokio::spawn(async move {
        let guard = table_clone.lock("x").await;
        acquired_tx.send(()).unwrap();
        guard
    });

    // Second task is queued, not running
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut acquired_rx)
            .await
            .is_err()
    );
    assert_eq!(table.waiters("x"), 2);

    // Unrelated keys are not delayed while "x" is contended
    let other = tokio::time::timeout(Duration::from_millis(50), table.lock("y"))
        .await
        .expect("lock on an unrelated key must not wait");
    other.unlock().unwrap();

    first.unlock().unwrap();
    acquired_rx.await.unwrap();
    let guard = second.await.unwrap();
    assert!(table.is_locked("x"));
    assert_eq!(table.waiters("x"), 1);

    guard.unlock().unwrap();
    assert!(table.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_distinct_keys_do_not_block() {
    let table = KeyLockTable::new();
    let _held = table.lock("k1").await;

    let table_clone = table.clone();
    let task = tokio::spawn(async move {
        let guard = table_clone.lock("k2").await;
        guard.unlock()
    });

    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("k2 must not wait for k1")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(table.len(), 1);
}

#[tokio::test]
async fn test_unlock_not_held_leaves_state_unchanged() {
    let table = KeyLockTable::new();
    let guard = table.lock("a").await;

    // A guard from another table does not hold anything here
    let other = KeyLockTable::new();
    match table.unlock(other.lock("b").await) {
        Err(LockError::NotHeld(key)) => assert_eq!(key, "b"),
        Ok(()) => panic!("Expected NotHeld error"),
    }
    assert_eq!(table.len(), 1);
    assert_eq!(table.waiters("a"), 1);
    assert!(table.is_locked("a"));

    guard.unlock().unwrap();
    assert!(table.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_non_holder_cannot_release_key() {
    let table = KeyLockTable::new();
    let holder = table.lock("x").await;

    // A task that never locked "x" on this table
    let table_clone = table.clone();
    let intruder = tokio::spawn(async move {
        let elsewhere = KeyLockTable::new();
        let foreign = elsewhere.lock("x").await;
        table_clone.unlock(foreign)
    });
    assert!(matches!(
        intruder.await.unwrap(),
        Err(LockError::NotHeld(_))
    ));

    // The holder still excludes everyone else
    assert!(table.is_locked("x"));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), table.lock("x"))
            .await
            .is_err(),
        "key acquired while its holder is still inside"
    );
    assert_eq!(table.waiters("x"), 1);

    holder.unlock().unwrap();
    assert!(table.is_empty());
}

#[tokio::test]
async fn test_cancelled_waiter_is_withdrawn() {
    let table = KeyLockTable::new();
    let holder = table.lock("x").await;

    let timed_out = tokio::time::timeout(Duration::from_millis(20), table.lock("x")).await;
    assert!(timed_out.is_err());
    assert_eq!(table.waiters("x"), 1, "abandoned waiter must not be counted");

    holder.unlock().unwrap();
    assert!(table.is_empty());

    // The key is usable again
    let again = table.lock("x").await;
    again.unlock().unwrap();
}

#[tokio::test]
async fn test_waiters_served_one_at_a_time() {
    let table = KeyLockTable::new();
    let holder = table.lock("x").await;
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for i in 0..3 {
        let table_clone = table.clone();
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            let guard = table_clone.lock("x").await;
            order.lock().push(i);
            guard.unlock().unwrap();
        }));
        // Let the task queue up before spawning the next one
        while table.waiters("x") < i + 2 {
            tokio::task::yield_now().await;
        }
    }

    assert!(order.lock().is_empty());
    holder.unlock().unwrap();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert!(table.is_empty());
}

#[tokio::test]
async fn test_close_waits_for_shared_holders() {
    let barrier = Arc::new(DrainBarrier::new());
    let passage = barrier.enter().await.unwrap();

    let barrier_clone = Arc::clone(&barrier);
    let sealer = tokio::spawn(async move { barrier_clone.seal().await.is_some() });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!sealer.is_finished(), "seal must wait for the shared holder");

    drop(passage);
    assert!(sealer.await.unwrap());
    assert!(barrier.enter().await.is_none());
}
