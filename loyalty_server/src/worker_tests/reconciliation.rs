use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use loyalty_engine::{
    db_types::{OrderStatusType, Points, Verdict, VerdictStatus},
    ApplyOutcome,
    LedgerError,
    OracleError,
};
use tokio::sync::watch;

use super::mocks::{pending_orders, MockLedger, MockOracle, StalledOracle};
use crate::{
    accrual_worker::{AccrualWorker, CycleReport, MIN_OVERLOAD_COOLDOWN},
    config::WorkerConfig,
};

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(10),
        batch_size: 10,
        rate_limit: 100,
        overload_cooldown: Duration::from_millis(200),
    }
}

fn processed(number: &loyalty_engine::db_types::OrderNumber) -> Result<Verdict, OracleError> {
    Ok(Verdict::new(number.clone(), VerdictStatus::Processed, Points::from_whole(1)))
}

#[tokio::test]
async fn empty_ledger_is_quiet() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().times(1).returning(|_| Err(LedgerError::NoPendingOrders));
    store.expect_apply_verdict().never();
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().never();
    let worker = AccrualWorker::new(store, oracle, fast_config());
    assert_eq!(worker.run_cycle().await, CycleReport::default());
}

#[tokio::test]
async fn fetch_failures_skip_the_cycle() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store
        .expect_fetch_pending_batch()
        .times(1)
        .returning(|_| Err(LedgerError::DatabaseError("disk I/O error".into())));
    store.expect_apply_verdict().never();
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().never();
    let worker = AccrualWorker::new(store, oracle, fast_config());
    assert_eq!(worker.run_cycle().await, CycleReport::default());
}

#[tokio::test]
async fn batch_size_is_passed_to_the_store() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store
        .expect_fetch_pending_batch()
        .withf(|limit| *limit == 3)
        .times(1)
        .returning(|_| Err(LedgerError::NoPendingOrders));
    let oracle = MockOracle::new();
    let worker = AccrualWorker::new(store, oracle, WorkerConfig { batch_size: 3, ..fast_config() });
    worker.run_cycle().await;
}

#[tokio::test]
async fn verdicts_are_applied_with_the_right_credit() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1", "2", "3", "4"])));
    store
        .expect_apply_verdict()
        .withf(|order, credit| match order.number.as_str() {
            "1" => order.status == OrderStatusType::Processed && *credit == Points::from(1000),
            "2" => order.status == OrderStatusType::Invalid && credit.is_zero(),
            "3" => order.status == OrderStatusType::Processing && credit.is_zero(),
            _ => false,
        })
        .times(3)
        .returning(|order, _| Ok(ApplyOutcome::Applied(order.clone())));
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().times(4).returning(|number| match number.as_str() {
        "1" => Ok(Verdict::new(number.clone(), VerdictStatus::Processed, Points::from(1000))),
        "2" => Ok(Verdict::new(number.clone(), VerdictStatus::Invalid, Points::zero())),
        "3" => Ok(Verdict::new(number.clone(), VerdictStatus::Registered, Points::zero())),
        _ => Err(OracleError::NotReady(number.clone())),
    });
    let worker = AccrualWorker::new(store, oracle, fast_config());
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 4, applied: 3, not_ready: 1, ..Default::default() });
}

#[tokio::test]
async fn rate_limited_order_does_not_hold_up_the_batch() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1", "2", "3", "4", "5"])));
    store
        .expect_apply_verdict()
        .withf(|order, _| order.number.as_str() != "3")
        .times(4)
        .returning(|order, _| Ok(ApplyOutcome::Applied(order.clone())));
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().times(5).returning(|number| match number.as_str() {
        "3" => Err(OracleError::RateLimited { retry_after: Some(Duration::from_millis(100)) }),
        _ => processed(number),
    });
    let worker = AccrualWorker::new(store, oracle, fast_config());
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 5, applied: 4, rate_limited: 1, ..Default::default() });
}

#[tokio::test]
async fn overload_without_retry_after_uses_the_configured_cooldown() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1"])));
    store.expect_apply_verdict().never();
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().times(1).returning(|_| Err(OracleError::RateLimited { retry_after: None }));
    let config = WorkerConfig { overload_cooldown: Duration::from_secs(600), ..fast_config() };
    let worker = AccrualWorker::new(store, oracle, config);
    let report = worker.run_cycle().await;
    assert_eq!(report.rate_limited, 1);
    assert!(worker.cooldown().is_active());
    assert!(worker.cooldown().remaining() > Duration::from_secs(590));
}

#[tokio::test]
async fn zero_retry_after_still_backs_off() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1"])));
    store.expect_apply_verdict().never();
    let mut oracle = MockOracle::new();
    oracle
        .expect_query_verdict()
        .times(2)
        .returning(|_| Err(OracleError::RateLimited { retry_after: Some(Duration::ZERO) }));
    let config = WorkerConfig { overload_cooldown: Duration::from_secs(600), ..fast_config() };
    let worker = AccrualWorker::new(store, oracle, config);
    let start = tokio::time::Instant::now();
    let report = worker.run_cycle().await;
    assert_eq!(report.rate_limited, 1);
    assert!(worker.cooldown().is_active());
    let report = worker.run_cycle().await;
    assert_eq!(report.rate_limited, 1);
    assert!(start.elapsed() >= MIN_OVERLOAD_COOLDOWN, "second query after {:?}", start.elapsed());
}

#[tokio::test]
async fn absurd_retry_after_does_not_kill_the_worker() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1", "2"])));
    store.expect_apply_verdict().never();
    let mut oracle = MockOracle::new();
    oracle
        .expect_query_verdict()
        .times(1)
        .returning(|_| Err(OracleError::RateLimited { retry_after: Some(Duration::MAX) }));
    let worker = AccrualWorker::new(store, oracle, fast_config());
    let (tx, rx) = watch::channel(false);
    let stop = async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tx
    };
    tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(worker.run(rx), stop) })
        .await
        .expect("Worker did not stop in time");
}

#[tokio::test]
async fn no_queries_while_cooling_down() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1"])));
    store.expect_apply_verdict().returning(|order, _| Ok(ApplyOutcome::Applied(order.clone())));
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().times(1).returning(processed);
    let worker = AccrualWorker::new(store, oracle, fast_config());
    worker.cooldown().trigger(Duration::from_millis(300));
    let start = tokio::time::Instant::now();
    let report = worker.run_cycle().await;
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn failures_are_contained_to_their_order() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1", "2", "3", "4"])));
    store.expect_apply_verdict().times(3).returning(|order, _| match order.number.as_str() {
        "1" => Err(LedgerError::BalanceNotFound(order.user_id.clone())),
        "2" => Ok(ApplyOutcome::AlreadySettled(order.clone())),
        _ => Ok(ApplyOutcome::Applied(order.clone())),
    });
    let mut oracle = MockOracle::new();
    oracle.expect_query_verdict().times(4).returning(|number| match number.as_str() {
        "4" => Err(OracleError::Transient("connection reset by peer".into())),
        _ => processed(number),
    });
    let worker = AccrualWorker::new(store, oracle, fast_config());
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 4, applied: 1, settled: 1, failed: 2, ..Default::default() });
}

#[tokio::test]
async fn shutdown_interrupts_a_stalled_batch() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(|_| Ok(pending_orders(&["1", "2"])));
    store.expect_apply_verdict().never();
    let worker = AccrualWorker::new(store, StalledOracle, fast_config());
    let (tx, rx) = watch::channel(false);
    let stop = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tx
    };
    tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(worker.run(rx), stop) })
        .await
        .expect("Worker did not stop in time");
}

#[tokio::test]
async fn shutdown_while_idle() {
    let _ = env_logger::try_init();
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().never();
    let oracle = MockOracle::new();
    let config = WorkerConfig { poll_interval: Duration::from_secs(3600), ..fast_config() };
    let worker = AccrualWorker::new(store, oracle, config);
    let (tx, rx) = watch::channel(false);
    let stop = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tx
    };
    tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(worker.run(rx), stop) })
        .await
        .expect("Worker did not stop in time");
}

#[tokio::test]
async fn only_a_true_flag_stops_the_worker() {
    let _ = env_logger::try_init();
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);
    let mut store = MockLedger::new();
    store.expect_fetch_pending_batch().returning(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::NoPendingOrders)
    });
    let oracle = MockOracle::new();
    let worker = AccrualWorker::new(store, oracle, fast_config());
    let (tx, rx) = watch::channel(false);
    let observed = Arc::clone(&fetches);
    let stop = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(false).unwrap();
        let after_false = observed.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let later = observed.load(Ordering::SeqCst);
        tx.send(true).unwrap();
        (after_false, later, tx)
    };
    let (_, (after_false, later, _tx)) =
        tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(worker.run(rx), stop) })
            .await
            .expect("Worker did not stop in time");
    assert!(later > after_false + 1, "worker stopped reconciling after a false flag ({after_false} -> {later})");
}
