use std::{collections::HashMap, time::Duration};

use accrual_client::{
    test_utils::{ScriptedOracle, ScriptedResponse},
    AccrualApi,
    AccrualConfig,
};
use loyalty_engine::{
    db_types::{OrderNumber, OrderStatusType, Points, UserId},
    test_utils::prepare_env::{prepare_test_env, random_db_path, seed_orders},
    BalanceManagement,
    LedgerStore,
    SqliteDatabase,
};

use crate::{
    accrual_worker::{start_accrual_worker, AccrualWorker, CycleReport},
    config::WorkerConfig,
    integrations::accrual::AccrualOracleClient,
};

fn config() -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(20),
        batch_size: 10,
        rate_limit: 50,
        overload_cooldown: Duration::from_secs(600),
    }
}

fn oracle_client(oracle: &ScriptedOracle) -> AccrualOracleClient {
    let api = AccrualApi::new(AccrualConfig::new(&oracle.base_url())).expect("Could not create accrual client");
    AccrualOracleClient::new(api)
}

async fn order_status(db: &SqliteDatabase, number: &str) -> OrderStatusType {
    db.fetch_order(&OrderNumber::from(number)).await.unwrap().unwrap().status
}

async fn balance(db: &SqliteDatabase, user: &str) -> Points {
    db.fetch_balance(&UserId::from(user)).await.unwrap().unwrap().current
}

#[tokio::test]
async fn processed_invalid_and_unknown_orders() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_orders(&db, "alice", &["12345678903", "2377225624", "49927398716"]).await;
    let mut script = HashMap::new();
    script.insert("12345678903".to_string(), ScriptedResponse::processed("12345678903", "10.00"));
    script.insert("2377225624".to_string(), ScriptedResponse::with_status("2377225624", "INVALID"));
    let oracle = ScriptedOracle::start(script).await;

    let worker = AccrualWorker::new(db.clone(), oracle_client(&oracle), config());
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 3, applied: 2, not_ready: 1, ..Default::default() });

    assert_eq!(order_status(&db, "12345678903").await, OrderStatusType::Processed);
    assert_eq!(order_status(&db, "2377225624").await, OrderStatusType::Invalid);
    assert_eq!(order_status(&db, "49927398716").await, OrderStatusType::New);
    assert_eq!(balance(&db, "alice").await, Points::from_whole(10));

    let pending = db.fetch_pending_batch(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].number.as_str(), "49927398716");

    // Only the unknown order is asked about again
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 1, not_ready: 1, ..Default::default() });
    assert_eq!(oracle.hits("12345678903"), 1);
    assert_eq!(oracle.hits("49927398716"), 2);
    assert_eq!(balance(&db, "alice").await, Points::from_whole(10));
    db.close().await;
}

#[tokio::test]
async fn overloaded_oracle_only_affects_one_order() {
    let db = prepare_test_env(&random_db_path()).await;
    let numbers = ["1001", "1002", "1003", "1004", "1005"];
    seed_orders(&db, "bob", &numbers).await;
    let mut script = numbers
        .iter()
        .map(|n| (n.to_string(), ScriptedResponse::processed(n, "1.5")))
        .collect::<HashMap<_, _>>();
    script.insert("1003".to_string(), ScriptedResponse::too_many_requests(Some(1)));
    let oracle = ScriptedOracle::start(script).await;

    let worker = AccrualWorker::new(db.clone(), oracle_client(&oracle), config());
    let report = worker.run_cycle().await;
    assert_eq!(report, CycleReport { fetched: 5, applied: 4, rate_limited: 1, ..Default::default() });
    assert_eq!(order_status(&db, "1003").await, OrderStatusType::New);
    assert_eq!(oracle.hits("1003"), 1);
    assert_eq!(oracle.total_hits(), 5);
    assert_eq!(balance(&db, "bob").await, Points::from(600));
    db.close().await;
}

#[tokio::test]
async fn orders_move_through_processing() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_orders(&db, "carol", &["5001"]).await;
    let mut script = HashMap::new();
    script.insert("5001".to_string(), ScriptedResponse::with_status("5001", "REGISTERED"));
    let oracle = ScriptedOracle::start(script).await;
    let worker = AccrualWorker::new(db.clone(), oracle_client(&oracle), config());
    worker.run_cycle().await;
    assert_eq!(order_status(&db, "5001").await, OrderStatusType::Processing);
    assert_eq!(balance(&db, "carol").await, Points::zero());

    let mut script = HashMap::new();
    script.insert("5001".to_string(), ScriptedResponse::processed("5001", "729.98"));
    let oracle = ScriptedOracle::start(script).await;
    let worker = AccrualWorker::new(db.clone(), oracle_client(&oracle), config());
    worker.run_cycle().await;
    assert_eq!(order_status(&db, "5001").await, OrderStatusType::Processed);
    assert_eq!(balance(&db, "carol").await, Points::from(72_998));
    db.close().await;
}

#[tokio::test]
async fn spawned_worker_settles_orders_and_stops() {
    let db = prepare_test_env(&random_db_path()).await;
    let numbers = (0..15).map(|i| format!("{}", 9000 + i)).collect::<Vec<_>>();
    let numbers = numbers.iter().map(String::as_str).collect::<Vec<_>>();
    seed_orders(&db, "dave", &numbers).await;
    let script =
        numbers.iter().map(|n| (n.to_string(), ScriptedResponse::processed(n, "2"))).collect::<HashMap<_, _>>();
    let oracle = ScriptedOracle::start(script).await;

    let (handle, shutdown) = start_accrual_worker(db.clone(), oracle_client(&oracle), config());
    let settled = async {
        while db.fetch_pending_batch(1).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), settled).await.expect("Orders were not settled in time");
    shutdown.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(balance(&db, "dave").await, Points::from_whole(30));
    assert_eq!(oracle.total_hits(), 15);
    db.close().await;
}

#[tokio::test]
async fn huge_retry_after_header_pauses_the_worker_without_crashing_it() {
    let db = prepare_test_env(&random_db_path()).await;
    seed_orders(&db, "erin", &["7001", "7002"]).await;
    let mut script = HashMap::new();
    script.insert("7001".to_string(), ScriptedResponse::too_many_requests(Some(u64::MAX)));
    script.insert("7002".to_string(), ScriptedResponse::too_many_requests(Some(u64::MAX)));
    let oracle = ScriptedOracle::start(script).await;

    let (handle, shutdown) = start_accrual_worker(db.clone(), oracle_client(&oracle), config());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished(), "worker task ended after an oversized Retry-After");
    let hits = oracle.total_hits();
    assert!((1..=2).contains(&hits));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(oracle.total_hits(), hits, "the worker kept querying during the cooldown");
    shutdown.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("Worker did not stop in time")
        .expect("Worker task panicked");

    assert_eq!(order_status(&db, "7001").await, OrderStatusType::New);
    assert_eq!(order_status(&db, "7002").await, OrderStatusType::New);
    db.close().await;
}
