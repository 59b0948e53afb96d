//! # Accrual reconciliation worker
//!
//! The worker is a single long-lived loop. Each cycle it
//! 1. waits out any overload cooldown,
//! 2. fetches a batch of orders that are still waiting for a verdict,
//! 3. asks the accrual system about every order in the batch concurrently, subject to a shared rate limit, and
//! 4. applies each verdict to the order and its owner's balance in a single transaction.
//!
//! The next cycle only starts once every order in the current batch has been dealt with, so an order is never in
//! flight twice. Failures are contained to the order they happened to; nothing that goes wrong in a cycle stops the
//! loop.
use std::time::Duration;

use log::*;
use loyalty_engine::{
    db_types::Order,
    AccrualOracle,
    ApplyOutcome,
    Cooldown,
    LedgerError,
    LedgerStore,
    OracleError,
    RateLimiter,
    SqliteDatabase,
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{config::WorkerConfig, integrations::accrual::AccrualOracleClient};

/// The shortest overload pause the accrual system can ask for. A `Retry-After` of zero still backs off this long.
pub const MIN_OVERLOAD_COOLDOWN: Duration = Duration::from_secs(1);

/// What happened during one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    /// Verdicts that were committed to the ledger.
    pub applied: usize,
    /// Verdicts for orders that had already been settled by the time they were applied.
    pub settled: usize,
    pub not_ready: usize,
    pub rate_limited: usize,
    /// Oracle or storage failures. These orders are retried in a later cycle.
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Applied => self.applied += 1,
            UnitOutcome::AlreadySettled => self.settled += 1,
            UnitOutcome::NotReady => self.not_ready += 1,
            UnitOutcome::RateLimited => self.rate_limited += 1,
            UnitOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Applied,
    AlreadySettled,
    NotReady,
    RateLimited,
    Failed,
}

pub struct AccrualWorker<S, O> {
    store: S,
    oracle: O,
    limiter: RateLimiter,
    cooldown: Cooldown,
    config: WorkerConfig,
}

impl<S, O> AccrualWorker<S, O>
where
    S: LedgerStore,
    O: AccrualOracle,
{
    pub fn new(store: S, oracle: O, config: WorkerConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit);
        Self { store, oracle, limiter, cooldown: Cooldown::new(), config }
    }

    /// The overload cooldown shared by every unit of work. Triggering it from outside pauses the worker too.
    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs a single reconciliation cycle and reports what happened. Never fails: errors are logged and the affected
    /// orders stay pending for the next cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        self.cooldown.wait().await;
        let orders = match self.store.fetch_pending_batch(self.config.batch_size).await {
            Ok(orders) => orders,
            Err(LedgerError::NoPendingOrders) => {
                trace!("🏅️ No orders are waiting for an accrual verdict");
                return CycleReport::default();
            },
            Err(e) => {
                error!("🏅️ Could not fetch pending orders. {e}");
                return CycleReport::default();
            },
        };
        let mut report = CycleReport { fetched: orders.len(), ..Default::default() };
        trace!("🏅️ Reconciling {} orders", orders.len());
        let units = orders.into_iter().map(|order| self.reconcile(order));
        for outcome in futures::future::join_all(units).await {
            report.record(outcome);
        }
        report
    }

    async fn reconcile(&self, mut order: Order) -> UnitOutcome {
        self.wait_for_permit().await;
        let verdict = match self.oracle.query_verdict(&order.number).await {
            Ok(verdict) => verdict,
            Err(OracleError::NotReady(_)) => {
                trace!("🏅️ Order {} is not known to the accrual system yet", order.number);
                return UnitOutcome::NotReady;
            },
            Err(OracleError::RateLimited { retry_after }) => {
                let pause = self.overload_pause(retry_after);
                warn!("🏅️ The accrual system is overloaded. Pausing all queries for {pause:?}");
                self.cooldown.trigger(pause);
                return UnitOutcome::RateLimited;
            },
            Err(OracleError::Transient(e)) => {
                warn!("🏅️ Could not get an accrual verdict for order {}. {e}", order.number);
                return UnitOutcome::Failed;
            },
        };
        let credit = verdict.credit();
        verdict.apply_to(&mut order);
        match self.store.apply_verdict(&order, credit).await {
            Ok(ApplyOutcome::Applied(updated)) => {
                debug!(
                    "🏅️ Order {} is now {}. {credit} points credited to {}",
                    updated.number, updated.status, updated.user_id
                );
                UnitOutcome::Applied
            },
            Ok(ApplyOutcome::AlreadySettled(stored)) => {
                debug!("🏅️ Order {} had already been settled as {}", stored.number, stored.status);
                UnitOutcome::AlreadySettled
            },
            Err(e) => {
                error!("🏅️ Could not apply the accrual verdict for order {}. {e}", order.number);
                UnitOutcome::Failed
            },
        }
    }

    /// How long to stop querying after an overload signal. The oracle's own estimate is honoured, but never below
    /// [`MIN_OVERLOAD_COOLDOWN`] (or the configured cooldown, if that is shorter).
    fn overload_pause(&self, retry_after: Option<Duration>) -> Duration {
        let floor = MIN_OVERLOAD_COOLDOWN.min(self.config.overload_cooldown);
        retry_after.map_or(self.config.overload_cooldown, |d| d.max(floor))
    }

    /// Takes a rate limiter permit, but never while a cooldown is active. A sibling may trigger the cooldown while this
    /// unit is queued for a permit, so the cooldown is checked again once the permit is granted.
    async fn wait_for_permit(&self) {
        loop {
            self.cooldown.wait().await;
            self.limiter.acquire().await;
            if !self.cooldown.is_active() {
                break;
            }
        }
    }

    /// Runs reconciliation cycles until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Both the pause between cycles and the cycle itself are raced against the shutdown signal. Abandoning a cycle
    /// drops every unit of work at whatever it was waiting on; uncommitted transactions roll back and the orders are
    /// picked up again on the next start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "🏅️ Accrual worker started. Up to {} orders every {:?}, at most {} queries per second",
            self.config.batch_size, self.config.poll_interval, self.config.rate_limit
        );
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {},
            }
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    warn!("🏅️ Shutdown requested. Abandoning the current batch");
                    break;
                },
                report = self.run_cycle() => {
                    if report.fetched > 0 {
                        info!(
                            "🏅️ Cycle complete. {} orders: {} applied, {} already settled, {} not ready, {} rate \
                             limited, {} failed",
                            report.fetched,
                            report.applied,
                            report.settled,
                            report.not_ready,
                            report.rate_limited,
                            report.failed
                        );
                    }
                },
            }
        }
        info!("🏅️ Accrual worker stopped");
    }
}

/// Resolves once the shutdown flag is `true` or its sender has gone away. Other updates are ignored.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Starts the accrual worker on its own task. Send `true` on the returned channel to stop it, then await the handle.
pub fn start_accrual_worker(
    db: SqliteDatabase,
    oracle: AccrualOracleClient,
    config: WorkerConfig,
) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let worker = AccrualWorker::new(db, oracle, config);
    let handle = tokio::spawn(worker.run(rx));
    (handle, tx)
}
