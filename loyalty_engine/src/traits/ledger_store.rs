use thiserror::Error;

use crate::db_types::{Order, OrderNumber, OrderStatusType, Points, UserId};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Not really an error. There is simply nothing to reconcile right now.
    #[error("There are no orders waiting for an accrual verdict")]
    NoPendingOrders,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("User {0} does not have a balance")]
    BalanceNotFound(UserId),
    #[error("Order {0} cannot be moved to status {1} by an accrual verdict")]
    InvalidTransition(OrderNumber, OrderStatusType),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The result of applying a verdict to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The order was updated (and the balance credited, if there was anything to credit). Contains the updated order.
    Applied(Order),
    /// The order had already reached a terminal state. Nothing was written. Contains the order as stored.
    AlreadySettled(Order),
}

/// The storage capability that the accrual reconciliation worker depends on.
#[allow(async_fn_in_trait)]
pub trait LedgerStore {
    /// Fetches at most `limit` orders that are still waiting for a verdict (i.e. `New` or `Processing`), least recently
    /// touched first.
    ///
    /// If there are no such orders, [`LedgerError::NoPendingOrders`] is returned.
    async fn fetch_pending_batch(&self, limit: u32) -> Result<Vec<Order>, LedgerError>;

    /// Applies an accrual verdict in a single atomic transaction:
    /// * The order row identified by `order.number` is updated with `order.status` and `order.accrual`, provided that
    ///   the stored order is not already in a terminal state.
    /// * `credit` is added to the current balance of the order's owner.
    ///
    /// Either both changes are committed, or neither is. If the stored order is already terminal, nothing is written
    /// and [`ApplyOutcome::AlreadySettled`] is returned, so applying the same verdict twice credits the balance once.
    ///
    /// The SQLite backend serializes writers. Concurrent calls, even for different users, queue on the database write
    /// lock and commit one at a time, each waiting at most the pool's busy timeout.
    async fn apply_verdict(&self, order: &Order, credit: Points) -> Result<ApplyOutcome, LedgerError>;
}
