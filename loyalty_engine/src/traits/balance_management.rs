use thiserror::Error;

use crate::db_types::{Balance, NewOrder, Order, OrderNumber, Points, UserId, Withdrawal};

#[derive(Debug, Clone, Error)]
pub enum BalanceApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} has already been uploaded by this user")]
    OrderAlreadyUploaded(OrderNumber),
    #[error("Order {0} has already been uploaded by another user")]
    OrderOwnedByAnotherUser(OrderNumber),
    #[error("User {0} does not have a balance")]
    BalanceNotFound(UserId),
    #[error("Insufficient funds to withdraw {0}")]
    InsufficientFunds(Points),
    #[error("Withdrawal amounts must be positive. {0} is not allowed")]
    InvalidAmount(Points),
    #[error("Points have already been withdrawn against order {0}")]
    DuplicateWithdrawal(OrderNumber),
}

impl From<sqlx::Error> for BalanceApiError {
    fn from(e: sqlx::Error) -> Self {
        BalanceApiError::DatabaseError(e.to_string())
    }
}

/// The storage contract for order intake, registration, and balance queries and withdrawals.
///
/// Writes through this trait observe the same atomicity guarantees as [`crate::traits::LedgerStore`]: a concurrent
/// reader never sees an order update without the matching balance change, and no write ever leaves a negative balance.
#[allow(async_fn_in_trait)]
pub trait BalanceManagement {
    /// Creates an empty balance for the user. If the balance already exists, it is returned unchanged.
    async fn open_balance(&self, user_id: &UserId) -> Result<Balance, BalanceApiError>;

    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<Balance>, BalanceApiError>;

    /// Stores a freshly uploaded order with status `New`.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, BalanceApiError>;

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, BalanceApiError>;

    /// All orders uploaded by the user, most recent first.
    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, BalanceApiError>;

    /// Spends `amount` points from the user's balance against `order_number`. The debit and the withdrawal record are
    /// written atomically. If the balance would go negative, nothing is written and
    /// [`BalanceApiError::InsufficientFunds`] is returned.
    async fn withdraw(
        &self,
        user_id: &UserId,
        order_number: &OrderNumber,
        amount: Points,
    ) -> Result<Balance, BalanceApiError>;

    /// All withdrawals made by the user, most recent first.
    async fn fetch_withdrawals_for_user(&self, user_id: &UserId) -> Result<Vec<Withdrawal>, BalanceApiError>;
}
