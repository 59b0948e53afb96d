//! `SqliteDatabase` is the concrete ledger backend.
//!
//! Unsurprisingly, it uses SQLite for storage and implements the storage traits defined in the [`crate::traits`]
//! module.
//!
//! Every multi-statement write runs inside a single transaction whose first statement is a write. SQLite therefore
//! takes the database write lock at the start of the transaction, and concurrent writers queue on the lock (up to the
//! busy timeout) instead of interleaving. The effect is serializable isolation for all ledger writes.
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{balances, new_pool, orders, withdrawals};
use crate::{
    db_types::{Balance, NewOrder, Order, OrderNumber, OrderStatusType, Points, UserId, Withdrawal},
    traits::{ApplyOutcome, BalanceApiError, BalanceManagement, LedgerError, LedgerStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the given URL and connection limit.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        debug!("🗃️ Connected to {url} with up to {max_connections} connections");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Ledger migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        debug!("🗃️ Connection pool for {} closed", self.url);
    }
}

impl LedgerStore for SqliteDatabase {
    async fn fetch_pending_batch(&self, limit: u32) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_pending_orders(limit, &mut conn).await?;
        if orders.is_empty() {
            return Err(LedgerError::NoPendingOrders);
        }
        Ok(orders)
    }

    async fn apply_verdict(&self, order: &Order, credit: Points) -> Result<ApplyOutcome, LedgerError> {
        if order.status == OrderStatusType::New {
            return Err(LedgerError::InvalidTransition(order.number.clone(), order.status));
        }
        let mut tx = self.pool.begin().await?;
        let updated = orders::update_pending_order(&order.number, order.status, order.accrual, &mut tx).await?;
        let Some(updated) = updated else {
            // Nothing was written, so dropping the transaction is enough.
            return match orders::fetch_order_by_number(&order.number, &mut tx).await? {
                Some(stored) => {
                    debug!("🗃️ Order {} was already settled as {}. Ignoring the verdict", stored.number, stored.status);
                    Ok(ApplyOutcome::AlreadySettled(stored))
                },
                None => Err(LedgerError::OrderNotFound(order.number.clone())),
            };
        };
        if credit.is_positive() && !balances::credit_balance(&updated.user_id, credit, &mut tx).await? {
            warn!("🗃️ Order {} belongs to {}, who has no balance. Rolling back", updated.number, updated.user_id);
            tx.rollback().await?;
            return Err(LedgerError::BalanceNotFound(updated.user_id));
        }
        tx.commit().await?;
        Ok(ApplyOutcome::Applied(updated))
    }
}

impl BalanceManagement for SqliteDatabase {
    async fn open_balance(&self, user_id: &UserId) -> Result<Balance, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::open_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<Balance>, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let balance = balances::fetch_balance(user_id, &mut conn).await?;
        Ok(balance)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order {} uploaded by {}", order.number, order.user_id);
        Ok(order)
    }

    async fn fetch_order(&self, number: &OrderNumber) -> Result<Option<Order>, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_number(number, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn withdraw(
        &self,
        user_id: &UserId,
        order_number: &OrderNumber,
        amount: Points,
    ) -> Result<Balance, BalanceApiError> {
        if !amount.is_positive() {
            return Err(BalanceApiError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        let balance = match balances::debit_balance(user_id, amount, &mut tx).await {
            Ok(Some(balance)) => balance,
            Ok(None) => return Err(BalanceApiError::BalanceNotFound(user_id.clone())),
            Err(sqlx::Error::Database(e)) if e.is_check_violation() => {
                return Err(BalanceApiError::InsufficientFunds(amount));
            },
            Err(e) => return Err(e.into()),
        };
        match withdrawals::insert_withdrawal(user_id, order_number, amount, &mut tx).await {
            Ok(_) => {},
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(BalanceApiError::DuplicateWithdrawal(order_number.clone()));
            },
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;
        info!("🗃️ {user_id} withdrew {amount} points against order {order_number}");
        Ok(balance)
    }

    async fn fetch_withdrawals_for_user(&self, user_id: &UserId) -> Result<Vec<Withdrawal>, BalanceApiError> {
        let mut conn = self.pool.acquire().await?;
        let withdrawals = withdrawals::fetch_withdrawals_for_user(user_id, &mut conn).await?;
        Ok(withdrawals)
    }
}
