use std::future::pending;

use loyalty_engine::{
    db_types::{Order, OrderNumber, OrderStatusType, Points, Verdict},
    AccrualOracle,
    ApplyOutcome,
    LedgerError,
    LedgerStore,
    OracleError,
};
use mockall::mock;

mock! {
    pub Ledger {}
    impl LedgerStore for Ledger {
        async fn fetch_pending_batch(&self, limit: u32) -> Result<Vec<Order>, LedgerError>;
        async fn apply_verdict(&self, order: &Order, credit: Points) -> Result<ApplyOutcome, LedgerError>;
    }
}

mock! {
    pub Oracle {}
    impl AccrualOracle for Oracle {
        async fn query_verdict(&self, number: &OrderNumber) -> Result<Verdict, OracleError>;
    }
}

/// An oracle that never answers.
pub struct StalledOracle;

impl AccrualOracle for StalledOracle {
    async fn query_verdict(&self, _number: &OrderNumber) -> Result<Verdict, OracleError> {
        pending().await
    }
}

pub fn pending_order(id: i64, number: &str) -> Order {
    Order {
        id,
        number: number.into(),
        user_id: format!("user{id}").into(),
        status: OrderStatusType::New,
        accrual: Points::zero(),
        uploaded_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

pub fn pending_orders(numbers: &[&str]) -> Vec<Order> {
    numbers.iter().enumerate().map(|(i, n)| pending_order(i as i64 + 1, n)).collect()
}
