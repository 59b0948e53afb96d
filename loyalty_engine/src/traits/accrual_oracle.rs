use std::time::Duration;

use thiserror::Error;

use crate::db_types::{OrderNumber, Verdict};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle has no record of the order yet. Try again later.
    #[error("Order {0} is not known to the accrual system yet")]
    NotReady(OrderNumber),
    /// The oracle is shedding load. No further queries should be made until the cooldown has passed.
    #[error("The accrual system is overloaded. Retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },
    /// Any other network or protocol failure.
    #[error("Accrual system query failed. {0}")]
    Transient(String),
}

/// The `AccrualOracle` trait is a translator between the external accrual system and [`Verdict`]s. Implementations
/// must not have any side effects beyond the outbound query.
#[allow(async_fn_in_trait)]
pub trait AccrualOracle {
    async fn query_verdict(&self, number: &OrderNumber) -> Result<Verdict, OracleError>;
}
