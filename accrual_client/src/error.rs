use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Order {0} is not registered with the accrual system")]
    NotRegistered(String),
    #[error("The accrual system is rate limiting requests. Retry after {retry_after:?}")]
    TooManyRequests { retry_after: Option<Duration> },
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
