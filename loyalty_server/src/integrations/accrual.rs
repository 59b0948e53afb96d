//! Adapts the accrual system's HTTP client to the engine's [`AccrualOracle`] contract.
use accrual_client::{AccrualApi, AccrualApiError, AccrualResponse, AccrualStatus};
use log::*;
use loyalty_engine::{
    db_types::{OrderNumber, Points, Verdict, VerdictStatus},
    AccrualOracle,
    OracleError,
};

#[derive(Clone)]
pub struct AccrualOracleClient {
    api: AccrualApi,
}

impl AccrualOracleClient {
    pub fn new(api: AccrualApi) -> Self {
        Self { api }
    }
}

impl AccrualOracle for AccrualOracleClient {
    async fn query_verdict(&self, number: &OrderNumber) -> Result<Verdict, OracleError> {
        let response = self.api.get_order_accrual(number.as_str()).await.map_err(|e| to_oracle_error(number, e))?;
        response_to_verdict(number, response)
    }
}

fn to_oracle_error(number: &OrderNumber, e: AccrualApiError) -> OracleError {
    match e {
        AccrualApiError::NotRegistered(_) => OracleError::NotReady(number.clone()),
        AccrualApiError::TooManyRequests { retry_after } => OracleError::RateLimited { retry_after },
        e => OracleError::Transient(e.to_string()),
    }
}

/// A processed order without an accrual earns nothing.
fn response_to_verdict(number: &OrderNumber, response: AccrualResponse) -> Result<Verdict, OracleError> {
    if response.order != number.as_str() {
        warn!("🔮️ Asked about order {number}, but the accrual system answered for {}", response.order);
    }
    let status = match response.status {
        AccrualStatus::Registered => VerdictStatus::Registered,
        AccrualStatus::Invalid => VerdictStatus::Invalid,
        AccrualStatus::Processing => VerdictStatus::Processing,
        AccrualStatus::Processed => VerdictStatus::Processed,
    };
    let accrual = match response.accrual {
        Some(accrual) => Points::try_from(accrual)
            .map_err(|e| OracleError::Transient(format!("Order {number} has an unusable accrual. {e}")))?,
        None => Points::zero(),
    };
    Ok(Verdict::new(number.clone(), status, accrual))
}
