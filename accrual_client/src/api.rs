use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER},
    Client,
    StatusCode,
};

use crate::{config::AccrualConfig, AccrualApiError, AccrualResponse};

#[derive(Clone)]
pub struct AccrualApi {
    config: AccrualConfig,
    client: Arc<Client>,
}

impl AccrualApi {
    pub fn new(config: AccrualConfig) -> Result<Self, AccrualApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccrualApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Asks the accrual system for its current verdict on the given order number.
    ///
    /// A `204` response yields [`AccrualApiError::NotRegistered`] and a `429` response yields
    /// [`AccrualApiError::TooManyRequests`]. Neither is a hard failure; the caller should simply try again later.
    pub async fn get_order_accrual(&self, order_number: &str) -> Result<AccrualResponse, AccrualApiError> {
        let url = self.url(&format!("/api/orders/{order_number}"));
        trace!("🔮️ Querying accrual for order {order_number}: {url}");
        let response =
            self.client.get(url).send().await.map_err(|e| AccrualApiError::RestResponseError(e.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                let result = response
                    .json::<AccrualResponse>()
                    .await
                    .map_err(|e| AccrualApiError::JsonError(e.to_string()))?;
                debug!("🔮️ Order {order_number} is {} in the accrual system", result.status);
                Ok(result)
            },
            StatusCode::NO_CONTENT => {
                trace!("🔮️ Order {order_number} is not registered with the accrual system yet");
                Err(AccrualApiError::NotRegistered(order_number.to_string()))
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parse_retry_after(response.headers());
                warn!("🔮️ The accrual system is rate limiting us. Retry-After: {retry_after:?}");
                Err(AccrualApiError::TooManyRequests { retry_after })
            },
            status => {
                let status = status.as_u16();
                let message =
                    response.text().await.map_err(|e| AccrualApiError::RestResponseError(e.to_string()))?;
                Err(AccrualApiError::QueryError { status, message })
            },
        }
    }
}

/// The longest pause the accrual system may ask for. Longer `Retry-After` values are clamped to this.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Only the delay-seconds form of `Retry-After` is supported. HTTP dates are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}
