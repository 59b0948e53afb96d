use std::time::Duration;

use log::*;

const DEFAULT_ACCRUAL_SYSTEM_ADDRESS: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AccrualConfig {
    /// The base URL of the accrual system, e.g. `http://localhost:8080`
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string(), request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }
}

impl AccrualConfig {
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), ..Default::default() }
    }

    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("LPG_ACCRUAL_SYSTEM_ADDRESS").unwrap_or_else(|_| {
            warn!("LPG_ACCRUAL_SYSTEM_ADDRESS not set, using {DEFAULT_ACCRUAL_SYSTEM_ADDRESS} as default");
            DEFAULT_ACCRUAL_SYSTEM_ADDRESS.to_string()
        });
        let request_timeout = std::env::var("LPG_ACCRUAL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("Invalid configuration value for LPG_ACCRUAL_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        Self { base_url, request_timeout }
    }
}
