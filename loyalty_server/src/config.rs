use std::{env, fmt::Display, str::FromStr, time::Duration};

use accrual_client::AccrualConfig;
use log::*;

const DEFAULT_LPG_DATABASE_URL: &str = "sqlite://data/loyalty_store.db";
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 10;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
const DEFAULT_BATCH_SIZE: u32 = 10;
const DEFAULT_RATE_LIMIT: u32 = 10;
const DEFAULT_OVERLOAD_COOLDOWN: Duration = Duration::from_secs(600);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_db_connections: u32,
    /// How to reach the accrual system
    pub accrual: AccrualConfig,
    pub worker: WorkerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_LPG_DATABASE_URL.to_string(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            accrual: AccrualConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("LPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ LPG_DATABASE_URL is not set. Using the default, {DEFAULT_LPG_DATABASE_URL}.");
            DEFAULT_LPG_DATABASE_URL.to_string()
        });
        let max_db_connections = positive_from_env("LPG_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS);
        let accrual = AccrualConfig::new_from_env_or_default();
        let worker = WorkerConfig::from_env_or_default();
        Self { database_url, max_db_connections, accrual, worker }
    }
}

/// Tuning knobs for the accrual reconciliation worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// The pause between the end of one reconciliation cycle and the start of the next.
    pub poll_interval: Duration,
    /// The maximum number of orders reconciled concurrently in one cycle.
    pub batch_size: u32,
    /// The maximum number of accrual system queries per second, across all orders in flight.
    pub rate_limit: u32,
    /// How long to stop querying the accrual system after it reports overload without saying for how long.
    pub overload_cooldown: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit: DEFAULT_RATE_LIMIT,
            overload_cooldown: DEFAULT_OVERLOAD_COOLDOWN,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let poll_interval = Duration::from_millis(positive_from_env(
            "LPG_ACCRUAL_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        ));
        let batch_size = positive_from_env("LPG_ACCRUAL_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let rate_limit = positive_from_env("LPG_ACCRUAL_RATE_LIMIT", DEFAULT_RATE_LIMIT);
        let overload_cooldown = Duration::from_secs(positive_from_env(
            "LPG_ACCRUAL_COOLDOWN_SECS",
            DEFAULT_OVERLOAD_COOLDOWN.as_secs(),
        ));
        Self { poll_interval, batch_size, rate_limit, overload_cooldown }
    }
}

/// Reads a strictly positive number from the environment. Missing values quietly fall back to the default; invalid
/// values fall back to the default with an error in the log.
fn positive_from_env<T>(name: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display + Copy,
    T::Err: Display,
{
    let Ok(s) = env::var(name) else {
        return default;
    };
    match s.parse::<T>() {
        Ok(v) if v > T::default() => v,
        Ok(v) => {
            error!("🪛️ {name} must be greater than zero, but was {v}. Using the default, {default}, instead.");
            default
        },
        Err(e) => {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        },
    }
}
