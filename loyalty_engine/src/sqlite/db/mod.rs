//! # SQLite ledger methods
//!
//! This module contains the "low-level" SQLite ledger interactions.
//!
//! All these interactions are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection`
//! argument. Callers can obtain a connection from a pool, or open an atomic transaction as the need arises and pass
//! `&mut *tx` through to the functions without any other changes.
use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod balances;
pub mod orders;
pub mod withdrawals;

/// How long a writer waits for the database lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Creates a new connection pool. The database file is created if it does not exist yet.
///
/// Write-ahead logging is enabled so that readers never block the single writer, and writers queue on the lock for up
/// to [`BUSY_TIMEOUT`] rather than failing immediately.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
