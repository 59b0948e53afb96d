//! # Loyalty points gateway server
//! This crate hosts the long-running process of the loyalty points gateway. It is responsible for:
//! * Reading the configuration from the environment.
//! * Bringing the ledger schema up to date.
//! * Running the accrual reconciliation worker, which settles uploaded orders against the external accrual system and
//!   credits the awarded points to users' balances.
//! * Shutting down cleanly on Ctrl-C or SIGTERM.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod accrual_worker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod integrations;
pub mod server;

#[cfg(test)]
mod worker_tests;
