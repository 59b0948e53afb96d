//! # Ledger storage and oracle contracts
//!
//! This module defines the interfaces that the reconciliation machinery depends on. Backends implement the storage
//! traits; oracle clients implement [`AccrualOracle`].
//!
//! * [`LedgerStore`] is what the reconciliation worker needs from storage: a way to find orders that are still waiting
//!   for a verdict, and a way to apply a verdict to an order and its owner's balance as a single atomic unit.
//! * [`BalanceManagement`] is the storage contract for everything else that touches orders and balances: order intake,
//!   registration and withdrawals. These operations observe the same atomicity guarantees as [`LedgerStore`].
//! * [`AccrualOracle`] translates the external accrual system's answers into [`crate::db_types::Verdict`]s.
mod accrual_oracle;
mod balance_management;
mod ledger_store;

pub use accrual_oracle::{AccrualOracle, OracleError};
pub use balance_management::{BalanceApiError, BalanceManagement};
pub use ledger_store::{ApplyOutcome, LedgerError, LedgerStore};
