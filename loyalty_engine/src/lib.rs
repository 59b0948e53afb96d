//! Loyalty Engine
//!
//! The loyalty engine holds the core logic for reconciling uploaded purchase orders with the verdicts of an external
//! accrual system and crediting the resulting loyalty points to users' balances.
//!
//! The library is divided into three main sections:
//! 1. Domain types ([`mod@db_types`]). Orders, balances, withdrawals and accrual verdicts.
//! 2. Storage and oracle contracts ([`mod@traits`]), along with an SQLite backend ([`SqliteDatabase`]) that
//!    implements the storage traits. You should never need to access the database directly. The SQLite-specific
//!    low-level functions are public so that tools can compose them inside their own transactions.
//! 3. Throttling helpers ([`mod@helpers`]) that keep outbound traffic to the accrual system within its limits.
pub mod db_types;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use helpers::{Cooldown, RateLimiter};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AccrualOracle,
    ApplyOutcome,
    BalanceApiError,
    BalanceManagement,
    LedgerError,
    LedgerStore,
    OracleError,
};
