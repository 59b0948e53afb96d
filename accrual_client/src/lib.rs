//! # Accrual oracle client
//!
//! A thin client for the external accrual system that decides how many loyalty points an order earns.
//!
//! The oracle exposes a single endpoint, `GET /api/orders/{number}`, which answers with
//! * `200` and an [`AccrualResponse`] once the oracle knows about the order,
//! * `204` while the order is not (yet) registered with the oracle,
//! * `429` when the oracle is shedding load. A `Retry-After` header may accompany this response.
//!
//! Each of these outcomes is reported as a distinct [`AccrualApiError`] variant so that callers can decide how to back
//! off.
mod api;
mod config;
mod data_objects;
mod error;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use api::{AccrualApi, MAX_RETRY_AFTER};
pub use config::AccrualConfig;
pub use data_objects::{AccrualResponse, AccrualStatus};
pub use error::AccrualApiError;
