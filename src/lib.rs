//! Call routing and prepaid wallet settlement for a multi-tenant telephony
//! platform.
//!
//! Two subsystems live here: the [`routing`] decision engine, with its
//! silent admin override layer, and the [`ledger`] service that keeps each
//! tenant's prepaid balance as an idempotent, append-only ledger. Override
//! and admin activity is reported through the internal-only [`audit`]
//! channel.

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod random;
pub mod routing;

pub use error::{Result, SwitchboardError};
