//! Shared value types for the recurring billing engine.
//!
//! This crate provides:
//! - `Money` and its rounding rule
//! - Billing intervals and the date arithmetic behind them
//! - `BillingPeriod`, the contiguous date range a subscription is billed for
//! - Subscription lifecycle status and generated document types
//! - Error codes shared by the engine and its callers

mod documents;
mod errors;
mod interval;
mod money;
mod period;
mod status;

pub use documents::DocumentType;
pub use errors::{ErrorCode, ParseEnumError, PeriodError};
pub use interval::BillingInterval;
pub use money::{Money, round_money};
pub use period::BillingPeriod;
pub use status::SubscriptionStatus;
