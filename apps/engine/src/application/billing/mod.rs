//! Pure billing decisions: periods, rates, proration and status.
//!
//! Nothing here persists state. The billing cycle use case feeds these
//! functions with subscription state and ledger lookups.

pub mod period;
pub mod proration;
pub mod rates;
pub mod status;
