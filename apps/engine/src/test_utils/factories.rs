//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{NaiveDate, NaiveDateTime};
use recurring_types::{BillingInterval, SubscriptionStatus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::domain::entities::{
    plan_line::{PlanLine, PlanLineStatus, PriceDetermination},
    subscription::{InvoiceTiming, Subscription},
};

/// Shorthand for a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Returns a fixed datetime for deterministic tests.
pub fn test_datetime() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-01-15 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Create a test plan line: one unit at a fixed rate of 100.
pub fn create_test_plan_line(
    subscription_id: Uuid,
    overrides: impl FnOnce(&mut PlanLine),
) -> PlanLine {
    let mut line = PlanLine {
        id: Uuid::new_v4(),
        subscription_id,
        item_code: "basic-plan".to_string(),
        description: Some("Basic plan".to_string()),
        quantity: dec!(1),
        price_determination: PriceDetermination::Fixed,
        fixed_rate: Some(dec!(100)),
        from_date: None,
        to_date: None,
        status: PlanLineStatus::Active,
        rate: dec!(100),
        position: 0,
    };
    overrides(&mut line);
    line
}

/// Create a test subscription with sensible defaults.
///
/// Monthly from 2024-01-01, invoiced at period end, one plan line.
pub fn create_test_subscription(overrides: impl FnOnce(&mut Subscription)) -> Subscription {
    let id = Uuid::new_v4();
    let mut subscription = Subscription {
        id,
        customer: "CUST-0001".to_string(),
        currency: "EUR".to_string(),
        interval: BillingInterval::Month,
        interval_count: 1,
        start_date: date(2024, 1, 1),
        trial_start: None,
        trial_end: None,
        current_period: None,
        cancellation_date: None,
        invoice_timing: InvoiceTiming::PeriodEnd,
        prorate_last_invoice: false,
        auto_order: false,
        auto_payment_request: true,
        days_until_due: 0,
        additional_discount_percentage: Decimal::ZERO,
        additional_discount_amount: Decimal::ZERO,
        price_list: None,
        payment_channel: None,
        status: SubscriptionStatus::Active,
        total: Decimal::ZERO,
        grand_total: Decimal::ZERO,
        last_error: None,
        billing_closed: false,
        plan_lines: vec![create_test_plan_line(id, |_| {})],
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut subscription);
    subscription
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_produce_valid_fixtures() {
        let sub = create_test_subscription(|_| {});
        assert!(sub.validate().is_ok());
        assert_eq!(sub.plan_lines[0].subscription_id, sub.id);
        assert!(sub.plan_lines[0].validate().is_ok());
    }

    #[test]
    fn test_overrides_apply() {
        let sub = create_test_subscription(|s| {
            s.customer = "CUST-0042".into();
            s.interval = BillingInterval::Year;
        });
        assert_eq!(sub.customer, "CUST-0042");
        assert_eq!(sub.interval, BillingInterval::Year);
    }
}
