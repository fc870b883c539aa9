use chrono::NaiveDate;
use recurring_types::BillingPeriod;
use rust_decimal::Decimal;

use crate::domain::entities::subscription::Subscription;

/// Share of `period` covered up to and including `cancellation_date`, in `[0, 1]`.
pub fn prorate_factor(period: &BillingPeriod, cancellation_date: NaiveDate) -> Decimal {
    let covered = (cancellation_date - period.start).num_days() + 1;
    let length = period.length_days();
    if covered <= 0 {
        return Decimal::ZERO;
    }
    if covered >= length {
        return Decimal::ONE;
    }
    Decimal::from(covered) / Decimal::from(length)
}

/// Factor for the invoice of `period`, if the subscription's last invoice is prorated.
pub fn invoice_factor(subscription: &Subscription, period: &BillingPeriod) -> Option<Decimal> {
    if !subscription.prorate_last_invoice {
        return None;
    }
    subscription
        .cancellation_date
        .map(|date| prorate_factor(period, date))
}
