use chrono::{NaiveDate, NaiveDateTime};
use recurring_types::{BillingInterval, BillingPeriod, Money, SubscriptionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::{payment_channel::PaymentChannelKind, plan_line::PlanLine};

/// When the invoice for a billing period is generated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "invoice_timing", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum InvoiceTiming {
    /// Invoice as soon as the period starts
    PeriodStart,
    /// Invoice once the period has ended
    #[default]
    PeriodEnd,
}

impl InvoiceTiming {
    pub fn at_period_start(&self) -> bool {
        matches!(self, InvoiceTiming::PeriodStart)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub customer: String,
    pub currency: String,
    pub interval: BillingInterval,
    pub interval_count: u32,
    pub start_date: NaiveDate,
    pub trial_start: Option<NaiveDate>,
    pub trial_end: Option<NaiveDate>,
    /// Cached current billing period, recomputed on every tick
    pub current_period: Option<BillingPeriod>,
    pub cancellation_date: Option<NaiveDate>,
    pub invoice_timing: InvoiceTiming,
    pub prorate_last_invoice: bool,
    pub auto_order: bool,
    pub auto_payment_request: bool,
    pub days_until_due: u32,
    pub additional_discount_percentage: Decimal,
    pub additional_discount_amount: Money,
    pub price_list: Option<String>,
    pub payment_channel: Option<PaymentChannelKind>,
    pub status: SubscriptionStatus,
    pub total: Money,
    pub grand_total: Money,
    pub last_error: Option<String>,
    /// Set once a cancelled subscription's last periods are all invoiced
    pub billing_closed: bool,
    pub plan_lines: Vec<PlanLine>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Subscription {
    pub fn has_trial(&self) -> bool {
        self.trial_start.is_some() && self.trial_end.is_some()
    }

    /// Whether the trial window covers `today`.
    pub fn in_trial(&self, today: NaiveDate) -> bool {
        match (self.trial_start, self.trial_end) {
            (Some(start), Some(end)) => start <= today && today <= end,
            _ => false,
        }
    }

    pub fn is_cancelled_on(&self, today: NaiveDate) -> bool {
        self.cancellation_date.is_some_and(|date| date <= today)
    }

    /// First day that can belong to a billing period.
    pub fn billing_start(&self) -> NaiveDate {
        match self.trial_end.and_then(|end| end.succ_opt()) {
            Some(after_trial) if self.trial_start.is_some() => self.start_date.max(after_trial),
            _ => self.start_date,
        }
    }

    /// Whether `period` is the last one this subscription will have.
    pub fn is_final_period(&self, period: &BillingPeriod) -> bool {
        self.cancellation_date.is_some_and(|date| date <= period.end)
    }

    /// Check the configuration before it is saved.
    pub fn validate(&self) -> Result<(), String> {
        if self.customer.trim().is_empty() {
            return Err("customer is required".into());
        }
        if self.currency.trim().is_empty() {
            return Err("currency is required".into());
        }
        if self.interval_count == 0 {
            return Err("billing interval count must be at least 1".into());
        }
        match (self.trial_start, self.trial_end) {
            (Some(start), Some(end)) if end < start => {
                return Err("trial end must not be before trial start".into());
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err("trial start and trial end must be set together".into());
            }
            _ => {}
        }
        if self.additional_discount_percentage < Decimal::ZERO
            || self.additional_discount_percentage > Decimal::ONE_HUNDRED
        {
            return Err("additional discount percentage must be between 0 and 100".into());
        }
        if self.additional_discount_amount < Decimal::ZERO {
            return Err("additional discount amount must not be negative".into());
        }
        if self.plan_lines.is_empty() {
            return Err("at least one plan line is required".into());
        }
        for line in &self.plan_lines {
            line.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_plan_line, create_test_subscription, date};

    #[test]
    fn test_trial_window() {
        let sub = create_test_subscription(|s| {
            s.trial_start = Some(date(2024, 1, 1));
            s.trial_end = Some(date(2024, 1, 5));
        });
        assert!(sub.in_trial(date(2024, 1, 1)));
        assert!(sub.in_trial(date(2024, 1, 5)));
        assert!(!sub.in_trial(date(2024, 1, 6)));
        assert_eq!(sub.billing_start(), date(2024, 1, 6));
    }

    #[test]
    fn test_billing_start_without_trial() {
        let sub = create_test_subscription(|s| s.start_date = date(2024, 3, 10));
        assert_eq!(sub.billing_start(), date(2024, 3, 10));
    }

    #[test]
    fn test_billing_start_prefers_later_start_date() {
        let sub = create_test_subscription(|s| {
            s.start_date = date(2024, 2, 1);
            s.trial_start = Some(date(2024, 1, 1));
            s.trial_end = Some(date(2024, 1, 5));
        });
        assert_eq!(sub.billing_start(), date(2024, 2, 1));
    }

    #[test]
    fn test_cancelled_on() {
        let sub = create_test_subscription(|s| s.cancellation_date = Some(date(2024, 1, 15)));
        assert!(!sub.is_cancelled_on(date(2024, 1, 14)));
        assert!(sub.is_cancelled_on(date(2024, 1, 15)));
    }

    #[test]
    fn test_validate_rejects_bad_configuration() {
        let sub = create_test_subscription(|s| s.interval_count = 0);
        assert!(sub.validate().is_err());

        let sub = create_test_subscription(|s| {
            s.trial_start = Some(date(2024, 1, 10));
            s.trial_end = Some(date(2024, 1, 1));
        });
        assert!(sub.validate().is_err());

        let sub = create_test_subscription(|s| s.trial_start = Some(date(2024, 1, 10)));
        assert!(sub.validate().is_err());

        let sub = create_test_subscription(|s| s.plan_lines.clear());
        assert!(sub.validate().is_err());

        let sub = create_test_subscription(|s| {
            s.additional_discount_percentage = Decimal::from(120);
        });
        assert!(sub.validate().is_err());
    }

    #[test]
    fn test_validate_checks_plan_lines() {
        let sub = create_test_subscription(|s| {
            s.plan_lines = vec![create_test_plan_line(s.id, |l| l.fixed_rate = None)];
        });
        assert!(sub.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(create_test_subscription(|_| {}).validate().is_ok());
    }
}
