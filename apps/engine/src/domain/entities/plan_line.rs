use chrono::NaiveDate;
use recurring_types::{BillingPeriod, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// How a plan line's rate is determined.
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
#[sqlx(type_name = "price_determination", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PriceDetermination {
    /// Rate stored on the line
    #[default]
    Fixed,
    /// Rate looked up from the price list and pricing rules
    PriceList,
}

/// Where a plan line sits relative to today.
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
#[sqlx(type_name = "plan_line_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PlanLineStatus {
    #[default]
    Active,
    Upcoming,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLine {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub item_code: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub price_determination: PriceDetermination,
    pub fixed_rate: Option<Money>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: PlanLineStatus,
    /// Rate resolved on the last tick
    pub rate: Money,
    pub position: i32,
}

impl PlanLine {
    pub fn status_on(&self, today: NaiveDate) -> PlanLineStatus {
        if self.from_date.is_some_and(|from| from > today) {
            return PlanLineStatus::Upcoming;
        }
        if self.to_date.is_some_and(|to| to < today) {
            return PlanLineStatus::Inactive;
        }
        PlanLineStatus::Active
    }

    /// Whether the line still contributes to a period starting on `period_start`.
    pub fn ends_on_or_after(&self, period_start: NaiveDate) -> bool {
        self.to_date.is_none_or(|to| to >= period_start)
    }

    /// Whether the line's effective range overlaps `period`.
    pub fn is_effective_during(&self, period: &BillingPeriod) -> bool {
        self.from_date.is_none_or(|from| from <= period.end) && self.ends_on_or_after(period.start)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.item_code.trim().is_empty() {
            return Err("plan line item is required".into());
        }
        if self.quantity <= Decimal::ZERO {
            return Err(format!("quantity for {} must be positive", self.item_code));
        }
        if self.price_determination == PriceDetermination::Fixed {
            match self.fixed_rate {
                None => return Err(format!("fixed rate for {} is required", self.item_code)),
                Some(rate) if rate < Decimal::ZERO => {
                    return Err(format!("fixed rate for {} must not be negative", self.item_code));
                }
                _ => {}
            }
        }
        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if to < from {
                return Err(format!(
                    "end date of {} must not be before its start date",
                    self.item_code
                ));
            }
        }
        Ok(())
    }
}
