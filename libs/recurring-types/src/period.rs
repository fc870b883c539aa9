use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::PeriodError;
use crate::interval::BillingInterval;

/// Inclusive date range a subscription is billed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if end < start {
            return Err(PeriodError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// Period of `count` intervals beginning on `start`.
    pub fn starting_at(
        start: NaiveDate,
        interval: BillingInterval,
        count: u32,
    ) -> Result<Self, PeriodError> {
        let end = interval.period_end(start, count)?;
        Ok(Self { start, end })
    }

    /// Number of days in the period, both ends included.
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First day after the period.
    pub fn next_start(&self) -> Result<NaiveDate, PeriodError> {
        self.end.succ_opt().ok_or(PeriodError::OutOfRange)
    }

    /// Period immediately following this one.
    pub fn following(&self, interval: BillingInterval, count: u32) -> Result<Self, PeriodError> {
        Self::starting_at(self.next_start()?, interval, count)
    }

    /// Whether `next` begins the day after this period ends.
    pub fn is_followed_by(&self, next: &BillingPeriod) -> bool {
        self.end.succ_opt() == Some(next.start)
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
