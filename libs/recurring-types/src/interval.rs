use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{ParseEnumError, PeriodError};

/// Unit of a subscription's billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Last day of a period of `count` intervals beginning on `start`.
    ///
    /// Month and year arithmetic keeps the day-of-month of `start` and clamps
    /// to the last day of the target month when that day does not exist.
    pub fn period_end(&self, start: NaiveDate, count: u32) -> Result<NaiveDate, PeriodError> {
        if count == 0 {
            return Err(PeriodError::InvalidIntervalCount(count));
        }

        let next_start = match self {
            Self::Day => start.checked_add_days(Days::new(u64::from(count))),
            Self::Week => start.checked_add_days(Days::new(7 * u64::from(count))),
            Self::Month => start.checked_add_months(Months::new(count)),
            Self::Year => count
                .checked_mul(12)
                .and_then(|months| start.checked_add_months(Months::new(months))),
        };

        next_start
            .and_then(|d| d.pred_opt())
            .ok_or(PeriodError::OutOfRange)
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "yearly" => Ok(Self::Year),
            other => Err(ParseEnumError::new("billing interval", other)),
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_and_weekly_ends() {
        assert_eq!(
            BillingInterval::Day.period_end(date(2024, 1, 1), 1).unwrap(),
            date(2024, 1, 1)
        );
        assert_eq!(
            BillingInterval::Day.period_end(date(2024, 1, 1), 3).unwrap(),
            date(2024, 1, 3)
        );
        assert_eq!(
            BillingInterval::Week.period_end(date(2024, 1, 1), 2).unwrap(),
            date(2024, 1, 14)
        );
    }

    #[test]
    fn monthly_end_keeps_day_of_month() {
        assert_eq!(
            BillingInterval::Month.period_end(date(2024, 1, 1), 1).unwrap(),
            date(2024, 1, 31)
        );
        assert_eq!(
            BillingInterval::Month.period_end(date(2024, 1, 15), 1).unwrap(),
            date(2024, 2, 14)
        );
        assert_eq!(
            BillingInterval::Month.period_end(date(2024, 1, 1), 3).unwrap(),
            date(2024, 3, 31)
        );
    }

    #[test]
    fn monthly_end_clamps_to_month_end() {
        // Jan 31 + 1 month clamps to Feb 29 in a leap year; the period ends the day before
        assert_eq!(
            BillingInterval::Month.period_end(date(2024, 1, 31), 1).unwrap(),
            date(2024, 2, 28)
        );
    }

    #[test]
    fn yearly_end() {
        assert_eq!(
            BillingInterval::Year.period_end(date(2024, 3, 1), 1).unwrap(),
            date(2025, 2, 28)
        );
        assert_eq!(
            BillingInterval::Year.period_end(date(2024, 1, 1), 2).unwrap(),
            date(2025, 12, 31)
        );
    }

    #[test]
    fn zero_count_is_rejected() {
        assert_eq!(
            BillingInterval::Month.period_end(date(2024, 1, 1), 0),
            Err(PeriodError::InvalidIntervalCount(0))
        );
    }

    #[test]
    fn parse_accepts_adverb_forms() {
        assert_eq!("Monthly".parse::<BillingInterval>().unwrap(), BillingInterval::Month);
        assert_eq!("week".parse::<BillingInterval>().unwrap(), BillingInterval::Week);
        assert!("fortnight".parse::<BillingInterval>().is_err());
    }
}
