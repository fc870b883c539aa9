use chrono::NaiveDate;
use recurring_types::BillingPeriod;

use crate::{app_error::AppResult, domain::entities::subscription::Subscription};

/// Result of recomputing a subscription's current period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodAdvance {
    pub period: Option<BillingPeriod>,
    /// Period that was closed by this advance
    pub previous: Option<BillingPeriod>,
    pub changed: bool,
    /// First period of a subscription that had none
    pub newly_created: bool,
}

impl PeriodAdvance {
    fn unchanged(period: Option<BillingPeriod>) -> Self {
        Self {
            period,
            previous: None,
            changed: false,
            newly_created: false,
        }
    }

    /// Whether a `PeriodAdvanced` event should be recorded.
    pub fn is_rollover(&self) -> bool {
        self.changed && !self.newly_created
    }
}

/// Recompute the current billing period as of `today`.
///
/// No period exists while the trial window covers `today`. A period that
/// has ended rolls over by exactly one interval per call, using the interval
/// configuration in effect at the time of the call. Once the cancellation
/// date falls within the current period it never rolls over again.
pub fn advance(subscription: &Subscription, today: NaiveDate) -> AppResult<PeriodAdvance> {
    if subscription.in_trial(today) {
        return Ok(PeriodAdvance::unchanged(None));
    }

    let Some(current) = subscription.current_period else {
        let first = BillingPeriod::starting_at(
            subscription.billing_start(),
            subscription.interval,
            subscription.interval_count,
        )?;
        return Ok(PeriodAdvance {
            period: Some(first),
            previous: None,
            changed: true,
            newly_created: true,
        });
    };

    if today <= current.end || subscription.is_final_period(&current) {
        return Ok(PeriodAdvance::unchanged(Some(current)));
    }

    let next = current.following(subscription.interval, subscription.interval_count)?;
    Ok(PeriodAdvance {
        period: Some(next),
        previous: Some(current),
        changed: next != current,
        newly_created: false,
    })
}

/// Period immediately before `current`, rebuilt from the billing start.
///
/// Used when the ledger holds no rollover record for `current`. Returns
/// `None` for the first period or when the rebuilt periods do not line up
/// with `current`.
pub fn preceding(
    subscription: &Subscription,
    current: &BillingPeriod,
) -> AppResult<Option<BillingPeriod>> {
    let mut period = BillingPeriod::starting_at(
        subscription.billing_start(),
        subscription.interval,
        subscription.interval_count,
    )?;
    let mut previous = None;
    while period.end < current.start {
        previous = Some(period);
        period = period.following(subscription.interval, subscription.interval_count)?;
    }
    Ok(previous.filter(|p| p.is_followed_by(current)))
}

/// Date on which the next invoice will be generated, if any.
pub fn next_invoice_date(
    subscription: &Subscription,
    today: NaiveDate,
    previous: Option<&BillingPeriod>,
    previous_invoiced: bool,
    current_invoiced: bool,
) -> AppResult<Option<NaiveDate>> {
    let Some(current) = subscription.current_period else {
        let first = BillingPeriod::starting_at(
            subscription.billing_start(),
            subscription.interval,
            subscription.interval_count,
        )?;
        return Ok(Some(if subscription.invoice_timing.at_period_start() {
            first.start
        } else {
            first.next_start()?
        }));
    };

    let is_final = subscription.is_final_period(&current);

    if subscription.invoice_timing.at_period_start() {
        if !current_invoiced {
            return Ok(Some(current.start.max(today)));
        }
        return Ok(if is_final {
            None
        } else {
            Some(current.next_start()?)
        });
    }

    if previous.is_some() && !previous_invoiced {
        return Ok(Some(today));
    }
    match (is_final, current_invoiced, subscription.cancellation_date) {
        (true, true, _) => Ok(None),
        (true, false, Some(cancellation)) => Ok(Some(cancellation.max(today))),
        _ => Ok(Some(current.next_start()?)),
    }
}
