use chrono::NaiveDate;
use recurring_types::{BillingPeriod, DocumentType, Money, SubscriptionStatus};
use rust_decimal::Decimal;

use crate::domain::entities::{generated_document::DocumentRef, subscription::Subscription};

/// Documents generated for the period currently being billed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodDocuments {
    pub billed_period: Option<BillingPeriod>,
    pub order: Option<DocumentRef>,
    pub invoice: Option<DocumentRef>,
    pub payment_request: Option<DocumentRef>,
    pub payment: Option<DocumentRef>,
}

impl PeriodDocuments {
    pub fn for_period(period: Option<BillingPeriod>) -> Self {
        Self {
            billed_period: period,
            ..Self::default()
        }
    }

    /// Whether a request or a pulled payment exists for the period.
    pub fn has_collection(&self) -> bool {
        self.payment_request.is_some() || self.payment.is_some()
    }

    /// Invoice if one exists, else the order.
    pub fn collection_target(&self) -> Option<(DocumentType, &DocumentRef)> {
        self.invoice
            .as_ref()
            .map(|r| (DocumentType::Invoice, r))
            .or_else(|| self.order.as_ref().map(|r| (DocumentType::Order, r)))
    }
}

/// Period whose invoice is due: the current one when invoicing at period
/// start, the one that just closed when invoicing at period end.
pub fn billed_period(
    subscription: &Subscription,
    previous: Option<BillingPeriod>,
) -> Option<BillingPeriod> {
    if subscription.invoice_timing.at_period_start() {
        subscription.current_period
    } else {
        previous
    }
}

/// Derive the lifecycle status. First matching rule wins.
///
/// `BillingFailed` is never produced here; only the billing cycle sets and
/// clears it.
pub fn resolve(
    subscription: &Subscription,
    today: NaiveDate,
    documents: &PeriodDocuments,
    outstanding: Money,
) -> SubscriptionStatus {
    if subscription.is_cancelled_on(today) {
        return SubscriptionStatus::Cancelled;
    }
    if subscription.in_trial(today) {
        return SubscriptionStatus::Trial;
    }

    let started = documents
        .billed_period
        .is_some_and(|period| period.start <= today);
    if !started {
        return SubscriptionStatus::Active;
    }

    if documents.invoice.is_none() {
        return SubscriptionStatus::Billable;
    }
    if !documents.has_collection() && outstanding > Decimal::ZERO {
        return SubscriptionStatus::Payable;
    }
    if outstanding > Decimal::ZERO {
        return SubscriptionStatus::Unpaid;
    }
    SubscriptionStatus::Paid
}
