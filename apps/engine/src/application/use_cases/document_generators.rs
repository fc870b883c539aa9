use std::future::Future;
use std::sync::Arc;

use chrono::{Days, Duration, NaiveDate};
use recurring_types::{BillingPeriod, DocumentType, Money, round_money};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        billing::{
            proration,
            rates::{apply_discount, line_amount},
        },
        ports::{
            clock::Clock,
            document_store::DocumentStore,
            ledger::LedgerStore,
            payment_channel::{CollectionOutcome, PaymentChannel},
        },
    },
    domain::entities::{
        generated_document::{
            CollectionRequestDraft, DocumentLine, DocumentRef, InvoiceDraft, OrderDraft,
            PaymentDraft, net_total,
        },
        lifecycle_event::LifecycleEvent,
        plan_line::PlanLineStatus,
        subscription::Subscription,
    },
};

/// Reservations older than this are reported as stuck.
const STALE_RESERVATION_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Created(DocumentRef),
    /// The document already existed for the period
    Existing(DocumentRef),
    Skipped(&'static str),
}

impl GenerationOutcome {
    pub fn document_ref(&self) -> Option<&DocumentRef> {
        match self {
            GenerationOutcome::Created(r) | GenerationOutcome::Existing(r) => Some(r),
            GenerationOutcome::Skipped(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, GenerationOutcome::Created(_))
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{document_type} generation failed: {source}")]
    Fatal {
        document_type: DocumentType,
        #[source]
        source: AppError,
    },

    #[error("{document_type} generation failed and will be retried: {source}")]
    Retryable {
        document_type: DocumentType,
        #[source]
        source: AppError,
    },

    #[error("{document_type} for {period} is already being generated")]
    InProgress {
        document_type: DocumentType,
        period: BillingPeriod,
    },
}

impl GenerationError {
    /// Invoice failures are fatal, everything else is retried on the next tick.
    fn from_failure(document_type: DocumentType, source: AppError) -> Self {
        match document_type {
            DocumentType::Invoice => GenerationError::Fatal {
                document_type,
                source,
            },
            _ => GenerationError::Retryable {
                document_type,
                source,
            },
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::Fatal { .. })
    }
}

pub type GenerationResult = Result<GenerationOutcome, GenerationError>;

// ============================================================================
// Drafts
// ============================================================================

fn document_lines(subscription: &Subscription, period: &BillingPeriod) -> Vec<DocumentLine> {
    subscription
        .plan_lines
        .iter()
        .filter(|line| line.status != PlanLineStatus::Upcoming)
        .filter(|line| line.is_effective_during(period))
        .map(|line| DocumentLine {
            item_code: line.item_code.clone(),
            description: line.description.clone(),
            quantity: line.quantity,
            rate: line.rate,
            amount: line_amount(line.rate, line.quantity),
        })
        .collect()
}

fn prorate_lines(lines: Vec<DocumentLine>, factor: Decimal) -> Vec<DocumentLine> {
    lines
        .into_iter()
        .map(|line| {
            let rate = round_money(line.rate * factor);
            DocumentLine {
                amount: line_amount(rate, line.quantity),
                rate,
                ..line
            }
        })
        .collect()
}

/// Order for `period` at full rate.
pub fn build_order(subscription: &Subscription, period: &BillingPeriod) -> OrderDraft {
    let lines = document_lines(subscription, period);
    let grand_total = apply_discount(
        net_total(&lines),
        subscription.additional_discount_percentage,
        subscription.additional_discount_amount,
    );
    OrderDraft {
        subscription_id: subscription.id,
        customer: subscription.customer.clone(),
        currency: subscription.currency.clone(),
        period: *period,
        transaction_date: period.start,
        delivery_date: if subscription.invoice_timing.at_period_start() {
            period.start
        } else {
            period.end
        },
        lines,
        additional_discount_percentage: subscription.additional_discount_percentage,
        additional_discount_amount: subscription.additional_discount_amount,
        grand_total,
    }
}

fn invoice_posting_date(subscription: &Subscription, period: &BillingPeriod) -> NaiveDate {
    if subscription.invoice_timing.at_period_start() {
        return period.start;
    }
    match subscription.cancellation_date {
        Some(date) if period.contains(date) => date,
        _ => period.end,
    }
}

/// Invoice for `period`, derived from the period's order when one exists.
///
/// The last invoice of a cancelled subscription is prorated when requested.
pub fn build_invoice(
    subscription: &Subscription,
    period: &BillingPeriod,
    order: Option<(&DocumentRef, &OrderDraft)>,
) -> InvoiceDraft {
    let (lines, source_order) = match order {
        Some((reference, draft)) => (draft.lines.clone(), Some(reference.clone())),
        None => (document_lines(subscription, period), None),
    };
    let lines = match proration::invoice_factor(subscription, period) {
        Some(factor) if factor < Decimal::ONE => prorate_lines(lines, factor),
        _ => lines,
    };
    let grand_total = apply_discount(
        net_total(&lines),
        subscription.additional_discount_percentage,
        subscription.additional_discount_amount,
    );
    let posting_date = invoice_posting_date(subscription, period);
    let due_date = posting_date
        .checked_add_days(Days::new(u64::from(subscription.days_until_due)))
        .unwrap_or(posting_date);

    InvoiceDraft {
        subscription_id: subscription.id,
        customer: subscription.customer.clone(),
        currency: subscription.currency.clone(),
        period: *period,
        posting_date,
        due_date,
        lines,
        additional_discount_percentage: subscription.additional_discount_percentage,
        additional_discount_amount: subscription.additional_discount_amount,
        grand_total,
        source_order,
    }
}

// ============================================================================
// Generators
// ============================================================================

/// Creates documents at most once per (subscription, document type, period).
///
/// Each document is guarded by a ledger reservation taken before the
/// document is created. The reservation is completed with the document
/// reference on success and released on failure.
pub struct DocumentGenerators {
    ledger: Arc<dyn LedgerStore>,
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl DocumentGenerators {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            documents,
            clock,
        }
    }

    pub async fn generate_order(
        &self,
        subscription: &Subscription,
        period: &BillingPeriod,
    ) -> GenerationResult {
        if !subscription.auto_order {
            return Ok(GenerationOutcome::Skipped("automatic orders are disabled"));
        }
        let draft = build_order(subscription, period);
        self.generate_once(subscription.id, DocumentType::Order, period, || {
            self.documents.create_order(&draft)
        })
        .await
    }

    pub async fn generate_invoice(
        &self,
        subscription: &Subscription,
        period: &BillingPeriod,
    ) -> GenerationResult {
        let fail = |source| GenerationError::from_failure(DocumentType::Invoice, source);

        let order_ref = self
            .ledger
            .find_event(subscription.id, DocumentType::Order, period)
            .await
            .map_err(fail)?
            .and_then(|event| event.document_ref);
        let order = match &order_ref {
            Some(reference) => self
                .documents
                .get_order(reference)
                .await
                .map_err(fail)?
                .map(|draft| (reference, draft)),
            None => None,
        };

        let draft = build_invoice(
            subscription,
            period,
            order.as_ref().map(|(reference, draft)| (*reference, draft)),
        );
        self.generate_once(subscription.id, DocumentType::Invoice, period, || {
            self.documents.create_invoice(&draft)
        })
        .await
    }

    /// Pull the outstanding amount of `reference` through a direct debit channel.
    pub async fn generate_payment(
        &self,
        subscription: &Subscription,
        period: &BillingPeriod,
        reference_type: DocumentType,
        reference: &DocumentRef,
        channel: &dyn PaymentChannel,
    ) -> GenerationResult {
        let amount = self
            .documents
            .document_outstanding(reference_type, reference)
            .await
            .map_err(|e| GenerationError::from_failure(DocumentType::Payment, e))?;
        if amount <= Decimal::ZERO {
            return Ok(GenerationOutcome::Skipped("nothing outstanding"));
        }

        let draft = PaymentDraft {
            subscription_id: subscription.id,
            customer: subscription.customer.clone(),
            currency: subscription.currency.clone(),
            period: *period,
            posting_date: self.clock.today(),
            amount,
            reference_type,
            reference: reference.clone(),
            channel: channel.kind(),
            paid_to_account: channel.settlement_account(),
            transaction_ref: None,
        };
        self.generate_once(subscription.id, DocumentType::Payment, period, || {
            self.documents.create_payment(&draft)
        })
        .await
    }

    /// Request the outstanding amount of `reference` through `channel`.
    ///
    /// Channels that can collect off-session are charged right away and a
    /// collected amount is recorded as a payment. Collection failures are
    /// logged and leave the request in place.
    pub async fn generate_collection_request(
        &self,
        subscription: &Subscription,
        period: &BillingPeriod,
        reference_type: DocumentType,
        reference: &DocumentRef,
        channel: &dyn PaymentChannel,
    ) -> GenerationResult {
        if !subscription.auto_payment_request {
            return Ok(GenerationOutcome::Skipped(
                "automatic payment requests are disabled",
            ));
        }

        let amount = self
            .documents
            .document_outstanding(reference_type, reference)
            .await
            .map_err(|e| GenerationError::from_failure(DocumentType::PaymentRequest, e))?;
        if amount <= Decimal::ZERO {
            return Ok(GenerationOutcome::Skipped("nothing to collect"));
        }

        let draft = CollectionRequestDraft {
            subscription_id: subscription.id,
            customer: subscription.customer.clone(),
            currency: subscription.currency.clone(),
            period: *period,
            request_date: self.clock.today(),
            amount,
            reference_type,
            reference: reference.clone(),
            channel: channel.kind(),
        };
        let outcome = self
            .generate_once(subscription.id, DocumentType::PaymentRequest, period, || {
                self.documents.create_collection_request(&draft)
            })
            .await?;

        if let GenerationOutcome::Created(request_ref) = &outcome {
            if channel.supports_immediate_collection() {
                self.collect_immediately(subscription, &draft, request_ref, channel)
                    .await;
            }
        }

        Ok(outcome)
    }

    async fn collect_immediately(
        &self,
        subscription: &Subscription,
        draft: &CollectionRequestDraft,
        request_ref: &DocumentRef,
        channel: &dyn PaymentChannel,
    ) {
        match channel.collect_immediately(draft, request_ref).await {
            Ok(CollectionOutcome::Collected {
                amount,
                transaction_ref,
            }) => {
                if let Err(e) = self
                    .record_collected_payment(subscription, draft, channel, amount, transaction_ref)
                    .await
                {
                    warn!(
                        subscription_id = %subscription.id,
                        request = %request_ref,
                        error = %e,
                        "Failed to record collected payment"
                    );
                }
            }
            Ok(CollectionOutcome::Pending) => {
                info!(
                    subscription_id = %subscription.id,
                    request = %request_ref,
                    "Immediate collection pending"
                );
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    request = %request_ref,
                    channel = %channel.kind(),
                    error = %e,
                    "Immediate collection failed"
                );
            }
        }
    }

    async fn record_collected_payment(
        &self,
        subscription: &Subscription,
        request: &CollectionRequestDraft,
        channel: &dyn PaymentChannel,
        amount: Money,
        transaction_ref: String,
    ) -> GenerationResult {
        let draft = PaymentDraft {
            subscription_id: subscription.id,
            customer: request.customer.clone(),
            currency: request.currency.clone(),
            period: request.period,
            posting_date: self.clock.today(),
            amount,
            reference_type: request.reference_type,
            reference: request.reference.clone(),
            channel: channel.kind(),
            paid_to_account: channel.settlement_account(),
            transaction_ref: Some(transaction_ref),
        };
        self.generate_once(subscription.id, DocumentType::Payment, &request.period, || {
            self.documents.create_payment(&draft)
        })
        .await
    }

    /// Claim the (subscription, document type, period) slot, then create.
    async fn generate_once<F, Fut>(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        period: &BillingPeriod,
        create: F,
    ) -> GenerationResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<DocumentRef>>,
    {
        let fail = move |source| GenerationError::from_failure(document_type, source);

        if let Some(existing) = self
            .ledger
            .find_event(subscription_id, document_type, period)
            .await
            .map_err(fail)?
        {
            if let Some(reference) = existing.document_ref {
                return Ok(GenerationOutcome::Existing(reference));
            }
            self.report_if_stale(&existing);
            return Err(GenerationError::InProgress {
                document_type,
                period: *period,
            });
        }

        let reservation = LifecycleEvent::document_reservation(
            subscription_id,
            document_type,
            *period,
            self.clock.now(),
        );
        if !self
            .ledger
            .insert_event_if_absent(&reservation)
            .await
            .map_err(fail)?
        {
            return Err(GenerationError::InProgress {
                document_type,
                period: *period,
            });
        }

        let reference = match create().await {
            Ok(reference) => reference,
            Err(e) => {
                if let Err(release_err) = self.ledger.release_reservation(reservation.id).await {
                    error!(
                        subscription_id = %subscription_id,
                        document_type = %document_type,
                        error = %release_err,
                        "Failed to release document reservation"
                    );
                }
                return Err(fail(e));
            }
        };

        if let Err(e) = self.ledger.attach_document(reservation.id, &reference).await {
            // The reservation stays pending so the document is never created twice
            error!(
                subscription_id = %subscription_id,
                document_type = %document_type,
                document = %reference,
                error = %e,
                "Document created but not recorded in ledger"
            );
            return Err(fail(e));
        }

        info!(
            subscription_id = %subscription_id,
            document_type = %document_type,
            document = %reference,
            period = %period,
            "Document generated"
        );
        Ok(GenerationOutcome::Created(reference))
    }

    fn report_if_stale(&self, reservation: &LifecycleEvent) {
        let age = self.clock.now() - reservation.created_at;
        if age > Duration::minutes(STALE_RESERVATION_MINUTES) {
            warn!(
                subscription_id = %reservation.subscription_id,
                event_id = %reservation.id,
                age_minutes = age.num_minutes(),
                "Document reservation is stuck and needs manual review"
            );
        }
    }
}
