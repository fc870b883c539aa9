use std::sync::Arc;

use chrono::NaiveDate;
use recurring_types::{BillingPeriod, DocumentType, Money, SubscriptionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        billing::{
            period::{self, PeriodAdvance},
            rates,
            status::{self, PeriodDocuments},
        },
        ports::{
            clock::Clock, customer_notifier::CustomerStatusNotifier,
            document_store::DocumentStore, ledger::LedgerStore, pricing::PricingService,
        },
    },
    domain::entities::{
        generated_document::DocumentRef, lifecycle_event::LifecycleEvent,
        subscription::Subscription,
    },
};

use super::{
    document_generators::{
        DocumentGenerators, GenerationError, GenerationOutcome, GenerationResult, build_invoice,
    },
    payment_channel_factory::PaymentChannelFactory,
    subscription::SubscriptionRepo,
};

/// Switches for a single billing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Skip the customer status refresh
    pub mute_notifications: bool,
    /// Create no payment requests or payments
    pub mute_payment_channels: bool,
    /// Compute period, totals and status without persisting or generating anything
    pub simulate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocument {
    pub document_type: DocumentType,
    pub document_ref: DocumentRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub subscription_id: Uuid,
    pub period: Option<BillingPeriod>,
    pub period_advanced: bool,
    pub status: SubscriptionStatus,
    pub total: Money,
    pub grand_total: Money,
    /// Grand total of the invoice a real run would generate now
    pub projected_invoice_total: Option<Money>,
    /// Documents created during this run
    pub documents: Vec<GeneratedDocument>,
    pub simulated: bool,
}

impl ProcessOutcome {
    fn new(subscription_id: Uuid, simulated: bool) -> Self {
        Self {
            subscription_id,
            period: None,
            period_advanced: false,
            status: SubscriptionStatus::default(),
            total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            projected_invoice_total: None,
            documents: Vec::new(),
            simulated,
        }
    }

    fn record(&mut self, document_type: DocumentType, outcome: &GenerationOutcome) {
        if let GenerationOutcome::Created(reference) = outcome {
            self.documents.push(GeneratedDocument {
                document_type,
                document_ref: reference.clone(),
            });
        }
    }

    fn finish(mut self, subscription: &Subscription) -> Self {
        self.period = subscription.current_period;
        self.status = subscription.status;
        self.total = subscription.total;
        self.grand_total = subscription.grand_total;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub subscription_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed + self.failed.len()
    }
}

/// Per-tick billing pipeline for subscriptions.
pub struct BillingCycleUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    ledger: Arc<dyn LedgerStore>,
    documents: Arc<dyn DocumentStore>,
    pricing: Arc<dyn PricingService>,
    notifier: Arc<dyn CustomerStatusNotifier>,
    channels: Arc<PaymentChannelFactory>,
    clock: Arc<dyn Clock>,
    generators: DocumentGenerators,
}

impl BillingCycleUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentStore>,
        pricing: Arc<dyn PricingService>,
        notifier: Arc<dyn CustomerStatusNotifier>,
        channels: Arc<PaymentChannelFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let generators = DocumentGenerators::new(ledger.clone(), documents.clone(), clock.clone());
        Self {
            subscriptions,
            ledger,
            documents,
            pricing,
            notifier,
            channels,
            clock,
            generators,
        }
    }

    /// Run one billing tick for a subscription.
    ///
    /// A fatal invoice failure is persisted as `BillingFailed` and returned
    /// as `AppError::BillingFailed`. Pricing, collection and notification
    /// failures are logged and never abort the tick.
    pub async fn process(&self, id: Uuid, options: ProcessOptions) -> AppResult<ProcessOutcome> {
        let mut subscription = self
            .subscriptions
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)?;
        let today = self.clock.today();
        let persist = !options.simulate;
        let mut outcome = ProcessOutcome::new(id, options.simulate);

        let advance = period::advance(&subscription, today)?;
        if advance.changed {
            self.apply_period(&mut subscription, &advance, persist).await?;
            outcome.period_advanced = advance.is_rollover();
        }

        let previous = self.previous_period(&subscription, &advance).await?;
        let billed = status::billed_period(&subscription, previous);

        rates::refresh_plan_lines(self.pricing.as_ref(), &mut subscription, today).await;
        let totals = rates::totals(
            &subscription,
            billed.or(subscription.current_period).map(|p| p.start),
        );
        subscription.total = totals.total;
        subscription.grand_total = totals.grand_total;
        if persist {
            if let Err(e) = self.persist_rates(&subscription).await {
                warn!(subscription_id = %id, error = %e, "Failed to persist plan rates");
            }
        }

        let documents = self.period_documents(id, billed).await?;
        let resolved = self.resolve(&subscription, today, &documents).await?;
        let failed_before = subscription.status == SubscriptionStatus::BillingFailed;
        if !failed_before {
            self.set_status(&mut subscription, resolved, None, persist)
                .await?;
        }

        let targets = self
            .invoice_targets(&subscription, today, resolved, &documents)
            .await?;

        if options.simulate {
            outcome.projected_invoice_total = targets
                .first()
                .map(|period| build_invoice(&subscription, period, None).grand_total);
            debug!(subscription_id = %id, status = %resolved, "Simulated billing run");
            return Ok(outcome.finish(&subscription));
        }

        let result = if !targets.is_empty() {
            self.run_invoicing(&mut subscription, today, resolved, &targets, &mut outcome)
                .await
        } else {
            if failed_before {
                self.set_status(&mut subscription, resolved, None, true)
                    .await?;
            }
            if resolved == SubscriptionStatus::Payable {
                self.run_collection(&mut subscription, today, documents, options, &mut outcome)
                    .await?;
            }
            Ok(())
        };

        if result.is_ok() {
            if let Err(e) = self.close_billing_if_settled(&mut subscription).await {
                warn!(subscription_id = %id, error = %e, "Failed to close billing");
            }
        }

        if !options.mute_notifications {
            self.notify(&subscription).await;
        }

        result.map(|()| outcome.finish(&subscription))
    }

    /// Process every subscription still to be billed, at most
    /// `max_concurrent` at a time. One subscription's failure never stops
    /// the batch.
    pub async fn process_all(
        self: &Arc<Self>,
        options: ProcessOptions,
        batch_size: i64,
        max_concurrent: usize,
    ) -> AppResult<BatchReport> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut report = BatchReport::default();
        let mut after = None;

        loop {
            let ids = self.subscriptions.list_processable(after, batch_size).await?;
            let Some(last) = ids.last().copied() else {
                break;
            };
            let page_len = ids.len();

            let mut handles = Vec::with_capacity(page_len);
            for id in ids {
                let uc = Arc::clone(self);
                let sem = Arc::clone(&semaphore);
                handles.push((
                    id,
                    tokio::spawn(async move {
                        let Ok(_permit) = sem.acquire().await else {
                            return Err(AppError::Internal("billing worker pool closed".into()));
                        };
                        uc.process(id, options).await
                    }),
                ));
            }

            for (id, handle) in handles {
                match handle.await {
                    Ok(Ok(_)) => report.processed += 1,
                    Ok(Err(e)) => {
                        warn!(subscription_id = %id, error = %e, "Subscription billing failed");
                        report.failed.push(BatchFailure {
                            subscription_id: id,
                            error: e.to_string(),
                        });
                    }
                    Err(e) => {
                        error!(subscription_id = %id, error = %e, "Billing task panicked");
                        report.failed.push(BatchFailure {
                            subscription_id: id,
                            error: "billing task panicked".to_string(),
                        });
                    }
                }
            }

            if (page_len as i64) < batch_size {
                break;
            }
            after = Some(last);
        }

        debug!(
            processed = report.processed,
            failed = report.failed.len(),
            "Billing run finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Pipeline steps
    // ------------------------------------------------------------------------

    async fn apply_period(
        &self,
        subscription: &mut Subscription,
        advance: &PeriodAdvance,
        persist: bool,
    ) -> AppResult<()> {
        subscription.current_period = advance.period;
        if !persist {
            return Ok(());
        }

        self.subscriptions
            .update_period(subscription.id, advance.period)
            .await?;
        if let (true, Some(period)) = (advance.is_rollover(), advance.period) {
            self.ledger
                .append(&LifecycleEvent::period_advanced(
                    subscription.id,
                    period,
                    advance.previous,
                    self.clock.now(),
                ))
                .await?;
            info!(
                subscription_id = %subscription.id,
                period = %period,
                "Billing period advanced"
            );
        }
        Ok(())
    }

    async fn previous_period(
        &self,
        subscription: &Subscription,
        advance: &PeriodAdvance,
    ) -> AppResult<Option<BillingPeriod>> {
        if advance.is_rollover() {
            return Ok(advance.previous);
        }
        let Some(current) = subscription.current_period else {
            return Ok(None);
        };
        match self
            .ledger
            .find_period_change(subscription.id, &current)
            .await?
        {
            Some(event) => Ok(event.previous_period),
            None => period::preceding(subscription, &current),
        }
    }

    async fn persist_rates(&self, subscription: &Subscription) -> AppResult<()> {
        self.subscriptions
            .update_plan_lines(&subscription.plan_lines)
            .await?;
        self.subscriptions
            .update_totals(subscription.id, subscription.total, subscription.grand_total)
            .await
    }

    async fn document_ref(
        &self,
        id: Uuid,
        document_type: DocumentType,
        period: &BillingPeriod,
    ) -> AppResult<Option<DocumentRef>> {
        Ok(self
            .ledger
            .find_event(id, document_type, period)
            .await?
            .and_then(|event| event.document_ref))
    }

    async fn period_documents(
        &self,
        id: Uuid,
        billed: Option<BillingPeriod>,
    ) -> AppResult<PeriodDocuments> {
        let mut documents = PeriodDocuments::for_period(billed);
        let Some(period) = billed else {
            return Ok(documents);
        };
        documents.order = self.document_ref(id, DocumentType::Order, &period).await?;
        documents.invoice = self.document_ref(id, DocumentType::Invoice, &period).await?;
        documents.payment_request = self
            .document_ref(id, DocumentType::PaymentRequest, &period)
            .await?;
        documents.payment = self.document_ref(id, DocumentType::Payment, &period).await?;
        Ok(documents)
    }

    async fn resolve(
        &self,
        subscription: &Subscription,
        today: NaiveDate,
        documents: &PeriodDocuments,
    ) -> AppResult<SubscriptionStatus> {
        let outstanding = self.documents.outstanding_amount(subscription.id).await?;
        Ok(status::resolve(subscription, today, documents, outstanding))
    }

    /// Persist a status change and record it in the ledger. Same status is a no-op.
    async fn set_status(
        &self,
        subscription: &mut Subscription,
        to: SubscriptionStatus,
        message: Option<String>,
        persist: bool,
    ) -> AppResult<()> {
        let from = subscription.status;
        if from == to {
            return Ok(());
        }

        subscription.status = to;
        subscription.last_error = message.clone();
        if !persist {
            return Ok(());
        }

        self.subscriptions
            .update_status(subscription.id, to, subscription.last_error.as_deref())
            .await?;
        self.ledger
            .append(&LifecycleEvent::status_changed(
                subscription.id,
                subscription.current_period,
                from,
                to,
                message,
                self.clock.now(),
            ))
            .await?;
        info!(
            subscription_id = %subscription.id,
            from = %from,
            to = %to,
            "Subscription status changed"
        );
        Ok(())
    }

    /// Periods whose invoice should be generated on this tick.
    ///
    /// A cancelled subscription also invoices its final period right away.
    async fn invoice_targets(
        &self,
        subscription: &Subscription,
        today: NaiveDate,
        resolved: SubscriptionStatus,
        documents: &PeriodDocuments,
    ) -> AppResult<Vec<BillingPeriod>> {
        let billed_due = documents
            .billed_period
            .filter(|period| period.start <= today && documents.invoice.is_none());

        let mut targets: Vec<BillingPeriod> = Vec::new();
        match resolved {
            SubscriptionStatus::Billable => targets.extend(billed_due),
            SubscriptionStatus::Cancelled => {
                targets.extend(billed_due);
                if let Some(last) = subscription
                    .current_period
                    .filter(|period| subscription.is_final_period(period))
                {
                    let invoiced = self
                        .document_ref(subscription.id, DocumentType::Invoice, &last)
                        .await?
                        .is_some();
                    if !invoiced && !targets.contains(&last) {
                        targets.push(last);
                    }
                }
            }
            _ => {}
        }
        Ok(targets)
    }

    async fn run_invoicing(
        &self,
        subscription: &mut Subscription,
        today: NaiveDate,
        resolved: SubscriptionStatus,
        targets: &[BillingPeriod],
        outcome: &mut ProcessOutcome,
    ) -> AppResult<()> {
        let cancelling = resolved == SubscriptionStatus::Cancelled;
        let mut complete = true;

        for period in targets {
            if !cancelling {
                match self.generators.generate_order(subscription, period).await {
                    Ok(generated) => outcome.record(DocumentType::Order, &generated),
                    Err(e) => warn!(
                        subscription_id = %subscription.id,
                        period = %period,
                        error = %e,
                        "Order generation failed"
                    ),
                }
            }

            match self.generators.generate_invoice(subscription, period).await {
                Ok(generated) => outcome.record(DocumentType::Invoice, &generated),
                Err(e) if e.is_fatal() => {
                    return Err(self.fail_billing(subscription, e).await);
                }
                Err(e) => {
                    warn!(
                        subscription_id = %subscription.id,
                        period = %period,
                        error = %e,
                        "Invoice generation deferred"
                    );
                    // Later periods wait until this one is invoiced
                    complete = false;
                    break;
                }
            }
        }

        if !complete {
            return Ok(());
        }

        let billed = status::billed_period(
            subscription,
            self.previous_period(subscription, &PeriodAdvance::default())
                .await?,
        );
        let documents = self.period_documents(subscription.id, billed).await?;
        let resolved = self.resolve(subscription, today, &documents).await?;
        self.set_status(subscription, resolved, None, true).await
    }

    async fn fail_billing(&self, subscription: &mut Subscription, err: GenerationError) -> AppError {
        let message = err.to_string();
        error!(
            subscription_id = %subscription.id,
            error = %message,
            "Invoice generation failed"
        );

        if let Err(e) = self
            .set_status(
                subscription,
                SubscriptionStatus::BillingFailed,
                Some(message.clone()),
                true,
            )
            .await
        {
            error!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to record billing failure"
            );
        }

        AppError::BillingFailed {
            subscription_id: subscription.id,
            message,
        }
    }

    async fn run_collection(
        &self,
        subscription: &mut Subscription,
        today: NaiveDate,
        mut documents: PeriodDocuments,
        options: ProcessOptions,
        outcome: &mut ProcessOutcome,
    ) -> AppResult<()> {
        let Some(period) = documents.billed_period else {
            return Ok(());
        };

        if !subscription.is_cancelled_on(today) {
            match self.generators.generate_order(subscription, &period).await {
                Ok(generated) => {
                    outcome.record(DocumentType::Order, &generated);
                    if documents.order.is_none() {
                        documents.order = generated.document_ref().cloned();
                    }
                }
                Err(e) => warn!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "Order generation failed"
                ),
            }
        }

        if options.mute_payment_channels {
            debug!(subscription_id = %subscription.id, "Payment channels muted");
            return Ok(());
        }
        let Some((reference_type, reference)) = documents.collection_target() else {
            return Ok(());
        };

        let channel = self.channels.get(subscription.payment_channel);
        let (document_type, result): (DocumentType, GenerationResult) =
            if channel.supports_direct_debit() {
                (
                    DocumentType::Payment,
                    self.generators
                        .generate_payment(
                            subscription,
                            &period,
                            reference_type,
                            reference,
                            channel.as_ref(),
                        )
                        .await,
                )
            } else {
                (
                    DocumentType::PaymentRequest,
                    self.generators
                        .generate_collection_request(
                            subscription,
                            &period,
                            reference_type,
                            reference,
                            channel.as_ref(),
                        )
                        .await,
                )
            };

        match result {
            Ok(generated) => outcome.record(document_type, &generated),
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    document_type = %document_type,
                    error = %e,
                    "Collection deferred"
                );
                return Ok(());
            }
        }

        let documents = self
            .period_documents(subscription.id, documents.billed_period)
            .await?;
        let resolved = self.resolve(subscription, today, &documents).await?;
        self.set_status(subscription, resolved, None, true).await
    }

    /// Close billing for a cancelled subscription once its final period, and
    /// with period-end invoicing the period before it, are invoiced.
    async fn close_billing_if_settled(&self, subscription: &mut Subscription) -> AppResult<()> {
        if subscription.billing_closed || subscription.status != SubscriptionStatus::Cancelled {
            return Ok(());
        }
        let Some(last) = subscription
            .current_period
            .filter(|period| subscription.is_final_period(period))
        else {
            return Ok(());
        };

        let mut periods = vec![last];
        if !subscription.invoice_timing.at_period_start() {
            periods.extend(
                self.previous_period(subscription, &PeriodAdvance::default())
                    .await?,
            );
        }
        for period in &periods {
            let invoiced = self
                .document_ref(subscription.id, DocumentType::Invoice, period)
                .await?
                .is_some();
            if !invoiced {
                return Ok(());
            }
        }

        self.subscriptions.close_billing(subscription.id).await?;
        subscription.billing_closed = true;
        info!(
            subscription_id = %subscription.id,
            period = %last,
            "Final billing period invoiced, billing closed"
        );
        Ok(())
    }

    async fn notify(&self, subscription: &Subscription) {
        if let Err(e) = self.notifier.refresh(&subscription.customer).await {
            warn!(
                subscription_id = %subscription.id,
                customer = %subscription.customer,
                error = %e,
                "Customer status refresh failed"
            );
        }
    }
}
