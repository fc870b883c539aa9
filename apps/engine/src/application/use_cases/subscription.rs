use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use recurring_types::{BillingInterval, BillingPeriod, DocumentType, Money, SubscriptionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        billing::period,
        ports::{clock::Clock, ledger::LedgerStore},
    },
    domain::entities::{
        generated_document::DocumentRef,
        lifecycle_event::LifecycleEvent,
        payment_channel::PaymentChannelKind,
        plan_line::{PlanLine, PlanLineStatus, PriceDetermination},
        subscription::{InvoiceTiming, Subscription},
    },
};

use super::payment_channel_factory::PaymentChannelFactory;

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlanLineInput {
    pub item_code: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub price_determination: PriceDetermination,
    pub fixed_rate: Option<Money>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionInput {
    pub customer: String,
    pub currency: String,
    pub interval: BillingInterval,
    pub interval_count: u32,
    pub start_date: NaiveDate,
    pub trial_start: Option<NaiveDate>,
    pub trial_end: Option<NaiveDate>,
    pub invoice_timing: InvoiceTiming,
    pub prorate_last_invoice: bool,
    pub auto_order: bool,
    pub auto_payment_request: bool,
    pub days_until_due: u32,
    pub additional_discount_percentage: Decimal,
    pub additional_discount_amount: Money,
    pub price_list: Option<String>,
    pub payment_channel: Option<PaymentChannelKind>,
    pub plan_lines: Vec<CreatePlanLineInput>,
}

/// When a cancellation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAt {
    Now,
    /// Last day of the current period
    PeriodEnd,
    Date(NaiveDate),
}

// ============================================================================
// Repository
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn create(&self, subscription: &Subscription) -> AppResult<Subscription>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    /// Ids of subscriptions still to be billed (not cancelled, or cancelled
    /// with billing not yet closed), ordered by id, starting after `after`.
    async fn list_processable(&self, after: Option<Uuid>, limit: i64) -> AppResult<Vec<Uuid>>;
    async fn update_period(&self, id: Uuid, period: Option<BillingPeriod>) -> AppResult<()>;
    /// Stop batch runs from picking up a fully billed cancelled subscription.
    async fn close_billing(&self, id: Uuid) -> AppResult<()>;
    async fn update_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        last_error: Option<&str>,
    ) -> AppResult<()>;
    async fn update_totals(&self, id: Uuid, total: Money, grand_total: Money) -> AppResult<()>;
    /// Persist the resolved status and rate of each line.
    async fn update_plan_lines(&self, lines: &[PlanLine]) -> AppResult<()>;
    async fn add_plan_line(&self, line: &PlanLine) -> AppResult<PlanLine>;
    async fn set_plan_line_end(
        &self,
        subscription_id: Uuid,
        line_id: Uuid,
        to_date: NaiveDate,
    ) -> AppResult<()>;
    /// Set the cancellation date and reopen billing.
    async fn set_cancellation(
        &self,
        id: Uuid,
        cancellation_date: NaiveDate,
        prorate_last_invoice: bool,
    ) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

// ============================================================================
// Use cases
// ============================================================================

fn new_plan_line(subscription_id: Uuid, position: i32, input: CreatePlanLineInput) -> PlanLine {
    PlanLine {
        id: Uuid::new_v4(),
        subscription_id,
        item_code: input.item_code,
        description: input.description,
        quantity: input.quantity,
        price_determination: input.price_determination,
        fixed_rate: input.fixed_rate,
        from_date: input.from_date,
        to_date: input.to_date,
        status: PlanLineStatus::Active,
        rate: input.fixed_rate.unwrap_or(Decimal::ZERO),
        position,
    }
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
    ledger: Arc<dyn LedgerStore>,
    channels: Arc<PaymentChannelFactory>,
    clock: Arc<dyn Clock>,
    default_price_list: Option<String>,
}

impl SubscriptionUseCases {
    pub fn new(
        repo: Arc<dyn SubscriptionRepo>,
        ledger: Arc<dyn LedgerStore>,
        channels: Arc<PaymentChannelFactory>,
        clock: Arc<dyn Clock>,
        default_price_list: Option<String>,
    ) -> Self {
        Self {
            repo,
            ledger,
            channels,
            clock,
            default_price_list,
        }
    }

    pub async fn create(&self, input: CreateSubscriptionInput) -> AppResult<Subscription> {
        let id = Uuid::new_v4();
        let plan_lines = input
            .plan_lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| new_plan_line(id, i as i32, line))
            .collect();

        let subscription = Subscription {
            id,
            customer: input.customer,
            currency: input.currency,
            interval: input.interval,
            interval_count: input.interval_count,
            start_date: input.start_date,
            trial_start: input.trial_start,
            trial_end: input.trial_end,
            current_period: None,
            cancellation_date: None,
            invoice_timing: input.invoice_timing,
            prorate_last_invoice: input.prorate_last_invoice,
            auto_order: input.auto_order,
            auto_payment_request: input.auto_payment_request,
            days_until_due: input.days_until_due,
            additional_discount_percentage: input.additional_discount_percentage,
            additional_discount_amount: input.additional_discount_amount,
            price_list: input.price_list.or_else(|| self.default_price_list.clone()),
            payment_channel: input.payment_channel,
            status: SubscriptionStatus::Active,
            total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            last_error: None,
            billing_closed: false,
            plan_lines,
            created_at: Some(self.clock.now()),
            updated_at: Some(self.clock.now()),
        };

        subscription.validate().map_err(AppError::Configuration)?;

        let created = self.repo.create(&subscription).await?;
        info!(
            subscription_id = %created.id,
            customer = %created.customer,
            interval = %created.interval,
            "Subscription created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Subscription> {
        self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn add_plan(&self, id: Uuid, input: CreatePlanLineInput) -> AppResult<PlanLine> {
        let subscription = self.get(id).await?;
        if subscription.is_cancelled_on(self.clock.today()) {
            return Err(AppError::InvalidInput(
                "cannot add plans to a cancelled subscription".into(),
            ));
        }

        let position = subscription
            .plan_lines
            .iter()
            .map(|line| line.position + 1)
            .max()
            .unwrap_or(0);
        let line = new_plan_line(id, position, input);
        line.validate().map_err(AppError::InvalidInput)?;

        self.repo.add_plan_line(&line).await
    }

    /// End a plan line on `end_date` (today by default). Lines are never
    /// deleted because past documents refer to them.
    pub async fn remove_plan(
        &self,
        id: Uuid,
        line_id: Uuid,
        end_date: Option<NaiveDate>,
    ) -> AppResult<()> {
        let subscription = self.get(id).await?;
        let line = subscription
            .plan_lines
            .iter()
            .find(|line| line.id == line_id)
            .ok_or(AppError::NotFound)?;

        let mut end = end_date.unwrap_or_else(|| self.clock.today());
        if let Some(existing) = line.to_date {
            end = end.min(existing);
        }
        if line.from_date.is_some_and(|from| end < from) {
            return Err(AppError::InvalidInput(
                "plan cannot end before it starts".into(),
            ));
        }

        self.repo.set_plan_line_end(id, line_id, end).await
    }

    /// Set the cancellation date. A cancellation date is never cleared and
    /// never moved later.
    pub async fn cancel(
        &self,
        id: Uuid,
        at: CancelAt,
        prorate_last_invoice: Option<bool>,
    ) -> AppResult<Subscription> {
        let mut subscription = self.get(id).await?;
        let today = self.clock.today();

        let date = match at {
            CancelAt::Now => today,
            CancelAt::PeriodEnd => subscription
                .current_period
                .map(|p| p.end)
                .unwrap_or(today),
            CancelAt::Date(date) => date,
        };

        let earliest = match subscription.current_period {
            Some(current) => current.start,
            None => subscription
                .trial_start
                .map_or(subscription.start_date, |trial| {
                    trial.min(subscription.start_date)
                }),
        };
        if date < earliest {
            return Err(AppError::InvalidInput(format!(
                "cancellation date {date} is before {earliest}"
            )));
        }

        if let Some(existing) = subscription.cancellation_date {
            if existing <= date {
                info!(
                    subscription_id = %id,
                    cancellation_date = %existing,
                    "Subscription already cancelled on an earlier date"
                );
                return Ok(subscription);
            }
        }

        let prorate = prorate_last_invoice.unwrap_or(subscription.prorate_last_invoice);
        self.repo.set_cancellation(id, date, prorate).await?;
        subscription.cancellation_date = Some(date);
        subscription.prorate_last_invoice = prorate;
        subscription.billing_closed = false;

        info!(
            subscription_id = %id,
            cancellation_date = %date,
            prorate,
            "Subscription cancellation scheduled"
        );
        Ok(subscription)
    }

    /// Delete a subscription and void its lifecycle events.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.get(id).await?;
        let voided = self.ledger.cancel_for_subscription(id).await?;
        self.repo.delete(id).await?;
        info!(subscription_id = %id, voided, "Subscription deleted");
        Ok(())
    }

    /// Void the ledger entry of a document cancelled in its own system.
    ///
    /// Payment requests are withdrawn on their channel when it allows it.
    pub async fn void_document(
        &self,
        id: Uuid,
        document_type: DocumentType,
        document_ref: &DocumentRef,
    ) -> AppResult<u64> {
        let subscription = self.get(id).await?;

        if document_type == DocumentType::PaymentRequest {
            let channel = self.channels.get(subscription.payment_channel);
            if channel.supports_cancellation() {
                if let Err(e) = channel.cancel(document_ref).await {
                    warn!(
                        subscription_id = %id,
                        document = %document_ref,
                        error = %e,
                        "Failed to cancel payment request on channel"
                    );
                }
            }
        }

        let voided = self
            .ledger
            .cancel_for_document(id, document_type, document_ref)
            .await?;
        if voided == 0 {
            return Err(AppError::NotFound);
        }
        info!(
            subscription_id = %id,
            document_type = %document_type,
            document = %document_ref,
            "Document voided"
        );
        Ok(voided)
    }

    async fn is_invoiced(&self, id: Uuid, period: &BillingPeriod) -> AppResult<bool> {
        Ok(self
            .ledger
            .find_event(id, DocumentType::Invoice, period)
            .await?
            .is_some_and(|event| event.document_ref.is_some()))
    }

    pub async fn next_invoice_date(&self, id: Uuid) -> AppResult<Option<NaiveDate>> {
        let subscription = self.get(id).await?;
        let today = self.clock.today();

        let (previous, current_invoiced) = match subscription.current_period {
            Some(current) => {
                let previous = match self.ledger.find_period_change(id, &current).await? {
                    Some(event) => event.previous_period,
                    None => period::preceding(&subscription, &current)?,
                };
                (previous, self.is_invoiced(id, &current).await?)
            }
            None => (None, false),
        };
        let previous_invoiced = match &previous {
            Some(period) => self.is_invoiced(id, period).await?,
            None => false,
        };

        period::next_invoice_date(
            &subscription,
            today,
            previous.as_ref(),
            previous_invoiced,
            current_invoiced,
        )
    }

    pub async fn events(&self, id: Uuid) -> AppResult<Vec<LifecycleEvent>> {
        self.get(id).await?;
        self.ledger.list_by_subscription(id).await
    }
}
