//! In-memory mock implementations for the billing ports and repositories.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use recurring_types::{BillingPeriod, DocumentType, Money, SubscriptionStatus};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::{
            clock::Clock,
            customer_notifier::CustomerStatusNotifier,
            document_store::DocumentStore,
            ledger::LedgerStore,
            pricing::{PriceQuery, PricingService},
        },
        use_cases::subscription::SubscriptionRepo,
    },
    domain::entities::{
        generated_document::{
            CollectionRequestDraft, DocumentRef, InvoiceDraft, OrderDraft, PaymentDraft,
        },
        lifecycle_event::{LifecycleEvent, LifecycleEventType},
        plan_line::PlanLine,
        subscription::Subscription,
    },
};

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    /// Subscriptions whose lookup fails with a database error
    pub broken: Mutex<HashSet<Uuid>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let map: HashMap<Uuid, Subscription> =
            subscriptions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            subscriptions: Mutex::new(map),
            ..Self::default()
        }
    }

    pub fn break_subscription(&self, id: Uuid) {
        self.broken.lock().unwrap().insert(id);
    }

    pub fn stored(&self, id: Uuid) -> Subscription {
        self.subscriptions.lock().unwrap().get(&id).cloned().unwrap()
    }

    fn modify(&self, id: Uuid, f: impl FnOnce(&mut Subscription)) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions.get_mut(&id).ok_or(AppError::NotFound)?;
        f(subscription);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, subscription: &Subscription) -> AppResult<Subscription> {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        if self.broken.lock().unwrap().contains(&id) {
            return Err(AppError::Database("connection reset".into()));
        }
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn list_processable(&self, after: Option<Uuid>, limit: i64) -> AppResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status != SubscriptionStatus::Cancelled || !s.billing_closed)
            .map(|s| s.id)
            .filter(|id| after.is_none_or(|after| *id > after))
            .collect();
        ids.sort();
        ids.truncate(limit.max(0) as usize);
        Ok(ids)
    }

    async fn update_period(&self, id: Uuid, period: Option<BillingPeriod>) -> AppResult<()> {
        self.modify(id, |s| s.current_period = period)
    }

    async fn close_billing(&self, id: Uuid) -> AppResult<()> {
        self.modify(id, |s| s.billing_closed = true)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        last_error: Option<&str>,
    ) -> AppResult<()> {
        self.modify(id, |s| {
            s.status = status;
            s.last_error = last_error.map(str::to_string);
        })
    }

    async fn update_totals(&self, id: Uuid, total: Money, grand_total: Money) -> AppResult<()> {
        self.modify(id, |s| {
            s.total = total;
            s.grand_total = grand_total;
        })
    }

    async fn update_plan_lines(&self, lines: &[PlanLine]) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        for line in lines {
            if let Some(stored) = subscriptions
                .get_mut(&line.subscription_id)
                .and_then(|s| s.plan_lines.iter_mut().find(|l| l.id == line.id))
            {
                stored.status = line.status;
                stored.rate = line.rate;
            }
        }
        Ok(())
    }

    async fn add_plan_line(&self, line: &PlanLine) -> AppResult<PlanLine> {
        self.modify(line.subscription_id, |s| s.plan_lines.push(line.clone()))?;
        Ok(line.clone())
    }

    async fn set_plan_line_end(
        &self,
        subscription_id: Uuid,
        line_id: Uuid,
        to_date: NaiveDate,
    ) -> AppResult<()> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let line = subscriptions
            .get_mut(&subscription_id)
            .and_then(|s| s.plan_lines.iter_mut().find(|l| l.id == line_id))
            .ok_or(AppError::NotFound)?;
        line.to_date = Some(to_date);
        Ok(())
    }

    async fn set_cancellation(
        &self,
        id: Uuid,
        cancellation_date: NaiveDate,
        prorate_last_invoice: bool,
    ) -> AppResult<()> {
        self.modify(id, |s| {
            s.cancellation_date = Some(cancellation_date);
            s.prorate_last_invoice = prorate_last_invoice;
            s.billing_closed = false;
        })
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.subscriptions.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// InMemoryLedger
// ============================================================================

#[derive(Default)]
pub struct InMemoryLedger {
    pub events: Mutex<Vec<LifecycleEvent>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-cancelled document events of one type, in insertion order.
    pub fn document_events(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
    ) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.subscription_id == subscription_id
                    && e.document_type == Some(document_type)
                    && !e.cancelled
            })
            .cloned()
            .collect()
    }

    pub fn events_of_type(
        &self,
        subscription_id: Uuid,
        event_type: LifecycleEventType,
    ) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.subscription_id == subscription_id && e.event_type == event_type)
            .cloned()
            .collect()
    }
}

fn same_slot(
    event: &LifecycleEvent,
    subscription_id: Uuid,
    document_type: DocumentType,
    period: &BillingPeriod,
) -> bool {
    event.subscription_id == subscription_id
        && event.document_type == Some(document_type)
        && event.period.as_ref() == Some(period)
        && !event.cancelled
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(&self, event: &LifecycleEvent) -> AppResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn insert_event_if_absent(&self, event: &LifecycleEvent) -> AppResult<bool> {
        let (Some(document_type), Some(period)) = (event.document_type, event.period) else {
            return Err(AppError::InvalidInput(
                "document events need a document type and period".into(),
            ));
        };
        let mut events = self.events.lock().unwrap();
        if events
            .iter()
            .any(|e| same_slot(e, event.subscription_id, document_type, &period))
        {
            return Ok(false);
        }
        events.push(event.clone());
        Ok(true)
    }

    async fn find_event(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| same_slot(e, subscription_id, document_type, period))
            .cloned())
    }

    async fn attach_document(&self, event_id: Uuid, document_ref: &DocumentRef) -> AppResult<()> {
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(AppError::NotFound)?;
        event.document_ref = Some(document_ref.clone());
        Ok(())
    }

    async fn release_reservation(&self, event_id: Uuid) -> AppResult<()> {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events
            .iter_mut()
            .find(|e| e.id == event_id && e.document_ref.is_none())
        {
            event.cancelled = true;
        }
        Ok(())
    }

    async fn find_period_change(
        &self,
        subscription_id: Uuid,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| {
                e.subscription_id == subscription_id
                    && e.event_type == LifecycleEventType::PeriodAdvanced
                    && e.period.as_ref() == Some(period)
                    && !e.cancelled
            })
            .cloned())
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<LifecycleEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.subscription_id == subscription_id)
            .cloned()
            .collect())
    }

    async fn cancel_for_document(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        document_ref: &DocumentRef,
    ) -> AppResult<u64> {
        let mut voided = 0;
        for event in self.events.lock().unwrap().iter_mut().filter(|e| {
            e.subscription_id == subscription_id
                && e.document_type == Some(document_type)
                && e.document_ref.as_ref() == Some(document_ref)
                && !e.cancelled
        }) {
            event.cancelled = true;
            voided += 1;
        }
        Ok(voided)
    }

    async fn cancel_for_subscription(&self, subscription_id: Uuid) -> AppResult<u64> {
        let mut voided = 0;
        for event in self
            .events
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|e| e.subscription_id == subscription_id && !e.cancelled)
        {
            event.cancelled = true;
            voided += 1;
        }
        Ok(voided)
    }
}

// ============================================================================
// InMemoryDocumentStore
// ============================================================================

#[derive(Default)]
pub struct InMemoryDocumentStore {
    pub orders: Mutex<HashMap<DocumentRef, OrderDraft>>,
    pub invoices: Mutex<HashMap<DocumentRef, InvoiceDraft>>,
    pub payments: Mutex<Vec<(DocumentRef, PaymentDraft)>>,
    pub requests: Mutex<Vec<(DocumentRef, CollectionRequestDraft)>>,
    fail_invoices: AtomicBool,
    fail_payments: AtomicBool,
    sequence: AtomicU32,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_invoices(&self, fail: bool) {
        self.fail_invoices.store(fail, Ordering::SeqCst);
    }

    pub fn fail_payments(&self, fail: bool) {
        self.fail_payments.store(fail, Ordering::SeqCst);
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.lock().unwrap().len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.lock().unwrap().len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn invoice(&self, reference: &DocumentRef) -> Option<InvoiceDraft> {
        self.invoices.lock().unwrap().get(reference).cloned()
    }

    /// Invoices of a subscription ordered by posting date.
    pub fn invoices_for(&self, subscription_id: Uuid) -> Vec<InvoiceDraft> {
        let mut invoices: Vec<InvoiceDraft> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.subscription_id == subscription_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.posting_date);
        invoices
    }

    /// Record a payment made outside the engine that settles `reference` in full.
    pub fn settle(&self, reference: &DocumentRef) {
        let Some(invoice) = self.invoice(reference) else {
            return;
        };
        let payment = PaymentDraft {
            subscription_id: invoice.subscription_id,
            customer: invoice.customer.clone(),
            currency: invoice.currency.clone(),
            period: invoice.period,
            posting_date: invoice.posting_date,
            amount: invoice.grand_total,
            reference_type: DocumentType::Invoice,
            reference: reference.clone(),
            channel: Default::default(),
            paid_to_account: None,
            transaction_ref: None,
        };
        let payment_ref = self.next_ref("EXT");
        self.payments.lock().unwrap().push((payment_ref, payment));
    }

    fn next_ref(&self, prefix: &str) -> DocumentRef {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        DocumentRef::new(format!("{prefix}-{n:05}"))
    }

    fn paid_against(&self, references: &[&DocumentRef]) -> Money {
        self.payments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| references.contains(&&p.reference))
            .map(|(_, p)| p.amount)
            .sum()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_order(&self, draft: &OrderDraft) -> AppResult<DocumentRef> {
        let reference = self.next_ref("SO");
        self.orders
            .lock()
            .unwrap()
            .insert(reference.clone(), draft.clone());
        Ok(reference)
    }

    async fn create_invoice(&self, draft: &InvoiceDraft) -> AppResult<DocumentRef> {
        if self.fail_invoices.load(Ordering::SeqCst) {
            return Err(AppError::Database("invoice could not be submitted".into()));
        }
        let reference = self.next_ref("INV");
        self.invoices
            .lock()
            .unwrap()
            .insert(reference.clone(), draft.clone());
        Ok(reference)
    }

    async fn create_payment(&self, draft: &PaymentDraft) -> AppResult<DocumentRef> {
        if self.fail_payments.load(Ordering::SeqCst) {
            return Err(AppError::Database("payment could not be submitted".into()));
        }
        let reference = self.next_ref("PAY");
        self.payments
            .lock()
            .unwrap()
            .push((reference.clone(), draft.clone()));
        Ok(reference)
    }

    async fn create_collection_request(
        &self,
        draft: &CollectionRequestDraft,
    ) -> AppResult<DocumentRef> {
        let reference = self.next_ref("PR");
        self.requests
            .lock()
            .unwrap()
            .push((reference.clone(), draft.clone()));
        Ok(reference)
    }

    async fn get_order(&self, reference: &DocumentRef) -> AppResult<Option<OrderDraft>> {
        Ok(self.orders.lock().unwrap().get(reference).cloned())
    }

    async fn document_outstanding(
        &self,
        document_type: DocumentType,
        reference: &DocumentRef,
    ) -> AppResult<Money> {
        let total = match document_type {
            DocumentType::Order => self.orders.lock().unwrap().get(reference).map(|o| o.grand_total),
            DocumentType::Invoice => self.invoice(reference).map(|i| i.grand_total),
            other => {
                return Err(AppError::InvalidInput(format!(
                    "{other} has no outstanding amount"
                )));
            }
        }
        .ok_or(AppError::NotFound)?;
        Ok((total - self.paid_against(&[reference])).max(Decimal::ZERO))
    }

    async fn outstanding_amount(&self, subscription_id: Uuid) -> AppResult<Money> {
        let invoices: Vec<(DocumentRef, InvoiceDraft)> = self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, i)| i.subscription_id == subscription_id)
            .map(|(r, i)| (r.clone(), i.clone()))
            .collect();

        Ok(invoices
            .iter()
            .map(|(reference, invoice)| {
                let mut references = vec![reference];
                references.extend(invoice.source_order.as_ref());
                (invoice.grand_total - self.paid_against(&references)).max(Decimal::ZERO)
            })
            .sum())
    }
}

// ============================================================================
// InMemoryPricingService
// ============================================================================

#[derive(Default)]
pub struct InMemoryPricingService {
    pub prices: HashMap<String, Money>,
    pub rules: HashMap<String, Money>,
    pub fail: bool,
}

impl InMemoryPricingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, item_code: &str, rate: Money) -> Self {
        self.prices.insert(item_code.to_string(), rate);
        self
    }

    pub fn with_rule(mut self, item_code: &str, rate: Money) -> Self {
        self.rules.insert(item_code.to_string(), rate);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl PricingService for InMemoryPricingService {
    async fn price_list_rate(&self, query: &PriceQuery) -> AppResult<Option<Money>> {
        if self.fail {
            return Err(AppError::Database("pricing unavailable".into()));
        }
        Ok(self.prices.get(&query.item_code).copied())
    }

    async fn pricing_rule_rate(
        &self,
        query: &PriceQuery,
        _price_list_rate: Option<Money>,
    ) -> AppResult<Option<Money>> {
        if self.fail {
            return Err(AppError::Database("pricing unavailable".into()));
        }
        Ok(self.rules.get(&query.item_code).copied())
    }
}

// ============================================================================
// InMemoryNotifier
// ============================================================================

#[derive(Default)]
pub struct InMemoryNotifier {
    pub refreshed: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshed.lock().unwrap().len()
    }
}

#[async_trait]
impl CustomerStatusNotifier for InMemoryNotifier {
    async fn refresh(&self, customer: &str) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("customer status unavailable".into()));
        }
        self.refreshed.lock().unwrap().push(customer.to_string());
        Ok(())
    }
}

// ============================================================================
// FixedClock
// ============================================================================

pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            now: Mutex::new(today.and_hms_opt(9, 0, 0).unwrap()),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.now.lock().unwrap() = today.and_hms_opt(9, 0, 0).unwrap();
    }

    pub fn advance_minutes(&self, minutes: i64) {
        *self.now.lock().unwrap() += Duration::minutes(minutes);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap()
    }
}
