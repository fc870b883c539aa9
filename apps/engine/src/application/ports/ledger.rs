use async_trait::async_trait;
use recurring_types::{BillingPeriod, DocumentType};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::{generated_document::DocumentRef, lifecycle_event::LifecycleEvent},
};

/// Lifecycle event ledger.
///
/// `insert_event_if_absent` must be atomic per (subscription, document type,
/// period) across concurrent callers.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, event: &LifecycleEvent) -> AppResult<()>;

    /// Insert a document event unless a non-cancelled one exists for the same
    /// subscription, document type and period. Returns whether it was inserted.
    async fn insert_event_if_absent(&self, event: &LifecycleEvent) -> AppResult<bool>;

    async fn find_event(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>>;

    async fn attach_document(&self, event_id: Uuid, document_ref: &DocumentRef) -> AppResult<()>;

    /// Void a reservation whose document was never created.
    async fn release_reservation(&self, event_id: Uuid) -> AppResult<()>;

    /// The `PeriodAdvanced` event that opened `period`.
    async fn find_period_change(
        &self,
        subscription_id: Uuid,
        period: &BillingPeriod,
    ) -> AppResult<Option<LifecycleEvent>>;

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<LifecycleEvent>>;

    async fn cancel_for_document(
        &self,
        subscription_id: Uuid,
        document_type: DocumentType,
        document_ref: &DocumentRef,
    ) -> AppResult<u64>;

    async fn cancel_for_subscription(&self, subscription_id: Uuid) -> AppResult<u64>;
}
