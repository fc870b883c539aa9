use async_trait::async_trait;
use recurring_types::{DocumentType, Money};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::entities::generated_document::{
        CollectionRequestDraft, DocumentRef, InvoiceDraft, OrderDraft, PaymentDraft,
    },
};

/// Creates commercial documents in the system that owns them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_order(&self, draft: &OrderDraft) -> AppResult<DocumentRef>;
    async fn create_invoice(&self, draft: &InvoiceDraft) -> AppResult<DocumentRef>;
    async fn create_payment(&self, draft: &PaymentDraft) -> AppResult<DocumentRef>;
    async fn create_collection_request(
        &self,
        draft: &CollectionRequestDraft,
    ) -> AppResult<DocumentRef>;

    async fn get_order(&self, reference: &DocumentRef) -> AppResult<Option<OrderDraft>>;

    /// Amount still owed on one order or invoice.
    async fn document_outstanding(
        &self,
        document_type: DocumentType,
        reference: &DocumentRef,
    ) -> AppResult<Money>;

    /// Amount still owed across all of a subscription's invoices.
    async fn outstanding_amount(&self, subscription_id: Uuid) -> AppResult<Money>;
}
