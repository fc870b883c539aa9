use chrono::NaiveDate;
use recurring_types::{BillingPeriod, DocumentType, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment_channel::PaymentChannelKind;

/// Reference to a document owned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub item_code: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub rate: Money,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub subscription_id: Uuid,
    pub customer: String,
    pub currency: String,
    pub period: BillingPeriod,
    pub transaction_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub lines: Vec<DocumentLine>,
    pub additional_discount_percentage: Decimal,
    pub additional_discount_amount: Money,
    pub grand_total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub subscription_id: Uuid,
    pub customer: String,
    pub currency: String,
    pub period: BillingPeriod,
    pub posting_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<DocumentLine>,
    pub additional_discount_percentage: Decimal,
    pub additional_discount_amount: Money,
    pub grand_total: Money,
    /// Order the invoice was derived from
    pub source_order: Option<DocumentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub subscription_id: Uuid,
    pub customer: String,
    pub currency: String,
    pub period: BillingPeriod,
    pub posting_date: NaiveDate,
    pub amount: Money,
    pub reference_type: DocumentType,
    pub reference: DocumentRef,
    pub channel: PaymentChannelKind,
    /// Account the channel settles into
    pub paid_to_account: Option<String>,
    /// Channel-side transaction identifier
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRequestDraft {
    pub subscription_id: Uuid,
    pub customer: String,
    pub currency: String,
    pub period: BillingPeriod,
    pub request_date: NaiveDate,
    pub amount: Money,
    pub reference_type: DocumentType,
    pub reference: DocumentRef,
    pub channel: PaymentChannelKind,
}

/// Sum of line amounts before document-level discounts.
pub fn net_total(lines: &[DocumentLine]) -> Money {
    lines.iter().map(|line| line.amount).sum()
}
