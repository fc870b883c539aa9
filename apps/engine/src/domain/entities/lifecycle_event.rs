use chrono::NaiveDateTime;
use recurring_types::{BillingPeriod, DocumentType, SubscriptionStatus};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::generated_document::DocumentRef;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "lifecycle_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LifecycleEventType {
    PeriodAdvanced,
    DocumentGenerated,
    StatusChanged,
    PaymentRequestCreated,
}

/// Append-only ledger entry for a subscription.
///
/// Document events double as the idempotency anchor: at most one
/// non-cancelled event exists per (subscription, document type, period).
/// A document event without `document_ref` is a reservation held while the
/// document is being created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub event_type: LifecycleEventType,
    pub document_type: Option<DocumentType>,
    pub document_ref: Option<DocumentRef>,
    pub period: Option<BillingPeriod>,
    /// Period closed by a `PeriodAdvanced` event
    pub previous_period: Option<BillingPeriod>,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: Option<SubscriptionStatus>,
    pub message: Option<String>,
    pub cancelled: bool,
    pub created_at: NaiveDateTime,
}

impl LifecycleEvent {
    fn base(subscription_id: Uuid, event_type: LifecycleEventType, at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id,
            event_type,
            document_type: None,
            document_ref: None,
            period: None,
            previous_period: None,
            previous_status: None,
            new_status: None,
            message: None,
            cancelled: false,
            created_at: at,
        }
    }

    pub fn period_advanced(
        subscription_id: Uuid,
        period: BillingPeriod,
        previous: Option<BillingPeriod>,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            period: Some(period),
            previous_period: previous,
            ..Self::base(subscription_id, LifecycleEventType::PeriodAdvanced, at)
        }
    }

    pub fn status_changed(
        subscription_id: Uuid,
        period: Option<BillingPeriod>,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
        message: Option<String>,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            period,
            previous_status: Some(from),
            new_status: Some(to),
            message,
            ..Self::base(subscription_id, LifecycleEventType::StatusChanged, at)
        }
    }

    /// Pending reservation for a document about to be created.
    pub fn document_reservation(
        subscription_id: Uuid,
        document_type: DocumentType,
        period: BillingPeriod,
        at: NaiveDateTime,
    ) -> Self {
        let event_type = match document_type {
            DocumentType::PaymentRequest => LifecycleEventType::PaymentRequestCreated,
            _ => LifecycleEventType::DocumentGenerated,
        };
        Self {
            document_type: Some(document_type),
            period: Some(period),
            ..Self::base(subscription_id, event_type, at)
        }
    }

    pub fn is_document_event(&self) -> bool {
        self.document_type.is_some()
    }

    /// A document event whose document has not been attached yet.
    pub fn is_pending(&self) -> bool {
        self.is_document_event() && self.document_ref.is_none()
    }
}
