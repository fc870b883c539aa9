use async_trait::async_trait;
use recurring_types::Money;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        generated_document::{CollectionRequestDraft, DocumentRef},
        payment_channel::PaymentChannelKind,
    },
};

// ============================================================================
// Port Types
// ============================================================================

/// Result of an immediate collection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    /// Funds were collected; a payment should be recorded
    Collected {
        amount: Money,
        transaction_ref: String,
    },
    /// Collection was accepted and settles asynchronously
    Pending,
}

// ============================================================================
// Payment Channel Port
// ============================================================================

/// A way of collecting money from a customer.
///
/// Capabilities default to unsupported; channels opt in to what they can do.
#[async_trait]
pub trait PaymentChannel: Send + Sync {
    fn kind(&self) -> PaymentChannelKind;

    /// Whether a request can be collected off-session right after creation.
    fn supports_immediate_collection(&self) -> bool {
        false
    }

    /// Whether the merchant pulls funds instead of sending a request.
    fn supports_direct_debit(&self) -> bool {
        false
    }

    /// Whether an issued request can be withdrawn on the channel.
    fn supports_cancellation(&self) -> bool {
        false
    }

    /// Account collected funds are paid into.
    fn settlement_account(&self) -> Option<String> {
        None
    }

    async fn collect_immediately(
        &self,
        _request: &CollectionRequestDraft,
        _request_ref: &DocumentRef,
    ) -> AppResult<CollectionOutcome> {
        Err(AppError::Unsupported(format!(
            "{} cannot collect immediately",
            self.kind().display_name()
        )))
    }

    async fn cancel(&self, _request_ref: &DocumentRef) -> AppResult<()> {
        Err(AppError::Unsupported(format!(
            "{} cannot cancel requests",
            self.kind().display_name()
        )))
    }
}
