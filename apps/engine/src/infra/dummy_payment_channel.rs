use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_channel::{CollectionOutcome, PaymentChannel},
    domain::entities::{
        generated_document::{CollectionRequestDraft, DocumentRef},
        payment_channel::PaymentChannelKind,
        payment_scenario::PaymentScenario,
    },
};

/// Dummy payment channel for testing purposes.
///
/// Collects locally without calling any external service. The configured
/// scenario decides how every immediate collection ends.
#[derive(Debug, Clone)]
pub struct DummyPaymentChannel {
    scenario: PaymentScenario,
}

impl DummyPaymentChannel {
    pub fn new(scenario: PaymentScenario) -> Self {
        Self { scenario }
    }

    fn generate_transaction_ref(&self) -> String {
        format!("dummy_txn_{}", Uuid::new_v4().simple())
    }
}

#[async_trait]
impl PaymentChannel for DummyPaymentChannel {
    fn kind(&self) -> PaymentChannelKind {
        PaymentChannelKind::Dummy
    }

    fn supports_immediate_collection(&self) -> bool {
        true
    }

    fn supports_cancellation(&self) -> bool {
        true
    }

    fn settlement_account(&self) -> Option<String> {
        Some("Dummy Clearing".to_string())
    }

    async fn collect_immediately(
        &self,
        request: &CollectionRequestDraft,
        request_ref: &DocumentRef,
    ) -> AppResult<CollectionOutcome> {
        debug!(
            request = %request_ref,
            scenario = %self.scenario,
            amount = %request.amount,
            "Dummy channel collecting"
        );

        if let Some(message) = self.scenario.failure_message() {
            return Err(AppError::PaymentDeclined(message.to_string()));
        }
        if self.scenario.is_success() {
            return Ok(CollectionOutcome::Collected {
                amount: request.amount,
                transaction_ref: self.generate_transaction_ref(),
            });
        }
        Ok(CollectionOutcome::Pending)
    }

    async fn cancel(&self, request_ref: &DocumentRef) -> AppResult<()> {
        debug!(request = %request_ref, "Dummy channel cancelled request");
        Ok(())
    }
}
