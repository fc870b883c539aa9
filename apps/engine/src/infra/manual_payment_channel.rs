use async_trait::async_trait;

use crate::{
    application::ports::payment_channel::PaymentChannel,
    domain::entities::payment_channel::PaymentChannelKind,
};

/// Channel without capabilities: the customer settles requests on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualPaymentChannel;

#[async_trait]
impl PaymentChannel for ManualPaymentChannel {
    fn kind(&self) -> PaymentChannelKind {
        PaymentChannelKind::Manual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app_error::AppError, domain::entities::generated_document::DocumentRef,
    };

    #[tokio::test]
    async fn test_has_no_capabilities() {
        let channel = ManualPaymentChannel;
        assert!(!channel.supports_immediate_collection());
        assert!(!channel.supports_direct_debit());
        assert!(!channel.supports_cancellation());
        assert!(channel.settlement_account().is_none());

        let err = channel.cancel(&DocumentRef::new("PR-1")).await.unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }
}
