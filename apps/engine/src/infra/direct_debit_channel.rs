use async_trait::async_trait;

use crate::{
    application::ports::payment_channel::PaymentChannel,
    domain::entities::payment_channel::PaymentChannelKind,
};

/// Pull-payment channel. Payments are recorded directly against the
/// clearing account instead of sending the customer a request.
#[derive(Debug, Clone)]
pub struct DirectDebitChannel {
    clearing_account: String,
}

impl DirectDebitChannel {
    pub fn new(clearing_account: String) -> Self {
        Self { clearing_account }
    }
}

#[async_trait]
impl PaymentChannel for DirectDebitChannel {
    fn kind(&self) -> PaymentChannelKind {
        PaymentChannelKind::DirectDebit
    }

    fn supports_direct_debit(&self) -> bool {
        true
    }

    fn settlement_account(&self) -> Option<String> {
        Some(self.clearing_account.clone())
    }
}
