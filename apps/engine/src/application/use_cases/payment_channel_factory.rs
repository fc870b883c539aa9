use std::sync::Arc;

use crate::{
    application::ports::payment_channel::PaymentChannel,
    domain::entities::{payment_channel::PaymentChannelKind, payment_scenario::PaymentScenario},
    infra::{
        direct_debit_channel::DirectDebitChannel, dummy_payment_channel::DummyPaymentChannel,
        manual_payment_channel::ManualPaymentChannel,
    },
};

#[derive(Debug, Clone)]
pub struct PaymentChannelSettings {
    /// Channel used by subscriptions without one of their own
    pub default_channel: PaymentChannelKind,
    pub direct_debit_clearing_account: String,
    pub dummy_scenario: PaymentScenario,
}

impl Default for PaymentChannelSettings {
    fn default() -> Self {
        Self {
            default_channel: PaymentChannelKind::Manual,
            direct_debit_clearing_account: "Direct Debit Clearing".to_string(),
            dummy_scenario: PaymentScenario::Success,
        }
    }
}

/// Builds the payment channel a subscription collects through.
pub struct PaymentChannelFactory {
    settings: PaymentChannelSettings,
    #[cfg(test)]
    test_channel_override: Option<Arc<dyn PaymentChannel>>,
}

impl PaymentChannelFactory {
    pub fn new(settings: PaymentChannelSettings) -> Self {
        Self {
            settings,
            #[cfg(test)]
            test_channel_override: None,
        }
    }

    #[cfg(test)]
    pub fn with_channel_override(mut self, channel: Arc<dyn PaymentChannel>) -> Self {
        self.test_channel_override = Some(channel);
        self
    }

    /// Channel for `kind`, or the default channel when the subscription has none.
    pub fn get(&self, kind: Option<PaymentChannelKind>) -> Arc<dyn PaymentChannel> {
        #[cfg(test)]
        if let Some(ref override_channel) = self.test_channel_override {
            return override_channel.clone();
        }

        match kind.unwrap_or(self.settings.default_channel) {
            PaymentChannelKind::Manual => Arc::new(ManualPaymentChannel),
            PaymentChannelKind::DirectDebit => Arc::new(DirectDebitChannel::new(
                self.settings.direct_debit_clearing_account.clone(),
            )),
            PaymentChannelKind::Dummy => {
                Arc::new(DummyPaymentChannel::new(self.settings.dummy_scenario))
            }
        }
    }
}
