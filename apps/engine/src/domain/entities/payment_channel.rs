use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Payment channel a subscription collects through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "payment_channel_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PaymentChannelKind {
    /// Customer pays against a request by their own means
    #[default]
    Manual,
    /// Merchant pulls funds under a mandate
    DirectDebit,
    /// Local test channel with scripted outcomes
    Dummy,
}

impl PaymentChannelKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentChannelKind::Manual => "Manual",
            PaymentChannelKind::DirectDebit => "Direct Debit",
            PaymentChannelKind::Dummy => "Test Channel",
        }
    }

    /// Whether payments are pulled rather than requested
    pub fn is_pull(&self) -> bool {
        matches!(self, PaymentChannelKind::DirectDebit)
    }
}
