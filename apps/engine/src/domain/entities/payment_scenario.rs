use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Scripted outcome of an immediate collection on the dummy channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PaymentScenario {
    /// Funds are collected at once
    #[default]
    Success,
    /// Collection started but settles later
    Pending,
    /// Payer's bank declines
    Decline,
    InsufficientFunds,
    /// Channel-side failure
    ProcessingError,
}

impl PaymentScenario {
    pub fn description(&self) -> &'static str {
        match self {
            PaymentScenario::Success => "Collection succeeds immediately",
            PaymentScenario::Pending => "Collection is accepted and settles later",
            PaymentScenario::Decline => "Collection is declined",
            PaymentScenario::InsufficientFunds => "Payer has insufficient funds",
            PaymentScenario::ProcessingError => "Collection fails on the channel side",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PaymentScenario::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PaymentScenario::Decline
                | PaymentScenario::InsufficientFunds
                | PaymentScenario::ProcessingError
        )
    }

    /// Message reported for failing scenarios
    pub fn failure_message(&self) -> Option<&'static str> {
        match self {
            PaymentScenario::Decline => Some("The collection was declined."),
            PaymentScenario::InsufficientFunds => Some("The payer has insufficient funds."),
            PaymentScenario::ProcessingError => {
                Some("An error occurred while processing the collection.")
            }
            PaymentScenario::Success | PaymentScenario::Pending => None,
        }
    }

    pub fn all() -> &'static [PaymentScenario] {
        &[
            PaymentScenario::Success,
            PaymentScenario::Pending,
            PaymentScenario::Decline,
            PaymentScenario::InsufficientFunds,
            PaymentScenario::ProcessingError,
        ]
    }
}
