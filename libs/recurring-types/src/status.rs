use serde::{Deserialize, Serialize};

use crate::errors::ParseEnumError;

/// Lifecycle status of a recurring subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    #[default]
    Active,
    Billable,
    Payable,
    Unpaid,
    Paid,
    Cancelled,
    BillingFailed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Billable => "billable",
            Self::Payable => "payable",
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::BillingFailed => "billing_failed",
        }
    }

    /// Returns true once the subscription no longer produces new periods.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if the current period still has something to invoice.
    pub fn needs_invoice(&self) -> bool {
        matches!(self, Self::Billable | Self::BillingFailed)
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trial" | "trialing" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "billable" => Ok(Self::Billable),
            "payable" => Ok(Self::Payable),
            "unpaid" => Ok(Self::Unpaid),
            "paid" => Ok(Self::Paid),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "billing_failed" => Ok(Self::BillingFailed),
            other => Err(ParseEnumError::new("subscription status", other)),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
