use serde::{Deserialize, Serialize};

use crate::errors::ParseEnumError;

/// Kind of downstream document the engine generates for a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Order,
    Invoice,
    Payment,
    PaymentRequest,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Invoice => "invoice",
            Self::Payment => "payment",
            Self::PaymentRequest => "payment_request",
        }
    }

    /// Documents that settle or request settlement of an order or invoice.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Payment | Self::PaymentRequest)
    }
}

impl std::str::FromStr for DocumentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "order" => Ok(Self::Order),
            "invoice" => Ok(Self::Invoice),
            "payment" => Ok(Self::Payment),
            "payment_request" => Ok(Self::PaymentRequest),
            other => Err(ParseEnumError::new("document type", other)),
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
