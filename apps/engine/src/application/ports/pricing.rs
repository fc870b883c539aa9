use async_trait::async_trait;
use chrono::NaiveDate;
use recurring_types::Money;
use rust_decimal::Decimal;

use crate::app_error::AppResult;

#[derive(Debug, Clone)]
pub struct PriceQuery {
    pub customer: String,
    pub item_code: String,
    pub quantity: Decimal,
    pub currency: String,
    pub as_of: NaiveDate,
    pub price_list: Option<String>,
}

/// Price list and pricing rule lookups.
///
/// `None` means no price is defined, which is not an error.
#[async_trait]
pub trait PricingService: Send + Sync {
    async fn price_list_rate(&self, query: &PriceQuery) -> AppResult<Option<Money>>;

    async fn pricing_rule_rate(
        &self,
        query: &PriceQuery,
        price_list_rate: Option<Money>,
    ) -> AppResult<Option<Money>>;

    /// Pricing rule rate if one matches, else the price list rate, else zero.
    async fn resolved_rate(&self, query: &PriceQuery) -> AppResult<Money> {
        let base = self.price_list_rate(query).await?;
        let rule = self.pricing_rule_rate(query, base).await?;
        Ok(rule.or(base).unwrap_or(Decimal::ZERO))
    }
}
