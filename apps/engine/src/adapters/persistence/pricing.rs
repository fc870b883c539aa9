use async_trait::async_trait;
use recurring_types::{Money, round_money};
use rust_decimal::Decimal;
use sqlx::Row;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::pricing::{PriceQuery, PricingService},
};

/// Rate a matched rule yields: its own rate, else its discount off the price list rate.
fn rule_rate(
    rate: Option<Money>,
    discount_percentage: Option<Decimal>,
    price_list_rate: Option<Money>,
) -> Option<Money> {
    if let Some(rate) = rate {
        return Some(rate);
    }
    let base = price_list_rate?;
    let discount = discount_percentage?;
    Some(round_money(base * (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED))
}

#[async_trait]
impl PricingService for PostgresPersistence {
    async fn price_list_rate(&self, query: &PriceQuery) -> AppResult<Option<Money>> {
        let Some(price_list) = &query.price_list else {
            return Ok(None);
        };

        // Customer-specific prices win over general ones
        let rate: Option<Money> = sqlx::query_scalar(
            r#"
            SELECT rate FROM item_prices
            WHERE item_code = $1 AND price_list = $2 AND currency = $3
              AND (customer IS NULL OR customer = $4)
              AND (valid_from IS NULL OR valid_from <= $5)
              AND (valid_upto IS NULL OR valid_upto >= $5)
            ORDER BY customer NULLS LAST, valid_from DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(&query.item_code)
        .bind(price_list)
        .bind(&query.currency)
        .bind(&query.customer)
        .bind(query.as_of)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rate)
    }

    async fn pricing_rule_rate(
        &self,
        query: &PriceQuery,
        price_list_rate: Option<Money>,
    ) -> AppResult<Option<Money>> {
        let row = sqlx::query(
            r#"
            SELECT rate, discount_percentage FROM pricing_rules
            WHERE item_code = $1 AND NOT disabled
              AND (customer IS NULL OR customer = $2)
              AND (price_list IS NULL OR price_list = $3)
              AND (currency IS NULL OR currency = $4)
              AND min_qty <= $5
              AND (valid_from IS NULL OR valid_from <= $6)
              AND (valid_upto IS NULL OR valid_upto >= $6)
            ORDER BY priority DESC, customer NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(&query.item_code)
        .bind(&query.customer)
        .bind(&query.price_list)
        .bind(&query.currency)
        .bind(query.quantity)
        .bind(query.as_of)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.and_then(|row| {
            rule_rate(
                row.get("rate"),
                row.get("discount_percentage"),
                price_list_rate,
            )
        }))
    }
}
