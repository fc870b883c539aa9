use chrono::NaiveDate;
use recurring_types::{Money, round_money};
use rust_decimal::Decimal;
use tracing::warn;

use crate::{
    application::ports::pricing::{PriceQuery, PricingService},
    domain::entities::{
        plan_line::{PlanLine, PlanLineStatus, PriceDetermination},
        subscription::Subscription,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanTotals {
    pub total: Money,
    pub grand_total: Money,
}

/// Rate of one line as of `as_of`.
///
/// Pricing failures are logged and priced at zero.
pub async fn line_rate(
    pricing: &dyn PricingService,
    subscription: &Subscription,
    line: &PlanLine,
    as_of: NaiveDate,
) -> Money {
    match line.price_determination {
        PriceDetermination::Fixed => line.fixed_rate.unwrap_or(Decimal::ZERO),
        PriceDetermination::PriceList => {
            let query = PriceQuery {
                customer: subscription.customer.clone(),
                item_code: line.item_code.clone(),
                quantity: line.quantity,
                currency: subscription.currency.clone(),
                as_of,
                price_list: subscription.price_list.clone(),
            };
            match pricing.resolved_rate(&query).await {
                Ok(rate) => rate,
                Err(e) => {
                    warn!(
                        subscription_id = %subscription.id,
                        item_code = %line.item_code,
                        error = %e,
                        "Pricing unavailable, using zero rate"
                    );
                    Decimal::ZERO
                }
            }
        }
    }
}

/// Recompute every line's status and cache the rate of active and upcoming lines.
///
/// Upcoming lines are priced as of their own start date.
pub async fn refresh_plan_lines(
    pricing: &dyn PricingService,
    subscription: &mut Subscription,
    today: NaiveDate,
) {
    let mut refreshed = Vec::with_capacity(subscription.plan_lines.len());
    for line in &subscription.plan_lines {
        let mut line = line.clone();
        line.status = line.status_on(today);
        match line.status {
            PlanLineStatus::Active => {
                line.rate = line_rate(pricing, subscription, &line, today).await;
            }
            PlanLineStatus::Upcoming => {
                let as_of = line.from_date.unwrap_or(today);
                line.rate = line_rate(pricing, subscription, &line, as_of).await;
            }
            PlanLineStatus::Inactive => {}
        }
        refreshed.push(line);
    }
    subscription.plan_lines = refreshed;
}

pub fn line_amount(rate: Money, quantity: Decimal) -> Money {
    round_money(rate * quantity)
}

/// Apply the document-level percentage, then the flat discount, floored at zero.
pub fn apply_discount(net: Money, percentage: Decimal, amount: Money) -> Money {
    let after_percentage = net - net * percentage / Decimal::ONE_HUNDRED;
    round_money((after_percentage - amount).max(Decimal::ZERO))
}

/// Totals over active and upcoming lines that still run on `billed_start`.
pub fn totals(subscription: &Subscription, billed_start: Option<NaiveDate>) -> PlanTotals {
    let total: Money = subscription
        .plan_lines
        .iter()
        .filter(|line| {
            matches!(
                line.status,
                PlanLineStatus::Active | PlanLineStatus::Upcoming
            )
        })
        .filter(|line| billed_start.is_none_or(|start| line.ends_on_or_after(start)))
        .map(|line| line_amount(line.rate, line.quantity))
        .sum();

    PlanTotals {
        total,
        grand_total: apply_discount(
            total,
            subscription.additional_discount_percentage,
            subscription.additional_discount_amount,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        InMemoryPricingService, create_test_plan_line, create_test_subscription, date,
    };
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_fixed_rate() {
        let pricing = InMemoryPricingService::new();
        let sub = create_test_subscription(|_| {});
        let rate = line_rate(&pricing, &sub, &sub.plan_lines[0], date(2024, 1, 1)).await;
        assert_eq!(rate, dec!(100));
    }

    #[tokio::test]
    async fn test_pricing_rule_takes_precedence() {
        let pricing = InMemoryPricingService::new()
            .with_price("seat", dec!(40))
            .with_rule("seat", dec!(35));
        let sub = create_test_subscription(|s| {
            s.plan_lines = vec![create_test_plan_line(s.id, |l| {
                l.item_code = "seat".into();
                l.price_determination = PriceDetermination::PriceList;
                l.fixed_rate = None;
            })];
        });
        let rate = line_rate(&pricing, &sub, &sub.plan_lines[0], date(2024, 1, 1)).await;
        assert_eq!(rate, dec!(35));
    }

    #[tokio::test]
    async fn test_price_list_without_rule() {
        let pricing = InMemoryPricingService::new().with_price("seat", dec!(40));
        let sub = create_test_subscription(|s| {
            s.plan_lines = vec![create_test_plan_line(s.id, |l| {
                l.item_code = "seat".into();
                l.price_determination = PriceDetermination::PriceList;
            })];
        });
        let rate = line_rate(&pricing, &sub, &sub.plan_lines[0], date(2024, 1, 1)).await;
        assert_eq!(rate, dec!(40));
    }

    #[tokio::test]
    async fn test_missing_price_is_zero() {
        let pricing = InMemoryPricingService::new();
        let sub = create_test_subscription(|s| {
            s.plan_lines = vec![create_test_plan_line(s.id, |l| {
                l.price_determination = PriceDetermination::PriceList;
            })];
        });
        let rate = line_rate(&pricing, &sub, &sub.plan_lines[0], date(2024, 1, 1)).await;
        assert_eq!(rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_pricing_failure_is_zero() {
        let pricing = InMemoryPricingService::new().failing();
        let sub = create_test_subscription(|s| {
            s.plan_lines = vec![create_test_plan_line(s.id, |l| {
                l.price_determination = PriceDetermination::PriceList;
            })];
        });
        let rate = line_rate(&pricing, &sub, &sub.plan_lines[0], date(2024, 1, 1)).await;
        assert_eq!(rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_refresh_sets_statuses() {
        let pricing = InMemoryPricingService::new();
        let mut sub = create_test_subscription(|s| {
            s.plan_lines = vec![
                create_test_plan_line(s.id, |l| l.fixed_rate = Some(dec!(10))),
                create_test_plan_line(s.id, |l| {
                    l.fixed_rate = Some(dec!(20));
                    l.from_date = Some(date(2024, 2, 1));
                }),
                create_test_plan_line(s.id, |l| {
                    l.fixed_rate = Some(dec!(30));
                    l.to_date = Some(date(2023, 12, 31));
                }),
            ];
        });
        refresh_plan_lines(&pricing, &mut sub, date(2024, 1, 15)).await;
        let statuses: Vec<_> = sub.plan_lines.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            vec![
                PlanLineStatus::Active,
                PlanLineStatus::Upcoming,
                PlanLineStatus::Inactive
            ]
        );
        assert_eq!(sub.plan_lines[1].rate, dec!(20));
    }

    #[tokio::test]
    async fn test_totals_include_upcoming_and_skip_ended() {
        let pricing = InMemoryPricingService::new();
        let mut sub = create_test_subscription(|s| {
            s.plan_lines = vec![
                create_test_plan_line(s.id, |l| {
                    l.fixed_rate = Some(dec!(10));
                    l.quantity = dec!(3);
                }),
                create_test_plan_line(s.id, |l| {
                    l.fixed_rate = Some(dec!(20));
                    l.from_date = Some(date(2024, 2, 1));
                }),
                create_test_plan_line(s.id, |l| {
                    l.fixed_rate = Some(dec!(30));
                    l.to_date = Some(date(2023, 12, 31));
                }),
            ];
        });
        refresh_plan_lines(&pricing, &mut sub, date(2024, 1, 15)).await;
        let result = totals(&sub, Some(date(2024, 1, 1)));
        assert_eq!(result.total, dec!(50));
        assert_eq!(result.grand_total, dec!(50));
    }

    #[test]
    fn test_discounts() {
        assert_eq!(apply_discount(dec!(200), dec!(10), dec!(5)), dec!(175));
        assert_eq!(apply_discount(dec!(10), Decimal::ZERO, dec!(50)), Decimal::ZERO);
        assert_eq!(apply_discount(dec!(99.99), dec!(15), Decimal::ZERO), dec!(84.99));
    }
}
