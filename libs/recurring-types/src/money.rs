use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amount in the subscription's currency.
pub type Money = Decimal;

const MONEY_DECIMALS: u32 = 2;

/// Round to cents, halves away from zero.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}
