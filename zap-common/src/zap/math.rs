//! Amount conversions and the small pieces of arithmetic shared by every strategy.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    errors::ZapError,
    models::{
        quote::{ZapFee, ZapQuoteStep},
        token::{Token, TokenAmount},
        Chain,
    },
    traits::StateSnapshot,
};

/// Largest mantissa a `Decimal` can hold (96 bits).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;
const MAX_SCALE: u32 = 28;

/// Converts a human amount to base units, flooring to `decimals`.
pub fn to_wei(amount: &Decimal, decimals: u32) -> Result<BigUint, ZapError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ZapError::Encoding(format!("negative amount {amount}")));
    }
    let floored = amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero);
    let mantissa = BigUint::from(floored.mantissa().unsigned_abs());
    let scale = floored.scale();
    Ok(mantissa * BigUint::from(10u32).pow(decimals - scale))
}

/// Converts base units to a human amount.
///
/// Amounts with more significant digits than a `Decimal` holds are truncated towards zero.
pub fn from_wei(amount: &BigUint, decimals: u32) -> Result<Decimal, ZapError> {
    let ten = BigUint::from(10u32);
    let mut mantissa = amount.clone();
    let mut scale = decimals;
    while scale > MAX_SCALE {
        mantissa /= &ten;
        scale -= 1;
    }
    while mantissa > BigUint::from(MAX_MANTISSA) {
        if scale == 0 {
            return Err(ZapError::Encoding(format!("amount {amount} out of range")));
        }
        mantissa /= &ten;
        scale -= 1;
    }
    let mantissa = mantissa
        .to_i128()
        .ok_or_else(|| ZapError::Encoding(format!("amount {amount} out of range")))?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|e| ZapError::Encoding(e.to_string()))
}

/// `amount * (1 - slippage)`, floored to the token's decimals.
pub fn slip_by(amount: Decimal, slippage: Decimal, decimals: u32) -> Decimal {
    (amount * (Decimal::ONE - slippage))
        .round_dp_with_strategy(decimals.min(MAX_SCALE), RoundingStrategy::ToZero)
}

pub fn slip_amount(amount: &TokenAmount, slippage: Decimal) -> TokenAmount {
    TokenAmount::new(amount.token.clone(), slip_by(amount.amount, slippage, amount.token.decimals))
}

/// Deterministic id of a token set on a chain, independent of order and address case.
pub fn selection_id(chain: Chain, tokens: &[Token]) -> String {
    let mut addresses: Vec<String> = tokens
        .iter()
        .map(|t| t.address.to_hex())
        .collect();
    addresses.sort();
    addresses.dedup();
    format!("{}:{}", chain.id(), addresses.join("+"))
}

/// Summed USD value of `amounts`; tokens without a price count as zero.
pub fn total_value<'a>(
    amounts: impl IntoIterator<Item = &'a TokenAmount>,
    state: &dyn StateSnapshot,
) -> Decimal {
    amounts
        .into_iter()
        .map(|a| {
            state
                .price(&a.token)
                .map_or(Decimal::ZERO, |price| price * a.amount)
        })
        .sum()
}

/// Percentage of input value not recovered in outputs plus returned dust.
///
/// A zero input value yields 100.
pub fn price_impact(input_value: Decimal, output_value: Decimal) -> Decimal {
    if input_value.is_zero() {
        return Decimal::ONE_HUNDRED;
    }
    (input_value - output_value) / input_value * Decimal::ONE_HUNDRED
}

pub fn quote_price_impact(
    inputs: &[TokenAmount],
    outputs: &[TokenAmount],
    returned: &[TokenAmount],
    state: &dyn StateSnapshot,
) -> Decimal {
    let input_value = total_value(inputs, state);
    let output_value = total_value(outputs.iter().chain(returned), state);
    price_impact(input_value, output_value)
}

/// The largest single fee among the steps; fees are not summed.
pub fn highest_fee(steps: &[ZapQuoteStep]) -> ZapFee {
    steps
        .iter()
        .map(ZapQuoteStep::fee)
        .max()
        .unwrap_or_default()
}

/// `amount * numerator / denominator` in base units, rounded down.
pub fn mul_div(amount: &BigUint, numerator: &BigUint, denominator: &BigUint) -> BigUint {
    if denominator.is_zero() {
        return BigUint::zero();
    }
    amount * numerator / denominator
}
