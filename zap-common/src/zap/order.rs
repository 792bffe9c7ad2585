//! Order assembly: required outputs first, then zero-minimum dust for every token the route
//! touched, so nothing is left behind in the router.

use std::collections::HashSet;

use num_bigint::BigUint;
use rust_decimal::Decimal;

use crate::{
    errors::ZapError,
    models::{
        token::{InputTokenAmount, Token, TokenAmount},
        zap::{OrderInput, OrderOutput, ZapOrder, ZapStep},
        Address,
    },
    zap::math::slip_amount,
};

/// Wanted outputs with their slippage adjusted minimum.
pub fn required_outputs(
    outputs: &[TokenAmount],
    slippage: Decimal,
) -> Result<Vec<OrderOutput>, ZapError> {
    outputs
        .iter()
        .map(|output| {
            let min = slip_amount(output, slippage);
            Ok(OrderOutput { token: output.token.address.clone(), min_output_amount: min.to_wei()? })
        })
        .collect()
}

pub fn dust_outputs<'a>(tokens: impl IntoIterator<Item = &'a Token>) -> Vec<OrderOutput> {
    tokens
        .into_iter()
        .map(|token| OrderOutput { token: token.address.clone(), min_output_amount: BigUint::default() })
        .collect()
}

/// Concatenates the lists and drops repeated tokens, keeping the first occurrence.
pub fn merge_outputs(required: Vec<OrderOutput>, dust: Vec<OrderOutput>) -> Vec<OrderOutput> {
    let mut seen = HashSet::new();
    required
        .into_iter()
        .chain(dust)
        .filter(|output| seen.insert(output.token.clone()))
        .collect()
}

pub fn order_inputs(inputs: &[InputTokenAmount]) -> Result<Vec<OrderInput>, ZapError> {
    inputs
        .iter()
        .map(|input| Ok(OrderInput { token: input.token.address.clone(), amount: input.to_wei()? }))
        .collect()
}

/// Everything needed to close an order.
#[derive(Debug, Clone)]
pub struct OrderParams<'a> {
    pub user: &'a Address,
    pub recipient: &'a Address,
    pub slippage: Decimal,
}

pub fn assemble_order<'a>(
    params: &OrderParams<'_>,
    inputs: &[InputTokenAmount],
    wanted: &[TokenAmount],
    dust: impl IntoIterator<Item = &'a Token>,
    steps: Vec<ZapStep>,
) -> Result<ZapOrder, ZapError> {
    let outputs = merge_outputs(required_outputs(wanted, params.slippage)?, dust_outputs(dust));
    Ok(ZapOrder {
        user: params.user.clone(),
        recipient: params.recipient.clone(),
        inputs: order_inputs(inputs)?,
        outputs,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{models::Chain, Bytes};

    fn token(address: &str, symbol: &str, decimals: u32) -> Token {
        Token::new(&Bytes::from_str(address).unwrap(), symbol, decimals, Chain::Polygon)
    }

    #[test]
    fn test_required_outputs_not_downgraded_by_dust() {
        let usdc = token("0x3c499c542cef5e3811e1192ce70d8cc03d5c3359", "USDC", 6);
        let wpol = Chain::Polygon.wrapped_native_token();
        let user = Bytes::from_str("0x00000000000000000000000000000000000000ab").unwrap();

        let order = assemble_order(
            &OrderParams { user: &user, recipient: &user, slippage: dec!(0.01) },
            &[InputTokenAmount::new(wpol.clone(), dec!(2), false)],
            &[TokenAmount::new(usdc.clone(), dec!(100))],
            [&wpol, &usdc, &wpol],
            vec![],
        )
        .unwrap();

        assert_eq!(
            order.outputs,
            vec![
                OrderOutput {
                    token: usdc.address.clone(),
                    min_output_amount: BigUint::from(99_000_000u64)
                },
                OrderOutput { token: wpol.address.clone(), min_output_amount: BigUint::default() },
            ]
        );
        assert_eq!(
            order.inputs,
            vec![OrderInput {
                token: wpol.address.clone(),
                amount: BigUint::from(2_000_000_000_000_000_000u64)
            }]
        );
    }

    #[test]
    fn test_merge_keeps_first() {
        let a = Bytes::from_str("0x01").unwrap();
        let b = Bytes::from_str("0x02").unwrap();
        let required = vec![OrderOutput { token: a.clone(), min_output_amount: BigUint::from(5u8) }];
        let dust = dust_outputs(&[
            token("0x02", "B", 18),
            token("0x01", "A", 18),
            token("0x02", "B", 18),
        ]);

        let merged = merge_outputs(required, dust);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].token, a);
        assert_eq!(merged[0].min_output_amount, BigUint::from(5u8));
        assert_eq!(merged[1].token, b);
    }
}
