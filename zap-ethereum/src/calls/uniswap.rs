//! Uniswap V2 style router calls.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use num_bigint::BigUint;
use zap_common::models::{zap::ZapStep, Address as TokenAddress};

use super::{dynamic_step, CallAmount};
use crate::{abi::IUniswapV2Router, biguint_to_u256, BytesCodec, EncodingError};

/// Shared parameters of every router call.
#[derive(Debug, Clone)]
pub struct RouterCall<'a> {
    pub router: &'a TokenAddress,
    /// Receiver of the call outputs, usually the zap router itself.
    pub to: &'a TokenAddress,
    pub deadline: U256,
}

impl RouterCall<'_> {
    fn to(&self) -> Result<Address, EncodingError> {
        Address::from_bytes(self.to)
    }
}

pub fn add_liquidity_step(
    call: &RouterCall<'_>,
    tokens: [&TokenAddress; 2],
    amounts: [&BigUint; 2],
    min_amounts: [&BigUint; 2],
) -> Result<ZapStep, EncodingError> {
    let token_a = Address::from_bytes(tokens[0])?;
    let token_b = Address::from_bytes(tokens[1])?;
    let amount_a_min = biguint_to_u256(min_amounts[0])?;
    let amount_b_min = biguint_to_u256(min_amounts[1])?;
    let to = call.to()?;
    let deadline = call.deadline;
    Ok(dynamic_step(
        call.router,
        BigUint::default(),
        &[
            CallAmount::new(tokens[0], biguint_to_u256(amounts[0])?),
            CallAmount::new(tokens[1], biguint_to_u256(amounts[1])?),
        ],
        |values| {
            IUniswapV2Router::addLiquidityCall {
                tokenA: token_a,
                tokenB: token_b,
                amountADesired: values[0],
                amountBDesired: values[1],
                amountAMin: amount_a_min,
                amountBMin: amount_b_min,
                to,
                deadline,
            }
            .abi_encode()
        },
    ))
}

pub fn remove_liquidity_step(
    call: &RouterCall<'_>,
    pair: &TokenAddress,
    tokens: [&TokenAddress; 2],
    liquidity: &BigUint,
    min_amounts: [&BigUint; 2],
) -> Result<ZapStep, EncodingError> {
    let token_a = Address::from_bytes(tokens[0])?;
    let token_b = Address::from_bytes(tokens[1])?;
    let amount_a_min = biguint_to_u256(min_amounts[0])?;
    let amount_b_min = biguint_to_u256(min_amounts[1])?;
    let to = call.to()?;
    let deadline = call.deadline;
    Ok(dynamic_step(
        call.router,
        BigUint::default(),
        &[CallAmount::new(pair, biguint_to_u256(liquidity)?)],
        |values| {
            IUniswapV2Router::removeLiquidityCall {
                tokenA: token_a,
                tokenB: token_b,
                liquidity: values[0],
                amountAMin: amount_a_min,
                amountBMin: amount_b_min,
                to,
                deadline,
            }
            .abi_encode()
        },
    ))
}

/// Swaps through a single pair.
pub fn swap_step(
    call: &RouterCall<'_>,
    token_in: &TokenAddress,
    token_out: &TokenAddress,
    amount_in: &BigUint,
    min_amount_out: &BigUint,
) -> Result<ZapStep, EncodingError> {
    let path = vec![Address::from_bytes(token_in)?, Address::from_bytes(token_out)?];
    let amount_out_min = biguint_to_u256(min_amount_out)?;
    let to = call.to()?;
    let deadline = call.deadline;
    Ok(dynamic_step(
        call.router,
        BigUint::default(),
        &[CallAmount::new(token_in, biguint_to_u256(amount_in)?)],
        |values| {
            IUniswapV2Router::swapExactTokensForTokensCall {
                amountIn: values[0],
                amountOutMin: amount_out_min,
                path: path.clone(),
                to,
                deadline,
            }
            .abi_encode()
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use zap_common::{
        models::zap::{BalanceInsert, StepToken},
        Bytes,
    };

    use super::*;

    fn addr(last: &str) -> Bytes {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    #[test]
    fn test_add_liquidity_inserts_both_amounts() {
        let (router, to) = (addr("01"), addr("02"));
        let call = RouterCall { router: &router, to: &to, deadline: U256::from(1_000u32) };
        let (a, b) = (addr("a0"), addr("b0"));

        let step = add_liquidity_step(
            &call,
            [&a, &b],
            [&BigUint::from(100u32), &BigUint::from(200u32)],
            [&BigUint::from(99u32), &BigUint::from(198u32)],
        )
        .unwrap();

        assert_eq!(step.target, router);
        assert_eq!(
            step.tokens,
            vec![
                StepToken::new(a, BalanceInsert::At(4 + 2 * 32)),
                StepToken::new(b, BalanceInsert::At(4 + 3 * 32)),
            ]
        );
        let decoded = IUniswapV2Router::addLiquidityCall::abi_decode(&step.data).unwrap();
        assert_eq!(decoded.amountBMin, U256::from(198u32));
    }

    #[test]
    fn test_swap_inserts_amount_in() {
        let (router, to) = (addr("01"), addr("02"));
        let call = RouterCall { router: &router, to: &to, deadline: U256::from(1_000u32) };
        let (a, b) = (addr("a0"), addr("b0"));

        let step =
            swap_step(&call, &a, &b, &BigUint::from(100u32), &BigUint::from(90u32)).unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(a, BalanceInsert::At(4))]);
    }

    #[test]
    fn test_remove_liquidity_inserts_liquidity() {
        let (router, to) = (addr("01"), addr("02"));
        let call = RouterCall { router: &router, to: &to, deadline: U256::from(1_000u32) };
        let (pair, a, b) = (addr("cc"), addr("a0"), addr("b0"));
        let zero = BigUint::default();

        let step =
            remove_liquidity_step(&call, &pair, [&a, &b], &BigUint::from(5u32), [&zero, &zero])
                .unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(pair, BalanceInsert::At(4 + 2 * 32))]);
    }
}
