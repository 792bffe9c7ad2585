//! Curve StableSwap pool calls. Two and three coin pools take fixed size arrays, larger and
//! newer pools take dynamic arrays.

use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use num_bigint::BigUint;
use zap_common::models::{zap::ZapStep, Address};

use super::{dynamic_step, CallAmount};
use crate::{
    abi::{ICurvePool, ICurvePool2, ICurvePool3, ICurvePoolNg},
    biguint_to_u256, EncodingError,
};

fn to_u256_vec(amounts: &[BigUint]) -> Result<Vec<U256>, EncodingError> {
    amounts.iter().map(biguint_to_u256).collect()
}

fn coin_index(i: usize) -> Result<i128, EncodingError> {
    i128::try_from(i).map_err(|_| EncodingError::Unsupported(format!("coin index {i}")))
}

fn encode_add_liquidity(values: &[U256], min_mint_amount: U256) -> Vec<u8> {
    match values {
        [a, b] => ICurvePool2::add_liquidityCall { amounts: [*a, *b], min_mint_amount }.abi_encode(),
        [a, b, c] => ICurvePool3::add_liquidityCall { amounts: [*a, *b, *c], min_mint_amount }
            .abi_encode(),
        _ => ICurvePoolNg::add_liquidityCall { amounts: values.to_vec(), min_mint_amount }
            .abi_encode(),
    }
}

/// Adds `amounts`, one per coin, minting at least `min_mint_amount` LP tokens.
pub fn add_liquidity_step(
    pool: &Address,
    coins: &[Address],
    amounts: &[BigUint],
    min_mint_amount: &BigUint,
) -> Result<ZapStep, EncodingError> {
    if coins.len() != amounts.len() || coins.len() < 2 {
        return Err(EncodingError::Unsupported(format!(
            "curve add_liquidity with {} coins and {} amounts",
            coins.len(),
            amounts.len()
        )));
    }
    let min_mint_amount = biguint_to_u256(min_mint_amount)?;
    let call_amounts = coins
        .iter()
        .zip(to_u256_vec(amounts)?)
        .map(|(coin, amount)| CallAmount::new(coin, amount))
        .collect::<Vec<_>>();
    Ok(dynamic_step(pool, BigUint::default(), &call_amounts, |values| {
        encode_add_liquidity(values, min_mint_amount)
    }))
}

pub fn remove_liquidity_one_coin_step(
    pool: &Address,
    lp_token: &Address,
    token_amount: &BigUint,
    coin: usize,
    min_amount: &BigUint,
) -> Result<ZapStep, EncodingError> {
    let i = coin_index(coin)?;
    let min_amount = biguint_to_u256(min_amount)?;
    Ok(dynamic_step(
        pool,
        BigUint::default(),
        &[CallAmount::new(lp_token, biguint_to_u256(token_amount)?)],
        |values| {
            ICurvePool::remove_liquidity_one_coinCall { token_amount: values[0], i, min_amount }
                .abi_encode()
        },
    ))
}

/// Proportional withdrawal to every coin.
pub fn remove_liquidity_step(
    pool: &Address,
    lp_token: &Address,
    amount: &BigUint,
    min_amounts: &[BigUint],
) -> Result<ZapStep, EncodingError> {
    let mins = to_u256_vec(min_amounts)?;
    Ok(dynamic_step(
        pool,
        BigUint::default(),
        &[CallAmount::new(lp_token, biguint_to_u256(amount)?)],
        |values| match mins.as_slice() {
            [a, b] => ICurvePool2::remove_liquidityCall { amount: values[0], min_amounts: [*a, *b] }
                .abi_encode(),
            [a, b, c] => ICurvePool3::remove_liquidityCall {
                amount: values[0],
                min_amounts: [*a, *b, *c],
            }
            .abi_encode(),
            _ => ICurvePoolNg::remove_liquidityCall { amount: values[0], min_amounts: mins.clone() }
                .abi_encode(),
        },
    ))
}

pub fn exchange_step(
    pool: &Address,
    token_in: &Address,
    i: usize,
    j: usize,
    dx: &BigUint,
    min_dy: &BigUint,
) -> Result<ZapStep, EncodingError> {
    let (i, j) = (coin_index(i)?, coin_index(j)?);
    let min_dy = biguint_to_u256(min_dy)?;
    Ok(dynamic_step(
        pool,
        BigUint::default(),
        &[CallAmount::new(token_in, biguint_to_u256(dx)?)],
        |values| ICurvePool::exchangeCall { i, j, dx: values[0], min_dy }.abi_encode(),
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
    fn test_single_coin_add_liquidity() {
        let pool = addr("cc");
        let coins = vec![addr("a0"), addr("b0"), addr("c0")];
        let amounts = vec![BigUint::default(), BigUint::from(7u32), BigUint::default()];

        let step = add_liquidity_step(&pool, &coins, &amounts, &BigUint::from(6u32)).unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(addr("b0"), BalanceInsert::At(4 + 32))]);
        assert_eq!(&step.data[..4], ICurvePool3::add_liquidityCall::SELECTOR.as_slice());
    }

    #[test]
    fn test_add_liquidity_rejects_mismatched_lengths() {
        let pool = addr("cc");

        let res = add_liquidity_step(&pool, &[addr("a0")], &[], &BigUint::default());

        assert!(res.is_err());
    }

    #[test]
    fn test_remove_one_coin() {
        let (pool, lp) = (addr("cc"), addr("dd"));

        let step =
            remove_liquidity_one_coin_step(&pool, &lp, &BigUint::from(3u32), 1, &BigUint::from(2u32))
                .unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(lp, BalanceInsert::At(4))]);
        let decoded = ICurvePool::remove_liquidity_one_coinCall::abi_decode(&step.data).unwrap();
        assert_eq!(decoded.i, 1);
    }
}
