//! Balancer V2 vault calls.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use num_bigint::BigUint;
use zap_common::{
    models::{zap::ZapStep, Address as TokenAddress},
    Bytes,
};

use super::{dynamic_step, CallAmount};
use crate::{abi::IBalancerVault, biguint_to_u256, BytesCodec, EncodingError};

/// Join kind shared by weighted, meta-stable and composable stable pools.
const JOIN_EXACT_TOKENS_IN_FOR_BPT_OUT: u8 = 1;
/// Exit kind shared by weighted, meta-stable and composable stable pools.
const EXIT_EXACT_BPT_IN_FOR_ONE_TOKEN_OUT: u8 = 0;
/// Proportional exit of weighted and meta-stable pools.
pub const EXIT_EXACT_BPT_IN_FOR_TOKENS_OUT: u8 = 1;
/// Proportional exit of composable stable pools.
pub const EXIT_EXACT_BPT_IN_FOR_ALL_TOKENS_OUT: u8 = 2;
const SWAP_KIND_GIVEN_IN: u8 = 0;

/// The vault and pool a call goes to, plus the account sending and receiving tokens.
#[derive(Debug, Clone)]
pub struct PoolCall<'a> {
    pub vault: &'a TokenAddress,
    pub pool_id: &'a Bytes,
    pub account: &'a TokenAddress,
}

impl PoolCall<'_> {
    fn decode(&self) -> Result<(B256, Address), EncodingError> {
        Ok((B256::from_bytes(self.pool_id)?, Address::from_bytes(self.account)?))
    }
}

fn addresses(tokens: &[TokenAddress]) -> Result<Vec<Address>, EncodingError> {
    tokens.iter().map(Address::from_bytes).collect()
}

fn amounts(values: &[BigUint]) -> Result<Vec<U256>, EncodingError> {
    values.iter().map(biguint_to_u256).collect()
}

/// Joins with exact token amounts. The amounts are repeated in the user data, so they are
/// encoded as planned rather than inserted from the live balance.
pub fn join_pool_step(
    call: &PoolCall<'_>,
    assets: &[TokenAddress],
    amounts_in: &[BigUint],
    min_bpt_out: &BigUint,
) -> Result<ZapStep, EncodingError> {
    if assets.len() != amounts_in.len() {
        return Err(EncodingError::Unsupported("join amounts do not match assets".to_string()));
    }
    let (pool_id, account) = call.decode()?;
    let asset_addresses = addresses(assets)?;
    let min_bpt_out = biguint_to_u256(min_bpt_out)?;
    let call_amounts = assets
        .iter()
        .zip(amounts(amounts_in)?)
        .map(|(token, amount)| CallAmount::new(token, amount))
        .collect::<Vec<_>>();
    Ok(dynamic_step(call.vault, BigUint::default(), &call_amounts, |values| {
        let user_data =
            (U256::from(JOIN_EXACT_TOKENS_IN_FOR_BPT_OUT), values.to_vec(), min_bpt_out)
                .abi_encode_params();
        IBalancerVault::joinPoolCall {
            poolId: pool_id,
            sender: account,
            recipient: account,
            request: IBalancerVault::JoinPoolRequest {
                assets: asset_addresses.clone(),
                maxAmountsIn: values.to_vec(),
                userData: user_data.into(),
                fromInternalBalance: false,
            },
        }
        .abi_encode()
    }))
}

/// Burns `bpt_in` for a single token at `exit_index` of `assets`.
pub fn exit_pool_single_step(
    call: &PoolCall<'_>,
    bpt: &TokenAddress,
    assets: &[TokenAddress],
    bpt_in: &BigUint,
    exit_index: usize,
    min_amount_out: &BigUint,
) -> Result<ZapStep, EncodingError> {
    if exit_index >= assets.len() {
        return Err(EncodingError::Unsupported(format!("exit index {exit_index} out of range")));
    }
    let (pool_id, account) = call.decode()?;
    let asset_addresses = addresses(assets)?;
    let mut min_amounts_out = vec![U256::ZERO; assets.len()];
    min_amounts_out[exit_index] = biguint_to_u256(min_amount_out)?;
    Ok(dynamic_step(
        call.vault,
        BigUint::default(),
        &[CallAmount::new(bpt, biguint_to_u256(bpt_in)?)],
        |values| {
            let user_data = (
                U256::from(EXIT_EXACT_BPT_IN_FOR_ONE_TOKEN_OUT),
                values[0],
                U256::from(exit_index),
            )
                .abi_encode_params();
            IBalancerVault::exitPoolCall {
                poolId: pool_id,
                sender: account,
                recipient: account,
                request: IBalancerVault::ExitPoolRequest {
                    assets: asset_addresses.clone(),
                    minAmountsOut: min_amounts_out.clone(),
                    userData: user_data.into(),
                    toInternalBalance: false,
                },
            }
            .abi_encode()
        },
    ))
}

/// Proportional exit; `exit_kind` depends on the pool type.
pub fn exit_pool_proportional_step(
    call: &PoolCall<'_>,
    bpt: &TokenAddress,
    assets: &[TokenAddress],
    bpt_in: &BigUint,
    min_amounts_out: &[BigUint],
    exit_kind: u8,
) -> Result<ZapStep, EncodingError> {
    let (pool_id, account) = call.decode()?;
    let asset_addresses = addresses(assets)?;
    let min_amounts_out = amounts(min_amounts_out)?;
    Ok(dynamic_step(
        call.vault,
        BigUint::default(),
        &[CallAmount::new(bpt, biguint_to_u256(bpt_in)?)],
        |values| {
            let user_data = (U256::from(exit_kind), values[0]).abi_encode_params();
            IBalancerVault::exitPoolCall {
                poolId: pool_id,
                sender: account,
                recipient: account,
                request: IBalancerVault::ExitPoolRequest {
                    assets: asset_addresses.clone(),
                    minAmountsOut: min_amounts_out.clone(),
                    userData: user_data.into(),
                    toInternalBalance: false,
                },
            }
            .abi_encode()
        },
    ))
}

/// Single pool swap, also used to mint and burn composable stable BPT.
pub fn swap_step(
    call: &PoolCall<'_>,
    asset_in: &TokenAddress,
    asset_out: &TokenAddress,
    amount: &BigUint,
    min_amount_out: &BigUint,
    deadline: U256,
) -> Result<ZapStep, EncodingError> {
    let (pool_id, account) = call.decode()?;
    let (asset_in_address, asset_out_address) =
        (Address::from_bytes(asset_in)?, Address::from_bytes(asset_out)?);
    let limit = biguint_to_u256(min_amount_out)?;
    Ok(dynamic_step(
        call.vault,
        BigUint::default(),
        &[CallAmount::new(asset_in, biguint_to_u256(amount)?)],
        |values| {
            IBalancerVault::swapCall {
                singleSwap: IBalancerVault::SingleSwap {
                    poolId: pool_id,
                    kind: SWAP_KIND_GIVEN_IN,
                    assetIn: asset_in_address,
                    assetOut: asset_out_address,
                    amount: values[0],
                    userData: Default::default(),
                },
                funds: IBalancerVault::FundManagement {
                    sender: account,
                    fromInternalBalance: false,
                    recipient: account,
                    toInternalBalance: false,
                },
                limit,
                deadline,
            }
            .abi_encode()
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use zap_common::models::zap::{BalanceInsert, StepToken};

    use super::*;

    fn addr(last: &str) -> Bytes {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    fn fixture() -> (Bytes, Bytes, Bytes) {
        (addr("ba"), Bytes::from(vec![0x11u8; 32]), addr("01"))
    }

    #[test]
    fn test_join_amounts_are_static() {
        let (vault, pool_id, account) = fixture();
        let call = PoolCall { vault: &vault, pool_id: &pool_id, account: &account };

        let step = join_pool_step(
            &call,
            &[addr("a0"), addr("b0")],
            &[BigUint::from(5u32), BigUint::default()],
            &BigUint::from(1u32),
        )
        .unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(addr("a0"), BalanceInsert::NotDynamic)]);
        let decoded = IBalancerVault::joinPoolCall::abi_decode(&step.data).unwrap();
        assert_eq!(decoded.request.maxAmountsIn, vec![U256::from(5u32), U256::ZERO]);
    }

    #[test]
    fn test_single_exit_inserts_bpt_amount() {
        let (vault, pool_id, account) = fixture();
        let call = PoolCall { vault: &vault, pool_id: &pool_id, account: &account };
        let bpt = addr("cc");

        let step = exit_pool_single_step(
            &call,
            &bpt,
            &[addr("a0"), addr("b0")],
            &BigUint::from(5u32),
            1,
            &BigUint::from(2u32),
        )
        .unwrap();

        assert_eq!(step.tokens.len(), 1);
        assert!(matches!(step.tokens[0].index, BalanceInsert::At(offset) if offset > 4));
        assert!(exit_pool_single_step(
            &call,
            &bpt,
            &[addr("a0")],
            &BigUint::from(5u32),
            1,
            &BigUint::default()
        )
        .is_err());
    }

    #[test]
    fn test_swap_inserts_amount() {
        let (vault, pool_id, account) = fixture();
        let call = PoolCall { vault: &vault, pool_id: &pool_id, account: &account };

        let step = swap_step(
            &call,
            &addr("a0"),
            &addr("cc"),
            &BigUint::from(5u32),
            &BigUint::from(4u32),
            U256::from(100u32),
        )
        .unwrap();

        assert_eq!(step.tokens.len(), 1);
        assert!(matches!(step.tokens[0].index, BalanceInsert::At(_)));
    }
}
