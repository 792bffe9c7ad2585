//! Vault entry and exit calls.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use num_bigint::BigUint;
use zap_common::models::{zap::ZapStep, Address as TokenAddress};

use super::{dynamic_step, static_step, CallAmount};
use crate::{
    abi::{IBeefyVault, IConcentratedLiquidityManager, IERC4626, IGovVault},
    biguint_to_u256, BytesCodec, EncodingError,
};

/// Deposits the router's whole balance of `want`.
pub fn standard_deposit_step(vault: &TokenAddress, want: &TokenAddress) -> ZapStep {
    static_step(
        vault,
        BigUint::default(),
        IBeefyVault::depositAllCall {}.abi_encode(),
        std::slice::from_ref(want),
    )
}

/// Burns vault shares; the share token is the vault itself.
pub fn standard_withdraw_step(vault: &TokenAddress, shares: &BigUint) -> Result<ZapStep, EncodingError> {
    Ok(dynamic_step(
        vault,
        BigUint::default(),
        &[CallAmount::new(vault, biguint_to_u256(shares)?)],
        |values| IBeefyVault::withdrawCall { shares: values[0] }.abi_encode(),
    ))
}

pub fn erc4626_deposit_step(
    vault: &TokenAddress,
    asset: &TokenAddress,
    assets: &BigUint,
    receiver: &TokenAddress,
) -> Result<ZapStep, EncodingError> {
    let receiver = Address::from_bytes(receiver)?;
    Ok(dynamic_step(
        vault,
        BigUint::default(),
        &[CallAmount::new(asset, biguint_to_u256(assets)?)],
        |values| IERC4626::depositCall { assets: values[0], receiver }.abi_encode(),
    ))
}

/// Redeems shares held by `account`, sending the assets back to it.
pub fn erc4626_redeem_step(
    vault: &TokenAddress,
    shares: &BigUint,
    account: &TokenAddress,
) -> Result<ZapStep, EncodingError> {
    let account = Address::from_bytes(account)?;
    Ok(dynamic_step(
        vault,
        BigUint::default(),
        &[CallAmount::new(vault, biguint_to_u256(shares)?)],
        |values| {
            IERC4626::redeemCall { shares: values[0], receiver: account, owner: account }
                .abi_encode()
        },
    ))
}

pub fn gov_stake_step(
    gov_vault: &TokenAddress,
    stake_token: &TokenAddress,
    amount: &BigUint,
) -> Result<ZapStep, EncodingError> {
    Ok(dynamic_step(
        gov_vault,
        BigUint::default(),
        &[CallAmount::new(stake_token, biguint_to_u256(amount)?)],
        |values| IGovVault::stakeCall { amount: values[0] }.abi_encode(),
    ))
}

/// Gov vault balances are not transferable, nothing is approved; the amount is still inserted
/// from the staked balance tracked under the gov vault address.
pub fn gov_withdraw_step(gov_vault: &TokenAddress, amount: &BigUint) -> Result<ZapStep, EncodingError> {
    Ok(dynamic_step(
        gov_vault,
        BigUint::default(),
        &[CallAmount::new(gov_vault, biguint_to_u256(amount)?)],
        |values| IGovVault::withdrawCall { amount: values[0] }.abi_encode(),
    ))
}

pub fn clm_deposit_step(
    manager: &TokenAddress,
    tokens: [&TokenAddress; 2],
    amounts: [&BigUint; 2],
    min_shares: &BigUint,
) -> Result<ZapStep, EncodingError> {
    let min_shares = biguint_to_u256(min_shares)?;
    Ok(dynamic_step(
        manager,
        BigUint::default(),
        &[
            CallAmount::new(tokens[0], biguint_to_u256(amounts[0])?),
            CallAmount::new(tokens[1], biguint_to_u256(amounts[1])?),
        ],
        |values| {
            IConcentratedLiquidityManager::depositCall {
                amount0: values[0],
                amount1: values[1],
                minShares: min_shares,
            }
            .abi_encode()
        },
    ))
}

pub fn clm_withdraw_step(
    manager: &TokenAddress,
    shares: &BigUint,
    min_amounts: [&BigUint; 2],
) -> Result<ZapStep, EncodingError> {
    let min_amount0 = biguint_to_u256(min_amounts[0])?;
    let min_amount1 = biguint_to_u256(min_amounts[1])?;
    Ok(dynamic_step(
        manager,
        BigUint::default(),
        &[CallAmount::new(manager, biguint_to_u256(shares)?)],
        |values| {
            IConcentratedLiquidityManager::withdrawCall {
                shares: values[0],
                minAmount0: min_amount0,
                minAmount1: min_amount1,
            }
            .abi_encode()
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;
    use zap_common::{
        models::zap::{BalanceInsert, StepToken},
        Bytes,
    };

    use super::*;

    fn addr(last: &str) -> Bytes {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    #[test]
    fn test_standard_deposit_is_deposit_all() {
        let step = standard_deposit_step(&addr("cc"), &addr("a0"));

        assert_eq!(step.data.to_vec(), IBeefyVault::depositAllCall::SELECTOR.to_vec());
        assert_eq!(step.tokens, vec![StepToken::new(addr("a0"), BalanceInsert::NotDynamic)]);
    }

    #[rstest]
    #[case::standard_withdraw(standard_withdraw_step(&addr("cc"), &BigUint::from(3u32)).unwrap())]
    #[case::redeem(erc4626_redeem_step(&addr("cc"), &BigUint::from(3u32), &addr("01")).unwrap())]
    #[case::gov_withdraw(gov_withdraw_step(&addr("cc"), &BigUint::from(3u32)).unwrap())]
    #[case::clm_withdraw(
        clm_withdraw_step(&addr("cc"), &BigUint::from(3u32), [&BigUint::from(1u32), &BigUint::from(1u32)])
            .unwrap()
    )]
    fn test_share_amount_is_first_argument(#[case] step: ZapStep) {
        assert_eq!(step.tokens, vec![StepToken::new(addr("cc"), BalanceInsert::At(4))]);
    }

    #[test]
    fn test_clm_deposit_inserts_both_tokens() {
        let step = clm_deposit_step(
            &addr("cc"),
            [&addr("a0"), &addr("b0")],
            [&BigUint::from(3u32), &BigUint::from(4u32)],
            &BigUint::from(1u32),
        )
        .unwrap();

        assert_eq!(
            step.tokens,
            vec![
                StepToken::new(addr("a0"), BalanceInsert::At(4)),
                StepToken::new(addr("b0"), BalanceInsert::At(36)),
            ]
        );
    }
}
