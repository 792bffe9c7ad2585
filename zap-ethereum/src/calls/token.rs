use alloy_sol_types::SolCall;
use num_bigint::BigUint;
use zap_common::models::{token::Token, zap::ZapStep};

use super::{dynamic_step, static_step, CallAmount};
use crate::{abi::IWrappedNative, biguint_to_u256, EncodingError};

fn check_wrapped(wrapped: &Token) -> Result<(), EncodingError> {
    if !wrapped.is_wrapped_native() {
        return Err(EncodingError::Unsupported(format!("{} is not a wrapped native token", wrapped.symbol)));
    }
    Ok(())
}

/// Wraps `amount` of the native token. The router sends its whole native balance as value.
pub fn wrap_step(wrapped: &Token, amount: &BigUint) -> Result<ZapStep, EncodingError> {
    check_wrapped(wrapped)?;
    let native = wrapped.chain.native_token();
    Ok(static_step(
        &wrapped.address,
        amount.clone(),
        IWrappedNative::depositCall {}.abi_encode(),
        &[native.address],
    ))
}

/// Unwraps the router's wrapped native balance.
pub fn unwrap_step(wrapped: &Token, amount: &BigUint) -> Result<ZapStep, EncodingError> {
    check_wrapped(wrapped)?;
    let amount = biguint_to_u256(amount)?;
    Ok(dynamic_step(
        &wrapped.address,
        BigUint::default(),
        &[CallAmount::new(&wrapped.address, amount)],
        |values| IWrappedNative::withdrawCall { amount: values[0] }.abi_encode(),
    ))
}

#[cfg(test)]
mod tests {
    use zap_common::models::{
        zap::{BalanceInsert, StepToken},
        Chain,
    };

    use super::*;

    #[test]
    fn test_wrap_sends_value() {
        let weth = Chain::Ethereum.wrapped_native_token();

        let step = wrap_step(&weth, &BigUint::from(10u32)).unwrap();

        assert_eq!(step.target, weth.address);
        assert_eq!(step.value, BigUint::from(10u32));
        assert_eq!(step.data.to_vec(), IWrappedNative::depositCall::SELECTOR.to_vec());
        assert_eq!(
            step.tokens,
            vec![StepToken::new(Chain::Ethereum.native_token().address, BalanceInsert::NotDynamic)]
        );
    }

    #[test]
    fn test_unwrap_inserts_amount() {
        let weth = Chain::Ethereum.wrapped_native_token();

        let step = unwrap_step(&weth, &BigUint::from(10u32)).unwrap();

        assert_eq!(step.tokens, vec![StepToken::new(weth.address, BalanceInsert::At(4))]);
        assert!(unwrap_step(&Chain::Ethereum.native_token(), &BigUint::from(1u32)).is_err());
    }
}
