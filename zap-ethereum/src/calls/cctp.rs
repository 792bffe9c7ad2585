//! Circle CCTP v2 burn calls.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use num_bigint::BigUint;
use zap_common::{
    models::{zap::ZapStep, Address as TokenAddress},
    Bytes,
};

use super::{dynamic_step, CallAmount};
use crate::{abi::ITokenMessengerV2, address_to_b256, biguint_to_u256, BytesCodec, EncodingError};

/// Finality threshold for fast transfers.
pub const FAST_FINALITY_THRESHOLD: u32 = 1000;

#[derive(Debug, Clone)]
pub struct BurnCall<'a> {
    pub token_messenger: &'a TokenAddress,
    pub burn_token: &'a TokenAddress,
    pub destination_domain: u32,
    /// Receives the minted tokens and runs the hook on the destination chain.
    pub mint_recipient: &'a TokenAddress,
    pub max_fee: &'a BigUint,
    pub min_finality_threshold: u32,
}

/// Burns the router's balance of `burn_token`; only the hook receiver may relay the message.
pub fn burn_step(
    call: &BurnCall<'_>,
    amount: &BigUint,
    hook_data: &Bytes,
) -> Result<ZapStep, EncodingError> {
    let recipient: B256 = address_to_b256(&Address::from_bytes(call.mint_recipient)?);
    let burn_token = Address::from_bytes(call.burn_token)?;
    let max_fee = biguint_to_u256(call.max_fee)?;
    let destination_domain = call.destination_domain;
    let min_finality_threshold = call.min_finality_threshold;
    Ok(dynamic_step(
        call.token_messenger,
        BigUint::default(),
        &[CallAmount::new(call.burn_token, biguint_to_u256(amount)?)],
        |values| {
            ITokenMessengerV2::depositForBurnWithHookCall {
                amount: values[0],
                destinationDomain: destination_domain,
                mintRecipient: recipient,
                burnToken: burn_token,
                destinationCaller: recipient,
                maxFee: max_fee,
                minFinalityThreshold: min_finality_threshold,
                hookData: hook_data.to_vec().into(),
            }
            .abi_encode()
        },
    ))
}

/// `abi.encode(destinationChainId, payload)`.
pub fn hook_data(destination_chain_id: u64, payload: &Bytes) -> Bytes {
    let payload: alloy_primitives::Bytes = payload.to_vec().into();
    Bytes::from((U256::from(destination_chain_id), payload).abi_encode_params())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use zap_common::models::zap::{BalanceInsert, StepToken};

    use super::*;

    fn addr(last: &str) -> Bytes {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    #[test]
    fn test_burn_inserts_amount() {
        let (messenger, usdc, receiver) = (addr("aa"), addr("a0"), addr("bb"));
        let max_fee = BigUint::from(100u32);
        let call = BurnCall {
            token_messenger: &messenger,
            burn_token: &usdc,
            destination_domain: 3,
            mint_recipient: &receiver,
            max_fee: &max_fee,
            min_finality_threshold: FAST_FINALITY_THRESHOLD,
        };

        let step = burn_step(&call, &BigUint::from(1_000_000u32), &Bytes::from(vec![1u8, 2])).unwrap();

        assert_eq!(step.target, messenger);
        assert_eq!(step.tokens, vec![StepToken::new(usdc, BalanceInsert::At(4))]);
        let decoded = ITokenMessengerV2::depositForBurnWithHookCall::abi_decode(&step.data).unwrap();
        assert_eq!(decoded.destinationDomain, 3);
        assert_eq!(decoded.hookData.to_vec(), vec![1u8, 2]);
    }

    #[test]
    fn test_hook_data_layout() {
        let data = hook_data(8453, &Bytes::from(vec![0xabu8]));

        // chain id, offset, length, padded payload
        assert_eq!(data.len(), 4 * 32);
        assert_eq!(&data[30..32], &[0x21, 0x05]);
        assert_eq!(data[96], 0xab);
    }
}
