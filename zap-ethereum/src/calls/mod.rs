//! Encoders turning planned actions into router steps.
//!
//! Amount parameters are located in the call data by encoding the call a second time with
//! a different amount and comparing the two encodings. The router overwrites the located
//! 32-byte word with its live balance of the token before executing the call.

pub mod balancer;
pub mod cctp;
pub mod curve;
pub mod router;
pub mod token;
pub mod uniswap;
pub mod vault;

use alloy_primitives::U256;
use num_bigint::BigUint;
use tracing::debug;
use zap_common::{
    models::{
        zap::{BalanceInsert, StepToken, ZapStep},
        Address,
    },
    Bytes,
};

const SELECTOR_LEN: usize = 4;
const WORD_LEN: usize = 32;

/// An amount parameter of a call, paid in `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAmount {
    pub token: Address,
    pub amount: U256,
}

impl CallAmount {
    pub fn new(token: &Address, amount: U256) -> Self {
        Self { token: token.clone(), amount }
    }
}

/// Byte offset of the single 32-byte word that differs between `data` and `probe`.
///
/// Returns `NotDynamic` when the encodings differ in length, or when the amount shows up in
/// more than one word (e.g. repeated inside nested user data), as the router can only
/// overwrite one position per token.
pub fn amount_offset(data: &[u8], probe: &[u8]) -> BalanceInsert {
    if data.len() != probe.len() || data.len() < SELECTOR_LEN {
        return BalanceInsert::NotDynamic;
    }
    let mut changed = data[SELECTOR_LEN..]
        .chunks(WORD_LEN)
        .zip(probe[SELECTOR_LEN..].chunks(WORD_LEN))
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i);
    match (changed.next(), changed.next()) {
        (Some(word), None) => BalanceInsert::At(SELECTOR_LEN + word * WORD_LEN),
        _ => BalanceInsert::NotDynamic,
    }
}

/// Encodes a call whose `amounts` are inserted from the router balance at execution time.
///
/// `encode` receives the amounts in the order given and must be deterministic. Zero amounts
/// are not listed as step tokens since nothing needs to be approved for them.
pub fn dynamic_step<F>(
    target: &Address,
    value: BigUint,
    amounts: &[CallAmount],
    encode: F,
) -> ZapStep
where
    F: Fn(&[U256]) -> Vec<u8>,
{
    let values: Vec<U256> = amounts.iter().map(|a| a.amount).collect();
    let data = encode(&values);
    let mut tokens = Vec::with_capacity(amounts.len());
    for (i, call_amount) in amounts.iter().enumerate() {
        if call_amount.amount.is_zero() {
            continue;
        }
        let mut probe = values.clone();
        probe[i] = call_amount.amount ^ U256::from(1u8);
        let index = amount_offset(&data, &encode(&probe));
        if index == BalanceInsert::NotDynamic {
            debug!(token = %call_amount.token, target = %target, "Amount not insertable");
        }
        tokens.push(StepToken::new(call_amount.token.clone(), index));
    }
    ZapStep { target: target.clone(), value, data: Bytes::from(data), tokens }
}

/// A call consuming exactly the encoded amounts; the tokens are only approved.
pub fn static_step(target: &Address, value: BigUint, data: Vec<u8>, tokens: &[Address]) -> ZapStep {
    ZapStep {
        target: target.clone(),
        value,
        data: Bytes::from(data),
        tokens: tokens
            .iter()
            .map(|t| StepToken::new(t.clone(), BalanceInsert::NotDynamic))
            .collect(),
    }
}

/// Unix timestamp `secs` from now.
pub fn deadline_after(secs: u64) -> U256 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    U256::from(now.saturating_add(secs))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    fn word(value: u8) -> Vec<u8> {
        let mut w = vec![0u8; 32];
        w[31] = value;
        w
    }

    fn call(words: &[u8]) -> Vec<u8> {
        let mut data = vec![0xaa, 0xbb, 0xcc, 0xdd];
        for w in words {
            data.extend(word(*w));
        }
        data
    }

    #[rstest]
    #[case::first_word(call(&[1, 2, 3]), call(&[9, 2, 3]), BalanceInsert::At(4))]
    #[case::third_word(call(&[1, 2, 3]), call(&[1, 2, 9]), BalanceInsert::At(68))]
    #[case::repeated(call(&[1, 2, 1]), call(&[9, 2, 9]), BalanceInsert::NotDynamic)]
    #[case::unchanged(call(&[1, 2, 3]), call(&[1, 2, 3]), BalanceInsert::NotDynamic)]
    #[case::length_mismatch(call(&[1, 2]), call(&[1, 2, 3]), BalanceInsert::NotDynamic)]
    fn test_amount_offset(
        #[case] data: Vec<u8>,
        #[case] probe: Vec<u8>,
        #[case] expected: BalanceInsert,
    ) {
        assert_eq!(amount_offset(&data, &probe), expected);
    }

    #[test]
    fn test_dynamic_step_skips_zero_amounts() {
        let target = Bytes::from_str("0x00000000000000000000000000000000000000ff").unwrap();
        let a = Bytes::from_str("0x00000000000000000000000000000000000000a0").unwrap();
        let b = Bytes::from_str("0x00000000000000000000000000000000000000b0").unwrap();
        let amounts =
            [CallAmount::new(&a, U256::from(5u8)), CallAmount::new(&b, U256::ZERO)];

        let step = dynamic_step(&target, BigUint::from(0u8), &amounts, |values| {
            let mut data = vec![1, 2, 3, 4];
            for v in values {
                data.extend(v.to_be_bytes::<32>());
            }
            data
        });

        assert_eq!(step.tokens, vec![StepToken::new(a, BalanceInsert::At(4))]);
        assert_eq!(step.data.len(), 68);
    }
}
