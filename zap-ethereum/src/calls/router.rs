//! Zap router `executeOrder` encoding, used as the destination payload of bridge hooks.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use zap_common::{
    models::zap::{StepToken, ZapOrder, ZapStep},
    Bytes,
};

use crate::{abi::IZapRouter, biguint_to_u256, BytesCodec, EncodingError};

fn step_token(token: &StepToken) -> Result<IZapRouter::StepToken, EncodingError> {
    let index = i32::try_from(token.index.as_i64())
        .map_err(|_| EncodingError::Unsupported(format!("insert offset {}", token.index.as_i64())))?;
    Ok(IZapRouter::StepToken { token: Address::from_bytes(&token.token)?, index })
}

fn step(step: &ZapStep) -> Result<IZapRouter::Step, EncodingError> {
    Ok(IZapRouter::Step {
        target: Address::from_bytes(&step.target)?,
        value: biguint_to_u256(&step.value)?,
        data: step.data.to_vec().into(),
        tokens: step
            .tokens
            .iter()
            .map(step_token)
            .collect::<Result<_, _>>()?,
    })
}

fn order(order: &ZapOrder) -> Result<IZapRouter::Order, EncodingError> {
    Ok(IZapRouter::Order {
        inputs: order
            .inputs
            .iter()
            .map(|input| {
                Ok(IZapRouter::Input {
                    token: Address::from_bytes(&input.token)?,
                    amount: biguint_to_u256(&input.amount)?,
                })
            })
            .collect::<Result<_, EncodingError>>()?,
        outputs: order
            .outputs
            .iter()
            .map(|output| {
                Ok(IZapRouter::Output {
                    token: Address::from_bytes(&output.token)?,
                    minOutputAmount: biguint_to_u256(&output.min_output_amount)?,
                })
            })
            .collect::<Result<_, EncodingError>>()?,
        relay: IZapRouter::Relay {
            target: Address::ZERO,
            value: U256::ZERO,
            data: Default::default(),
        },
        user: Address::from_bytes(&order.user)?,
        recipient: Address::from_bytes(&order.recipient)?,
    })
}

/// Call data of `executeOrder(order, order.steps)`.
pub fn execute_order_data(zap_order: &ZapOrder) -> Result<Bytes, EncodingError> {
    let route = zap_order
        .steps
        .iter()
        .map(step)
        .collect::<Result<Vec<_>, _>>()?;
    let call = IZapRouter::executeOrderCall { order: order(zap_order)?, route };
    Ok(Bytes::from(call.abi_encode()))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use zap_common::models::zap::{BalanceInsert, OrderInput, OrderOutput};

    use num_bigint::BigUint;

    use super::*;

    fn addr(last: &str) -> Bytes {
        Bytes::from_str(&format!("0x{:0>40}", last)).unwrap()
    }

    fn zap_order() -> ZapOrder {
        ZapOrder {
            user: addr("01"),
            recipient: addr("02"),
            inputs: vec![OrderInput { token: addr("a0"), amount: BigUint::from(10u32) }],
            outputs: vec![
                OrderOutput { token: addr("cc"), min_output_amount: BigUint::from(9u32) },
                OrderOutput { token: addr("a0"), min_output_amount: BigUint::default() },
            ],
            steps: vec![ZapStep {
                target: addr("cc"),
                value: BigUint::default(),
                data: Bytes::from(vec![1u8, 2, 3, 4]),
                tokens: vec![
                    StepToken::new(addr("a0"), BalanceInsert::At(4)),
                    StepToken::new(addr("b0"), BalanceInsert::NotDynamic),
                ],
            }],
        }
    }

    #[test]
    fn test_execute_order_encoding() {
        let data = execute_order_data(&zap_order()).unwrap();

        let decoded = IZapRouter::executeOrderCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.order.outputs.len(), 2);
        assert_eq!(decoded.route[0].tokens[0].index, 4);
        assert_eq!(decoded.route[0].tokens[1].index, -1);
        assert_eq!(decoded.order.relay.target, Address::ZERO);
    }

    #[test]
    fn test_invalid_address_fails() {
        let mut order = zap_order();
        order.user = Bytes::zero(3);

        assert!(execute_order_data(&order).is_err());
    }
}
