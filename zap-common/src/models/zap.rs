//! On-chain call and order shapes handed to the zap router.

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{Display, EnumString};

use super::Address;
use crate::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ZapAction {
    Deposit,
    Withdraw,
}

/// Where the router should write its live balance of a token into a call's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BalanceInsert {
    /// Byte offset of the 32-byte amount word in the call data.
    At(usize),
    /// The token is only approved to the target, its amount is not rewritten.
    #[default]
    NotDynamic,
}

impl BalanceInsert {
    pub fn as_i64(&self) -> i64 {
        match self {
            BalanceInsert::At(offset) => *offset as i64,
            BalanceInsert::NotDynamic => -1,
        }
    }
}

impl Serialize for BalanceInsert {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for BalanceInsert {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        match value {
            -1 => Ok(BalanceInsert::NotDynamic),
            v if v >= 0 => Ok(BalanceInsert::At(v as usize)),
            v => Err(serde::de::Error::custom(format!("invalid balance insert index {v}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepToken {
    pub token: Address,
    pub index: BalanceInsert,
}

impl StepToken {
    pub fn new(token: Address, index: BalanceInsert) -> Self {
        Self { token, index }
    }
}

/// One call executed by the zap router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapStep {
    pub target: Address,
    pub value: BigUint,
    pub data: Bytes,
    pub tokens: Vec<StepToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInput {
    pub token: Address,
    pub amount: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutput {
    pub token: Address,
    pub min_output_amount: BigUint,
}

/// Final, execution ready call sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapOrder {
    pub user: Address,
    pub recipient: Address,
    pub inputs: Vec<OrderInput>,
    pub outputs: Vec<OrderOutput>,
    pub steps: Vec<ZapStep>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_insert_serde() {
        let tokens = vec![
            StepToken::new(Bytes::zero(20), BalanceInsert::At(36)),
            StepToken::new(Bytes::zero(20), BalanceInsert::NotDynamic),
        ];

        let json = serde_json::to_value(&tokens).unwrap();
        assert_eq!(json[0]["index"], 36);
        assert_eq!(json[1]["index"], -1);

        let back: Vec<StepToken> = serde_json::from_value(json).unwrap();
        assert_eq!(back, tokens);
        assert!(serde_json::from_str::<BalanceInsert>("-2").is_err());
    }
}
