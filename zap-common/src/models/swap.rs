//! Request/response shapes of the swap aggregator contract.

use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    quote::ZapFee,
    token::{Token, TokenAmount},
    Address, ProviderId, VaultId,
};
use crate::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub from_token: Token,
    pub from_amount: Decimal,
    pub to_token: Token,
    pub vault_id: VaultId,
}

impl QuoteRequest {
    pub fn new(from: &TokenAmount, to_token: &Token, vault_id: &str) -> Self {
        Self {
            from_token: from.token.clone(),
            from_amount: from.amount,
            to_token: to_token.clone(),
            vault_id: vault_id.to_string(),
        }
    }
}

/// A single provider's indicative quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub provider_id: ProviderId,
    pub from_token: Token,
    pub from_amount: Decimal,
    pub to_token: Token,
    pub to_amount: Decimal,
    pub fee: ZapFee,
}

impl QuoteResponse {
    pub fn from(&self) -> TokenAmount {
        TokenAmount::new(self.from_token.clone(), self.from_amount)
    }

    pub fn to(&self) -> TokenAmount {
        TokenAmount::new(self.to_token.clone(), self.to_amount)
    }
}

/// Restricts which providers may serve a quote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteFilter {
    #[serde(default)]
    pub allow: Option<Vec<ProviderId>>,
    #[serde(default)]
    pub block: Vec<ProviderId>,
}

impl QuoteFilter {
    pub fn accepts(&self, provider: &str) -> bool {
        if self.block.iter().any(|p| p == provider) {
            return false;
        }
        self.allow
            .as_ref()
            .map_or(true, |allow| allow.iter().any(|p| p == provider))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub quote: QuoteResponse,
    /// The account executing the swap, i.e. the zap router.
    pub from_address: Address,
    pub slippage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTx {
    pub target: Address,
    pub data: Bytes,
    pub value: BigUint,
    /// Byte offset of the input amount in `data`, if the provider supports replacing it.
    pub input_position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResponse {
    pub to_amount: Decimal,
    pub to_amount_min: Decimal,
    pub tx: SwapTx,
}

/// Tokens the aggregator can swap into the requested tokens.
///
/// `any` holds tokens convertible into every requested token, `per_token[i]` those
/// convertible into the i-th requested token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSupport {
    pub any: Vec<Token>,
    pub per_token: Vec<Vec<Token>>,
}
