use std::{
    fmt,
    hash::{Hash, Hasher},
};

use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Address, Chain};
use crate::{
    errors::ZapError,
    zap::math::{from_wei, to_wei},
    Bytes,
};

#[derive(Debug, Clone, Deserialize, Serialize, Eq)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u32,
    pub chain: Chain,
}

impl Token {
    pub fn new(address: &Bytes, symbol: &str, decimals: u32, chain: Chain) -> Self {
        Self { address: address.clone(), symbol: symbol.to_string(), decimals, chain }
    }

    /// Native gas tokens are addressed by the zero address.
    pub fn is_native(&self) -> bool {
        self.address.is_zero()
    }

    /// True if this token is the wrapped form of the chain's native token.
    pub fn is_wrapped_native(&self) -> bool {
        *self == self.chain.wrapped_native_token()
    }

    /// Native and wrapped native are interchangeable for route discovery.
    pub fn is_equivalent(&self, other: &Token) -> bool {
        if self == other {
            return true;
        }
        self.chain == other.chain &&
            ((self.is_native() && other.is_wrapped_native()) ||
                (self.is_wrapped_native() && other.is_native()))
    }

    /// Maps native to wrapped native; other tokens are returned unchanged.
    pub fn wrapped(&self) -> Token {
        if self.is_native() {
            self.chain.wrapped_native_token()
        } else {
            self.clone()
        }
    }

    /// One whole token in base units.
    pub fn one(&self) -> BigUint {
        BigUint::from(10u32).pow(self.decimals)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain && self.address == other.address
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain.hash(state);
        self.address.hash(state);
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.chain, &self.address).cmp(&(other.chain, &other.address))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.symbol, self.chain, self.address)
    }
}

/// An amount of a token in human units (not base units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: Token,
    pub amount: Decimal,
}

impl TokenAmount {
    pub fn new(token: Token, amount: Decimal) -> Self {
        Self { token, amount }
    }

    pub fn zero(token: Token) -> Self {
        Self { token, amount: Decimal::ZERO }
    }

    /// Builds an amount from base units.
    pub fn from_wei(token: Token, amount: &BigUint) -> Result<Self, ZapError> {
        let amount = from_wei(amount, token.decimals)?;
        Ok(Self { token, amount })
    }

    /// Converts to base units, flooring to the token's decimals.
    pub fn to_wei(&self) -> Result<BigUint, ZapError> {
        to_wei(&self.amount, self.token.decimals)
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.token.symbol)
    }
}

/// A user supplied input amount.
///
/// When `max` is set the on-chain call consuming this input must be built so that the
/// execution contract's live balance of the token is used, not the fixed `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputTokenAmount {
    pub token: Token,
    pub amount: Decimal,
    pub max: bool,
}

impl InputTokenAmount {
    pub fn new(token: Token, amount: Decimal, max: bool) -> Self {
        Self { token, amount, max }
    }

    pub fn to_wei(&self) -> Result<BigUint, ZapError> {
        to_wei(&self.amount, self.token.decimals)
    }

    pub fn as_token_amount(&self) -> TokenAmount {
        TokenAmount::new(self.token.clone(), self.amount)
    }
}

impl From<InputTokenAmount> for TokenAmount {
    fn from(value: InputTokenAmount) -> Self {
        TokenAmount::new(value.token, value.amount)
    }
}

impl From<TokenAmount> for InputTokenAmount {
    fn from(value: TokenAmount) -> Self {
        InputTokenAmount::new(value.token, value.amount, false)
    }
}

/// An ERC-20 approval the user must grant before executing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowance {
    pub token: Token,
    pub amount: Decimal,
    pub spender: Address,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal_macros::dec;

    use super::*;

    fn usdc() -> Token {
        Token::new(
            &Bytes::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap(),
            "USDC",
            6,
            Chain::Ethereum,
        )
    }

    #[test]
    fn test_eq_ignores_metadata() {
        let mut renamed = usdc();
        renamed.symbol = "USDC.e".to_string();

        assert_eq!(usdc(), renamed);

        let mut other_chain = usdc();
        other_chain.chain = Chain::Base;
        assert_ne!(usdc(), other_chain);
    }

    #[test]
    fn test_native_equivalence() {
        let eth = Chain::Ethereum.native_token();
        let weth = Chain::Ethereum.wrapped_native_token();

        assert!(eth.is_equivalent(&weth));
        assert!(weth.is_equivalent(&eth));
        assert!(!eth.is_equivalent(&usdc()));
        assert!(!eth.is_equivalent(&Chain::Base.wrapped_native_token()));
        assert_eq!(eth.wrapped(), weth);
    }

    #[test]
    fn test_wei_conversion() {
        let amount = TokenAmount::new(usdc(), dec!(12.3456789));

        assert_eq!(amount.to_wei().unwrap(), BigUint::from(12_345_678u64));
        assert_eq!(
            TokenAmount::from_wei(usdc(), &BigUint::from(1_500_000u64))
                .unwrap()
                .amount,
            dec!(1.5)
        );
        assert_eq!(usdc().one(), BigUint::from(1_000_000u64));
    }
}
