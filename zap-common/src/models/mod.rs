pub mod quote;
pub mod swap;
pub mod token;
pub mod vault;
pub mod zap;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use token::Token;

use crate::Bytes;

/// Address literal type to uniquely identify contracts/accounts on a chain.
pub type Address = Bytes;

/// Identifier of a vault, unique across chains.
pub type VaultId = String;

/// Identifier of a swap provider behind the aggregator (e.g. "kyber", "odos").
pub type ProviderId = String;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Optimism,
    Bsc,
    Polygon,
    Arbitrum,
    Base,
    Avax,
    Linea,
    Sonic,
}

fn native(chain: Chain, symbol: &str) -> Token {
    Token::new(&Bytes::zero(20), symbol, 18, chain)
}

fn wrapped_native(chain: Chain, symbol: &str, address: &str) -> Token {
    Token::new(&Bytes::from_str(address).unwrap_or_default(), symbol, 18, chain)
}

impl Chain {
    pub const ALL: [Chain; 9] = [
        Chain::Ethereum,
        Chain::Optimism,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Avax,
        Chain::Linea,
        Chain::Sonic,
    ];

    pub fn id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Arbitrum => 42161,
            Chain::Base => 8453,
            Chain::Avax => 43114,
            Chain::Linea => 59144,
            Chain::Sonic => 146,
        }
    }

    /// Returns the native gas token of the chain, addressed by the zero address.
    pub fn native_token(&self) -> Token {
        match self {
            Chain::Bsc => native(*self, "BNB"),
            Chain::Polygon => native(*self, "POL"),
            Chain::Avax => native(*self, "AVAX"),
            Chain::Sonic => native(*self, "S"),
            Chain::Ethereum | Chain::Optimism | Chain::Arbitrum | Chain::Base | Chain::Linea => {
                native(*self, "ETH")
            }
        }
    }

    /// Returns the wrapped native token for the chain.
    pub fn wrapped_native_token(&self) -> Token {
        match self {
            Chain::Ethereum => {
                wrapped_native(*self, "WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2")
            }
            Chain::Optimism | Chain::Base => {
                wrapped_native(*self, "WETH", "0x4200000000000000000000000000000000000006")
            }
            Chain::Bsc => {
                wrapped_native(*self, "WBNB", "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c")
            }
            Chain::Polygon => {
                wrapped_native(*self, "WPOL", "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270")
            }
            Chain::Arbitrum => {
                wrapped_native(*self, "WETH", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1")
            }
            Chain::Avax => {
                wrapped_native(*self, "WAVAX", "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7")
            }
            Chain::Linea => {
                wrapped_native(*self, "WETH", "0xe5D7C2a44FfDDf6b295A15c148167daaAf5Cf34f")
            }
            Chain::Sonic => {
                wrapped_native(*self, "wS", "0x039e2fB66102314Ce7b64Ce5Ce3E5183bc94aD38")
            }
        }
    }
}

/// Per-chain addresses of the zap execution contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain: Chain,
    /// Router executing orders; steps are called from this address.
    pub zap_router: Address,
    /// Contract pulling order inputs from the user; the allowance spender.
    pub token_manager: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_from_str() {
        assert_eq!(Chain::from_str("arbitrum").unwrap(), Chain::Arbitrum);
        assert_eq!(Chain::Base.to_string(), "base");
        assert!(Chain::from_str("solana").is_err());
    }

    #[test]
    fn test_native_and_wrapped() {
        let native = Chain::Bsc.native_token();
        let wrapped = Chain::Bsc.wrapped_native_token();

        assert!(native.is_native());
        assert_eq!(native.symbol, "BNB");
        assert!(!wrapped.is_native());
        assert_eq!(wrapped.symbol, "WBNB");
        assert_eq!(wrapped.chain, Chain::Bsc);
    }
}
