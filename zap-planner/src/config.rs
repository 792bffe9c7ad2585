//! YAML configuration of the strategies available per vault.

use std::{collections::HashSet, fs::File, io::Read};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zap_common::{
    errors::ZapError,
    models::{quote::StrategyId, swap::QuoteFilter, Address, Chain, VaultId},
};

use crate::bridge::CctpConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ZapError {
    fn from(err: ConfigError) -> Self {
        ZapError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalancerPoolType {
    Weighted,
    MetaStable,
    ComposableStable,
}

/// One strategy of a vault, tagged by its strategy id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy_id", rename_all = "kebab-case")]
pub enum StrategyConfig {
    Single,
    UniswapLike {
        /// Pair contract, also the LP token.
        pool: Address,
        router: Address,
    },
    Curve {
        pool: Address,
    },
    Balancer {
        pool: Address,
        /// The Balancer vault every pool call goes through.
        balancer_vault: Address,
        pool_type: BalancerPoolType,
    },
    Cowcentrated,
    GovComposer {
        underlying_vault_id: VaultId,
    },
    VaultComposer {
        underlying_vault_id: VaultId,
    },
    CrossChain {
        /// Chains users may zap from; every chain the bridge supports when empty.
        #[serde(default)]
        source_chains: Vec<Chain>,
    },
}

impl StrategyConfig {
    pub fn id(&self) -> StrategyId {
        match self {
            StrategyConfig::Single => StrategyId::Single,
            StrategyConfig::UniswapLike { .. } => StrategyId::UniswapLike,
            StrategyConfig::Curve { .. } => StrategyId::Curve,
            StrategyConfig::Balancer { .. } => StrategyId::Balancer,
            StrategyConfig::Cowcentrated => StrategyId::Cowcentrated,
            StrategyConfig::GovComposer { .. } => StrategyId::GovComposer,
            StrategyConfig::VaultComposer { .. } => StrategyId::VaultComposer,
            StrategyConfig::CrossChain { .. } => StrategyId::CrossChain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStrategies {
    pub vault_id: VaultId,
    pub strategies: Vec<StrategyConfig>,
}

/// Knobs shared by every strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZapSettings {
    /// Fraction of the slippage tolerated when revalidating an LP split at build time.
    pub split_revalidation_leeway: Decimal,
    /// Lifetime of router calls that take a deadline.
    pub swap_deadline_secs: u64,
    /// Providers allowed to serve aggregator quotes.
    pub aggregator_filter: QuoteFilter,
}

impl Default for ZapSettings {
    fn default() -> Self {
        Self {
            split_revalidation_leeway: Decimal::new(1, 1),
            swap_deadline_secs: 300,
            aggregator_filter: QuoteFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapConfig {
    #[serde(default)]
    pub settings: ZapSettings,
    #[serde(default)]
    pub bridge: Option<CctpConfig>,
    pub vaults: Vec<VaultStrategies>,
}

impl ZapConfig {
    pub fn from_yaml(path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ZapConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let leeway = self.settings.split_revalidation_leeway;
        if leeway < Decimal::ZERO || leeway > Decimal::ONE {
            return Err(ConfigError::Invalid(format!("split revalidation leeway {leeway} not in [0, 1]")));
        }
        let mut vault_ids = HashSet::new();
        for vault in &self.vaults {
            if !vault_ids.insert(&vault.vault_id) {
                return Err(ConfigError::Invalid(format!("vault {} configured twice", vault.vault_id)));
            }
            let mut ids = HashSet::new();
            for strategy in &vault.strategies {
                if !ids.insert(strategy.id()) {
                    return Err(ConfigError::Invalid(format!(
                        "strategy {} configured twice for {}",
                        strategy.id(),
                        vault.vault_id
                    )));
                }
                match strategy {
                    StrategyConfig::GovComposer { underlying_vault_id } |
                    StrategyConfig::VaultComposer { underlying_vault_id }
                        if underlying_vault_id == &vault.vault_id =>
                    {
                        return Err(ConfigError::Invalid(format!(
                            "composer of {} wraps itself",
                            vault.vault_id
                        )));
                    }
                    StrategyConfig::CrossChain { .. } if self.bridge.is_none() => {
                        return Err(ConfigError::Invalid(format!(
                            "cross-chain strategy of {} needs a bridge",
                            vault.vault_id
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
