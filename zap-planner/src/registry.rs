//! Strategies of every configured vault, built once.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use tracing::{debug, info};
use zap_common::{errors::ZapError, models::VaultId};

use crate::{
    config::ZapConfig,
    strategy::{helpers::ZapHelpers, Strategy, StrategyResolver},
};

#[derive(Debug, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<VaultId, Vec<Arc<Strategy>>>,
}

impl StrategyRegistry {
    /// Builds the strategies of every configured vault. Composing strategies get a weak handle
    /// to the registry and resolve the strategies they wrap on first use.
    pub fn build(config: &ZapConfig, helpers: Arc<ZapHelpers>) -> Result<Arc<Self>, ZapError> {
        let mut failure = None;
        let registry = Arc::new_cyclic(|weak: &Weak<Self>| {
            let resolver: Weak<dyn StrategyResolver> = weak.clone();
            let mut strategies = HashMap::with_capacity(config.vaults.len());
            for entry in &config.vaults {
                let built = helpers
                    .vault(&entry.vault_id)
                    .and_then(|vault| {
                        entry
                            .strategies
                            .iter()
                            .map(|strategy| {
                                Strategy::build(strategy, vault.clone(), helpers.clone(), resolver.clone())
                                    .map(Arc::new)
                            })
                            .collect::<Result<Vec<_>, _>>()
                    });
                match built {
                    Ok(built) => {
                        debug!(vault = %entry.vault_id, strategies = built.len(), "Built vault strategies");
                        strategies.insert(entry.vault_id.clone(), built);
                    }
                    Err(err) => {
                        failure.get_or_insert(err);
                        break;
                    }
                }
            }
            Self { strategies }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        info!(vaults = registry.strategies.len(), "Strategy registry ready");
        Ok(registry)
    }

    pub fn vault_ids(&self) -> impl Iterator<Item = &VaultId> {
        self.strategies.keys()
    }
}

impl StrategyResolver for StrategyRegistry {
    fn strategies(&self, vault_id: &str) -> Result<Vec<Arc<Strategy>>, ZapError> {
        self.strategies
            .get(vault_id)
            .cloned()
            .ok_or_else(|| ZapError::route_not_found(format!("no strategies for vault {vault_id}")))
    }
}
