use super::{DexAdapter, DexError};
use lpbot_domain::enums::{Chain, Dex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Maps each exchange to its adapter.
#[derive(Clone, Default)]
pub struct DexRegistry {
    adapters: HashMap<Dex, Arc<dyn DexAdapter>>,
}

impl DexRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` under its own [`Dex`], replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn DexAdapter>) {
        let dex = adapter.dex();
        info!(dex = %dex, "Registering DEX adapter");
        self.adapters.insert(dex, adapter);
    }

    #[must_use]
    pub fn with(mut self, adapter: Arc<dyn DexAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, dex: Dex) -> Result<Arc<dyn DexAdapter>, DexError> {
        self.adapters
            .get(&dex)
            .cloned()
            .ok_or(DexError::UnsupportedDex(dex))
    }

    /// Adapters for exchanges deployed on `chain`.
    pub fn for_chain(&self, chain: Chain) -> Vec<Arc<dyn DexAdapter>> {
        self.adapters
            .iter()
            .filter(|(dex, _)| dex.chain() == chain)
            .map(|(_, adapter)| adapter.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
