use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tokio::runtime::Runtime;
use tracing::{info, trace};

use crate::{
    Config, Result, ShareLock,
    common::{read, write},
    engine::RuleEngine,
    runtime::ChainService,
    store::StoreProvider,
};

/// Per-tenant chain services, created on first access.
pub struct TenantRegistry {
    services: ShareLock<HashMap<String, Arc<ChainService>>>,
    provider: Arc<dyn StoreProvider>,
    engine: Arc<dyn RuleEngine>,
    config: Arc<Config>,
    runtime: Arc<Runtime>,
}

impl TenantRegistry {
    pub fn new(
        provider: Arc<dyn StoreProvider>,
        engine: Arc<dyn RuleEngine>,
        config: Arc<Config>,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            provider,
            engine,
            config,
            runtime,
        }
    }

    /// Returns the service of `tenant`, initialising it on first access.
    ///
    /// Initialisation loads every enabled chain of the tenant and happens once,
    /// however many callers race for it. The flag is true for the caller that
    /// created the service.
    pub fn get_or_init(
        &self,
        tenant: &str,
    ) -> Result<(Arc<ChainService>, bool)> {
        if let Some(service) = self.get(tenant) {
            return Ok((service, false));
        }

        let mut services = write(&self.services);
        if let Some(service) = services.get(tenant) {
            return Ok((service.clone(), false));
        }

        trace!("registry::init({})", tenant);
        let store = self.provider.tenant(tenant)?;
        let service = Arc::new(ChainService::new(tenant, store, self.engine.clone(), &self.config, self.runtime.clone()));
        service.load_all()?;
        services.insert(tenant.to_string(), service.clone());
        info!(tenant, "tenant initialised");
        Ok((service, true))
    }

    pub fn get(
        &self,
        tenant: &str,
    ) -> Option<Arc<ChainService>> {
        read(&self.services).get(tenant).cloned()
    }

    /// Initialised tenants, sorted.
    pub fn tenants(&self) -> Vec<String> {
        let mut tenants: Vec<String> = read(&self.services).keys().cloned().collect();
        tenants.sort();
        tenants
    }

    pub fn provider(&self) -> &Arc<dyn StoreProvider> {
        &self.provider
    }

    /// Stops the instances of every tenant.
    pub fn clear(&self) {
        for service in read(&self.services).values() {
            service.pool().clear();
        }
    }
}
