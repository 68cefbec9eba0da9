//! Application context: one hub per process, passed to whoever needs tenants.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::{
    Config, Result, RuleHubError,
    engine::RuleEngine,
    runtime::{ChainService, TenantRegistry},
    store::StoreProvider,
};

/// Owns the tenant registry and the async runtime shared by every tenant.
///
/// # Example
///
/// ```rust,ignore
/// let hub = HubBuilder::new().build()?;
/// hub.launch();
///
/// let chains = hub.tenant("alice")?;
/// chains.save_dsl("main", dsl.as_bytes())?;
/// chains.add_debug_observer("main", "ui", |e| println!("{}: {}", e.node_id, e.msg.data));
/// ```
pub struct RuleHub {
    config: Arc<Config>,
    registry: TenantRegistry,
    running: AtomicBool,
    runtime: Arc<Runtime>,
}

impl RuleHub {
    pub(crate) fn new(
        config: Config,
        provider: Arc<dyn StoreProvider>,
        engine: Arc<dyn RuleEngine>,
        runtime: Arc<Runtime>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            registry: TenantRegistry::new(provider, engine, config.clone(), runtime.clone()),
            config,
            running: AtomicBool::new(false),
            runtime,
        }
    }

    /// Initialises every tenant named in the configuration or known to the store.
    ///
    /// A tenant that fails to initialise is logged and retried on its first access.
    pub fn launch(&self) {
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        let mut tenants = self.config.tenants.clone();
        match self.registry.provider().tenants() {
            Ok(known) => tenants.extend(known),
            Err(e) => warn!("failed to list tenants: {}", e),
        }
        tenants.sort();
        tenants.dedup();

        for tenant in tenants.iter() {
            if let Err(e) = self.registry.get_or_init(tenant) {
                warn!(tenant = %tenant, "failed to initialise tenant: {}", e);
            }
        }
        info!(tenants = tenants.len(), "rule hub launched");
    }

    /// Stops every live instance. Persisted definitions are untouched.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        self.registry.clear();
        info!("rule hub stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Chain service of `tenant`, initialised on first access.
    pub fn tenant(
        &self,
        tenant: &str,
    ) -> Result<Arc<ChainService>> {
        if !self.is_running() {
            return Err(RuleHubError::Engine("rule hub is not running".to_string()));
        }
        self.registry.get_or_init(tenant).map(|(service, _)| service)
    }

    /// Initialised tenants, sorted.
    pub fn tenants(&self) -> Vec<String> {
        self.registry.tenants()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Config, HubBuilder, RuleHubError,
        store::{ChainStore, MemStore},
    };

    const CHAIN: &str = r#"{"ruleChain":{"id":"main"},"metadata":{"nodes":[{"id":"n1","type":"log"}]}}"#;

    #[test]
    fn test_launch_initialises_known_tenants() {
        let store = MemStore::new();
        store.tenant_store("bob").save("main", CHAIN).unwrap();
        let config = Config {
            tenants: vec!["alice".to_string()],
            ..Default::default()
        };
        let hub = HubBuilder::new().config(config).store(store).build().unwrap();

        assert!(matches!(hub.tenant("alice"), Err(RuleHubError::Engine(_))));
        hub.launch();
        hub.launch();
        assert_eq!(hub.tenants(), vec!["alice", "bob"]);
        assert!(hub.tenant("bob").unwrap().get("main").is_some());

        hub.tenant("carol").unwrap();
        assert_eq!(hub.tenants(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_shutdown_stops_instances() {
        let store = MemStore::new();
        store.tenant_store("bob").save("main", CHAIN).unwrap();
        let hub = HubBuilder::new().store(store).build().unwrap();
        hub.launch();
        let bob = hub.tenant("bob").unwrap();
        assert!(bob.get("main").is_some());

        hub.shutdown();
        assert!(!hub.is_running());
        assert!(bob.get("main").is_none());
        assert!(bob.store().exists("main").unwrap());
    }
}
