use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};

use crate::{
    Config, Result, RuleHub, RuleHubError,
    engine::{DefinitionEngine, RuleEngine},
    store::{MemStore, StoreProvider},
};

#[derive(Default)]
pub struct HubBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    store: Option<Arc<dyn StoreProvider>>,
    engine: Option<Arc<dyn RuleEngine>>,
}

impl HubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn store(
        mut self,
        store: impl StoreProvider + 'static,
    ) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn engine(
        mut self,
        engine: impl RuleEngine + 'static,
    ) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    pub fn build(self) -> Result<RuleHub> {
        let runtime = match self.rt {
            Some(rt) => rt,
            None => Arc::new(
                Builder::new_multi_thread()
                    .worker_threads(self.config.async_worker_thread_number.max(1).into())
                    .enable_all()
                    .build()
                    .map_err(|e| RuleHubError::Engine(format!("failed to start runtime: {}", e)))?,
            ),
        };
        let store = self.store.unwrap_or_else(|| Arc::new(MemStore::new()));
        let engine = self.engine.unwrap_or_else(|| Arc::new(DefinitionEngine::new()));

        Ok(RuleHub::new(self.config, store, engine, runtime))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::runtime::Builder;

    use crate::HubBuilder;

    #[test]
    fn test_build_with_shared_runtime() {
        let rt = Arc::new(Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap());
        let hub = HubBuilder::new().runtime(rt.clone()).build().unwrap();
        assert!(Arc::ptr_eq(hub.runtime(), &rt));
        assert_eq!(hub.config().async_worker_thread_number, 4);
    }

    #[test]
    fn test_worker_thread_number() {
        let hub = HubBuilder::new().async_worker_thread_number(2).build().unwrap();
        assert_eq!(hub.config().async_worker_thread_number, 2);
    }
}
