use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    Result, RuleHubError, ShareLock,
    common::{read, write},
    engine::{EngineOptions, RuleEngine, RuleInstance},
};

/// Live chain instances of one tenant, keyed by chain id.
///
/// The map lock only guards map mutation; instances are created and
/// reloaded outside of it.
pub struct InstancePool {
    engine: Arc<dyn RuleEngine>,
    options: EngineOptions,
    instances: ShareLock<HashMap<String, Arc<dyn RuleInstance>>>,
}

impl InstancePool {
    pub fn new(
        engine: Arc<dyn RuleEngine>,
        options: EngineOptions,
    ) -> Self {
        Self {
            engine,
            options,
            instances: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates an instance of `def` and registers it, replacing any instance with the same id.
    pub fn create(
        &self,
        chain_id: &str,
        def: &[u8],
    ) -> Result<Arc<dyn RuleInstance>> {
        trace!("pool::create({})", chain_id);
        let instance = self.engine.create(chain_id, def, &self.options)?;
        write(&self.instances).insert(chain_id.to_string(), instance.clone());
        Ok(instance)
    }

    pub fn get(
        &self,
        chain_id: &str,
    ) -> Option<Arc<dyn RuleInstance>> {
        read(&self.instances).get(chain_id).cloned()
    }

    pub fn del(
        &self,
        chain_id: &str,
    ) -> Option<Arc<dyn RuleInstance>> {
        trace!("pool::del({})", chain_id);
        write(&self.instances).remove(chain_id)
    }

    pub fn contains(
        &self,
        chain_id: &str,
    ) -> bool {
        read(&self.instances).contains_key(chain_id)
    }

    pub fn len(&self) -> usize {
        read(&self.instances).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chain ids of every live instance, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = read(&self.instances).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Visits a snapshot of the pool until `f` returns false.
    pub fn range<F>(
        &self,
        mut f: F,
    ) where
        F: FnMut(&str, &Arc<dyn RuleInstance>) -> bool,
    {
        let snapshot: Vec<(String, Arc<dyn RuleInstance>)> = read(&self.instances).iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (chain_id, instance) in snapshot.iter() {
            if !f(chain_id, instance) {
                break;
            }
        }
    }

    /// Replaces the definition of a running instance in place.
    pub fn reload_self(
        &self,
        chain_id: &str,
        def: &[u8],
    ) -> Result<()> {
        trace!("pool::reload_self({})", chain_id);
        self.running(chain_id)?.reload_self(def)
    }

    pub fn reload_child(
        &self,
        chain_id: &str,
        node_id: &str,
        def: &[u8],
    ) -> Result<()> {
        trace!("pool::reload_child({}, {})", chain_id, node_id);
        self.running(chain_id)?.reload_child(node_id, def)
    }

    /// Reloads the running instance, or creates one when the chain is not running.
    pub fn create_or_reload(
        &self,
        chain_id: &str,
        def: &[u8],
    ) -> Result<Arc<dyn RuleInstance>> {
        match self.get(chain_id) {
            Some(instance) => {
                instance.reload_self(def)?;
                Ok(instance)
            }
            None => self.create(chain_id, def),
        }
    }

    /// Stops every instance.
    pub fn clear(&self) {
        write(&self.instances).clear();
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn running(
        &self,
        chain_id: &str,
    ) -> Result<Arc<dyn RuleInstance>> {
        self.get(chain_id).ok_or_else(|| RuleHubError::NotFound(format!("rule chain {} is not running", chain_id)))
    }
}
