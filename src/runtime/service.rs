use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::{info, trace, warn};

use crate::{
    Config, Result, RuleHubError,
    debug::{DebugData, DebugHub, DebugLog},
    engine::{EngineOptions, RuleEngine},
    events::TraceEvent,
    graph,
    model::{ChainDefinition, ChainInfo, KEY_CREATE_TIME, KEY_MESSAGE, KEY_UPDATE_TIME, KEY_USERNAME, Node},
    runtime::InstancePool,
    store::{ChainStore, ListQuery, PageData, data::ChainRecord},
    utils,
};

/// Lifecycle of the chains of one tenant.
///
/// Keeps the persisted definitions in the tenant's [`ChainStore`] and the live
/// instances in its [`InstancePool`] consistent. Every write is validated for
/// cross-chain cycles before anything is persisted.
pub struct ChainService {
    tenant: String,
    store: Arc<dyn ChainStore>,
    pool: InstancePool,
    debug: Arc<DebugHub>,
}

impl ChainService {
    pub fn new(
        tenant: &str,
        store: Arc<dyn ChainStore>,
        engine: Arc<dyn RuleEngine>,
        config: &Config,
        runtime: Arc<Runtime>,
    ) -> Self {
        let log = DebugLog::new(config.node_log_size(), config.max_debug_chains);
        let debug = Arc::new(DebugHub::new(log, config.observer_queue_size, config.debug, runtime));

        let sink = debug.clone();
        let options = EngineOptions::new(config.global.clone()).with_on_debug(move |e| sink.on_trace(e));

        Self {
            tenant: tenant.to_string(),
            store,
            pool: InstancePool::new(engine, options),
            debug,
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    pub fn debug(&self) -> &Arc<DebugHub> {
        &self.debug
    }

    /// Starts every persisted chain that is not disabled, in store order.
    ///
    /// A chain that fails to start is marked disabled with the failure message;
    /// its siblings still load. Returns the number of chains started.
    pub fn load_all(&self) -> Result<usize> {
        let mut loaded = 0;
        for record in self.store.list()? {
            let def = match parse_record(&record) {
                Ok(def) => def,
                Err(e) => {
                    warn!(tenant = %self.tenant, chain_id = %record.id, "skip unreadable rule chain: {}", e);
                    continue;
                }
            };
            if def.rule_chain.disabled {
                continue;
            }
            match self.start(def) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(tenant = %self.tenant, chain_id = %record.id, "failed to load rule chain: {}", e),
            }
        }
        info!(tenant = %self.tenant, loaded, "tenant rule chains loaded");
        Ok(loaded)
    }

    /// Starts or reloads a chain from its persisted definition.
    pub fn load(
        &self,
        chain_id: &str,
    ) -> Result<()> {
        trace!("service::load({}, {})", self.tenant, chain_id);
        let def = self.stored(chain_id)?.ok_or_else(|| not_found(chain_id))?;
        self.start(def)
    }

    /// Saves a complete definition, then starts, reloads or stops the chain
    /// according to its disabled flag.
    pub fn save_dsl(
        &self,
        chain_id: &str,
        def: &[u8],
    ) -> Result<()> {
        trace!("service::save_dsl({}, {})", self.tenant, chain_id);
        let mut def = ChainDefinition::from_json(def)?;
        def.rule_chain.id = chain_id.to_string();
        self.commit(def)
    }

    /// Updates name, root flag, debug mode, disabled flag, configuration and
    /// additional info of a chain. Configuration and additional info are merged
    /// key by key; disabling stops the running instance.
    ///
    /// A chain unknown to both the pool and the store is created with empty metadata.
    pub fn save_base_info(
        &self,
        chain_id: &str,
        info: ChainInfo,
    ) -> Result<()> {
        trace!("service::save_base_info({}, {})", self.tenant, chain_id);
        let mut def = match self.get(chain_id) {
            Some(def) => def,
            None => self.stored(chain_id)?.unwrap_or_else(|| ChainDefinition {
                rule_chain: ChainInfo {
                    id: chain_id.to_string(),
                    disabled: info.disabled,
                    ..Default::default()
                },
                ..Default::default()
            }),
        };
        def.rule_chain.name = info.name;
        def.rule_chain.root = info.root;
        def.rule_chain.debug_mode = info.debug_mode;
        def.rule_chain.disabled = info.disabled;
        def.rule_chain.configuration.extend(info.configuration);
        def.rule_chain.additional_info.extend(info.additional_info);
        self.commit(def)
    }

    /// Sets one key of a running chain's configuration.
    pub fn save_configuration(
        &self,
        chain_id: &str,
        key: &str,
        value: Value,
    ) -> Result<()> {
        trace!("service::save_configuration({}, {}, {})", self.tenant, chain_id, key);
        let mut def = self.get(chain_id).ok_or_else(|| not_found(chain_id))?;
        def.rule_chain.configuration.insert(key.to_string(), value);
        self.commit(def)
    }

    /// Enables a chain and starts it.
    pub fn deploy(
        &self,
        chain_id: &str,
    ) -> Result<()> {
        trace!("service::deploy({}, {})", self.tenant, chain_id);
        let mut def = self.current(chain_id)?.ok_or_else(|| not_found(chain_id))?;
        def.rule_chain.disabled = false;
        self.commit(def)
    }

    /// Stops a chain and persists it as disabled.
    pub fn undeploy(
        &self,
        chain_id: &str,
    ) -> Result<()> {
        trace!("service::undeploy({}, {})", self.tenant, chain_id);
        let mut def = self.current(chain_id)?.ok_or_else(|| not_found(chain_id))?;
        self.pool.del(chain_id);
        def.rule_chain.disabled = true;
        self.persist(&def)?;
        info!(tenant = %self.tenant, chain_id, "rule chain undeployed");
        Ok(())
    }

    /// Stops a chain and deletes its persisted definition and debug records.
    ///
    /// If the store fails after the instance was stopped, the instance is not
    /// restored and `PartialDelete` is returned.
    pub fn delete(
        &self,
        chain_id: &str,
    ) -> Result<()> {
        trace!("service::delete({}, {})", self.tenant, chain_id);
        if !self.pool.contains(chain_id) && !self.store.exists(chain_id)? {
            return Err(not_found(chain_id));
        }
        self.pool.del(chain_id);
        self.debug.log().clear(chain_id);
        self.store.delete(chain_id).map_err(|e| RuleHubError::PartialDelete(format!("rule chain {} stopped but not deleted: {}", chain_id, e)))?;
        info!(tenant = %self.tenant, chain_id, "rule chain deleted");
        Ok(())
    }

    /// Replaces one node of a running chain and persists the result.
    pub fn reload_child(
        &self,
        chain_id: &str,
        node_id: &str,
        def: &[u8],
    ) -> Result<()> {
        trace!("service::reload_child({}, {}, {})", self.tenant, chain_id, node_id);
        let instance = self.pool.get(chain_id).ok_or_else(|| not_found(chain_id))?;
        let node = Node::from_json(def)?;
        if node.id != node_id {
            return Err(RuleHubError::MalformedConfig(format!("node definition id {} does not match {}", node.id, node_id)));
        }

        let mut next = instance.definition();
        let slot = next.metadata.nodes.iter_mut().find(|n| n.id == node_id).ok_or_else(|| RuleHubError::NotFound(format!("node {} in rule chain {}", node_id, chain_id)))?;
        *slot = node;
        graph::check_definition(&next, self.store.as_ref())?;

        self.pool.reload_child(chain_id, node_id, def)?;
        let mut def = instance.definition();
        self.stamp(&mut def)?;
        self.persist(&def)
    }

    /// Definition of a running chain.
    pub fn get(
        &self,
        chain_id: &str,
    ) -> Option<ChainDefinition> {
        self.pool.get(chain_id).map(|instance| instance.definition())
    }

    /// DSL of a running chain, or of one of its nodes.
    pub fn get_dsl(
        &self,
        chain_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<u8>> {
        let instance = self.pool.get(chain_id).ok_or_else(|| not_found(chain_id))?;
        match node_id {
            None => Ok(instance.dsl()),
            Some(node_id) => instance.node_dsl(node_id).ok_or_else(|| RuleHubError::NotFound(format!("node {} in rule chain {}", node_id, chain_id))),
        }
    }

    /// Persisted chains matching `query`, most recently updated first.
    pub fn list(
        &self,
        query: &ListQuery,
    ) -> Result<PageData<ChainDefinition>> {
        let mut chains: Vec<ChainDefinition> = self
            .store
            .list()?
            .iter()
            .filter_map(|record| match parse_record(record) {
                Ok(def) => Some(def),
                Err(e) => {
                    warn!(tenant = %self.tenant, chain_id = %record.id, "skip unreadable rule chain: {}", e);
                    None
                }
            })
            .filter(|def| query.matches(def))
            .collect();
        chains.sort_by(|a, b| b.additional_info(KEY_UPDATE_TIME).cmp(&a.additional_info(KEY_UPDATE_TIME)));

        let count = chains.len();
        let (rows, page_count) = if query.size == 0 {
            (chains, usize::from(count > 0))
        } else {
            (chains.into_iter().skip(query.offset()).take(query.size).collect(), count.div_ceil(query.size))
        };
        Ok(PageData {
            count,
            page_num: query.page.max(1),
            page_count,
            page_size: query.size,
            rows,
        })
    }

    /// The most recently updated persisted chain.
    pub fn latest(&self) -> Result<Option<ChainDefinition>> {
        self.store.latest()?.as_ref().map(parse_record).transpose()
    }

    /// Retained trace records of a chain, oldest first.
    pub fn debug_data(
        &self,
        chain_id: &str,
        node_id: Option<&str>,
    ) -> Vec<DebugData> {
        self.debug.log().get(chain_id, node_id)
    }

    pub fn add_debug_observer(
        &self,
        chain_id: &str,
        observer_id: &str,
        f: impl Fn(&TraceEvent) + Send + Sync + 'static,
    ) {
        self.debug.add_observer(chain_id, observer_id, f);
    }

    pub fn add_debug_observer_async<F>(
        &self,
        chain_id: &str,
        observer_id: &str,
        f: F,
    ) where
        F: Fn(&TraceEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.debug.add_observer_async(chain_id, observer_id, f);
    }

    pub fn remove_debug_observer(
        &self,
        observer_id: &str,
    ) -> bool {
        self.debug.remove_observer(observer_id)
    }

    /// Validate, stamp, persist, then start or stop.
    fn commit(
        &self,
        mut def: ChainDefinition,
    ) -> Result<()> {
        graph::check_definition(&def, self.store.as_ref())?;
        self.stamp(&mut def)?;

        if def.rule_chain.disabled {
            self.pool.del(def.id());
            return self.persist(&def);
        }

        def.remove_additional_info(KEY_MESSAGE);
        self.persist(&def)?;
        self.start(def)
    }

    /// Creates or reloads the live instance. On failure the persisted
    /// definition is marked disabled with the failure message.
    fn start(
        &self,
        mut def: ChainDefinition,
    ) -> Result<()> {
        let data = def.to_json()?;
        let err = match self.pool.create_or_reload(def.id(), data.as_bytes()) {
            Ok(_) => {
                info!(tenant = %self.tenant, chain_id = %def.id(), "rule chain deployed");
                return Ok(());
            }
            Err(RuleHubError::Instance(msg)) => msg,
            Err(e) => e.to_string(),
        };

        warn!(tenant = %self.tenant, chain_id = %def.id(), "failed to start rule chain: {}", err);
        def.rule_chain.disabled = true;
        def.put_additional_info(KEY_MESSAGE, err.as_str());
        if let Err(e) = self.persist(&def) {
            warn!(tenant = %self.tenant, chain_id = %def.id(), "failed to mark rule chain disabled: {}", e);
        }
        Err(RuleHubError::Instance(err))
    }

    /// Records the owner and the update time; the creation time is kept from
    /// the definition or its persisted version. An unreadable persisted
    /// version restarts the creation time.
    fn stamp(
        &self,
        def: &mut ChainDefinition,
    ) -> Result<()> {
        let now = utils::time::now_str();
        if def.additional_info(KEY_CREATE_TIME).is_none() {
            let created = match self.store.find(def.id())? {
                Some(record) => match parse_record(&record) {
                    Ok(prev) => prev.additional_info(KEY_CREATE_TIME).map(str::to_string),
                    Err(e) => {
                        warn!(tenant = %self.tenant, chain_id = %def.id(), "persisted rule chain is unreadable: {}", e);
                        None
                    }
                },
                None => None,
            };
            def.put_additional_info(KEY_CREATE_TIME, created.unwrap_or_else(|| now.clone()));
        }
        def.put_additional_info(KEY_USERNAME, self.tenant.as_str());
        def.put_additional_info(KEY_UPDATE_TIME, now);
        Ok(())
    }

    fn persist(
        &self,
        def: &ChainDefinition,
    ) -> Result<()> {
        self.store.save(def.id(), &def.to_json()?)
    }

    fn stored(
        &self,
        chain_id: &str,
    ) -> Result<Option<ChainDefinition>> {
        self.store.find(chain_id)?.as_ref().map(parse_record).transpose()
    }

    /// Persisted definition, or the running one if the chain was never stored.
    fn current(
        &self,
        chain_id: &str,
    ) -> Result<Option<ChainDefinition>> {
        match self.stored(chain_id)? {
            Some(def) => Ok(Some(def)),
            None => Ok(self.get(chain_id)),
        }
    }
}

fn parse_record(record: &ChainRecord) -> Result<ChainDefinition> {
    let mut def = ChainDefinition::from_json(record.data.as_bytes())?;
    def.rule_chain.id = record.id.clone();
    Ok(def)
}

fn not_found(chain_id: &str) -> RuleHubError {
    RuleHubError::NotFound(format!("rule chain {}", chain_id))
}
