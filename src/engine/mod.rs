//! Contract of the rule-execution engine that runs chain instances.
//!
//! Executing messages is the engine's business; this crate only creates,
//! reloads and inspects instances, and receives their trace events.

mod definition;

use std::{collections::HashMap, sync::Arc};

use crate::{Result, events::TraceEvent, model::ChainDefinition};

pub use definition::{DefinitionEngine, DefinitionInstance};

/// Receives the trace events an instance produces.
pub type TraceSink = Arc<dyn Fn(TraceEvent) + Send + Sync>;

/// Options handed to the engine for every instance it creates.
#[derive(Clone, Default)]
pub struct EngineOptions {
    /// global properties from the hub configuration
    pub properties: HashMap<String, String>,
    /// trace callback into the tenant's debug hub
    pub on_debug: Option<TraceSink>,
}

impl EngineOptions {
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self {
            properties,
            on_debug: None,
        }
    }

    pub fn with_on_debug(
        mut self,
        f: impl Fn(TraceEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_debug = Some(Arc::new(f));
        self
    }
}

/// Factory of live chain instances.
pub trait RuleEngine: Send + Sync {
    /// Builds an executable instance of a definition.
    fn create(
        &self,
        chain_id: &str,
        def: &[u8],
        options: &EngineOptions,
    ) -> Result<Arc<dyn RuleInstance>>;
}

/// A live, executable chain.
pub trait RuleInstance: Send + Sync {
    fn id(&self) -> &str;

    /// Replaces the whole definition. On error the previous definition keeps running.
    fn reload_self(
        &self,
        def: &[u8],
    ) -> Result<()>;

    /// Replaces the definition of one node. On error nothing changes.
    fn reload_child(
        &self,
        node_id: &str,
        def: &[u8],
    ) -> Result<()>;

    /// The definition currently running.
    fn definition(&self) -> ChainDefinition;

    /// The running definition as JSON.
    fn dsl(&self) -> Vec<u8>;

    /// JSON of one node, or `None` if the chain has no such node.
    fn node_dsl(
        &self,
        node_id: &str,
    ) -> Option<Vec<u8>>;
}
