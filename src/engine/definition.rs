use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::{
    Result, RuleHubError,
    common::{read, write},
    engine::{EngineOptions, RuleEngine, RuleInstance},
    events::{FlowDirection, RuleMsg, TraceEvent},
    model::{ChainDefinition, Node},
};

/// Reference engine that validates and holds definitions without executing messages.
///
/// Useful for embedding the lifecycle manager where execution happens elsewhere,
/// and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionEngine;

impl DefinitionEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEngine for DefinitionEngine {
    fn create(
        &self,
        chain_id: &str,
        def: &[u8],
        options: &EngineOptions,
    ) -> Result<Arc<dyn RuleInstance>> {
        Ok(Arc::new(DefinitionInstance::new(chain_id, def, options.clone())?))
    }
}

pub struct DefinitionInstance {
    id: String,
    definition: RwLock<Arc<ChainDefinition>>,
    options: EngineOptions,
}

impl DefinitionInstance {
    pub fn new(
        chain_id: &str,
        def: &[u8],
        options: EngineOptions,
    ) -> Result<Self> {
        let definition = parse(chain_id, def)?;
        Ok(Self {
            id: chain_id.to_string(),
            definition: RwLock::new(Arc::new(definition)),
            options,
        })
    }

    /// Reports one node's processing outcome to the trace sink, if the chain
    /// or the node has debug mode on.
    pub fn trace(
        &self,
        node_id: &str,
        flow: FlowDirection,
        msg: RuleMsg,
        relation_type: &str,
        err: Option<String>,
    ) {
        let Some(sink) = &self.options.on_debug else {
            return;
        };
        let definition = read(&self.definition).clone();
        let node_debug = definition.metadata.node(node_id).is_some_and(|n| n.debug_mode);
        if definition.rule_chain.debug_mode || node_debug {
            sink(TraceEvent::new(&self.id, node_id, flow, msg, relation_type, err));
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }
}

impl RuleInstance for DefinitionInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn reload_self(
        &self,
        def: &[u8],
    ) -> Result<()> {
        trace!("definition::reload_self({})", self.id);
        let definition = parse(&self.id, def)?;
        *write(&self.definition) = Arc::new(definition);
        Ok(())
    }

    fn reload_child(
        &self,
        node_id: &str,
        def: &[u8],
    ) -> Result<()> {
        trace!("definition::reload_child({}, {})", self.id, node_id);
        let node = Node::from_json(def)?;
        if node.id != node_id {
            return Err(RuleHubError::Instance(format!("node definition id {} does not match {}", node.id, node_id)));
        }

        let mut guard = write(&self.definition);
        let mut definition = ChainDefinition::clone(&guard);
        let slot = definition
            .metadata
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| RuleHubError::NotFound(format!("node {} in rule chain {}", node_id, self.id)))?;
        *slot = node;
        *guard = Arc::new(definition);
        Ok(())
    }

    fn definition(&self) -> ChainDefinition {
        ChainDefinition::clone(&read(&self.definition))
    }

    fn dsl(&self) -> Vec<u8> {
        serde_json::to_vec(read(&self.definition).as_ref()).unwrap_or_default()
    }

    fn node_dsl(
        &self,
        node_id: &str,
    ) -> Option<Vec<u8>> {
        let definition = read(&self.definition).clone();
        definition.metadata.node(node_id).and_then(|n| serde_json::to_vec(n).ok())
    }
}

fn parse(
    chain_id: &str,
    def: &[u8],
) -> Result<ChainDefinition> {
    let mut definition = ChainDefinition::from_json(def)?;
    if definition.id().is_empty() {
        definition.rule_chain.id = chain_id.to_string();
    } else if definition.id() != chain_id {
        return Err(RuleHubError::Instance(format!("definition id {} does not match rule chain {}", definition.id(), chain_id)));
    }
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn def(debug_mode: bool) -> Vec<u8> {
        json!({
            "ruleChain": {"id": "a", "name": "A", "debugMode": debug_mode},
            "metadata": {
                "nodes": [{"id": "n1", "type": "log"}, {"id": "n2", "type": "log", "debugMode": true}],
                "connections": [{"fromId": "n1", "toId": "n2", "type": "Success"}]
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_create_and_inspect() {
        let instance = DefinitionEngine::new().create("a", &def(false), &EngineOptions::default()).unwrap();
        assert_eq!(instance.id(), "a");
        assert_eq!(instance.definition().rule_chain.name, "A");

        let dsl = ChainDefinition::from_json(&instance.dsl()).unwrap();
        assert_eq!(dsl, instance.definition());

        let node: serde_json::Value = serde_json::from_slice(&instance.node_dsl("n2").unwrap()).unwrap();
        assert_eq!(node["id"], "n2");
        assert!(instance.node_dsl("missing").is_none());
    }

    #[test]
    fn test_mismatched_id_is_rejected() {
        let err = DefinitionEngine::new().create("b", &def(false), &EngineOptions::default()).err().unwrap();
        assert!(matches!(err, RuleHubError::Instance(_)));
    }

    #[test]
    fn test_failed_reload_keeps_previous_definition() {
        let instance = DefinitionEngine::new().create("a", &def(false), &EngineOptions::default()).unwrap();
        assert!(instance.reload_self(b"{broken").is_err());
        assert_eq!(instance.definition().rule_chain.name, "A");

        let renamed = String::from_utf8(def(false)).unwrap().replace("\"A\"", "\"B\"");
        instance.reload_self(renamed.as_bytes()).unwrap();
        assert_eq!(instance.definition().rule_chain.name, "B");
    }

    #[test]
    fn test_reload_child_replaces_one_node() {
        let instance = DefinitionEngine::new().create("a", &def(false), &EngineOptions::default()).unwrap();
        instance.reload_child("n1", br#"{"id":"n1","type":"jsFilter","name":"filter"}"#).unwrap();
        let definition = instance.definition();
        assert_eq!(definition.metadata.node("n1").unwrap().node_type(), "jsFilter");
        assert_eq!(definition.metadata.node("n2").unwrap().node_type(), "log");

        assert!(matches!(instance.reload_child("zz", br#"{"id":"zz","type":"log"}"#), Err(RuleHubError::NotFound(_))));
        assert!(instance.reload_child("n1", br#"{"id":"n2","type":"log"}"#).is_err());
    }

    #[test]
    fn test_trace_respects_debug_mode() {
        let (tx, rx) = flume::unbounded();
        let options = EngineOptions::default().with_on_debug(move |e| {
            let _ = tx.send(e);
        });

        let instance = DefinitionInstance::new("a", &def(false), options.clone()).unwrap();
        instance.trace("n1", FlowDirection::In, RuleMsg::new("TEST", "{}"), "", None);
        instance.trace("n2", FlowDirection::Out, RuleMsg::new("TEST", "{}"), "Success", None);
        let e = rx.try_recv().unwrap();
        assert_eq!(e.node_id, "n2");
        assert!(rx.try_recv().is_err());

        let instance = DefinitionInstance::new("a", &def(true), options).unwrap();
        instance.trace("n1", FlowDirection::In, RuleMsg::new("TEST", "{}"), "", None);
        assert_eq!(rx.try_recv().unwrap().chain_id, "a");
    }
}
