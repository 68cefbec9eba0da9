use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, RuleHubError};

/// Type tag of a node that invokes another chain.
pub const FLOW_NODE_TYPE: &str = "flow";
/// Configuration key naming the chain a flow node invokes.
pub const FLOW_TARGET_KEY: &str = "targetId";

/// node id, unique within its chain
pub type NodeId = String;

/// Configuration of a `flow` node.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    /// id of the invoked chain
    pub target_id: String,
    /// remaining configuration keys, kept for round-tripping
    pub extra: Map<String, Value>,
}

/// Configuration of any node type this crate does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    pub node_type: String,
    pub configuration: Map<String, Value>,
}

/// Node configuration decoded once, when the definition is parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Flow(FlowConfig),
    Component(ComponentConfig),
}

/// A processing node inside a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub debug_mode: bool,
    pub config: NodeConfig,
}

/// Wire shape of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub configuration: Option<Map<String, Value>>,
    #[serde(default)]
    pub debug_mode: bool,
}

impl Node {
    pub fn node_type(&self) -> &str {
        match &self.config {
            NodeConfig::Flow(_) => FLOW_NODE_TYPE,
            NodeConfig::Component(c) => &c.node_type,
        }
    }

    /// Chain invoked by this node, if it is a flow node.
    pub fn flow_target(&self) -> Option<&str> {
        match &self.config {
            NodeConfig::Flow(f) => Some(&f.target_id),
            NodeConfig::Component(_) => None,
        }
    }

    pub fn from_json(s: &[u8]) -> Result<Self> {
        let raw: RawNode = serde_json::from_slice(s)?;
        Node::try_from(raw)
    }
}

impl TryFrom<RawNode> for Node {
    type Error = RuleHubError;

    fn try_from(raw: RawNode) -> Result<Self> {
        let mut configuration = raw.configuration.unwrap_or_default();
        let config = if raw.node_type == FLOW_NODE_TYPE {
            let target_id = match configuration.remove(FLOW_TARGET_KEY) {
                Some(Value::String(id)) if !id.trim().is_empty() => id,
                Some(other) => {
                    return Err(RuleHubError::MalformedConfig(format!(
                        "flow node {} has invalid {}: {}",
                        raw.id, FLOW_TARGET_KEY, other
                    )));
                }
                None => {
                    return Err(RuleHubError::MalformedConfig(format!("flow node {} is missing {}", raw.id, FLOW_TARGET_KEY)));
                }
            };
            NodeConfig::Flow(FlowConfig {
                target_id,
                extra: configuration,
            })
        } else {
            NodeConfig::Component(ComponentConfig {
                node_type: raw.node_type,
                configuration,
            })
        };

        Ok(Self {
            id: raw.id,
            name: raw.name,
            debug_mode: raw.debug_mode,
            config,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let (node_type, configuration) = match node.config {
            NodeConfig::Flow(f) => {
                let mut configuration = f.extra;
                configuration.insert(FLOW_TARGET_KEY.to_string(), Value::String(f.target_id));
                (FLOW_NODE_TYPE.to_string(), configuration)
            }
            NodeConfig::Component(c) => (c.node_type, c.configuration),
        };

        Self {
            id: node.id,
            node_type,
            name: node.name,
            configuration: Some(configuration),
            debug_mode: node.debug_mode,
        }
    }
}
