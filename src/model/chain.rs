use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    Result, RuleHubError,
    model::{Connection, Node, node::RawNode},
};

/// Additional-info key of the creation time, kept once set.
pub const KEY_CREATE_TIME: &str = "createTime";
/// Additional-info key of the last update time.
pub const KEY_UPDATE_TIME: &str = "updateTime";
/// Additional-info key of the owning tenant.
pub const KEY_USERNAME: &str = "username";
/// Additional-info key of the last deployment failure.
pub const KEY_MESSAGE: &str = "message";

/// Base information of a chain, the `ruleChain` block of a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub root: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub additional_info: BTreeMap<String, String>,
    #[serde(default)]
    pub configuration: Map<String, Value>,
}

/// Nodes and connections of one chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata")]
pub struct Metadata {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

/// A complete chain definition as persisted and exchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDefinition")]
pub struct ChainDefinition {
    pub rule_chain: ChainInfo,
    pub metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMetadata {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    connections: Vec<Connection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDefinition {
    rule_chain: ChainInfo,
    #[serde(default)]
    metadata: RawMetadata,
}

impl TryFrom<RawMetadata> for Metadata {
    type Error = RuleHubError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        let nodes = raw.nodes.into_iter().map(Node::try_from).collect::<Result<Vec<_>>>()?;

        let mut ids = HashSet::new();
        for node in nodes.iter() {
            if !ids.insert(node.id.as_str()) {
                return Err(RuleHubError::MalformedConfig(format!("duplicate node id: {}", node.id)));
            }
        }
        for conn in raw.connections.iter() {
            for end in [&conn.from_id, &conn.to_id] {
                if !ids.contains(end.as_str()) {
                    return Err(RuleHubError::MalformedConfig(format!("connection references unknown node: {}", end)));
                }
            }
        }

        Ok(Self {
            nodes,
            connections: raw.connections,
        })
    }
}

impl TryFrom<RawDefinition> for ChainDefinition {
    type Error = RuleHubError;

    fn try_from(raw: RawDefinition) -> Result<Self> {
        let metadata = Metadata::try_from(raw.metadata).map_err(|e| match e {
            RuleHubError::MalformedConfig(msg) => RuleHubError::MalformedConfig(format!("chain {}: {}", raw.rule_chain.id, msg)),
            other => other,
        })?;
        Ok(Self {
            rule_chain: raw.rule_chain,
            metadata,
        })
    }
}

impl Metadata {
    pub fn node(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl ChainDefinition {
    /// Parses a definition. Syntax errors surface as `Convert`, invalid
    /// node configuration or dangling connections as `MalformedConfig`.
    pub fn from_json(s: &[u8]) -> Result<Self> {
        let raw: RawDefinition = serde_json::from_slice(s)?;
        ChainDefinition::try_from(raw)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn id(&self) -> &str {
        &self.rule_chain.id
    }

    /// Ids of every chain this chain invokes, in node order.
    pub fn flow_targets(&self) -> impl Iterator<Item = &str> {
        self.metadata.nodes.iter().filter_map(Node::flow_target)
    }

    pub fn additional_info(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.rule_chain.additional_info.get(key).map(String::as_str)
    }

    pub fn remove_additional_info(
        &mut self,
        key: &str,
    ) -> Option<String> {
        self.rule_chain.additional_info.remove(key)
    }

    pub fn put_additional_info(
        &mut self,
        key: &str,
        value: impl Into<String>,
    ) {
        self.rule_chain.additional_info.insert(key.to_string(), value.into());
    }
}
