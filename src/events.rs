//! Trace events emitted by running chain instances.
//!
//! The rule engine reports every message entering or leaving a node; these
//! events feed the debug ring and the registered observers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{model::NodeId, utils};

/// Direction of a message relative to the traced node.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
pub enum FlowDirection {
    #[serde(rename = "IN")]
    #[strum(serialize = "IN")]
    In,
    #[serde(rename = "OUT")]
    #[strum(serialize = "OUT")]
    Out,
}

/// Snapshot of the message a node processed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleMsg {
    pub id: String,
    pub ts: i64,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub data: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RuleMsg {
    pub fn new(
        msg_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: utils::longid(),
            ts: utils::time::time_millis(),
            msg_type: msg_type.into(),
            data: data.into(),
            metadata: HashMap::new(),
        }
    }
}

/// One node's processing outcome for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub chain_id: String,
    pub node_id: NodeId,
    pub flow: FlowDirection,
    pub msg: RuleMsg,
    /// relation type the node routed the message to
    pub relation_type: String,
    pub err: Option<String>,
    /// Timestamp in milliseconds of the event.
    pub timestamp: i64,
}

impl TraceEvent {
    pub fn new(
        chain_id: impl Into<String>,
        node_id: impl Into<String>,
        flow: FlowDirection,
        msg: RuleMsg,
        relation_type: impl Into<String>,
        err: Option<String>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            node_id: node_id.into(),
            flow,
            msg,
            relation_type: relation_type.into(),
            err,
            timestamp: utils::time::time_millis(),
        }
    }
}
