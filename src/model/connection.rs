use serde::{Deserialize, Serialize};

use crate::model::NodeId;

/// Directed link between two nodes of the same chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_id: NodeId,
    pub to_id: NodeId,
    /// relation type, e.g. `Success` or `Failure`
    #[serde(rename = "type", default)]
    pub relation_type: String,
}
