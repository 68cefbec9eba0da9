use serde::{Deserialize, Serialize};

/// Persisted form of one chain definition.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChainRecord {
    pub id: String,
    /// definition JSON
    pub data: String,
    pub create_time: i64,
    pub update_time: i64,
}
