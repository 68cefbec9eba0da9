use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};

use crate::{
    common::{MemCache, lock},
    events::{FlowDirection, RuleMsg, TraceEvent},
    model::NodeId,
};

/// One retained trace record, replayed by debugging UIs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DebugData {
    pub ts: i64,
    pub node_id: NodeId,
    pub flow_type: FlowDirection,
    pub msg: RuleMsg,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl From<&TraceEvent> for DebugData {
    fn from(e: &TraceEvent) -> Self {
        Self {
            ts: e.timestamp,
            node_id: e.node_id.clone(),
            flow_type: e.flow,
            msg: e.msg.clone(),
            relation_type: e.relation_type.clone(),
            err: e.err.clone(),
        }
    }
}

type Ring = Arc<Mutex<VecDeque<DebugData>>>;

/// Capped per-chain rings of recent trace records, oldest evicted first.
///
/// Purely in memory; nothing here is persisted.
#[derive(Clone)]
pub struct DebugLog {
    capacity: usize,
    chains: MemCache<String, Ring>,
}

impl DebugLog {
    pub fn new(
        capacity: usize,
        max_chains: usize,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            chains: MemCache::new(max_chains),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn add(
        &self,
        chain_id: &str,
        data: DebugData,
    ) {
        let ring = self.chains.get_or_insert_with(chain_id.to_string(), || Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity))));
        let mut ring = lock(&ring);
        while ring.len() >= self.capacity {
            ring.pop_front();
        }
        ring.push_back(data);
    }

    /// Records of `chain_id`, oldest first, optionally only those of one node.
    pub fn get(
        &self,
        chain_id: &str,
        node_id: Option<&str>,
    ) -> Vec<DebugData> {
        let Some(ring) = self.chains.get(&chain_id.to_string()) else {
            return Vec::new();
        };
        let ring = lock(&ring);
        ring.iter().filter(|d| node_id.is_none_or(|nid| d.node_id == nid)).cloned().collect()
    }

    pub fn clear(
        &self,
        chain_id: &str,
    ) {
        self.chains.remove(&chain_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        node_id: &str,
        i: usize,
    ) -> DebugData {
        DebugData::from(&TraceEvent::new("a", node_id, FlowDirection::In, RuleMsg::new("TEST", i.to_string()), "Success", None))
    }

    #[test]
    fn test_ring_keeps_most_recent_in_order() {
        let log = DebugLog::new(5, 16);
        for i in 0..10 {
            log.add("a", record("n1", i));
        }
        let data: Vec<String> = log.get("a", None).into_iter().map(|d| d.msg.data).collect();
        assert_eq!(data, vec!["5", "6", "7", "8", "9"]);
    }

    #[test]
    fn test_rings_are_per_chain() {
        let log = DebugLog::new(3, 16);
        log.add("a", record("n1", 1));
        log.add("b", record("n1", 2));
        assert_eq!(log.get("a", None).len(), 1);
        assert_eq!(log.get("b", None).len(), 1);
        assert!(log.get("c", None).is_empty());
    }

    #[test]
    fn test_node_filter_and_clear() {
        let log = DebugLog::new(10, 16);
        log.add("a", record("n1", 1));
        log.add("a", record("n2", 2));
        log.add("a", record("n1", 3));
        let n1: Vec<String> = log.get("a", Some("n1")).into_iter().map(|d| d.msg.data).collect();
        assert_eq!(n1, vec!["1", "3"]);

        log.clear("a");
        assert!(log.get("a", None).is_empty());
    }

    #[test]
    fn test_concurrent_appends_stay_capped() {
        let log = DebugLog::new(40, 16);
        std::thread::scope(|s| {
            for t in 0..4 {
                let log = &log;
                s.spawn(move || {
                    for i in 0..100 {
                        log.add("a", record(&format!("n{}", t), i));
                    }
                });
            }
        });
        assert_eq!(log.get("a", None).len(), 40);
    }
}
