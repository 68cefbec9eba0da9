//! Cross-chain dependency graph and cycle detection.
//!
//! Flow nodes invoke other chains by id. Before a chain is saved or deployed,
//! every chain it transitively invokes is resolved from the store and folded
//! into one graph; a cycle in that graph rejects the write.

mod builder;
mod cycle;

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::{Result, RuleHubError, model::ChainDefinition, store::ChainStore};

pub use builder::{DependencyGraph, GraphBuilder, Vertex, build_graph};

/// Chains reachable from a root, in discovery order (root first).
#[derive(Debug, Default)]
pub struct Discovery {
    pub order: Vec<String>,
    pub chains: HashMap<String, ChainDefinition>,
}

/// Resolves every chain reachable from `root` through flow nodes.
///
/// A chain is marked visited the first time it is encountered, so a shared
/// sub-chain is fetched and expanded once. The root itself is never fetched:
/// its in-flight definition is used.
pub fn discover(
    root: &ChainDefinition,
    store: &dyn ChainStore,
) -> Result<Discovery> {
    let mut visited = HashSet::from([root.id().to_string()]);
    let mut discovery = Discovery::default();
    collect(root.clone(), store, &mut visited, &mut discovery)?;
    Ok(discovery)
}

fn collect(
    def: ChainDefinition,
    store: &dyn ChainStore,
    visited: &mut HashSet<String>,
    discovery: &mut Discovery,
) -> Result<()> {
    let targets: Vec<String> = def.flow_targets().map(str::to_string).collect();
    discovery.order.push(def.id().to_string());
    discovery.chains.insert(def.id().to_string(), def);

    for target in targets {
        if !visited.insert(target.clone()) {
            continue;
        }
        let record = store.find(&target)?.ok_or_else(|| RuleHubError::Lookup(format!("rule chain {} not found", target)))?;
        let mut sub = ChainDefinition::from_json(record.data.as_bytes())?;
        sub.rule_chain.id = target;
        collect(sub, store, visited, discovery)?;
    }
    Ok(())
}

/// Rejects `def` if it reaches itself, directly or through nested flow nodes.
pub fn check_definition(
    def: &ChainDefinition,
    store: &dyn ChainStore,
) -> Result<()> {
    trace!("graph::check_definition({})", def.id());
    let discovery = discover(def, store)?;
    let graph = build_graph(&discovery.chains, &discovery.order)?;

    match graph.detect_cycle() {
        Some(path) => Err(RuleHubError::CyclicReference {
            chain_id: def.id().to_string(),
            path: path.iter().map(Vertex::to_string).collect(),
        }),
        None => Ok(()),
    }
}

/// Parses `def` as the next version of `chain_id` and checks it for cycles.
pub fn check_for_cycle(
    chain_id: &str,
    def: &[u8],
    store: &dyn ChainStore,
) -> Result<()> {
    let mut def = ChainDefinition::from_json(def)?;
    def.rule_chain.id = chain_id.to_string();
    check_definition(&def, store)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemChainStore;

    /// Chain `id` whose single entry node connects to one flow node per target.
    fn chain_to(
        id: &str,
        targets: &[&str],
    ) -> serde_json::Value {
        let mut nodes = vec![json!({"id": "n1", "type": "log"})];
        let mut connections = vec![];
        for (i, target) in targets.iter().enumerate() {
            let fid = format!("f{}", i);
            nodes.push(json!({"id": fid, "type": "flow", "configuration": {"targetId": target}}));
            connections.push(json!({"fromId": "n1", "toId": fid, "type": "Success"}));
        }
        json!({"ruleChain": {"id": id}, "metadata": {"nodes": nodes, "connections": connections}})
    }

    fn seed(
        store: &MemChainStore,
        id: &str,
        targets: &[&str],
    ) {
        store.save(id, &chain_to(id, targets).to_string()).unwrap();
    }

    fn bytes(v: serde_json::Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    #[test]
    fn test_chain_without_connections_is_acyclic() {
        let store = MemChainStore::new();
        let def = json!({"ruleChain": {"id": "a"}, "metadata": {"nodes": [{"id": "n1", "type": "log"}]}});
        assert!(check_for_cycle("a", &bytes(def), &store).is_ok());
    }

    #[test]
    fn test_multi_level_acyclic() {
        let store = MemChainStore::new();
        seed(&store, "b", &["c", "d"]);
        seed(&store, "c", &["d"]);
        seed(&store, "d", &[]);
        assert!(check_for_cycle("a", &bytes(chain_to("a", &["b", "c"])), &store).is_ok());
    }

    #[test]
    fn test_self_reference_is_cyclic() {
        let store = MemChainStore::new();
        let err = check_for_cycle("a", &bytes(chain_to("a", &["a"])), &store).unwrap_err();
        assert!(matches!(err, RuleHubError::CyclicReference { chain_id, .. } if chain_id == "a"));
    }

    #[test]
    fn test_three_chain_cycle_reports_all_roots() {
        let store = MemChainStore::new();
        seed(&store, "b", &["c"]);
        seed(&store, "c", &["a"]);
        let err = check_for_cycle("a", &bytes(chain_to("a", &["b"])), &store).unwrap_err();
        match err {
            RuleHubError::CyclicReference {
                chain_id,
                path,
            } => {
                assert_eq!(chain_id, "a");
                for root in ["a", "b", "c"] {
                    assert!(path.iter().any(|v| v == root), "{} missing from {:?}", root, path);
                }
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_lone_flow_node_to_itself_is_cyclic() {
        let store = MemChainStore::new();
        let def = json!({"ruleChain": {"id": "a"}, "metadata": {"nodes": [{"id": "f", "type": "flow", "configuration": {"targetId": "a"}}]}});
        let err = check_for_cycle("a", &bytes(def), &store).unwrap_err();
        assert!(matches!(err, RuleHubError::CyclicReference { chain_id, .. } if chain_id == "a"));
    }

    #[test]
    fn test_cycle_through_entry_flow_nodes() {
        // the flow node is the entry of each chain: nothing connects into it
        let entry_flow = |id: &str, target: &str| {
            json!({
                "ruleChain": {"id": id},
                "metadata": {
                    "nodes": [{"id": "f", "type": "flow", "configuration": {"targetId": target}}, {"id": "n1", "type": "log"}],
                    "connections": [{"fromId": "f", "toId": "n1", "type": "Success"}]
                }
            })
        };
        let store = MemChainStore::new();
        store.save("b", &entry_flow("b", "a").to_string()).unwrap();

        let err = check_for_cycle("a", &bytes(entry_flow("a", "b")), &store).unwrap_err();
        match err {
            RuleHubError::CyclicReference {
                path,
                ..
            } => {
                assert!(path.iter().any(|v| v == "a"));
                assert!(path.iter().any(|v| v == "b"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unconnected_flow_to_existing_chain_is_acyclic() {
        let store = MemChainStore::new();
        seed(&store, "b", &[]);
        let def = json!({"ruleChain": {"id": "a"}, "metadata": {"nodes": [{"id": "f", "type": "flow", "configuration": {"targetId": "b"}}]}});
        assert!(check_for_cycle("a", &bytes(def), &store).is_ok());
    }

    #[test]
    fn test_inflight_root_replaces_stored_version() {
        // stored a -> b -> a would be cyclic, the new a no longer references b
        let store = MemChainStore::new();
        seed(&store, "a", &["b"]);
        seed(&store, "b", &["a"]);
        assert!(check_for_cycle("a", &bytes(chain_to("a", &[])), &store).is_ok());
    }

    #[test]
    fn test_missing_sub_chain_is_lookup_error() {
        let store = MemChainStore::new();
        let err = check_for_cycle("a", &bytes(chain_to("a", &["ghost"])), &store).unwrap_err();
        assert!(matches!(err, RuleHubError::Lookup(_)));
    }

    #[test]
    fn test_flow_without_target_is_malformed() {
        let store = MemChainStore::new();
        let def = json!({"ruleChain": {"id": "a"}, "metadata": {"nodes": [{"id": "f", "type": "flow", "configuration": {}}]}});
        let err = check_for_cycle("a", &bytes(def), &store).unwrap_err();
        assert!(matches!(err, RuleHubError::MalformedConfig(_)));
    }

    #[test]
    fn test_shared_sub_chain_is_expanded_once() {
        let store = MemChainStore::new();
        seed(&store, "b", &["shared"]);
        seed(&store, "c", &["shared"]);
        seed(&store, "shared", &[]);
        let root = ChainDefinition::from_json(&bytes(chain_to("a", &["b", "c"]))).unwrap();
        let discovery = discover(&root, &store).unwrap();
        assert_eq!(discovery.order, vec!["a", "b", "shared", "c"]);
        assert!(check_definition(&root, &store).is_ok());
    }
}
