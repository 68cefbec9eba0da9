use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::{Result, RuleHubError, model::ChainDefinition};

/// Vertex of the cross-chain dependency graph.
///
/// Node ids are qualified by their owning chain so that equal ids in
/// unrelated chains never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Vertex {
    /// Root of a chain. A flow node is represented by the root of its target.
    Chain(String),
    /// A non-flow node of a chain.
    Node {
        chain: String,
        node: String,
    },
}

impl Vertex {
    pub fn chain(id: &str) -> Self {
        Vertex::Chain(id.to_string())
    }

    pub fn node(
        chain: &str,
        node: &str,
    ) -> Self {
        Vertex::Node {
            chain: chain.to_string(),
            node: node.to_string(),
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Vertex::Chain(id) => write!(f, "{}", id),
            Vertex::Node {
                chain,
                node,
            } => write!(f, "{}->{}", chain, node),
        }
    }
}

/// Directed graph spanning one root chain and every chain it reaches.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<Vertex, ()>,
    index: HashMap<Vertex, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// add vertex, returning the existing index when already present
    pub fn add_vertex(
        &mut self,
        vertex: Vertex,
    ) -> NodeIndex {
        if let Some(idx) = self.index.get(&vertex) {
            return *idx;
        }
        let idx = self.graph.add_node(vertex.clone());
        self.index.insert(vertex, idx);
        idx
    }

    /// add edge between two vertices, adding missing endpoints
    pub fn add_edge(
        &mut self,
        from: Vertex,
        to: Vertex,
    ) {
        let from = self.add_vertex(from);
        let to = self.add_vertex(to);
        self.graph.update_edge(from, to, ());
    }

    pub fn contains(
        &self,
        vertex: &Vertex,
    ) -> bool {
        self.index.contains_key(vertex)
    }

    pub fn has_edge(
        &self,
        from: &Vertex,
        to: &Vertex,
    ) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Folds chain metadata into a [`DependencyGraph`].
///
/// The visited set belongs to this builder, so each check owns a fresh traversal state.
pub struct GraphBuilder<'a> {
    chains: &'a HashMap<String, ChainDefinition>,
    visited: HashSet<String>,
    graph: DependencyGraph,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(chains: &'a HashMap<String, ChainDefinition>) -> Self {
        Self {
            chains,
            visited: HashSet::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// Folds `chain_id` and every chain its flow nodes invoke.
    /// A chain already folded is not expanded again.
    pub fn fold(
        &mut self,
        chain_id: &str,
    ) -> Result<()> {
        if !self.visited.insert(chain_id.to_string()) {
            return Ok(());
        }
        let def = self.lookup(chain_id)?;
        let root = Vertex::chain(chain_id);
        self.graph.add_vertex(root.clone());

        for node in def.metadata.nodes.iter() {
            self.graph.add_edge(root.clone(), qualify(def, chain_id, &node.id));
        }
        for conn in def.metadata.connections.iter() {
            self.graph.add_edge(qualify(def, chain_id, &conn.from_id), qualify(def, chain_id, &conn.to_id));
        }
        for target in def.flow_targets() {
            self.fold(target)?;
        }
        Ok(())
    }

    pub fn finish(self) -> DependencyGraph {
        self.graph
    }

    fn lookup(
        &self,
        chain_id: &str,
    ) -> Result<&'a ChainDefinition> {
        self.chains.get(chain_id).ok_or_else(|| RuleHubError::Lookup(format!("rule chain {} not found", chain_id)))
    }
}

/// Vertex of a node: its target chain's root for a flow node, the qualified node otherwise.
fn qualify(
    def: &ChainDefinition,
    chain_id: &str,
    node_id: &str,
) -> Vertex {
    match def.metadata.node(node_id).and_then(|n| n.flow_target()) {
        Some(target) => Vertex::chain(target),
        None => Vertex::node(chain_id, node_id),
    }
}

/// Builds the graph of every chain in `order`, all looked up in `chains`.
pub fn build_graph(
    chains: &HashMap<String, ChainDefinition>,
    order: &[String],
) -> Result<DependencyGraph> {
    let mut builder = GraphBuilder::new(chains);
    for id in order {
        builder.fold(id)?;
    }
    Ok(builder.finish())
}
