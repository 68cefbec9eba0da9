use petgraph::graph::{Neighbors, NodeIndex};

use crate::graph::{DependencyGraph, Vertex};

impl DependencyGraph {
    /// Depth-first search with an explicit recursion stack.
    ///
    /// Returns the path from the DFS start to the vertex closing the first
    /// back-edge found, ending with that repeated vertex.
    pub fn detect_cycle(&self) -> Option<Vec<Vertex>> {
        let graph = &self.graph;
        let mut visited = vec![false; graph.node_count()];
        let mut on_stack = vec![false; graph.node_count()];

        for start in graph.node_indices() {
            if visited[start.index()] {
                continue;
            }

            let mut stack: Vec<(NodeIndex, Neighbors<'_, ()>)> = vec![(start, graph.neighbors(start))];
            visited[start.index()] = true;
            on_stack[start.index()] = true;

            while let Some((node, neighbors)) = stack.last_mut() {
                let node = *node;
                match neighbors.next() {
                    Some(next) if on_stack[next.index()] => {
                        let mut path: Vec<Vertex> = stack.iter().map(|(idx, _)| graph[*idx].clone()).collect();
                        path.push(graph[next].clone());
                        return Some(path);
                    }
                    Some(next) if !visited[next.index()] => {
                        visited[next.index()] = true;
                        on_stack[next.index()] = true;
                        stack.push((next, graph.neighbors(next)));
                    }
                    Some(_) => {}
                    None => {
                        on_stack[node.index()] = false;
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    pub fn has_cycle(&self) -> bool {
        self.detect_cycle().is_some()
    }

    /// In-degree propagation (Kahn). A cycle exists when fewer vertices than
    /// the graph holds can be placed in topological order.
    #[cfg(test)]
    pub(crate) fn has_cycle_by_in_degree(&self) -> bool {
        use std::collections::VecDeque;

        use petgraph::Direction;

        let graph = &self.graph;
        let mut in_degree: Vec<usize> = graph.node_indices().map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count()).collect();
        let mut queue: VecDeque<NodeIndex> = graph.node_indices().filter(|idx| in_degree[idx.index()] == 0).collect();
        let mut placed = 0;

        while let Some(node) = queue.pop_front() {
            placed += 1;
            for next in graph.neighbors(node) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    queue.push_back(next);
                }
            }
        }

        placed != graph.node_count()
    }
}
