//! The dependency graph of one module.
//!
//! Nodes are modules keyed by `group:artifact`; the first version reached
//! (nearest to the root) wins. Edges carry the scope they were declared with.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::{bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::artifact::{Coordinates, Scope};

/// A node in resolution order, with its effective scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedNode {
    pub coordinates: Coordinates,
    pub scope: Scope,
    pub direct: bool,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Coordinates, Scope>,
    by_key: HashMap<String, NodeIndex>,
    root: NodeIndex,
}

impl DependencyGraph {
    /// Create a graph containing only the root module.
    pub fn new(root: Coordinates) -> Self {
        let mut graph = DiGraph::new();
        let mut by_key = HashMap::new();
        by_key.insert(root.key(), NodeIndex::new(0));
        let root = graph.add_node(root);
        DependencyGraph {
            graph,
            by_key,
            root,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn coordinates(&self, node: NodeIndex) -> &Coordinates {
        &self.graph[node]
    }

    /// Add a module, returning its node and whether it is new.
    ///
    /// A module already present under another version keeps its first
    /// version.
    pub fn add_artifact(&mut self, coordinates: Coordinates) -> (NodeIndex, bool) {
        if let Some(&node) = self.by_key.get(&coordinates.key()) {
            let existing = &self.graph[node];
            if existing.version != coordinates.version {
                tracing::warn!(
                    "{} requested, using nearer version {}",
                    coordinates,
                    existing.version
                );
            }
            return (node, false);
        }
        let key = coordinates.key();
        let node = self.graph.add_node(coordinates);
        self.by_key.insert(key, node);
        (node, true)
    }

    /// Add a dependency edge between modules.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, scope: Scope) {
        if !self.graph.contains_edge(from, to) {
            self.graph.add_edge(from, to, scope);
        }
    }

    /// Number of dependency modules, the root excluded.
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    /// Whether the root has no dependencies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Direct dependencies of a node, in the order they were added.
    pub fn deps(&self, node: NodeIndex) -> Vec<(NodeIndex, Scope)> {
        // petgraph yields edges newest first
        let mut deps: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        deps.reverse();
        deps
    }

    /// Modules that depend on the given node.
    pub fn dependents(&self, node: NodeIndex) -> Vec<&Coordinates> {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|n| &self.graph[n])
            .collect()
    }

    /// Fail if the graph contains a cycle, naming one module on it.
    pub fn check_acyclic(&self) -> Result<()> {
        if let Err(cycle) = toposort(&self.graph, None) {
            bail!(
                "dependency cycle detected involving `{}`",
                self.graph[cycle.node_id()]
            );
        }
        Ok(())
    }

    /// Every module except the root, nearest first, in declaration order.
    ///
    /// A module with a path of compile edges from the root is compile
    /// scope; anything else is test scope.
    pub fn resolution_order(&self) -> Vec<OrderedNode> {
        let compile = self.reachable(|scope| scope == Scope::Compile);
        let direct: HashSet<NodeIndex> = self.deps(self.root).into_iter().map(|(n, _)| n).collect();

        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(self.root);
        queue.push_back(self.root);

        while let Some(node) = queue.pop_front() {
            for (dep, _) in self.deps(node) {
                if seen.insert(dep) {
                    order.push(OrderedNode {
                        coordinates: self.graph[dep].clone(),
                        scope: if compile.contains(&dep) {
                            Scope::Compile
                        } else {
                            Scope::Test
                        },
                        direct: direct.contains(&dep),
                    });
                    queue.push_back(dep);
                }
            }
        }
        order
    }

    /// Nodes reachable from the root whose first edge satisfies `first`.
    fn reachable(&self, first: impl Fn(Scope) -> bool) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeIndex> = self
            .deps(self.root)
            .into_iter()
            .filter(|(_, scope)| first(*scope))
            .map(|(n, _)| n)
            .collect();

        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.deps(node).into_iter().map(|(n, _)| n));
            }
        }
        seen
    }
}
