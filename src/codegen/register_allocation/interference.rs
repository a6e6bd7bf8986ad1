//! Interference graphs, stored as an arena of nodes with index adjacency sets.

use std::{
    collections::{BTreeSet, HashMap},
    fmt::{Debug, Display},
    hash::Hash,
};

use crate::prelude::*;

use super::{Liveness, Location, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<R> {
    pub location: Location<R>,
    pub neighbours: BTreeSet<NodeId>,
    /// Number of times the location is read or written.
    pub spill_cost: usize,
    /// Nodes merged into another node by coalescing no longer take part in the graph.
    pub removed: bool,
}
impl<R> Node<R> {
    /// Hard registers are coloured before allocation starts.
    pub fn is_precoloured(&self) -> bool {
        !self.location.is_pseudo()
    }
}

/// The interference graph of one register class. Two locations interfere if
/// one is written while the other holds a value that is still needed.
#[derive(Debug, Clone)]
pub struct InterferenceGraph<R> {
    pub name: String,
    nodes: Vec<Node<R>>,
    index: HashMap<Location<R>, NodeId>,
}
impl<R: Copy + Eq + Ord + Hash + Debug + Display> InterferenceGraph<R> {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            nodes: vec![],
            index: HashMap::new(),
        }
    }

    /// Returns the node for a location, creating it if needed.
    pub fn add_node(&mut self, location: Location<R>) -> NodeId {
        if let Some(id) = self.index.get(&location) {
            return *id;
        }
        let id = NodeId(self.nodes.len());
        self.index.insert(location.clone(), id);
        self.nodes.push(Node {
            location,
            neighbours: BTreeSet::new(),
            spill_cost: 0,
            removed: false,
        });
        id
    }

    pub fn add_edge(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        self.nodes[a.0].neighbours.insert(b);
        self.nodes[b.0].neighbours.insert(a);
    }

    pub fn node(&self, id: NodeId) -> &Node<R> {
        &self.nodes[id.0]
    }

    /// Number of nodes ever added, including those removed by merging.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn bump_spill_cost(&mut self, id: NodeId) {
        self.nodes[id.0].spill_cost += 1;
    }

    pub fn id_of(&self, location: &Location<R>) -> Option<NodeId> {
        self.index.get(location).copied()
    }

    /// All nodes still taking part in the graph.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.removed)
            .map(|(i, _)| NodeId(i))
    }

    pub fn neighbours(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0].neighbours.iter().copied()
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.nodes[id.0].neighbours.len()
    }

    pub fn interferes(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes[a.0].neighbours.contains(&b)
    }

    /// Merge node `from` into node `into`: `into` inherits every edge and the
    /// spill cost of `from`, which is removed from the graph.
    pub fn merge(&mut self, from: NodeId, into: NodeId) {
        let neighbours = std::mem::take(&mut self.nodes[from.0].neighbours);
        for n in neighbours {
            self.nodes[n.0].neighbours.remove(&from);
            self.add_edge(into, n);
        }
        self.nodes[into.0].spill_cost += self.nodes[from.0].spill_cost;
        self.nodes[from.0].removed = true;
        for id in self.index.values_mut() {
            if *id == from {
                *id = into;
            }
        }
    }

    /// All edges, each reported once with the lower node first.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.node_ids()
            .flat_map(|a| {
                self.neighbours(a)
                    .filter(move |b| a < *b)
                    .map(move |b| (a, b))
            })
            .collect()
    }
}

/// Build the interference graph for the given register class.
pub fn build<T: Target>(
    target: &T,
    liveness: &Liveness<T::Register>,
    class: T::Class,
) -> InterferenceGraph<T::Register> {
    let mut graph = InterferenceGraph::new(class.to_string());
    for reg in target.colours(class) {
        graph.add_node(Location::Reg(*reg));
    }

    let in_class = |l: &Location<T::Register>| target.class_of(l) == Some(class);
    for index in 0..target.instructions().len() {
        let reads = target.reads(index);
        let writes = target.writes(index);
        for location in reads.iter().chain(&writes).filter(|l| in_class(l)) {
            let id = graph.add_node(location.clone());
            graph.bump_spill_cost(id);
        }

        // The source of a copy may share a register with its destination.
        let source = target.as_move(index).map(|(_, src)| src);
        for written in writes.iter().filter(|l| in_class(l)) {
            let w = graph.add_node(written.clone());
            for live in liveness.live_out(index).iter().filter(|l| in_class(l)) {
                if live == written || Some(live) == source.as_ref() {
                    continue;
                }
                let l = graph.add_node(live.clone());
                graph.add_edge(w, l);
            }
        }
    }

    trace!(
        "built {} interference graph with {} nodes and {} edges",
        graph.name,
        graph.nodes.len(),
        graph.edges().len()
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::register_allocation::{liveness, testing::*};

    fn graph_of(function: &ToyFunction) -> InterferenceGraph<char> {
        let liveness = liveness::analyse(function);
        build(function, &liveness, 0)
    }

    fn interferes(graph: &InterferenceGraph<char>, a: &Location<char>, b: &Location<char>) -> bool {
        match (graph.id_of(a), graph.id_of(b)) {
            (Some(a), Some(b)) => graph.interferes(a, b),
            _ => false,
        }
    }

    #[test]
    fn simultaneously_live_values_interfere() {
        let function = ToyFunction::new(
            "abc",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Def(p("y"), vec![]),
                Toy::Use(vec![p("x"), p("y")]),
                Toy::Ret,
            ],
        );
        let graph = graph_of(&function);

        assert!(interferes(&graph, &p("x"), &p("y")));
    }

    #[test]
    fn copy_source_does_not_interfere_with_destination() {
        let function = ToyFunction::new(
            "abc",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Mov(p("y"), p("x")),
                Toy::Use(vec![p("x"), p("y")]),
                Toy::Ret,
            ],
        );
        let graph = graph_of(&function);

        assert!(!interferes(&graph, &p("x"), &p("y")));
    }

    #[test]
    fn hard_registers_are_always_present() {
        let function = ToyFunction::new("abc", vec![Toy::Ret]);
        let graph = graph_of(&function);

        assert_eq!(3, graph.node_ids().count());
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn writing_a_hard_register_interferes_with_live_pseudos() {
        let function = ToyFunction::new(
            "abc",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Def(r('a'), vec![]),
                Toy::Use(vec![p("x"), r('a')]),
                Toy::Ret,
            ],
        );
        let graph = graph_of(&function);

        assert!(interferes(&graph, &p("x"), &r('a')));
        assert!(!interferes(&graph, &p("x"), &r('b')));
    }

    #[test]
    fn spill_cost_counts_occurrences() {
        let function = ToyFunction::new(
            "abc",
            vec![
                Toy::Def(p("x"), vec![]),
                Toy::Use(vec![p("x")]),
                Toy::Use(vec![p("x")]),
                Toy::Ret,
            ],
        );
        let graph = graph_of(&function);

        let x = graph.id_of(&p("x")).unwrap();
        assert_eq!(3, graph.node(x).spill_cost);
    }

    #[test]
    fn merging_moves_edges() {
        let mut graph = InterferenceGraph::new("test");
        let a = graph.add_node(p("a"));
        let b = graph.add_node(p("b"));
        let c = graph.add_node(p("c"));
        graph.add_edge(a, c);

        graph.merge(a, b);

        assert!(graph.interferes(b, c));
        assert!(!graph.interferes(a, c));
        assert_eq!(Some(b), graph.id_of(&p("a")));
        assert_eq!(2, graph.node_ids().count());
    }
}
