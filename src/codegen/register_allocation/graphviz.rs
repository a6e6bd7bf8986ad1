//! Rendering of interference graphs in the GraphViz DOT format.

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use crate::prelude::*;

use super::{interference::NodeId, InterferenceGraph};

pub struct GraphViz<'g, R> {
    graph: &'g InterferenceGraph<R>,
}

impl<'g, R: Copy + Eq + Ord + Hash + Debug + Display> GraphViz<'g, R> {
    pub fn new(graph: &'g InterferenceGraph<R>) -> Self {
        Self { graph }
    }

    pub fn render<W: std::io::Write>(&self, output: &mut W) -> dot2::Result {
        dot2::render(self, output)
    }
}

/// Render the graph as an undirected DOT graph.
pub fn render_dot<R: Copy + Eq + Ord + Hash + Debug + Display>(
    graph: &InterferenceGraph<R>,
) -> Result<String> {
    let mut output = vec![];
    GraphViz::new(graph)
        .render(&mut output)
        .map_err(|_| anyhow!("Could not render interference graph {}", graph.name))?;
    Ok(String::from_utf8(output)?)
}

fn identifier(name: &str) -> String {
    let mut id: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
        id.insert(0, 'g');
    }
    id
}

impl<'g, R: Copy + Eq + Ord + Hash + Debug + Display> dot2::Labeller<'g> for GraphViz<'g, R> {
    type Node = NodeId;
    type Edge = (NodeId, NodeId);
    type Subgraph = ();

    fn graph_id(&'g self) -> dot2::Result<dot2::Id<'g>> {
        dot2::Id::new(identifier(&self.graph.name))
    }

    fn node_id(&'g self, n: &Self::Node) -> dot2::Result<dot2::Id<'g>> {
        dot2::Id::new(format!("n{}", n.0))
    }

    fn node_label(&'g self, n: &Self::Node) -> dot2::Result<dot2::label::Text<'g>> {
        Ok(dot2::label::Text::LabelStr(
            self.graph.node(*n).location.to_string().into(),
        ))
    }

    fn kind(&self) -> dot2::Kind {
        dot2::Kind::Graph
    }
}

impl<'g, R: Copy + Eq + Ord + Hash + Debug + Display> dot2::GraphWalk<'g> for GraphViz<'g, R> {
    type Node = NodeId;
    type Edge = (NodeId, NodeId);
    type Subgraph = ();

    fn nodes(&'g self) -> dot2::Nodes<'g, Self::Node> {
        self.graph.node_ids().collect::<Vec<_>>().into()
    }

    fn edges(&'g self) -> dot2::Edges<'g, Self::Edge> {
        self.graph.edges().into()
    }

    fn source(&'g self, edge: &Self::Edge) -> Self::Node {
        edge.0
    }

    fn target(&'g self, edge: &Self::Edge) -> Self::Node {
        edge.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::register_allocation::testing::*;

    #[test]
    fn renders_nodes_and_undirected_edges() {
        let mut graph = InterferenceGraph::<char>::new("general");
        let a = graph.add_node(r('a'));
        let x = graph.add_node(p("%t1"));
        graph.add_edge(a, x);

        let dot = render_dot(&graph).unwrap();

        assert!(dot.starts_with("graph general {"));
        assert!(dot.contains("n0 -- n1"));
        assert!(dot.contains("label=\"%t1\""));
    }

    #[test]
    fn identifiers_are_sanitised() {
        assert_eq!("sse", identifier("sse"));
        assert_eq!("g_t1", identifier("%t1"));
    }
}
