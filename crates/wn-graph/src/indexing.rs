//! Name lookup for nodes and links.

use std::collections::HashMap;
use wn_core::{LinkId, NodeId};

use crate::error::GraphError;
use crate::graph::Graph;

/// Maps user-facing names to node and link IDs.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    nodes: HashMap<String, NodeId>,
    links: HashMap<String, LinkId>,
}

impl NameIndex {
    pub fn from_graph(graph: &Graph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .iter()
                .map(|n| (n.name.clone(), n.id))
                .collect(),
            links: graph
                .links()
                .iter()
                .map(|l| (l.name.clone(), l.id))
                .collect(),
        }
    }

    pub fn node(&self, name: &str) -> Result<NodeId, GraphError> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NameNotFound {
                what: "node",
                name: name.to_string(),
            })
    }

    pub fn link(&self, name: &str) -> Result<LinkId, GraphError> {
        self.links
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NameNotFound {
                what: "link",
                name: name.to_string(),
            })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;

    #[test]
    fn name_round_trip() {
        let mut builder = GraphBuilder::new();
        let n1 = builder.add_node("R1");
        let n2 = builder.add_node("J1");
        let p = builder.add_link("P1", n1, n2);
        let graph = builder.build().unwrap();

        let index = NameIndex::from_graph(&graph);
        assert_eq!(index.node("J1").unwrap(), n2);
        assert_eq!(index.link("P1").unwrap(), p);
        assert_eq!(index.node_count(), 2);
        assert_eq!(index.link_count(), 1);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let graph = GraphBuilder::new().build().unwrap();
        let index = NameIndex::from_graph(&graph);
        assert!(matches!(
            index.node("nope"),
            Err(GraphError::NameNotFound { what: "node", .. })
        ));
    }
}
