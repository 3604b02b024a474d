//! Incremental graph builder.

use std::collections::HashMap;
use wn_core::{LinkId, NodeId};

use crate::error::GraphError;
use crate::graph::{Graph, Link, LinkEnd, Node};
use crate::validate;

/// Builder for constructing a network topology incrementally.
///
/// Use `add_node` and `add_link` to build up the graph,
/// then call `build()` to validate and freeze it into an immutable `Graph`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph and return its ID.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        self.nodes.push(Node {
            id,
            name: name.into(),
        });
        id
    }

    /// Add a link from `from` to `to` and return its ID.
    pub fn add_link(&mut self, name: impl Into<String>, from: NodeId, to: NodeId) -> LinkId {
        let id = LinkId::from_usize(self.links.len());
        self.links.push(Link {
            id,
            name: name.into(),
            from,
            to,
        });
        id
    }

    /// Build and validate the graph, returning an immutable `Graph`.
    pub fn build(self) -> Result<Graph, GraphError> {
        validate::validate_structure(&self.nodes, &self.links)?;

        let (node_link_offsets, node_links) = Self::build_incidence(&self.nodes, &self.links);

        Ok(Graph {
            nodes: self.nodes,
            links: self.links,
            node_link_offsets,
            node_links,
        })
    }

    /// Build compact incidence lists: for each node, collect its links.
    fn build_incidence(
        nodes: &[Node],
        links: &[Link],
    ) -> (Vec<usize>, Vec<(LinkId, LinkEnd)>) {
        let mut node_to_links: HashMap<NodeId, Vec<(LinkId, LinkEnd)>> = HashMap::new();
        for link in links {
            node_to_links
                .entry(link.from)
                .or_default()
                .push((link.id, LinkEnd::Start));
            node_to_links
                .entry(link.to)
                .or_default()
                .push((link.id, LinkEnd::End));
        }

        // Sort each node's list for determinism
        for list in node_to_links.values_mut() {
            list.sort_by_key(|(l, _)| l.index());
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat = Vec::with_capacity(links.len() * 2);
        offsets.push(0);

        for node in nodes {
            if let Some(list) = node_to_links.get(&node.id) {
                flat.extend_from_slice(list);
            }
            offsets.push(flat.len());
        }

        (offsets, flat)
    }
}
