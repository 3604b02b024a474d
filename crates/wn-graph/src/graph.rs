//! Core topology data structures.

use std::collections::VecDeque;
use wn_core::{LinkId, NodeId};

/// Which end of a link touches a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEnd {
    /// Start node (positive flow leaves it).
    Start,
    /// End node (positive flow enters it).
    End,
}

/// A node in the pipe network: a junction, tank or reservoir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
}

/// A link between two nodes: pipe, pump or valve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
}

impl Link {
    /// The node at the given end.
    pub fn node(&self, end: LinkEnd) -> NodeId {
        match end {
            LinkEnd::Start => self.from,
            LinkEnd::End => self.to,
        }
    }

    /// The node across the link from `node`.
    pub fn other(&self, node: NodeId) -> NodeId {
        if self.from == node { self.to } else { self.from }
    }
}

/// The graph: a validated, immutable collection of nodes and links.
///
/// Incidence is stored compactly: node i's links are in
/// `node_links[node_link_offsets[i]..node_link_offsets[i+1]]`, sorted by link id.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) node_link_offsets: Vec<usize>,
    pub(crate) node_links: Vec<(LinkId, LinkEnd)>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.pos())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.pos())
    }

    /// Links incident to a node, with the end of each link that touches it.
    pub fn node_links(&self, node_id: NodeId) -> &[(LinkId, LinkEnd)] {
        let idx = node_id.pos();
        if idx >= self.nodes.len() {
            return &[];
        }
        let start = self.node_link_offsets[idx];
        let end = self.node_link_offsets[idx + 1];
        &self.node_links[start..end]
    }

    /// Link end points as arena positions, in link order.
    pub fn link_ends(&self) -> Vec<(usize, usize)> {
        self.links
            .iter()
            .map(|l| (l.from.pos(), l.to.pos()))
            .collect()
    }

    /// Nodes that cannot be reached from any of `sources` through links
    /// for which `is_open` holds. Returned in node order.
    pub fn unreachable_from<F>(&self, sources: &[NodeId], is_open: F) -> Vec<NodeId>
    where
        F: Fn(LinkId) -> bool,
    {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        for &s in sources {
            if s.pos() < seen.len() && !seen[s.pos()] {
                seen[s.pos()] = true;
                queue.push_back(s);
            }
        }
        while let Some(n) = queue.pop_front() {
            for &(link_id, _) in self.node_links(n) {
                if !is_open(link_id) {
                    continue;
                }
                let next = self.links[link_id.pos()].other(n);
                if !seen[next.pos()] {
                    seen[next.pos()] = true;
                    queue.push_back(next);
                }
            }
        }
        self.nodes
            .iter()
            .filter(|n| !seen[n.id.pos()])
            .map(|n| n.id)
            .collect()
    }
}
