//! Graph validation logic.

use std::collections::HashSet;

use crate::error::GraphError;
use crate::graph::{Link, Node};

/// Validate the topology: every link references existing, distinct nodes and names are unique.
pub(crate) fn validate_structure(nodes: &[Node], links: &[Link]) -> Result<(), GraphError> {
    let mut names = HashSet::new();
    for node in nodes {
        if !names.insert(node.name.as_str()) {
            return Err(GraphError::DuplicateName {
                what: "node",
                name: node.name.clone(),
            });
        }
    }

    let mut names = HashSet::new();
    for link in links {
        if !names.insert(link.name.as_str()) {
            return Err(GraphError::DuplicateName {
                what: "link",
                name: link.name.clone(),
            });
        }
        for node in [link.from, link.to] {
            if node.pos() >= nodes.len() {
                return Err(GraphError::InvalidNodeRef {
                    link: link.id,
                    node,
                });
            }
        }
        if link.from == link.to {
            return Err(GraphError::SelfLoop {
                link: link.id,
                node: link.from,
            });
        }
    }

    Ok(())
}
