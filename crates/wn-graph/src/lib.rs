//! wn-graph: topology layer for waternet.
//!
//! Provides:
//! - Core topology data structures (Node, Link, Graph)
//! - Incremental graph builder with validation
//! - Name lookup and reachability queries
//!
//! # Example
//!
//! ```
//! use wn_graph::GraphBuilder;
//!
//! let mut builder = GraphBuilder::new();
//! let n1 = builder.add_node("R1");
//! let n2 = builder.add_node("J1");
//! builder.add_link("P1", n1, n2);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.nodes().len(), 2);
//! assert_eq!(graph.links().len(), 1);
//! ```

pub mod builder;
pub mod error;
pub mod graph;
pub mod indexing;
pub(crate) mod validate;

pub use builder::GraphBuilder;
pub use error::GraphError;
pub use graph::{Graph, Link, LinkEnd, Node};
pub use indexing::NameIndex;
