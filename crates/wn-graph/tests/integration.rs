//! Integration tests for wn-graph.

use wn_graph::{GraphBuilder, GraphError, LinkEnd, NameIndex};

#[test]
fn build_looped_network() {
    // R -> A -> B -> C -> A
    let mut builder = GraphBuilder::new();
    let r = builder.add_node("R");
    let a = builder.add_node("A");
    let b = builder.add_node("B");
    let c = builder.add_node("C");
    builder.add_link("P0", r, a);
    let p1 = builder.add_link("P1", a, b);
    builder.add_link("P2", b, c);
    let p3 = builder.add_link("P3", c, a);
    let graph = builder.build().unwrap();

    assert_eq!(graph.nodes().len(), 4);
    assert_eq!(graph.links().len(), 4);

    let a_links = graph.node_links(a);
    assert_eq!(a_links.len(), 3);
    assert!(a_links.contains(&(p1, LinkEnd::Start)));
    assert!(a_links.contains(&(p3, LinkEnd::End)));

    assert!(graph.unreachable_from(&[r], |_| true).is_empty());
}

#[test]
fn parallel_links_are_kept() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_node("A");
    let b = builder.add_node("B");
    builder.add_link("P1", a, b);
    builder.add_link("P2", b, a);
    let graph = builder.build().unwrap();

    assert_eq!(graph.node_links(a).len(), 2);
    assert_eq!(graph.link_ends(), vec![(0, 1), (1, 0)]);
}

#[test]
fn duplicate_link_names_rejected() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_node("A");
    let b = builder.add_node("B");
    builder.add_link("P1", a, b);
    builder.add_link("P1", a, b);
    assert!(matches!(
        builder.build(),
        Err(GraphError::DuplicateName { what: "link", .. })
    ));
}

#[test]
fn name_index_lookup() {
    let mut builder = GraphBuilder::new();
    let a = builder.add_node("A");
    let b = builder.add_node("B");
    let p = builder.add_link("P1", a, b);
    let graph = builder.build().unwrap();
    let index = NameIndex::from_graph(&graph);

    assert_eq!(index.node("B").unwrap(), b);
    assert_eq!(index.link("P1").unwrap(), p);
    assert!(index.link("P2").is_err());
}
