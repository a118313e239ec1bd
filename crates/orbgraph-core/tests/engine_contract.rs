//! # Engine Contract Tests
//!
//! One suite, run against every engine. Both engines must be
//! indistinguishable through the service layer.

use orbgraph_core::{
    AttrValue, Backend, Edge, EdgeFilter, EdgeUpdate, ErrorCode, Graph, GraphFilter, GraphUpdate,
    Node, NodeFilter, NodeUpdate, Services, attrs,
};
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

fn open(dsn: &str) -> Services<Backend> {
    Services::new(Arc::new(Backend::open(dsn).expect("open store")))
}

fn graph(s: &Services<Backend>) -> String {
    let mut g = Graph::new();
    s.graphs.create_graph(&mut g).expect("create graph");
    g.uid
}

fn node(s: &Services<Backend>, g: &str, uid: &str, label: &str) -> Node {
    let mut n = Node::new().with_uid(uid).with_label(label);
    s.nodes.create_node(g, &mut n).expect("create node");
    n
}

fn edge(s: &Services<Backend>, g: &str, source: &str, target: &str) -> Edge {
    let mut e = Edge::new(source, target);
    s.edges.create_edge(g, &mut e).expect("create edge");
    e
}

fn edge_uids(s: &Services<Backend>, g: &str, filter: EdgeFilter) -> Vec<String> {
    s.edges
        .find_edges(g, &filter)
        .expect("find edges")
        .items
        .into_iter()
        .map(|e| e.uid)
        .collect()
}

fn node_uids(s: &Services<Backend>, g: &str, filter: NodeFilter) -> Vec<String> {
    s.nodes
        .find_nodes(g, &filter)
        .expect("find nodes")
        .items
        .into_iter()
        .map(|n| n.uid)
        .collect()
}

// =============================================================================
// SUITE
// =============================================================================

macro_rules! contract_suite {
    ($engine:ident, $dsn:expr) => {
        mod $engine {
            use super::*;

            fn store() -> Services<Backend> {
                open($dsn)
            }

            // -----------------------------------------------------------------
            // Scenarios
            // -----------------------------------------------------------------

            #[test]
            fn generated_graph_uid_and_labelled_edge_lookup() {
                let s = store();
                let g = graph(&s);
                assert!(!g.is_empty());

                node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                let mut e = Edge::new("a", "b").with_label("L");
                s.edges.create_edge(&g, &mut e).expect("edge");

                let found = edge_uids(
                    &s,
                    &g,
                    EdgeFilter {
                        label: Some("L".into()),
                        ..EdgeFilter::default()
                    },
                );
                assert_eq!(found, vec![e.uid]);
            }

            #[test]
            fn duplicate_graph_uid_conflicts() {
                let s = store();
                s.graphs
                    .create_graph(&mut Graph::new().with_uid("dup"))
                    .expect("first");
                let err = s
                    .graphs
                    .create_graph(&mut Graph::new().with_uid("dup"))
                    .expect_err("second");
                assert_eq!(err.code(), ErrorCode::Conflict);
            }

            #[test]
            fn label_filter_with_offset_and_limit() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "r1", "Repo");
                node(&s, &g, "u1", "User");
                node(&s, &g, "r2", "Repo");

                let page = s
                    .nodes
                    .find_nodes(
                        &g,
                        &NodeFilter {
                            label: Some("Repo".into()),
                            offset: 1,
                            limit: 1,
                            ..NodeFilter::default()
                        },
                    )
                    .expect("find");
                assert_eq!(page.len(), 1);
                assert_eq!(page.total, 2);
                assert_eq!(page.items[0].uid, "r2");
            }

            #[test]
            fn node_attribute_update_merges() {
                let s = store();
                let g = graph(&s);
                let mut n = Node::new().with_attrs(attrs([
                    ("foo", AttrValue::from("bar")),
                    ("num", AttrValue::Int(5)),
                ]));
                s.nodes.create_node(&g, &mut n).expect("node");

                let update = NodeUpdate {
                    label: None,
                    attrs: Some(attrs([("foo", AttrValue::from("baz"))])),
                };
                let updated = s.nodes.update_node(&g, n.id, &update).expect("update");
                let expected = attrs([("foo", AttrValue::from("baz")), ("num", AttrValue::Int(5))]);
                assert_eq!(updated.attrs, expected);
                let reread = s.nodes.find_node_by_id(&g, n.id).expect("find");
                assert_eq!(reread.attrs, expected);
            }

            // -----------------------------------------------------------------
            // Properties
            // -----------------------------------------------------------------

            #[test]
            fn attributes_round_trip() {
                let s = store();
                let nested = attrs([
                    ("list", AttrValue::List(vec![AttrValue::Int(1), AttrValue::from("x")])),
                    ("flag", AttrValue::Bool(false)),
                ]);
                let a = attrs([
                    ("int", AttrValue::Int(-7)),
                    ("float", AttrValue::Float(0.25)),
                    ("text", AttrValue::from("hello")),
                    ("none", AttrValue::Null),
                    ("nested", AttrValue::Map(nested)),
                ]);

                let mut g = Graph::new().with_attrs(a.clone());
                s.graphs.create_graph(&mut g).expect("graph");
                assert_eq!(s.graphs.find_graph_by_uid(&g.uid).expect("find").attrs, a);

                let mut n1 = Node::new().with_uid("n1").with_attrs(a.clone());
                s.nodes.create_node(&g.uid, &mut n1).expect("node");
                node(&s, &g.uid, "n2", "");
                assert_eq!(s.nodes.find_node_by_uid(&g.uid, "n1").expect("find").attrs, a);

                let mut e = Edge::new("n1", "n2").with_attrs(a.clone());
                s.edges.create_edge(&g.uid, &mut e).expect("edge");
                assert_eq!(s.edges.find_edge_by_uid(&g.uid, &e.uid).expect("find").attrs, a);
            }

            #[test]
            fn deleting_a_missing_graph_succeeds() {
                let s = store();
                s.graphs.delete_graph("never-created").expect("idempotent");
                let g = graph(&s);
                s.graphs.delete_graph(&g).expect("first");
                s.graphs.delete_graph(&g).expect("second");
            }

            #[test]
            fn self_loops_are_invalid() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                for uid in ["a", "", "missing"] {
                    let err = s
                        .edges
                        .create_edge(&g, &mut Edge::new(uid, uid))
                        .expect_err("self-loop");
                    assert_eq!(err.code(), ErrorCode::Invalid, "uid {uid:?}");
                }
            }

            #[test]
            fn one_edge_per_ordered_pair() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                let first = edge(&s, &g, "a", "b");

                let mut second = Edge::new("a", "b").with_weight(9.0).with_label("other");
                s.edges.create_edge(&g, &mut second).expect("no-op");
                assert_eq!(second.uid, first.uid);
                assert_eq!(second.weight, first.weight);
                assert_eq!(second.label, "");

                let between = EdgeFilter {
                    source: Some("a".into()),
                    target: Some("b".into()),
                    ..EdgeFilter::default()
                };
                assert_eq!(edge_uids(&s, &g, between), vec![first.uid]);

                // The reverse direction is a different pair.
                edge(&s, &g, "b", "a");
                assert_eq!(s.graphs.find_graph_by_uid(&g).expect("graph").edges, 2);
            }

            #[test]
            fn deleting_a_node_removes_its_edges() {
                let s = store();
                let g = graph(&s);
                let hub = node(&s, &g, "hub", "");
                for uid in ["x", "y"] {
                    node(&s, &g, uid, "");
                }
                edge(&s, &g, "hub", "x");
                edge(&s, &g, "y", "hub");
                let kept = edge(&s, &g, "x", "y");

                s.nodes.delete_node_by_id(&g, hub.id).expect("delete");

                assert_eq!(edge_uids(&s, &g, EdgeFilter::default()), vec![kept.uid]);
                for filter in [
                    EdgeFilter {
                        source: Some("hub".into()),
                        ..EdgeFilter::default()
                    },
                    EdgeFilter {
                        target: Some("hub".into()),
                        ..EdgeFilter::default()
                    },
                ] {
                    assert!(edge_uids(&s, &g, filter).is_empty());
                }
                let x = s.nodes.find_node_by_uid(&g, "x").expect("x");
                assert_eq!((x.deg_out, x.deg_in), (1, 0));
            }

            #[test]
            fn pagination_length_and_total() {
                let s = store();
                let g = graph(&s);
                for i in 0..5 {
                    node(&s, &g, &format!("n{i}"), "");
                }
                let cases = [
                    (0, 0, 5),
                    (2, 0, 3),
                    (0, 2, 2),
                    (4, 3, 1),
                    (5, 1, 0),
                    (9, 0, 0),
                    (-3, -1, 5),
                ];
                for (offset, limit, expected) in cases {
                    let page = s
                        .nodes
                        .find_nodes(
                            &g,
                            &NodeFilter {
                                offset,
                                limit,
                                ..NodeFilter::default()
                            },
                        )
                        .expect("find");
                    assert_eq!(page.len(), expected, "offset {offset} limit {limit}");
                    assert_eq!(page.total, 5, "offset {offset} limit {limit}");
                }
            }

            // -----------------------------------------------------------------
            // Filters
            // -----------------------------------------------------------------

            #[test]
            fn node_filter_precedence_and_adjacency() {
                let s = store();
                let g = graph(&s);
                let a = node(&s, &g, "a", "Repo");
                node(&s, &g, "b", "User");
                node(&s, &g, "c", "Repo");
                edge(&s, &g, "b", "a");
                edge(&s, &g, "b", "c");
                edge(&s, &g, "a", "c");

                // `id` wins over every other selector.
                let by_id = NodeFilter {
                    id: Some(a.id),
                    uid: Some("b".into()),
                    to: Some("c".into()),
                    ..NodeFilter::default()
                };
                assert_eq!(node_uids(&s, &g, by_id), vec!["a"]);

                // `to` wins over `from`.
                let into_c = NodeFilter {
                    to: Some("c".into()),
                    from: Some("a".into()),
                    ..NodeFilter::default()
                };
                assert_eq!(node_uids(&s, &g, into_c), vec!["a", "b"]);

                let from_b_repos = NodeFilter {
                    from: Some("b".into()),
                    label: Some("Repo".into()),
                    ..NodeFilter::default()
                };
                assert_eq!(node_uids(&s, &g, from_b_repos), vec!["a", "c"]);

                let unknown = NodeFilter {
                    to: Some("nobody".into()),
                    ..NodeFilter::default()
                };
                assert!(node_uids(&s, &g, unknown).is_empty());
            }

            #[test]
            fn single_result_filters_still_paginate() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                let page = s
                    .nodes
                    .find_nodes(
                        &g,
                        &NodeFilter {
                            uid: Some("a".into()),
                            offset: 1,
                            ..NodeFilter::default()
                        },
                    )
                    .expect("find");
                assert!(page.is_empty());
                assert_eq!(page.total, 1);
            }

            #[test]
            fn edge_filters_by_direction_and_label() {
                let s = store();
                let g = graph(&s);
                for uid in ["a", "b", "c"] {
                    node(&s, &g, uid, "");
                }
                let ab = edge(&s, &g, "a", "b");
                let mut ac = Edge::new("a", "c").with_label("fork");
                s.edges.create_edge(&g, &mut ac).expect("edge");
                let bc = edge(&s, &g, "b", "c");

                let out_a = EdgeFilter {
                    source: Some("a".into()),
                    ..EdgeFilter::default()
                };
                assert_eq!(edge_uids(&s, &g, out_a), vec![ab.uid.clone(), ac.uid.clone()]);

                let into_c = EdgeFilter {
                    target: Some("c".into()),
                    ..EdgeFilter::default()
                };
                assert_eq!(edge_uids(&s, &g, into_c), vec![ac.uid.clone(), bc.uid.clone()]);

                let forks_into_c = EdgeFilter {
                    target: Some("c".into()),
                    label: Some("fork".into()),
                    ..EdgeFilter::default()
                };
                assert_eq!(edge_uids(&s, &g, forks_into_c), vec![ac.uid]);

                let all = EdgeFilter::default();
                assert_eq!(edge_uids(&s, &g, all).len(), 3);
            }

            #[test]
            fn graph_filters() {
                let s = store();
                for (uid, label) in [("g1", "x"), ("g2", "y"), ("g3", "x")] {
                    s.graphs
                        .create_graph(&mut Graph::new().with_uid(uid).with_label(label))
                        .expect("graph");
                }
                let xs = s
                    .graphs
                    .find_graphs(&GraphFilter {
                        label: Some("x".into()),
                        ..GraphFilter::default()
                    })
                    .expect("find");
                let uids: Vec<_> = xs.items.iter().map(|g| g.uid.as_str()).collect();
                assert_eq!(uids, vec!["g1", "g3"]);

                let foreign = s
                    .graphs
                    .find_graphs(&GraphFilter {
                        graph_type: Some("undirected".into()),
                        ..GraphFilter::default()
                    })
                    .expect("find");
                assert_eq!(foreign.total, 0);
            }

            // -----------------------------------------------------------------
            // Errors and updates
            // -----------------------------------------------------------------

            #[test]
            fn unsupported_graph_type() {
                let s = store();
                let err = s
                    .graphs
                    .create_graph(&mut Graph::new().with_type("undirected"))
                    .expect_err("type");
                assert_eq!(err.code(), ErrorCode::Unsupported);
            }

            #[test]
            fn missing_entities_are_not_found() {
                let s = store();
                let err = s
                    .nodes
                    .create_node("ghost", &mut Node::new())
                    .expect_err("no graph");
                assert_eq!(err.code(), ErrorCode::NotFound);

                let g = graph(&s);
                node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                let checks = [
                    s.graphs.find_graph_by_uid("ghost").map(drop),
                    s.graphs.update_graph("ghost", &GraphUpdate::default()).map(drop),
                    s.nodes.find_node_by_id(&g, 999).map(drop),
                    s.nodes.find_node_by_uid(&g, "ghost").map(drop),
                    s.nodes.update_node(&g, 999, &NodeUpdate::default()).map(drop),
                    s.nodes.delete_node_by_id(&g, 999),
                    s.nodes.delete_node_by_uid(&g, "ghost"),
                    s.edges.create_edge(&g, &mut Edge::new("a", "ghost")).map(drop),
                    s.edges.find_edge_by_uid(&g, "ghost").map(drop),
                    s.edges
                        .update_edge_between(&g, "a", "b", &EdgeUpdate::default())
                        .map(drop),
                    s.edges.delete_edge(&g, "ghost"),
                    s.edges.delete_edge_between(&g, "a", "b"),
                    s.nodes.find_nodes("ghost", &NodeFilter::default()).map(drop),
                ];
                for (i, result) in checks.into_iter().enumerate() {
                    let err = result.expect_err("missing");
                    assert_eq!(err.code(), ErrorCode::NotFound, "check {i}");
                }
            }

            #[test]
            fn node_uids_are_unique() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                let err = s
                    .nodes
                    .create_node(&g, &mut Node::new().with_uid("a"))
                    .expect_err("duplicate");
                assert_eq!(err.code(), ErrorCode::Conflict);
            }

            #[test]
            fn node_ids_and_counts() {
                let s = store();
                let g = graph(&s);
                let a = node(&s, &g, "a", "");
                let b = node(&s, &g, "b", "");
                assert!(a.id > 0);
                assert!(b.id > a.id);
                assert!(a.created_at.is_some());
                edge(&s, &g, "a", "b");

                let summary = s.graphs.find_graph_by_uid(&g).expect("graph");
                assert_eq!((summary.nodes, summary.edges), (2, 1));
                assert_eq!(summary.graph_type, "weighted_directed");
            }

            #[test]
            fn updates_change_only_given_fields() {
                let s = store();
                let mut g = Graph::new()
                    .with_label("before")
                    .with_attrs(attrs([("k", AttrValue::Int(1))]));
                s.graphs.create_graph(&mut g).expect("graph");
                let updated = s
                    .graphs
                    .update_graph(
                        &g.uid,
                        &GraphUpdate {
                            label: Some("after".into()),
                            attrs: None,
                        },
                    )
                    .expect("update");
                assert_eq!(updated.label, "after");
                assert_eq!(updated.attrs, attrs([("k", AttrValue::Int(1))]));

                node(&s, &g.uid, "a", "");
                node(&s, &g.uid, "b", "");
                let mut e = Edge::new("a", "b").with_label("keep");
                s.edges.create_edge(&g.uid, &mut e).expect("edge");
                let e = s
                    .edges
                    .update_edge_between(
                        &g.uid,
                        "a",
                        "b",
                        &EdgeUpdate {
                            weight: Some(3.5),
                            label: None,
                            attrs: Some(attrs([("since", AttrValue::Int(2024))])),
                        },
                    )
                    .expect("update edge");
                assert_eq!(e.weight, 3.5);
                assert_eq!(e.label, "keep");
                assert_eq!(e.attrs["since"], AttrValue::Int(2024));
            }

            #[test]
            fn deleting_edges_by_uid_and_pair() {
                let s = store();
                let g = graph(&s);
                for uid in ["a", "b", "c"] {
                    node(&s, &g, uid, "");
                }
                let ab = edge(&s, &g, "a", "b");
                edge(&s, &g, "b", "c");

                s.edges.delete_edge(&g, &ab.uid).expect("by uid");
                s.edges.delete_edge_between(&g, "b", "c").expect("by pair");
                assert!(edge_uids(&s, &g, EdgeFilter::default()).is_empty());
                assert_eq!(s.nodes.find_node_by_uid(&g, "b").expect("b").deg_in, 0);
            }

            #[test]
            fn deleting_a_graph_removes_its_contents() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                edge(&s, &g, "a", "b");
                s.graphs.delete_graph(&g).expect("delete");

                let err = s.graphs.find_graph_by_uid(&g).expect_err("gone");
                assert_eq!(err.code(), ErrorCode::NotFound);

                // Node UIDs are free again.
                let g2 = graph(&s);
                node(&s, &g2, "a", "");
            }

            #[test]
            fn non_finite_weights_are_invalid() {
                let s = store();
                let g = graph(&s);
                node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                for weight in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                    let err = s
                        .edges
                        .create_edge(&g, &mut Edge::new("a", "b").with_weight(weight))
                        .expect_err("non-finite weight");
                    assert_eq!(err.code(), ErrorCode::Invalid, "weight {weight}");
                }
                assert!(edge_uids(&s, &g, EdgeFilter::default()).is_empty());

                let e = edge(&s, &g, "a", "b");
                let err = s
                    .edges
                    .update_edge_between(
                        &g,
                        "a",
                        "b",
                        &EdgeUpdate {
                            weight: Some(f64::NAN),
                            label: Some("changed".into()),
                            attrs: None,
                        },
                    )
                    .expect_err("non-finite weight");
                assert_eq!(err.code(), ErrorCode::Invalid);
                let stored = s.edges.find_edge_by_uid(&g, &e.uid).expect("edge");
                assert_eq!((stored.weight, stored.label), (e.weight, e.label));
            }

            #[test]
            fn non_finite_attribute_floats_are_invalid() {
                let bad = || attrs([("x", AttrValue::Float(f64::INFINITY))]);
                let nested = || {
                    attrs([(
                        "xs",
                        AttrValue::List(vec![AttrValue::Int(1), AttrValue::Float(f64::NAN)]),
                    )])
                };
                let s = store();

                let err = s
                    .graphs
                    .create_graph(&mut Graph::new().with_attrs(bad()))
                    .expect_err("graph attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);
                let g = graph(&s);
                let err = s
                    .graphs
                    .update_graph(
                        &g,
                        &GraphUpdate {
                            label: None,
                            attrs: Some(nested()),
                        },
                    )
                    .expect_err("graph update attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);

                let err = s
                    .nodes
                    .create_node(&g, &mut Node::new().with_uid("c").with_attrs(nested()))
                    .expect_err("node attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);
                let a = node(&s, &g, "a", "");
                node(&s, &g, "b", "");
                let err = s
                    .nodes
                    .update_node(
                        &g,
                        a.id,
                        &NodeUpdate {
                            label: None,
                            attrs: Some(bad()),
                        },
                    )
                    .expect_err("node update attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);

                let err = s
                    .edges
                    .create_edge(&g, &mut Edge::new("a", "b").with_attrs(bad()))
                    .expect_err("edge attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);
                edge(&s, &g, "a", "b");
                let err = s
                    .edges
                    .update_edge_between(
                        &g,
                        "a",
                        "b",
                        &EdgeUpdate {
                            weight: None,
                            label: None,
                            attrs: Some(nested()),
                        },
                    )
                    .expect_err("edge update attrs");
                assert_eq!(err.code(), ErrorCode::Invalid);

                // Nothing rejected was stored.
                assert_eq!(node_uids(&s, &g, NodeFilter::default()), vec!["a", "b"]);
                assert!(s.graphs.find_graph_by_uid(&g).expect("graph").attrs.is_empty());
                assert!(s.nodes.find_node_by_uid(&g, "a").expect("a").attrs.is_empty());
            }

            #[test]
            fn concurrent_writers_and_readers() {
                const THREADS: usize = 8;
                const PER_THREAD: usize = 25;

                let s = store();
                let g = graph(&s);
                std::thread::scope(|scope| {
                    for t in 0..THREADS {
                        let (s, g) = (&s, &g);
                        scope.spawn(move || {
                            for i in 0..PER_THREAD {
                                node(s, g, &format!("t{t}-n{i}"), "Worker");
                                let page = s
                                    .nodes
                                    .find_nodes(
                                        g,
                                        &NodeFilter {
                                            label: Some("Worker".into()),
                                            limit: 5,
                                            ..NodeFilter::default()
                                        },
                                    )
                                    .expect("read while writing");
                                assert!(page.items.len() <= 5);
                                assert!(page.total > i);
                            }
                        });
                    }
                });

                let page = s
                    .nodes
                    .find_nodes(&g, &NodeFilter::default())
                    .expect("find nodes");
                assert_eq!(page.total, THREADS * PER_THREAD);
                let ids: BTreeSet<i64> = page.items.iter().map(|n| n.id).collect();
                let uids: BTreeSet<&str> = page.items.iter().map(|n| n.uid.as_str()).collect();
                assert_eq!(ids.len(), THREADS * PER_THREAD);
                assert_eq!(uids.len(), THREADS * PER_THREAD);
                assert_eq!(
                    s.graphs.find_graph_by_uid(&g).expect("graph").nodes,
                    THREADS * PER_THREAD
                );
            }

            #[test]
            fn returned_values_do_not_alias_storage() {
                let s = store();
                let g = graph(&s);
                let mut n = node(&s, &g, "a", "");
                n.label = "changed".into();
                n.attrs.insert("k".into(), AttrValue::Bool(true));
                let stored = s.nodes.find_node_by_uid(&g, "a").expect("find");
                assert_eq!(stored.label, "");
                assert!(stored.attrs.is_empty());
            }
        }
    };
}

contract_suite!(memory, ":memory:");
contract_suite!(sqlite, "sqlite://:memory:");

#[test]
fn sqlite_on_disk_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dsn = format!("sqlite://{}", dir.path().join("db/graphs.db").display());

    let g = {
        let s = open(&dsn);
        let g = graph(&s);
        node(&s, &g, "a", "Repo");
        g
    };

    let s = open(&dsn);
    let a = s.nodes.find_node_by_uid(&g, "a").expect("persisted");
    assert_eq!(a.label, "Repo");
}
