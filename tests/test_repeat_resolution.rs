//! Repeat resolution on small hand-built graphs
//! Paired information either tells the entrances of a repeat vertex apart or it does not

use std::collections::BTreeSet;

use path_forge::assembly::{RepeatResolver, ResolverSettings};
use path_forge::paired_info::Point;
use path_forge::{AssemblyGraph, Conjugation, EdgeId, LibraryStats, PairedInfoIndex, VertexId};

fn library() -> LibraryStats {
    LibraryStats {
        read_length: 50,
        insert_size: 150,
        insert_size_deviation: 10.0,
        avg_coverage: 20.0,
    }
}

fn settings() -> ResolverSettings {
    ResolverSettings {
        symmetric_resolve: false,
        ..ResolverSettings::default()
    }
}

fn random_sequence(rng: &mut fastrand::Rng, len: usize) -> String {
    (0..len).map(|_| ['A', 'C', 'G', 'T'][rng.usize(..4)]).collect()
}

struct Cross {
    graph: AssemblyGraph,
    center: VertexId,
    a1: EdgeId,
    a2: EdgeId,
    b1: EdgeId,
    b2: EdgeId,
}

/// Two entrances and two exits through one vertex, k = 5.
fn cross() -> Cross {
    let k = 5;
    let mut rng = fastrand::Rng::with_seed(7);
    let mut graph = AssemblyGraph::new(k, Conjugation::Asymmetric);
    let s1 = graph.add_vertex();
    let s2 = graph.add_vertex();
    let center = graph.add_vertex();
    let t1 = graph.add_vertex();
    let t2 = graph.add_vertex();
    let a1 = graph.add_edge(s1, center, &random_sequence(&mut rng, 50 + k), 20.0).unwrap();
    let a2 = graph.add_edge(s2, center, &random_sequence(&mut rng, 60 + k), 20.0).unwrap();
    let b1 = graph.add_edge(center, t1, &random_sequence(&mut rng, 50 + k), 20.0).unwrap();
    let b2 = graph.add_edge(center, t2, &random_sequence(&mut rng, 60 + k), 20.0).unwrap();
    Cross {
        graph,
        center,
        a1,
        a2,
        b1,
        b2,
    }
}

fn self_point(index: &mut PairedInfoIndex, e: EdgeId) {
    index.add_point(e, e, Point::new(0.0, 1.0, 0.0), true).unwrap();
}

#[test]
fn test_cross_splits_into_two_copies() {
    let Cross {
        graph,
        center,
        a1,
        a2,
        b1,
        b2,
    } = cross();
    let mut index = PairedInfoIndex::new();
    for e in [a1, a2, b1, b2] {
        self_point(&mut index, e);
    }
    index.add_point(a1, b1, Point::new(50.0, 5.0, 0.0), true).unwrap();
    index.add_point(a2, b2, Point::new(60.0, 5.0, 0.0), true).unwrap();

    let mut resolver = RepeatResolver::new(&graph, &index, library(), settings()).unwrap();
    resolver.resolve_repeats().unwrap();
    let resolved = resolver.into_resolved();

    assert_eq!(resolved.context.splits, 1);
    assert_eq!(resolved.graph.edge_count(), 4);
    assert_eq!(resolved.graph.vertex_count(), 6);

    let copies: Vec<VertexId> = resolved
        .graph
        .vertices()
        .filter(|v| resolved.vertex_labels.get(v) == Some(&center))
        .collect();
    assert_eq!(copies.len(), 2);

    let mut joined = BTreeSet::new();
    for v in copies {
        let incoming = resolved.graph.incoming_edges(v);
        let outgoing = resolved.graph.outgoing_edges(v);
        assert_eq!(incoming.len(), 1);
        assert_eq!(outgoing.len(), 1);
        joined.insert((resolved.edge_labels[&incoming[0]], resolved.edge_labels[&outgoing[0]]));
        assert_eq!(resolved.graph.coverage(incoming[0]), 20.0);
    }
    assert_eq!(joined, BTreeSet::from([(a1, b1), (a2, b2)]));
}

#[test]
fn test_unpaired_exit_blocks_split() {
    let Cross {
        graph, a1, a2, b1, b2, ..
    } = cross();
    let mut index = PairedInfoIndex::new();
    for e in [a1, a2, b1] {
        self_point(&mut index, e);
    }
    index.add_point(a1, b1, Point::new(50.0, 5.0, 0.0), true).unwrap();

    let mut resolver = RepeatResolver::new(&graph, &index, library(), settings()).unwrap();
    assert_eq!(resolver.context().cheater_length, graph.length(b2));
    resolver.resolve_repeats().unwrap();
    let resolved = resolver.into_resolved();

    assert_eq!(resolved.context.splits, 0);
    assert_eq!(resolved.graph.edge_count(), 4);
    assert_eq!(resolved.graph.vertex_count(), 5);
}

#[test]
fn test_consistent_chain_is_left_whole() {
    let k = 5;
    let mut rng = fastrand::Rng::with_seed(11);
    let mut graph = AssemblyGraph::new(k, Conjugation::Asymmetric);
    let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
    let a = graph.add_edge(v[0], v[1], &random_sequence(&mut rng, 50 + k), 20.0).unwrap();
    let b = graph.add_edge(v[1], v[2], &random_sequence(&mut rng, 50 + k), 20.0).unwrap();

    let mut index = PairedInfoIndex::new();
    self_point(&mut index, a);
    self_point(&mut index, b);
    index.add_point(a, b, Point::new(50.0, 3.0, 0.0), true).unwrap();

    let mut resolver = RepeatResolver::new(&graph, &index, library(), settings()).unwrap();
    resolver.resolve_repeats().unwrap();
    let resolved = resolver.into_resolved();
    assert_eq!(resolved.context.splits, 0);
    assert_eq!(resolved.graph.edge_count(), 2);
    assert_eq!(resolved.graph.vertex_count(), 3);
}

#[test]
fn test_symmetric_graph_without_paired_info_is_copied() {
    let mut graph = AssemblyGraph::new(3, Conjugation::Symmetric);
    let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
    graph.add_edge(v[0], v[1], "ACGTTGCAAG", 5.0).unwrap();
    graph.add_edge(v[1], v[2], "AAGCTTCGA", 5.0).unwrap();

    let mut resolver =
        RepeatResolver::new(&graph, &PairedInfoIndex::new(), library(), ResolverSettings::default()).unwrap();
    assert!(resolver.is_symmetric());
    resolver.resolve_repeats().unwrap();
    let resolved = resolver.into_resolved();
    assert_eq!(resolved.context.splits, 0);
    assert_eq!(resolved.graph.edge_count(), graph.edge_count());
    for e in resolved.graph.edges() {
        let twin = resolved.graph.conjugate(e);
        assert_eq!(resolved.edge_labels[&twin], graph.conjugate(resolved.edge_labels[&e]));
    }
}
