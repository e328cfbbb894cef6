use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::core::assembly_graph::{AssemblyGraph, VertexId};

/// Returned for vertex pairs farther apart than the search depth.
pub const UNREACHABLE: usize = 1_000_000_000;

/// Memoized bounded Dijkstra over edge lengths.
///
/// The first query from a start vertex explores everything within `depth`
/// and caches the whole distance table; later queries from the same start
/// are lookups.
#[derive(Debug, Clone)]
pub struct FastDistanceCounter {
    depth: usize,
    distances: AHashMap<VertexId, AHashMap<VertexId, usize>>,
}

impl FastDistanceCounter {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            distances: AHashMap::new(),
        }
    }

    pub fn distance(&mut self, graph: &AssemblyGraph, start: VertexId, end: VertexId) -> usize {
        let depth = self.depth;
        let table = self
            .distances
            .entry(start)
            .or_insert_with(|| bounded_dijkstra(graph, start, depth));
        table.get(&end).copied().unwrap_or(UNREACHABLE)
    }

    pub fn cached_starts(&self) -> usize {
        self.distances.len()
    }
}

fn bounded_dijkstra(graph: &AssemblyGraph, start: VertexId, depth: usize) -> AHashMap<VertexId, usize> {
    let mut settled: AHashMap<VertexId, usize> = AHashMap::new();
    let mut heap = BinaryHeap::new();
    heap.push(Reverse((0usize, start)));

    while let Some(Reverse((dist, v))) = heap.pop() {
        if settled.contains_key(&v) {
            continue;
        }
        settled.insert(v, dist);
        for &e in graph.outgoing_edges(v) {
            let next = graph.edge_end(e);
            let candidate = dist + graph.length(e);
            if candidate <= depth && !settled.contains_key(&next) {
                heap.push(Reverse((candidate, next)));
            }
        }
    }
    settled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    #[test]
    fn test_bounded_shortest_paths() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        graph.add_edge(v[0], v[1], "ACGTA", 1.0).unwrap(); // 3
        graph.add_edge(v[1], v[2], "TACGTAC", 1.0).unwrap(); // 5
        graph.add_edge(v[0], v[2], "ACGTACGTACG", 1.0).unwrap(); // 9
        graph.add_edge(v[2], v[3], "ACGTACGTACGTAC", 1.0).unwrap(); // 12

        let mut counter = FastDistanceCounter::new(10);
        assert_eq!(counter.distance(&graph, v[0], v[0]), 0);
        assert_eq!(counter.distance(&graph, v[0], v[2]), 8);
        assert_eq!(counter.distance(&graph, v[0], v[3]), UNREACHABLE);
        assert_eq!(counter.distance(&graph, v[2], v[0]), UNREACHABLE);
        assert_eq!(counter.cached_starts(), 2);
    }
}
