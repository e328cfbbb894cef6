use std::collections::{BTreeMap, BTreeSet};

use super::bidirectional_path::{BidirectionalPath, PathEvent, PathId};
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};

/// For every edge, the paths currently running through it.
///
/// Subscribed paths journal their pushes and pops; [`GraphCoverageMap::sync`]
/// replays the journal so the map never holds a reference to a path.
#[derive(Debug, Clone, Default)]
pub struct GraphCoverageMap {
    coverage: BTreeMap<EdgeId, BTreeMap<PathId, usize>>,
}

impl GraphCoverageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every edge of `path` and start following its changes.
    pub fn subscribe(&mut self, path: &mut BidirectionalPath<'_>) {
        path.take_events();
        for e in path.edges() {
            self.added(e, path.id());
        }
        path.start_tracking();
    }

    /// Forget every edge of `path` as it is now.
    pub fn unsubscribe(&mut self, path: &BidirectionalPath<'_>) {
        for e in path.edges() {
            self.removed(e, path.id());
        }
    }

    /// Apply the changes journaled by `path` since the last sync.
    pub fn sync(&mut self, path: &mut BidirectionalPath<'_>) {
        let id = path.id();
        for event in path.take_events() {
            match event {
                PathEvent::Added(e) => self.added(e, id),
                PathEvent::Removed(e) => self.removed(e, id),
            }
        }
    }

    pub fn covering_paths(&self, e: EdgeId) -> Vec<PathId> {
        self.coverage
            .get(&e)
            .map(|paths| paths.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of distinct paths through `e`.
    pub fn coverage(&self, e: EdgeId) -> usize {
        self.coverage.get(&e).map_or(0, |paths| paths.len())
    }

    /// Whether every edge of `path` is already used by some path.
    pub fn is_covered(&self, path: &BidirectionalPath<'_>) -> bool {
        path.edges().all(|e| self.coverage(e) > 0)
    }

    fn added(&mut self, e: EdgeId, id: PathId) {
        *self.coverage.entry(e).or_default().entry(id).or_insert(0) += 1;
    }

    fn removed(&mut self, e: EdgeId, id: PathId) {
        if let Some(paths) = self.coverage.get_mut(&e) {
            if let Some(count) = paths.get_mut(&id) {
                *count -= 1;
                if *count == 0 {
                    paths.remove(&id);
                }
            }
            if paths.is_empty() {
                self.coverage.remove(&e);
            }
        }
    }
}

/// Unique edges already claimed by some path during one growth run.
///
/// An empty unique set disables the check.
#[derive(Debug, Clone, Default)]
pub struct UsedUniqueStorage {
    unique: BTreeSet<EdgeId>,
    used: BTreeSet<EdgeId>,
}

impl UsedUniqueStorage {
    pub fn new(unique: BTreeSet<EdgeId>) -> Self {
        Self {
            unique,
            used: BTreeSet::new(),
        }
    }

    /// Edges at least `min_length` long are treated as unique.
    pub fn from_length(graph: &AssemblyGraph, min_length: usize) -> Self {
        Self::new(graph.edges().filter(|&e| graph.length(e) >= min_length).collect())
    }

    pub fn is_unique(&self, e: EdgeId) -> bool {
        self.unique.contains(&e)
    }

    /// Claim `e` and its conjugate; non-unique edges are ignored.
    pub fn insert(&mut self, graph: &AssemblyGraph, e: EdgeId) {
        if self.is_unique(e) {
            self.used.insert(e);
            self.used.insert(graph.conjugate(e));
        }
    }

    pub fn is_used_and_unique(&self, e: EdgeId) -> bool {
        self.is_unique(e) && self.used.contains(&e)
    }

    pub fn unique_check_enabled(&self) -> bool {
        !self.unique.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    #[test]
    fn test_coverage_follows_journal() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGT", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "GTTA", 1.0).unwrap();

        let mut map = GraphCoverageMap::new();
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        path.set_id(4);
        map.subscribe(&mut path);
        assert_eq!(map.covering_paths(a), vec![4]);
        assert!(!map.is_covered(&BidirectionalPath::from_edges(&graph, &[a, b])));

        path.push_back(b);
        map.sync(&mut path);
        assert!(map.is_covered(&BidirectionalPath::from_edges(&graph, &[a, b])));

        path.pop_back();
        map.sync(&mut path);
        assert_eq!(map.coverage(b), 0);
        map.unsubscribe(&path);
        assert!(map.covering_paths(a).is_empty());
    }

    #[test]
    fn test_used_unique_claims_both_strands() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Symmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let long = graph.add_edge(v[0], v[1], "ACGTACGTAC", 1.0).unwrap();
        let short = graph.add_edge(v[1], v[2], "ACTT", 1.0).unwrap();

        let mut storage = UsedUniqueStorage::from_length(&graph, 5);
        assert!(storage.unique_check_enabled());
        storage.insert(&graph, short);
        assert!(!storage.is_used_and_unique(short));
        storage.insert(&graph, long);
        assert!(storage.is_used_and_unique(long));
        assert!(storage.is_used_and_unique(graph.conjugate(long)));
        assert!(!UsedUniqueStorage::default().unique_check_enabled());
    }
}
