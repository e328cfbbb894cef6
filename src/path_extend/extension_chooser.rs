//! Extension choice
//!
//! Given a path and a set of candidate next edges, a chooser keeps the ones
//! supported by paired information. Choosers backed by a [`WeightCounter`]
//! also let the extenders investigate short loops by weight.

use std::cmp::Ordering;
use tracing::trace;

use super::bidirectional_path::BidirectionalPath;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::core::math;
use crate::core::paired_reads::LibraryStats;
use crate::paired_info::PairedInfoIndex;

/// A candidate next edge and its gap from the current path end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeWithDistance {
    pub edge: EdgeId,
    pub distance: i64,
}

impl EdgeWithDistance {
    pub fn new(edge: EdgeId, distance: i64) -> Self {
        Self { edge, distance }
    }
}

/// Paired-information support for appending `e` to a path after `gap`.
pub trait WeightCounter {
    fn count_weight(&self, path: &BidirectionalPath<'_>, e: EdgeId, gap: i64) -> f64;

    fn library(&self) -> &LibraryStats;
}

pub trait ExtensionChooser {
    fn filter(&self, path: &BidirectionalPath<'_>, candidates: &[EdgeWithDistance]) -> Vec<EdgeWithDistance>;

    fn weight_counter(&self) -> Option<&dyn WeightCounter> {
        None
    }

    fn weight_counter_based(&self) -> bool {
        self.weight_counter().is_some()
    }
}

/// Sums the weight of observations linking each path edge to the candidate
/// at the distance the extended path would place it.
pub struct PairedInfoWeightCounter<'g> {
    index: &'g PairedInfoIndex,
    library: LibraryStats,
}

impl<'g> PairedInfoWeightCounter<'g> {
    pub fn new(index: &'g PairedInfoIndex, library: LibraryStats) -> Self {
        Self { index, library }
    }
}

impl WeightCounter for PairedInfoWeightCounter<'_> {
    fn count_weight(&self, path: &BidirectionalPath<'_>, e: EdgeId, gap: i64) -> f64 {
        let is_max = self.library.is_max() as f64;
        let tolerance = self.library.insert_size_deviation;
        let lengths = path.suffix_lengths();
        let mut weight = 0.0;
        for (i, &suffix) in lengths.iter().enumerate() {
            let distance = suffix as f64 + gap as f64;
            if distance > is_max {
                continue;
            }
            for point in self.index.edge_pair_info(path.at(i), e) {
                if (point.d - distance).abs() <= point.var + tolerance {
                    weight += point.weight;
                }
            }
        }
        trace!("Weight of {} after path {}: {:.3}", e, path.id(), weight);
        weight
    }

    fn library(&self) -> &LibraryStats {
        &self.library
    }
}

/// Accepts a candidate only when it is the only one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialExtensionChooser;

impl ExtensionChooser for TrivialExtensionChooser {
    fn filter(&self, _path: &BidirectionalPath<'_>, candidates: &[EdgeWithDistance]) -> Vec<EdgeWithDistance> {
        if candidates.len() == 1 {
            candidates.to_vec()
        } else {
            Vec::new()
        }
    }
}

/// Keep candidates with enough weight; among several, a clear winner
/// (`prior_coefficient` times heavier than the runner-up) is kept alone.
fn pick_by_weight(
    mut weighted: Vec<(EdgeWithDistance, f64)>,
    threshold: f64,
    prior_coefficient: f64,
) -> Vec<EdgeWithDistance> {
    weighted.retain(|(_, w)| math::ge(*w, threshold));
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    if weighted.len() > 1 && math::gr(weighted[0].1, prior_coefficient * weighted[1].1) {
        weighted.truncate(1);
    }
    weighted.into_iter().map(|(c, _)| c).collect()
}

pub struct PairedInfoChooser<'g> {
    counter: PairedInfoWeightCounter<'g>,
    weight_threshold: f64,
    single_threshold: f64,
    prior_coefficient: f64,
}

impl<'g> PairedInfoChooser<'g> {
    pub const DEFAULT_PRIOR_COEFFICIENT: f64 = 1.5;

    pub fn new(
        index: &'g PairedInfoIndex,
        library: LibraryStats,
        weight_threshold: f64,
        single_threshold: f64,
    ) -> Self {
        Self {
            counter: PairedInfoWeightCounter::new(index, library),
            weight_threshold,
            single_threshold,
            prior_coefficient: Self::DEFAULT_PRIOR_COEFFICIENT,
        }
    }
}

impl ExtensionChooser for PairedInfoChooser<'_> {
    fn filter(&self, path: &BidirectionalPath<'_>, candidates: &[EdgeWithDistance]) -> Vec<EdgeWithDistance> {
        if path.is_empty() || candidates.is_empty() {
            return Vec::new();
        }
        let weighted: Vec<_> = candidates
            .iter()
            .map(|c| (*c, self.counter.count_weight(path, c.edge, c.distance)))
            .collect();
        let threshold = if candidates.len() == 1 {
            self.single_threshold
        } else {
            self.weight_threshold
        };
        pick_by_weight(weighted, threshold, self.prior_coefficient)
    }

    fn weight_counter(&self) -> Option<&dyn WeightCounter> {
        Some(&self.counter)
    }
}

/// Picks a far edge for scaffolding and estimates the gap to it from the
/// observations that land beyond the path end.
pub struct ScaffoldingChooser<'g> {
    graph: &'g AssemblyGraph,
    index: &'g PairedInfoIndex,
    library: LibraryStats,
    weight_threshold: f64,
    prior_coefficient: f64,
}

impl<'g> ScaffoldingChooser<'g> {
    pub fn new(
        graph: &'g AssemblyGraph,
        index: &'g PairedInfoIndex,
        library: LibraryStats,
        weight_threshold: f64,
    ) -> Self {
        Self {
            graph,
            index,
            library,
            weight_threshold,
            prior_coefficient: PairedInfoChooser::DEFAULT_PRIOR_COEFFICIENT,
        }
    }

    /// Total weight and weighted mean gap of `e` after `path`.
    fn estimate(&self, path: &BidirectionalPath<'_>, lengths: &[usize], e: EdgeId) -> (f64, f64) {
        let is_max = self.library.is_max() as f64;
        let mut weight = 0.0;
        let mut weighted_gap = 0.0;
        for (i, &suffix) in lengths.iter().enumerate() {
            for point in self.index.edge_pair_info(path.at(i), e) {
                let gap = point.d - suffix as f64;
                if gap < 0.0 || gap > is_max {
                    continue;
                }
                weight += point.weight;
                weighted_gap += point.weight * gap;
            }
        }
        if weight > 0.0 {
            (weight, weighted_gap / weight)
        } else {
            (0.0, 0.0)
        }
    }
}

impl ExtensionChooser for ScaffoldingChooser<'_> {
    fn filter(&self, path: &BidirectionalPath<'_>, candidates: &[EdgeWithDistance]) -> Vec<EdgeWithDistance> {
        if path.is_empty() {
            return Vec::new();
        }
        let lengths = path.suffix_lengths();
        let weighted: Vec<_> = candidates
            .iter()
            .filter(|c| self.graph.contains_edge(c.edge))
            .filter_map(|c| {
                let (weight, gap) = self.estimate(path, &lengths, c.edge);
                (weight > 0.0).then(|| (EdgeWithDistance::new(c.edge, gap.round() as i64), weight))
            })
            .collect();
        pick_by_weight(weighted, self.weight_threshold, self.prior_coefficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;
    use crate::paired_info::Point;

    fn library() -> LibraryStats {
        LibraryStats {
            read_length: 10,
            insert_size: 40,
            insert_size_deviation: 2.0,
            avg_coverage: 10.0,
        }
    }

    /// a: v0 -> v1 (len 10), then x and y leave v1 (len 10 each), and a
    /// disconnected source s (len 10).
    fn fork() -> (AssemblyGraph, [EdgeId; 4]) {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..6).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTACGTACGT", 1.0).unwrap();
        let x = graph.add_edge(v[1], v[2], "GTTTTTTTTTTT", 1.0).unwrap();
        let y = graph.add_edge(v[1], v[3], "GTAAAAAAAAAA", 1.0).unwrap();
        let s = graph.add_edge(v[4], v[5], "CCCCCCCCCCCC", 1.0).unwrap();
        (graph, [a, x, y, s])
    }

    #[test]
    fn test_paired_chooser_prefers_supported_branch() {
        let (graph, [a, x, y, _]) = fork();
        let mut index = PairedInfoIndex::new();
        index.add_point(a, x, Point::new(10.0, 5.0, 0.0), true).unwrap();
        index.add_point(a, y, Point::new(10.0, 1.0, 0.0), true).unwrap();

        let chooser = PairedInfoChooser::new(&index, library(), 0.5, 0.001);
        let path = BidirectionalPath::from_edges(&graph, &[a]);
        let candidates = [EdgeWithDistance::new(x, 0), EdgeWithDistance::new(y, 0)];
        assert_eq!(chooser.filter(&path, &candidates), vec![candidates[0]]);
        assert!(chooser.weight_counter_based());

        let counter = chooser.weight_counter().unwrap();
        assert_eq!(counter.count_weight(&path, x, 0), 5.0);
        assert_eq!(counter.count_weight(&path, x, 20), 0.0);
    }

    #[test]
    fn test_paired_chooser_keeps_ambiguous_pair() {
        let (graph, [a, x, y, _]) = fork();
        let mut index = PairedInfoIndex::new();
        index.add_point(a, x, Point::new(10.0, 2.0, 0.0), true).unwrap();
        index.add_point(a, y, Point::new(10.0, 2.0, 0.0), true).unwrap();

        let chooser = PairedInfoChooser::new(&index, library(), 0.5, 0.001);
        let path = BidirectionalPath::from_edges(&graph, &[a]);
        let candidates = [EdgeWithDistance::new(x, 0), EdgeWithDistance::new(y, 0)];
        assert_eq!(chooser.filter(&path, &candidates).len(), 2);
    }

    #[test]
    fn test_trivial_chooser() {
        let (graph, [a, x, y, _]) = fork();
        let path = BidirectionalPath::from_edges(&graph, &[a]);
        let one = [EdgeWithDistance::new(x, 0)];
        let two = [EdgeWithDistance::new(x, 0), EdgeWithDistance::new(y, 0)];
        assert_eq!(TrivialExtensionChooser.filter(&path, &one), one.to_vec());
        assert!(TrivialExtensionChooser.filter(&path, &two).is_empty());
        assert!(!TrivialExtensionChooser.weight_counter_based());
    }

    #[test]
    fn test_scaffolding_chooser_estimates_gap() {
        let (graph, [a, x, _, s]) = fork();
        let mut index = PairedInfoIndex::new();
        index.add_point(a, s, Point::new(28.0, 1.0, 1.0), true).unwrap();
        index.add_point(a, s, Point::new(32.0, 1.0, 1.0), true).unwrap();

        let chooser = ScaffoldingChooser::new(&graph, &index, library(), 0.5);
        let path = BidirectionalPath::from_edges(&graph, &[a, x]);
        let sources = [EdgeWithDistance::new(s, 0), EdgeWithDistance::new(a, 0)];
        // path length 20, observations at 28 and 32 from the start of a
        assert_eq!(chooser.filter(&path, &sources), vec![EdgeWithDistance::new(s, 10)]);
    }
}
