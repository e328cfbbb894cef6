//! Paired information weight normalization
//!
//! Raw weights grow with edge length and coverage. A normalizer rescales each
//! point so that linkage between different edge pairs becomes comparable.
//! Normalization never mutates the source index; it fills a second one.

use anyhow::Result;
use tracing::trace;

use super::index::PairedInfoIndex;
use super::point::Point;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::core::math;
use crate::core::paired_reads::LibraryStats;

pub trait WeightNormalizer {
    fn normalize(&self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: Point) -> Point;
}

/// Leaves every point unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialNormalizer;

impl WeightNormalizer for TrivialNormalizer {
    fn normalize(&self, _graph: &AssemblyGraph, _e1: EdgeId, _e2: EdgeId, point: Point) -> Point {
        point
    }
}

/// Divides the weight by `length(e1) * length(e2) / (coverage(e1) * coverage(e2))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageNormalizer;

impl WeightNormalizer for CoverageNormalizer {
    fn normalize(&self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: Point) -> Point {
        let coverage = graph.coverage(e1) * graph.coverage(e2);
        let lengths = graph.length(e1) as f64 * graph.length(e2) as f64;
        if !math::gr(coverage, 0.0) || !math::gr(lengths, 0.0) {
            return Point { weight: 0.0, ..point };
        }
        Point {
            weight: point.weight / (lengths / coverage),
            ..point
        }
    }
}

/// Divides the weight by the number of read start positions that place a
/// pair with the library's insert size across both edges at the point's
/// distance, then by the expected per-position coverage.
#[derive(Debug, Clone)]
pub struct InsertSizeNormalizer {
    pub insert_size: usize,
    pub read_length: usize,
    pub k: usize,
    pub avg_coverage: f64,
}

impl InsertSizeNormalizer {
    pub fn new(library: &LibraryStats, k: usize) -> Self {
        Self {
            insert_size: library.insert_size,
            read_length: library.read_length,
            k,
            avg_coverage: library.avg_coverage,
        }
    }

    /// Width of the window of consistent start positions (may be negative).
    pub fn window(&self, graph: &AssemblyGraph, mut e1: EdgeId, mut e2: EdgeId, d: f64) -> f64 {
        let is = self.insert_size as i64;
        let rl = self.read_length as i64;
        let k = self.k as i64;
        if math::eq(d, 0.0) && e1 == e2 {
            return (graph.length(e1) as i64 - is + 2 * rl + 1 - k) as f64;
        }
        if math::ls(d, 0.0) {
            std::mem::swap(&mut e1, &mut e2);
        }
        let len1 = graph.length(e1) as i64;
        let len2 = graph.length(e2) as i64;
        let gap = math::round_to_zero(d).abs() - len1;
        let right = is.min(gap + len2 + rl);
        let left = gap.max(is - rl - len1);
        (right - left + 1 - k) as f64
    }
}

impl WeightNormalizer for InsertSizeNormalizer {
    fn normalize(&self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: Point) -> Point {
        let w = self.window(graph, e1, e2, point.d);
        let mut weight = if math::gr(w, 0.0) { point.weight / w } else { 0.0 };
        let per_position = self.avg_coverage / (2.0 * (self.read_length as f64 - self.k as f64));
        if math::gr(per_position, 0.0) {
            weight /= per_position;
        }
        Point { weight, ..point }
    }
}

/// Normalizer for long-range (jumping) libraries:
/// `weight / (min(len1, len2, max_norm) + read_length - k)`.
#[derive(Debug, Clone)]
pub struct JumpingNormalizer {
    pub read_length: usize,
    pub max_norm: usize,
}

impl JumpingNormalizer {
    pub fn new(read_length: usize, max_norm: usize) -> Self {
        Self {
            read_length,
            max_norm,
        }
    }

    fn norm(&self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId) -> f64 {
        let shortest = graph.length(e1).min(graph.length(e2)).min(self.max_norm);
        (shortest + self.read_length) as f64 - graph.k() as f64
    }
}

impl WeightNormalizer for JumpingNormalizer {
    fn normalize(&self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: Point) -> Point {
        let norm = self.norm(graph, e1, e2);
        let weight = if math::gr(norm, 0.0) { point.weight / norm } else { 0.0 };
        Point { weight, ..point }
    }
}

/// Copy every point of `source` into `target`, scaled by `coeff` and passed
/// through `normalizer`. Both twins already live in `source`, so reversal is
/// suppressed.
pub fn fill_normalized_index(
    graph: &AssemblyGraph,
    source: &PairedInfoIndex,
    target: &mut PairedInfoIndex,
    normalizer: &dyn WeightNormalizer,
    coeff: f64,
) -> Result<()> {
    for (e1, e2, histogram) in source.iter() {
        for point in histogram.values() {
            let scaled = Point {
                weight: point.weight * coeff,
                ..*point
            };
            let normalized = normalizer.normalize(graph, e1, e2, scaled);
            trace!("Normalized {} -> {}", scaled, normalized);
            target.add_point(e1, e2, normalized, false)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    fn two_edges(len1: usize, len2: usize, cov1: f64, cov2: f64) -> (AssemblyGraph, EdgeId, EdgeId) {
        let k = 5;
        let mut graph = AssemblyGraph::new(k, Conjugation::Asymmetric);
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        let e1 = graph.add_edge(a, b, &"A".repeat(len1 + k), cov1).unwrap();
        let e2 = graph.add_edge(b, c, &"C".repeat(len2 + k), cov2).unwrap();
        (graph, e1, e2)
    }

    #[test]
    fn test_coverage_normalizer_divides_by_length_over_coverage() {
        let (graph, e1, e2) = two_edges(10, 20, 2.0, 5.0);
        let p = CoverageNormalizer.normalize(&graph, e1, e2, Point::new(15.0, 40.0, 1.0));
        assert!((p.weight - 40.0 / 20.0).abs() < 1e-12);
        assert_eq!(p.d, 15.0);
        assert_eq!(p.var, 1.0);
    }

    #[test]
    fn test_insert_size_window_and_clamp() {
        let (graph, e1, e2) = two_edges(100, 100, 1.0, 1.0);
        let normalizer = InsertSizeNormalizer {
            insert_size: 200,
            read_length: 50,
            k: 5,
            avg_coverage: 90.0,
        };
        // gap = 120 - 100 = 20; right = min(200, 170) = 170; left = max(20, 50) = 50
        assert_eq!(normalizer.window(&graph, e1, e2, 120.0), 116.0);
        assert_eq!(normalizer.window(&graph, e2, e1, -120.0), 116.0);
        let p = normalizer.normalize(&graph, e1, e2, Point::new(120.0, 116.0, 0.0));
        assert!((p.weight - 1.0).abs() < 1e-12);

        // far beyond the insert size the window is empty
        let far = normalizer.normalize(&graph, e1, e2, Point::new(1000.0, 5.0, 0.0));
        assert_eq!(far.weight, 0.0);
    }

    #[test]
    fn test_jumping_normalizer() {
        let (graph, e1, e2) = two_edges(30, 500, 1.0, 1.0);
        let p = JumpingNormalizer::new(100, 200).normalize(&graph, e1, e2, Point::new(0.0, 125.0, 0.0));
        assert!((p.weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fill_normalized_index_scales_without_reversal() {
        let (graph, e1, e2) = two_edges(10, 10, 1.0, 1.0);
        let mut source = PairedInfoIndex::new();
        source.add_point(e1, e2, Point::new(12.0, 3.0, 0.0), true).unwrap();
        let mut target = PairedInfoIndex::new();
        fill_normalized_index(&graph, &source, &mut target, &TrivialNormalizer, 2.0).unwrap();
        assert_eq!(target.size(), 2);
        assert_eq!(target.edge_pair_info(e2, e1)[0].weight, 6.0);
    }
}
