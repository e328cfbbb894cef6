//! Gap Closing
//! ===========
//!
//! Scaffolding links come with a statistical distance estimate. Before the
//! link is written into a path, the estimate is checked against the edge
//! sequences: if the flanks of the two edges overlap, the overlap length is
//! used instead of the estimate.
//!
//! **Expert Level:**
//! - `HammingGapAnalyzer` scores ungapped overlaps, longest first
//! - `LAGapAnalyzer` runs a local alignment (`bio::alignment::pairwise`)
//!   over a window sized from the estimate and may trim both flanks
//! - `CompositeGapAnalyzer` chains analyzers and falls back to an artificial
//!   gap, or rejects links that should have overlapped but did not

use bio::alignment::pairwise::Aligner;
use bio::alignment::AlignmentOperation;
use tracing::{debug, trace};

use super::bidirectional_path::Gap;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::core::math;
use crate::utils::configuration::GapCloserConfig;

/// Hypothesis about how `left` and `right` abut. Negative distances are
/// overlaps; trims cut nucleotides from the end of `left` and the start of
/// `right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapDescription {
    pub left: EdgeId,
    pub right: EdgeId,
    pub estimated_dist: i64,
    pub left_trim: usize,
    pub right_trim: usize,
}

impl GapDescription {
    pub fn new(left: EdgeId, right: EdgeId, estimated_dist: i64) -> Self {
        Self {
            left,
            right,
            estimated_dist,
            left_trim: 0,
            right_trim: 0,
        }
    }

    pub fn with_trims(
        left: EdgeId,
        right: EdgeId,
        estimated_dist: i64,
        left_trim: usize,
        right_trim: usize,
    ) -> Self {
        Self {
            left,
            right,
            estimated_dist,
            left_trim,
            right_trim,
        }
    }

    pub fn no_trim(&self) -> bool {
        self.left_trim == 0 && self.right_trim == 0
    }

    /// Path gap (k-mer coordinates) carrying the trims.
    pub fn to_gap(&self, k: usize) -> Gap {
        Gap::with_trash(
            self.estimated_dist + k as i64 - self.left_trim as i64 - self.right_trim as i64,
            self.left_trim,
            self.right_trim,
        )
    }
}

/// Refines a gap estimate, or returns `None` when no credible join exists.
pub trait GapAnalyzer {
    fn fix_gap(&self, gap: &GapDescription) -> Option<GapDescription>;
}

pub struct HammingGapAnalyzer<'g> {
    graph: &'g AssemblyGraph,
    min_gap_score: f64,
    short_overlap_threshold: usize,
    basic_overlap_length: usize,
}

impl<'g> HammingGapAnalyzer<'g> {
    const MIN_OVERLAP_COEFF: f64 = 0.05;

    pub fn new(
        graph: &'g AssemblyGraph,
        min_gap_score: f64,
        short_overlap_threshold: usize,
        basic_overlap_length: usize,
    ) -> Self {
        debug!(
            "HammingGapAnalyzer: min_gap_score {}, short_overlap_threshold {}, basic_overlap_length {}",
            min_gap_score, short_overlap_threshold, basic_overlap_length
        );
        Self {
            graph,
            min_gap_score,
            short_overlap_threshold,
            basic_overlap_length,
        }
    }

    fn score(left: &[u8], right: &[u8]) -> f64 {
        let mismatches = left.iter().zip(right).filter(|(a, b)| a != b).count();
        1.0 - mismatches as f64 / left.len() as f64
    }
}

impl GapAnalyzer for HammingGapAnalyzer<'_> {
    fn fix_gap(&self, gap: &GapDescription) -> Option<GapDescription> {
        let graph = self.graph;
        let k = graph.k();
        let est = gap.estimated_dist;

        let mut max_overlap = self.basic_overlap_length;
        if est < 0 {
            max_overlap += (-est) as usize;
        }
        max_overlap = max_overlap.min(k + graph.length(gap.left).min(graph.length(gap.right)));

        let mut min_overlap = 1;
        if est < 0 {
            min_overlap = min_overlap.max((Self::MIN_OVERLAP_COEFF * (-est) as f64).round() as usize);
        }
        debug!("Overlap search range {}..={}", min_overlap, max_overlap);

        let left = graph.sequence(gap.left).as_bytes();
        let right = graph.sequence(gap.right).as_bytes();
        let mut best_score = self.min_gap_score;
        let mut fixed: Option<i64> = None;

        for l in (min_overlap..=max_overlap).rev() {
            let score = Self::score(&left[left.len() - l..], &right[..l]);
            if math::gr(score, best_score) {
                trace!("Overlap {} scores {:.3}", l, score);
                best_score = score;
                fixed = Some(-(l as i64));
            }
            if l == self.short_overlap_threshold && fixed.is_some() {
                debug!("Not looking at short overlaps");
                break;
            }
        }

        let fixed = fixed?;
        debug!("Estimated gap {}, fixed gap {} (score {:.3})", est, fixed, best_score);
        Some(GapDescription {
            estimated_dist: fixed,
            ..*gap
        })
    }
}

/// Aligned ranges of an overlap: half-open positions in the left and the
/// right edge sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OverlapInfo {
    left: (usize, usize),
    right: (usize, usize),
    matches: usize,
}

impl OverlapInfo {
    fn size(&self) -> usize {
        (self.left.1 - self.left.0).max(self.right.1 - self.right.0)
    }

    fn identity(&self) -> f64 {
        if self.size() == 0 {
            0.0
        } else {
            self.matches as f64 / self.size() as f64
        }
    }
}

/// Local alignment of the end of `left` against the start of `right`,
/// each cut to `flank` nucleotides.
fn analyze_overlap(left: &[u8], right: &[u8], flank: usize) -> OverlapInfo {
    let start1 = left.len().saturating_sub(flank);
    let end2 = flank.min(right.len());
    let x = &left[start1..];
    let y = &right[..end2];

    let score = |a: u8, b: u8| if a == b { 1i32 } else { -3i32 };
    let mut aligner = Aligner::with_capacity(x.len(), y.len(), -5, -2, score);
    let alignment = aligner.local(x, y);
    let matches = alignment
        .operations
        .iter()
        .filter(|op| matches!(op, AlignmentOperation::Match))
        .count();

    OverlapInfo {
        left: (start1 + alignment.xstart, start1 + alignment.xend),
        right: (alignment.ystart, alignment.yend),
        matches,
    }
}

pub struct LAGapAnalyzer<'g> {
    graph: &'g AssemblyGraph,
    min_la_length: usize,
    flank_multiplication_coefficient: f64,
    flank_addition_coefficient: i64,
    min_identity: f64,
}

impl<'g> LAGapAnalyzer<'g> {
    const ESTIMATED_GAP_MULTIPLIER: f64 = 2.0;
    const GAP_ADDITIONAL_COEFFICIENT: usize = 30;

    pub fn new(
        graph: &'g AssemblyGraph,
        min_la_length: usize,
        flank_multiplication_coefficient: f64,
        flank_addition_coefficient: i64,
        min_identity: f64,
    ) -> Self {
        Self {
            graph,
            min_la_length,
            flank_multiplication_coefficient,
            flank_addition_coefficient,
            min_identity,
        }
    }
}

impl GapAnalyzer for LAGapAnalyzer<'_> {
    fn fix_gap(&self, gap: &GapDescription) -> Option<GapDescription> {
        let graph = self.graph;
        let k = graph.k();
        let estimated_overlap = if gap.estimated_dist < 0 {
            gap.estimated_dist.unsigned_abs() as usize
        } else {
            0
        };
        let flank = (estimated_overlap as f64 * Self::ESTIMATED_GAP_MULTIPLIER).round() as usize
            + Self::GAP_ADDITIONAL_COEFFICIENT;

        let overlap = analyze_overlap(
            graph.sequence(gap.left).as_bytes(),
            graph.sequence(gap.right).as_bytes(),
            flank,
        );
        debug!("{:?}", overlap);

        if overlap.size() < self.min_la_length {
            debug!("Low alignment size");
            return None;
        }

        let left_len = graph.length(gap.left);
        let max_flank = overlap.right.0.max(left_len + k - overlap.left.1);
        let flank_cost =
            (max_flank as f64 * self.flank_multiplication_coefficient).round() as i64 + self.flank_addition_coefficient;
        if flank_cost > overlap.size() as i64 {
            debug!("Too long flanks for such alignment");
            return None;
        }

        if math::ls(overlap.identity(), self.min_identity) {
            debug!("Low identity score");
            return None;
        }

        if overlap.left.1 <= k || overlap.right.0 >= graph.length(gap.right) {
            debug!("Less than k+1 nucleotides were left of one of the edges");
            return None;
        }

        Some(GapDescription::with_trims(
            gap.left,
            gap.right,
            -((overlap.left.1 - overlap.left.0) as i64),
            left_len + k - overlap.left.1,
            overlap.right.0,
        ))
    }
}

/// Tries each analyzer in order; without a hit, estimates that should have
/// overlapped are rejected and the rest are clamped to an artificial gap.
pub struct CompositeGapAnalyzer<'g> {
    joiners: Vec<Box<dyn GapAnalyzer + 'g>>,
    may_overlap_threshold: i64,
    must_overlap_threshold: i64,
    artificial_gap: i64,
}

impl<'g> CompositeGapAnalyzer<'g> {
    pub fn new(
        joiners: Vec<Box<dyn GapAnalyzer + 'g>>,
        may_overlap_threshold: i64,
        must_overlap_threshold: i64,
        artificial_gap: i64,
    ) -> Self {
        Self {
            joiners,
            may_overlap_threshold,
            must_overlap_threshold,
            artificial_gap,
        }
    }

    /// Hamming and/or local-alignment joiners as enabled in `config`.
    pub fn from_config(graph: &'g AssemblyGraph, config: &GapCloserConfig) -> Self {
        let mut joiners: Vec<Box<dyn GapAnalyzer + 'g>> = Vec::new();
        if config.use_hamming {
            joiners.push(Box::new(HammingGapAnalyzer::new(
                graph,
                config.min_gap_score,
                config.short_overlap_threshold,
                config.basic_overlap_length,
            )));
        }
        if config.use_la {
            joiners.push(Box::new(LAGapAnalyzer::new(
                graph,
                config.min_la_length,
                config.flank_multiplication_coefficient,
                config.flank_addition_coefficient,
                config.min_identity,
            )));
        }
        Self::new(
            joiners,
            config.may_overlap_threshold,
            config.must_overlap_threshold,
            config.artificial_gap,
        )
    }
}

impl GapAnalyzer for CompositeGapAnalyzer<'_> {
    fn fix_gap(&self, gap: &GapDescription) -> Option<GapDescription> {
        debug!(
            "Trying to fix estimated gap {} between {} and {}",
            gap.estimated_dist, gap.left, gap.right
        );
        if gap.estimated_dist > self.may_overlap_threshold {
            debug!("Edges are supposed to be too far to check overlaps");
            return Some(*gap);
        }

        if let Some(fixed) = self.joiners.iter().find_map(|joiner| joiner.fix_gap(gap)) {
            return Some(fixed);
        }

        if gap.estimated_dist < self.must_overlap_threshold {
            debug!("Estimated gap looks unreliable");
            None
        } else {
            debug!("Overlap was not found");
            Some(GapDescription {
                estimated_dist: gap.estimated_dist.max(self.artificial_gap),
                ..*gap
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    fn pair(k: usize, left: &str, right: &str) -> (AssemblyGraph, EdgeId, EdgeId) {
        let mut graph = AssemblyGraph::new(k, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let l = graph.add_edge(v[0], v[1], left, 1.0).unwrap();
        let r = graph.add_edge(v[2], v[3], right, 1.0).unwrap();
        (graph, l, r)
    }

    #[test]
    fn test_hamming_finds_exact_overlap() {
        let (graph, l, r) = pair(3, "TTAACTTACATCG", "ACTTACATCG");
        let analyzer = HammingGapAnalyzer::new(&graph, 0.9, 3, 10);
        let fixed = analyzer.fix_gap(&GapDescription::new(l, r, 0)).unwrap();
        assert_eq!(fixed.estimated_dist, -10);
        assert!(fixed.no_trim());
    }

    #[test]
    fn test_hamming_score_at_threshold_is_rejected() {
        // one mismatch over ten bases scores exactly 0.9
        let (graph, l, r) = pair(3, "TTAACTTACATCG", "ACTTTCATCG");
        let strict = HammingGapAnalyzer::new(&graph, 0.9, 3, 10);
        assert_eq!(strict.fix_gap(&GapDescription::new(l, r, 0)), None);

        let lenient = HammingGapAnalyzer::new(&graph, 0.85, 3, 10);
        let fixed = lenient.fix_gap(&GapDescription::new(l, r, 0)).unwrap();
        assert_eq!(fixed.estimated_dist, -10);
    }

    #[test]
    fn test_local_alignment_overlap() {
        let overlap = "ACGTTGCATGCAAGTCCATGGATCA";
        let left = format!("TTTTTTTTTTGGGGGGGGGGTTTTTTTTTTGGGGGGGGGG{overlap}");
        let right = format!("{overlap}CCCCCCCCCCAAAAAAAAAACCCCCCCCCCAAAAAAAAAA");
        let (graph, l, r) = pair(5, &left, &right);
        let analyzer = LAGapAnalyzer::new(&graph, 10, 0.5, 5, 0.9);
        let fixed = analyzer.fix_gap(&GapDescription::new(l, r, -25)).unwrap();
        assert_eq!(fixed.estimated_dist, -25);
        assert_eq!(fixed.left_trim, 0);
        assert_eq!(fixed.right_trim, 0);
        assert_eq!(fixed.to_gap(5), Gap::new(-20));
    }

    #[test]
    fn test_composite_fallbacks() {
        let (graph, l, r) = pair(3, "TTAACTTACATCG", "AAAAAAAAAA");
        let composite = CompositeGapAnalyzer::new(
            vec![Box::new(HammingGapAnalyzer::new(&graph, 0.9, 3, 10))],
            10,
            -10,
            10,
        );
        let far = GapDescription::new(l, r, 50);
        assert_eq!(composite.fix_gap(&far), Some(far));

        let near = composite.fix_gap(&GapDescription::new(l, r, -3)).unwrap();
        assert_eq!(near.estimated_dist, 10);

        assert_eq!(composite.fix_gap(&GapDescription::new(l, r, -20)), None);
    }
}
