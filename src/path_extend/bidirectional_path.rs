//! Bidirectional Paths
//! ===================
//!
//! A path is a chain of graph edges, each separated from its predecessor by
//! a [`Gap`]. Paths always come in pairs with their reverse complement; the
//! pair is kept together by [`super::PathContainer`].
//!
//! **Layman's Explanation:**
//! A path is a route through the assembly graph written down as the list of
//! roads taken. Usually consecutive roads touch, but when the map has a hole
//! the path records how far it had to jump to reach the next road.
//!
//! **Expert Level:**
//! - Gap `0` means the two edges share a vertex (they overlap by `k`)
//! - A gap larger than `k` is padded with `N` when the contig is spelled
//! - Trash values trim the flanks of an overlap found by local alignment
//! - Edge additions and removals are journaled when tracking is enabled so a
//!   coverage map can follow the path without holding a reference to it

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::core::assembly_graph::{AssemblyGraph, EdgeId};

pub type PathId = usize;

/// Distance from the end of the previous edge to the start of the next one,
/// in graph (k-mer) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Gap {
    pub gap: i64,
    /// Nucleotides cut from the end of the previous edge
    pub trash_previous: usize,
    /// Nucleotides cut from the start of this edge
    pub trash_current: usize,
}

impl Gap {
    pub fn new(gap: i64) -> Self {
        Self {
            gap,
            trash_previous: 0,
            trash_current: 0,
        }
    }

    pub fn with_trash(gap: i64, trash_previous: usize, trash_current: usize) -> Self {
        Self {
            gap,
            trash_previous,
            trash_current,
        }
    }

    /// Nucleotide overlap of the neighbouring edges once both trims are
    /// applied; negative values are a real gap.
    pub fn overlap_after_trim(&self, k: usize) -> i64 {
        k as i64 - self.gap - self.trash_previous as i64 - self.trash_current as i64
    }

    fn conjugate(&self) -> Self {
        Self {
            gap: self.gap,
            trash_previous: self.trash_current,
            trash_current: self.trash_previous,
        }
    }
}

/// Change journal entry consumed by [`super::GraphCoverageMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEvent {
    Added(EdgeId),
    Removed(EdgeId),
}

pub struct BidirectionalPath<'g> {
    graph: &'g AssemblyGraph,
    id: PathId,
    edges: VecDeque<EdgeId>,
    gaps: VecDeque<Gap>,
    tracking: bool,
    events: Vec<PathEvent>,
}

impl<'g> BidirectionalPath<'g> {
    pub fn new(graph: &'g AssemblyGraph) -> Self {
        Self {
            graph,
            id: 0,
            edges: VecDeque::new(),
            gaps: VecDeque::new(),
            tracking: false,
            events: Vec::new(),
        }
    }

    /// Gapless path over `edges`.
    pub fn from_edges(graph: &'g AssemblyGraph, edges: &[EdgeId]) -> Self {
        let mut path = Self::new(graph);
        for &e in edges {
            path.push_back(e);
        }
        path
    }

    pub fn graph(&self) -> &'g AssemblyGraph {
        self.graph
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn set_id(&mut self, id: PathId) {
        self.id = id;
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn at(&self, i: usize) -> EdgeId {
        self.edges[i]
    }

    pub fn front(&self) -> Option<EdgeId> {
        self.edges.front().copied()
    }

    pub fn back(&self) -> Option<EdgeId> {
        self.edges.back().copied()
    }

    /// Gap in front of position `i`; the first edge always reports a zero gap.
    pub fn gap_at(&self, i: usize) -> Gap {
        self.gaps[i]
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn length(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.length_at(0)
        }
    }

    /// Length from the start of edge `i` to the end of the path, gaps after
    /// `i` included.
    pub fn length_at(&self, i: usize) -> usize {
        let mut total: i64 = 0;
        for j in i..self.len() {
            total += self.graph.length(self.edges[j]) as i64;
            if j > i {
                total += self.gaps[j].gap;
            }
        }
        total.max(0) as usize
    }

    /// `length_at(i)` for every position at once.
    pub fn suffix_lengths(&self) -> Vec<usize> {
        let mut result = vec![0usize; self.len()];
        let mut total: i64 = 0;
        for j in (0..self.len()).rev() {
            total += self.graph.length(self.edges[j]) as i64;
            result[j] = total.max(0) as usize;
            total += self.gaps[j].gap;
        }
        result
    }

    pub fn push_back(&mut self, e: EdgeId) {
        self.push_back_with_gap(e, Gap::default());
    }

    pub fn push_back_with_gap(&mut self, e: EdgeId, gap: Gap) {
        let gap = if self.is_empty() { Gap::default() } else { gap };
        self.edges.push_back(e);
        self.gaps.push_back(gap);
        self.record(PathEvent::Added(e));
    }

    /// Append `other`; its first edge takes `gap`, the rest keep theirs.
    pub fn push_back_path(&mut self, other: &BidirectionalPath<'_>, gap: Gap) {
        for i in 0..other.len() {
            let g = if i == 0 { gap } else { other.gaps[i] };
            self.push_back_with_gap(other.edges[i], g);
        }
    }

    pub fn pop_back(&mut self) -> Option<EdgeId> {
        let e = self.edges.pop_back()?;
        self.gaps.pop_back();
        self.record(PathEvent::Removed(e));
        Some(e)
    }

    pub fn pop_back_n(&mut self, n: usize) {
        for _ in 0..n {
            if self.pop_back().is_none() {
                break;
            }
        }
    }

    pub fn pop_front_n(&mut self, n: usize) {
        for _ in 0..n {
            match self.edges.pop_front() {
                Some(e) => {
                    self.gaps.pop_front();
                    self.record(PathEvent::Removed(e));
                }
                None => break,
            }
        }
        if let Some(first) = self.gaps.front_mut() {
            *first = Gap::default();
        }
    }

    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    pub fn sub_path(&self, from: usize) -> Self {
        self.sub_path_range(from, self.len())
    }

    /// Positions `from..to`, clamped to the path.
    pub fn sub_path_range(&self, from: usize, to: usize) -> Self {
        let mut result = Self::new(self.graph);
        for i in from..to.min(self.len()) {
            result.push_back_with_gap(self.edges[i], self.gaps[i]);
        }
        result
    }

    /// Reverse complement; gaps move with the junction they describe.
    pub fn conjugate(&self) -> Self {
        let n = self.len();
        let mut result = Self::new(self.graph);
        for i in 0..n {
            let e = self.graph.conjugate(self.edges[n - 1 - i]);
            let gap = if i == 0 {
                Gap::default()
            } else {
                self.gaps[n - i].conjugate()
            };
            result.push_back_with_gap(e, gap);
        }
        result
    }

    pub fn contains(&self, e: EdgeId) -> bool {
        self.edges.contains(&e)
    }

    pub fn find_all(&self, e: EdgeId) -> Vec<usize> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, x)| **x == e)
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether `sample`'s edges occur in this path starting at `from`.
    pub fn compare_from(&self, from: usize, sample: &BidirectionalPath<'_>) -> bool {
        if from + sample.len() > self.len() {
            return false;
        }
        sample
            .edges
            .iter()
            .enumerate()
            .all(|(i, e)| self.edges[from + i] == *e)
    }

    pub fn find_first(&self, sample: &BidirectionalPath<'_>) -> Option<usize> {
        if sample.len() > self.len() {
            return None;
        }
        (0..=self.len() - sample.len()).find(|&i| self.compare_from(i, sample))
    }

    pub fn find_last(&self, sample: &BidirectionalPath<'_>) -> Option<usize> {
        if sample.len() > self.len() {
            return None;
        }
        (0..=self.len() - sample.len())
            .rev()
            .find(|&i| self.compare_from(i, sample))
    }

    /// Length-weighted mean coverage of the edges.
    pub fn coverage(&self) -> f64 {
        let mut weighted = 0.0;
        let mut total = 0usize;
        for &e in &self.edges {
            let len = self.graph.length(e);
            weighted += self.graph.coverage(e) * len as f64;
            total += len;
        }
        if total == 0 {
            0.0
        } else {
            weighted / total as f64
        }
    }

    /// Spell the path: consecutive edges overlap by `k - gap`, trimmed by the
    /// trash values; a negative overlap is padded with `N`.
    pub fn sequence(&self) -> String {
        let k = self.graph.k();
        let mut result = String::new();
        for (i, &e) in self.edges.iter().enumerate() {
            let seq = self.graph.sequence(e);
            if i == 0 {
                result.push_str(seq);
                continue;
            }
            let gap = self.gaps[i];
            let keep = result.len().saturating_sub(gap.trash_previous);
            result.truncate(keep);
            let overlap = gap.overlap_after_trim(k);
            let mut skip = gap.trash_current;
            if overlap < 0 {
                result.extend(std::iter::repeat('N').take((-overlap) as usize));
            } else {
                skip += overlap as usize;
            }
            if skip < seq.len() {
                result.push_str(&seq[skip..]);
            }
        }
        result
    }

    /// Cut a palindromic stretch where the path runs into its own reverse
    /// complement, dropping the shorter flank. Returns how many edges were
    /// removed.
    pub fn check_conjugate_end(&mut self, max_repeat_length: usize) -> usize {
        if !self.graph.is_symmetric() {
            return 0;
        }
        let initial = self.len();
        let mut previous = usize::MAX;
        while previous != self.len() {
            previous = self.len();
            self.cut_conjugate_fragment(max_repeat_length);
        }
        initial - self.len()
    }

    fn cut_conjugate_fragment(&mut self, max_repeat_length: usize) {
        let size = self.len();
        let total_len = self.length();
        for begin_pos in 0..size {
            let twin = self.graph.conjugate(self.edges[begin_pos]);
            let ends: Vec<usize> = self
                .find_all(twin)
                .into_iter()
                .filter(|&p| p > begin_pos)
                .collect();
            for &end_pos in ends.iter().rev() {
                let mut begin = begin_pos;
                let mut end = end_pos;
                while begin < end && self.edges[begin] == self.graph.conjugate(self.edges[end]) {
                    begin += 1;
                    end -= 1;
                }
                let tail_size = size - end_pos - 1;
                let head_size = begin_pos;
                let half = begin - begin_pos;
                let head_len = total_len - self.length_at(begin_pos);
                let tail_len = if end_pos + 1 < size {
                    self.length_at(end_pos + 1)
                } else {
                    0
                };
                let palindrome_len = self.length_at(begin_pos).saturating_sub(self.length_at(begin));
                let after_end = if end + 1 < size { self.length_at(end + 1) } else { 0 };
                let between = self.length_at(begin).saturating_sub(after_end);

                if palindrome_len <= max_repeat_length {
                    if palindrome_len < head_len && palindrome_len < tail_len {
                        continue;
                    }
                    if between > palindrome_len {
                        continue;
                    }
                }
                let delete_tail = if tail_size == head_size {
                    tail_len < head_len
                } else {
                    tail_size < head_size
                };
                if delete_tail {
                    self.pop_back_n(tail_size + half);
                } else {
                    self.pop_front_n(head_size + half);
                }
                return;
            }
        }
    }

    /// Start journaling edge additions and removals.
    pub fn start_tracking(&mut self) {
        self.tracking = true;
    }

    pub fn take_events(&mut self) -> Vec<PathEvent> {
        std::mem::take(&mut self.events)
    }

    fn record(&mut self, event: PathEvent) {
        if self.tracking {
            self.events.push(event);
        }
    }
}

impl Clone for BidirectionalPath<'_> {
    /// Copies are untracked and start with an empty journal.
    fn clone(&self) -> Self {
        Self {
            graph: self.graph,
            id: self.id,
            edges: self.edges.clone(),
            gaps: self.gaps.clone(),
            tracking: false,
            events: Vec::new(),
        }
    }
}

impl PartialEq for BidirectionalPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.edges == other.edges && self.gaps == other.gaps
    }
}

impl fmt::Debug for BidirectionalPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidirectionalPath")
            .field("id", &self.id)
            .field("edges", &self.edges)
            .field("gaps", &self.gaps)
            .finish()
    }
}

impl fmt::Display for BidirectionalPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path #{} [", self.id)?;
        for (i, e) in self.edges.iter().enumerate() {
            if i > 0 {
                let gap = self.gaps[i].gap;
                if gap == 0 {
                    write!(f, " ")?;
                } else {
                    write!(f, " ({gap}) ")?;
                }
            }
            write!(f, "{e}")?;
        }
        write!(f, "]")
    }
}

/// Walk `path1` from `start1` and find the last pair of positions where it
/// still agrees with `path2` (searched forward from `start2`), tolerating
/// stretches of at most `max_diff` that only one path contains.
pub fn compare_paths(
    start1: usize,
    start2: usize,
    path1: &BidirectionalPath<'_>,
    path2: &BidirectionalPath<'_>,
    max_diff: usize,
) -> (usize, usize) {
    if start1 >= path1.len() || start2 >= path2.len() {
        return (start1, start2);
    }
    let graph = path1.graph();
    let lengths2 = path2.suffix_lengths();
    let mut last1 = start1;
    let mut last2 = start2;
    let mut diff_len: i64 = 0;
    for cur in start1 + 1..path1.len() {
        if diff_len > max_diff as i64 {
            return (last1, last2);
        }
        let e = path1.at(cur);
        let mut found = false;
        for pos2 in path2.find_all(e) {
            if pos2 > last2 {
                let skipped = lengths2[last2] as i64
                    - lengths2[pos2] as i64
                    - graph.length(path2.at(last2)) as i64
                    - path2.gap_at(pos2).gap;
                if skipped > max_diff as i64 {
                    break;
                }
                last1 = cur;
                last2 = pos2;
                found = true;
                break;
            }
        }
        if found {
            diff_len = 0;
        } else {
            diff_len += graph.length(e) as i64 + path1.gap_at(cur).gap;
        }
    }
    (last1, last2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::{Conjugation, VertexId};

    /// Chain v0 -a-> v1 -b-> v2 -c-> v3 with k = 3.
    fn chain(conjugation: Conjugation) -> (AssemblyGraph, Vec<EdgeId>) {
        let mut graph = AssemblyGraph::new(3, conjugation);
        let v: Vec<VertexId> = (0..4).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTACG", 1.0).unwrap(); // 4
        let b = graph.add_edge(v[1], v[2], "ACGTTTT", 3.0).unwrap(); // 4
        let c = graph.add_edge(v[2], v[3], "TTTTGCAGC", 1.0).unwrap(); // 6
        (graph, vec![a, b, c])
    }

    #[test]
    fn test_lengths_include_inner_gaps() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let mut path = BidirectionalPath::from_edges(&graph, &e[..2]);
        path.push_back_with_gap(e[2], Gap::new(5));
        assert_eq!(path.length(), 4 + 4 + 5 + 6);
        assert_eq!(path.length_at(1), 4 + 5 + 6);
        assert_eq!(path.length_at(2), 6);
        assert_eq!(path.suffix_lengths(), vec![19, 15, 6]);
        assert!((path.coverage() - (4.0 + 12.0 + 6.0) / 14.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_gap_is_always_zero() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let mut path = BidirectionalPath::new(&graph);
        path.push_back_with_gap(e[0], Gap::new(40));
        assert_eq!(path.gap_at(0), Gap::default());
    }

    #[test]
    fn test_spelling_overlaps_and_pads() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let adjacent = BidirectionalPath::from_edges(&graph, &e[..2]);
        assert_eq!(adjacent.sequence(), "ACGTACGTTTT");

        let mut padded = BidirectionalPath::from_edges(&graph, &e[..1]);
        padded.push_back_with_gap(e[2], Gap::new(5));
        assert_eq!(padded.sequence(), "ACGTACGNNTTTTGCAGC");

        let mut trimmed = BidirectionalPath::from_edges(&graph, &e[..1]);
        trimmed.push_back_with_gap(e[2], Gap::with_trash(1, 1, 1));
        // overlap after trim = 3 - 1 - 1 - 1 = 0
        assert_eq!(trimmed.sequence(), "ACGTACTTTGCAGC");
    }

    #[test]
    fn test_search_and_compare() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let path = BidirectionalPath::from_edges(&graph, &[e[0], e[1], e[0], e[1], e[2]]);
        let sample = BidirectionalPath::from_edges(&graph, &[e[0], e[1]]);
        assert_eq!(path.find_all(e[1]), vec![1, 3]);
        assert_eq!(path.find_first(&sample), Some(0));
        assert_eq!(path.find_last(&sample), Some(2));
        assert!(path.compare_from(2, &sample));
        assert!(!path.compare_from(4, &sample));
        assert_eq!(path.sub_path_range(1, 3), BidirectionalPath::from_edges(&graph, &[e[1], e[0]]));
    }

    #[test]
    fn test_conjugate_reverses_and_moves_gaps() {
        let (graph, e) = chain(Conjugation::Symmetric);
        let mut path = BidirectionalPath::from_edges(&graph, &e[..2]);
        path.push_back_with_gap(e[2], Gap::with_trash(7, 2, 1));
        let conj = path.conjugate();
        assert_eq!(conj.len(), 3);
        assert_eq!(conj.at(0), graph.conjugate(e[2]));
        assert_eq!(conj.at(2), graph.conjugate(e[0]));
        assert_eq!(conj.gap_at(1), Gap::with_trash(7, 1, 2));
        assert_eq!(conj.gap_at(2), Gap::default());
        assert_eq!(conj.length(), path.length());
        assert_eq!(conj.conjugate(), path);
    }

    #[test]
    fn test_journal_only_when_tracking() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let mut path = BidirectionalPath::new(&graph);
        path.push_back(e[0]);
        assert!(path.take_events().is_empty());
        path.start_tracking();
        path.push_back(e[1]);
        path.pop_back();
        assert_eq!(
            path.take_events(),
            vec![PathEvent::Added(e[1]), PathEvent::Removed(e[1])]
        );
        assert!(path.clone().take_events().is_empty());
    }

    #[test]
    fn test_compare_paths_tracks_last_agreement() {
        let (graph, e) = chain(Conjugation::Asymmetric);
        let p1 = BidirectionalPath::from_edges(&graph, &[e[0], e[1], e[2]]);
        let p2 = BidirectionalPath::from_edges(&graph, &[e[0], e[1]]);
        assert_eq!(compare_paths(0, 0, &p1, &p2, 100), (1, 1));
        assert_eq!(compare_paths(5, 0, &p1, &p2, 100), (5, 0));
    }
}
