//! Paired Information Index
//! ========================
//!
//! Storage for distance observations between ordered edge pairs:
//! `first edge -> second edge -> histogram of points`, where a histogram is
//! keyed by the rounded distance of its points. Every non-symmetric
//! observation is stored together with its backward twin unless the caller
//! explicitly suppresses reversal.
//!
//! The index follows the graph: it implements [`GraphObserver`] and moves
//! its points onto new edge ids when edges are merged, glued or split.

use ahash::AHashMap;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace};

use super::point::{PairInfo, Point};
use crate::core::assembly_graph::{AssemblyGraph, EdgeId, GraphEvent, GraphObserver};
use crate::core::math;
use crate::utils::configuration::PipelineError;

/// Points between one ordered edge pair, keyed by rounded distance.
pub type Histogram = BTreeMap<i64, Point>;

/// Serialized form of one stored observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairInfoRecord {
    pub first: usize,
    pub second: usize,
    pub d: f64,
    pub weight: f64,
    #[serde(default)]
    pub var: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PairedInfoIndex {
    index: AHashMap<EdgeId, BTreeMap<EdgeId, Histogram>>,
    size: usize,
}

fn consistency_error(message: String) -> anyhow::Error {
    PipelineError::GraphError { message }.into()
}

/// Slot of the point at distance `d`: the rounded key when it holds a point
/// at that distance, otherwise a point stored under another key whose
/// distance drifted there through merges.
fn find_slot(histogram: &Histogram, d: f64) -> Option<i64> {
    let key = math::round_to_zero(d);
    if histogram.contains_key(&key) {
        return Some(key);
    }
    histogram
        .iter()
        .find(|(_, p)| math::eq(p.d, d))
        .map(|(k, _)| *k)
}

impl PairedInfoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.size = 0;
    }

    /// Add the zero self-observation of every graph edge.
    pub fn init(&mut self, graph: &AssemblyGraph) -> Result<()> {
        for e in graph.edges() {
            self.handle_add(e)?;
        }
        Ok(())
    }

    pub fn add_pair_info(&mut self, info: PairInfo, add_reversed: bool) -> Result<()> {
        self.add_point(info.first, info.second, info.point, add_reversed)
    }

    /// Insert `point` between `e1` and `e2`, merging it into an existing
    /// point of the same slot. With `add_reversed` the backward twin is kept
    /// in step.
    pub fn add_point(&mut self, e1: EdgeId, e2: EdgeId, point: Point, add_reversed: bool) -> Result<()> {
        trace!("Adding info {} {} {}", e1, e2, point);
        // a self pair in the zero slot is its own twin
        let symmetric = e1 == e2 && point.key() == 0;
        let histogram = self.index.entry(e1).or_default().entry(e2).or_default();

        match find_slot(histogram, point.d) {
            Some(key) => {
                let merged = histogram[&key].merge(&point);
                histogram.insert(key, merged);
                if add_reversed && !symmetric {
                    let twin = self
                        .index
                        .get_mut(&e2)
                        .and_then(|m| m.get_mut(&e1))
                        .and_then(|h| h.get_mut(&-key))
                        .ok_or_else(|| {
                            consistency_error(format!(
                                "backward twin of {} -> {} at {} is missing",
                                e1, e2, key
                            ))
                        })?;
                    *twin = -merged;
                }
            }
            None => {
                let key = point.key();
                histogram.insert(key, point);
                self.size += 1;
                if add_reversed && !symmetric {
                    self.index
                        .entry(e2)
                        .or_default()
                        .entry(e1)
                        .or_default()
                        .insert(-key, -point);
                    self.size += 1;
                }
            }
        }
        Ok(())
    }

    /// Mirror an observation onto the conjugates of its edges.
    pub fn add_conj_pair_info(
        &mut self,
        graph: &AssemblyGraph,
        e1: EdgeId,
        e2: EdgeId,
        point: Point,
        add_reversed: bool,
    ) -> Result<()> {
        self.add_point(
            graph.conjugate(e2),
            graph.conjugate(e1),
            point.conjugate(graph.length(e1), graph.length(e2)),
            add_reversed,
        )
    }

    /// Remove the single point of `info`'s slot. Returns whether a point was
    /// removed.
    pub fn remove_pair_info(&mut self, info: &PairInfo) -> bool {
        self.remove_point(info.first, info.second, &info.point)
    }

    pub fn remove_point(&mut self, e1: EdgeId, e2: EdgeId, point: &Point) -> bool {
        let Some(inner) = self.index.get_mut(&e1) else {
            return false;
        };
        let Some(histogram) = inner.get_mut(&e2) else {
            return false;
        };
        let removed = match find_slot(histogram, point.d) {
            Some(key) => histogram.remove(&key).is_some(),
            None => false,
        };
        if removed {
            self.size -= 1;
        }
        if histogram.is_empty() {
            inner.remove(&e2);
        }
        if inner.is_empty() {
            self.index.remove(&e1);
        }
        removed
    }

    pub fn remove_conj_pair_info(&mut self, graph: &AssemblyGraph, e1: EdgeId, e2: EdgeId, point: &Point) -> bool {
        self.remove_point(
            graph.conjugate(e2),
            graph.conjugate(e1),
            &point.conjugate(graph.length(e1), graph.length(e2)),
        )
    }

    /// Drop the whole histogram of `(e1, e2)`.
    pub fn remove_edge_pair_info(&mut self, e1: EdgeId, e2: EdgeId) -> bool {
        let Some(inner) = self.index.get_mut(&e1) else {
            return false;
        };
        let Some(histogram) = inner.remove(&e2) else {
            return false;
        };
        self.size -= histogram.len();
        if inner.is_empty() {
            self.index.remove(&e1);
        }
        true
    }

    /// Remove everything keyed by `edge`, together with the backward
    /// histograms `(other, edge)`.
    pub fn remove_edge_info(&mut self, edge: EdgeId) {
        let Some(inner) = self.index.remove(&edge) else {
            return;
        };
        for (e2, histogram) in inner {
            self.size -= histogram.len();
            if e2 != edge {
                self.remove_edge_pair_info(e2, edge);
            }
        }
    }

    /// Merge another index into this one, reversal suppressed (the other
    /// index already holds its twins).
    pub fn add_all(&mut self, other: &PairedInfoIndex) -> Result<()> {
        for (e1, e2, histogram) in other.iter() {
            for point in histogram.values() {
                self.add_point(e1, e2, *point, false)?;
            }
        }
        Ok(())
    }

    /// All observations anchored on `edge`, ordered by second edge and
    /// distance.
    pub fn edge_info(&self, edge: EdgeId) -> Vec<PairInfo> {
        self.index
            .get(&edge)
            .map(|inner| {
                inner
                    .iter()
                    .flat_map(|(e2, histogram)| {
                        histogram.values().map(move |p| PairInfo::new(edge, *e2, *p))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn edge_pair_info(&self, e1: EdgeId, e2: EdgeId) -> Vec<Point> {
        self.index
            .get(&e1)
            .and_then(|inner| inner.get(&e2))
            .map(|histogram| histogram.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.index.contains_key(&edge)
    }

    /// Histograms in ascending `(first, second)` order.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, EdgeId, &Histogram)> + '_ {
        let mut firsts: Vec<EdgeId> = self.index.keys().copied().collect();
        firsts.sort_unstable();
        firsts.into_iter().flat_map(move |e1| {
            self.index[&e1]
                .iter()
                .map(move |(e2, histogram)| (e1, *e2, histogram))
        })
    }

    /// Every stored observation as a flat list.
    pub fn pair_infos(&self) -> Vec<PairInfo> {
        self.iter()
            .flat_map(|(e1, e2, histogram)| histogram.values().map(move |p| PairInfo::new(e1, e2, *p)))
            .collect()
    }

    // ----- graph event handlers -------------------------------------------

    pub fn handle_add(&mut self, edge: EdgeId) -> Result<()> {
        trace!("Handling addition {}", edge);
        self.add_point(edge, edge, Point::new(0.0, 0.0, 0.0), true)
    }

    pub fn handle_delete(&mut self, edge: EdgeId) {
        trace!("Handling deletion {}", edge);
        self.remove_edge_info(edge);
    }

    /// Old edges were concatenated; each one's points move onto the new edge
    /// shifted by the length of what precedes it.
    pub fn handle_merge(&mut self, old_edges: &[EdgeId], old_lengths: &[usize], new_edge: EdgeId) -> Result<()> {
        debug!("Handling merge of {} edges into {}", old_edges.len(), new_edge);
        self.add_point(new_edge, new_edge, Point::new(0.0, 0.0, 0.0), true)?;
        let mut shift = 0i64;
        for (old, length) in old_edges.iter().zip(old_lengths) {
            self.transfer_info(*old, new_edge, shift, 1.0)?;
            shift -= *length as i64;
        }
        Ok(())
    }

    pub fn handle_glue(&mut self, new_edge: EdgeId, first: EdgeId, second: EdgeId) -> Result<()> {
        debug!("Handling glue {} {} into {}", first, second, new_edge);
        self.transfer_info(second, new_edge, 0, 1.0)?;
        self.transfer_info(first, new_edge, 0, 1.0)
    }

    /// Weights are shared between the halves in proportion to their length.
    pub fn handle_split(
        &mut self,
        old_edge: EdgeId,
        old_length: usize,
        new_edge1: EdgeId,
        new_edge1_length: usize,
        new_edge2: EdgeId,
    ) -> Result<()> {
        debug!("Handling split of {} into {} {}", old_edge, new_edge1, new_edge2);
        let ratio = if old_length > 0 {
            new_edge1_length as f64 / old_length as f64
        } else {
            0.5
        };
        self.transfer_info(old_edge, new_edge1, 0, ratio)?;
        self.transfer_info(old_edge, new_edge2, new_edge1_length as i64, 1.0 - ratio)
    }

    fn transfer_info(&mut self, old_edge: EdgeId, new_edge: EdgeId, shift: i64, weight_scale: f64) -> Result<()> {
        for info in self.edge_info(old_edge) {
            let p = info.point;
            if info.second != old_edge {
                self.add_point(
                    new_edge,
                    info.second,
                    Point::new(p.d - shift as f64, weight_scale * p.weight, p.var),
                    true,
                )?;
            } else if !math::eq(p.d, 0.0) {
                // both directions of a self-distance are stored, each gets half
                self.add_point(
                    new_edge,
                    new_edge,
                    Point::new(p.d, weight_scale * 0.5 * p.weight, p.var),
                    true,
                )?;
            } else {
                self.add_point(
                    new_edge,
                    new_edge,
                    Point::new(p.d, weight_scale * p.weight, p.var),
                    true,
                )?;
            }
        }
        Ok(())
    }

    // ----- serialization --------------------------------------------------

    pub fn to_records(&self) -> Vec<PairInfoRecord> {
        self.pair_infos()
            .into_iter()
            .map(|info| PairInfoRecord {
                first: info.first.0,
                second: info.second.0,
                d: info.d(),
                weight: info.weight(),
                var: info.var(),
            })
            .collect()
    }

    pub fn from_records(records: &[PairInfoRecord], add_reversed: bool) -> Result<Self> {
        let mut index = PairedInfoIndex::new();
        for record in records {
            index.add_point(
                EdgeId(record.first),
                EdgeId(record.second),
                Point::new(record.d, record.weight, record.var),
                add_reversed,
            )?;
        }
        Ok(index)
    }

    /// Load a JSON list of observations. Files written by
    /// [`PairedInfoIndex::to_records`] already contain both twins, so the
    /// records are inserted with reversal suppressed.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open paired info file: {}", path.display()))?;
        let records: Vec<PairInfoRecord> = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse paired info file: {}", path.display()))?;
        Self::from_records(&records, false)
    }
}

impl GraphObserver for PairedInfoIndex {
    fn on_event(&mut self, event: &GraphEvent) -> Result<()> {
        match event {
            GraphEvent::Add { edge } => self.handle_add(*edge),
            GraphEvent::Delete { edge } => {
                self.handle_delete(*edge);
                Ok(())
            }
            GraphEvent::Merge {
                old_edges,
                old_lengths,
                new_edge,
            } => self.handle_merge(old_edges, old_lengths, *new_edge),
            GraphEvent::Glue {
                new_edge,
                first,
                second,
            } => self.handle_glue(*new_edge, *first, *second),
            GraphEvent::Split {
                old_edge,
                old_length,
                new_edge1,
                new_edge1_length,
                new_edge2,
            } => self.handle_split(*old_edge, *old_length, *new_edge1, *new_edge1_length, *new_edge2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    fn info(e1: usize, e2: usize, d: f64, w: f64, v: f64) -> PairInfo {
        PairInfo::new(EdgeId(e1), EdgeId(e2), Point::new(d, w, v))
    }

    #[test]
    fn test_add_stores_backward_twin() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), true).unwrap();
        assert_eq!(index.size(), 2);
        let twin = index.edge_pair_info(EdgeId(2), EdgeId(1));
        assert_eq!(twin, vec![Point::new(-10.0, 1.0, 0.0)]);
    }

    #[test]
    fn test_symmetric_info_has_no_twin() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(3, 3, 0.0, 0.0, 0.0), true).unwrap();
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn test_self_pair_near_zero_is_stored_once() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(5, 5, 0.3, 1.0, 0.0), true).unwrap();
        assert_eq!(index.size(), 1);
        assert_eq!(index.edge_pair_info(EdgeId(5), EdgeId(5)), vec![Point::new(0.3, 1.0, 0.0)]);
    }

    #[test]
    fn test_self_pair_near_zero_merges_without_flipping() {
        let mut index = PairedInfoIndex::new();
        index.handle_add(EdgeId(5)).unwrap();
        index.add_pair_info(info(5, 5, 0.3, 2.0, 0.0), true).unwrap();
        assert_eq!(index.size(), 1);
        let stored = index.edge_pair_info(EdgeId(5), EdgeId(5));
        assert_eq!(stored.len(), 1);
        assert!((stored[0].d - 0.15).abs() < 1e-12);
        assert!((stored[0].var - 0.15).abs() < 1e-12);
        assert_eq!(stored[0].weight, 2.0);
    }

    #[test]
    fn test_merge_updates_both_directions() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(1, 2, 10.0, 1.0, 1.0), true).unwrap();
        index.add_pair_info(info(1, 2, 10.4, 2.0, 0.0), true).unwrap();
        assert_eq!(index.size(), 2);
        let forward = index.edge_pair_info(EdgeId(1), EdgeId(2));
        let backward = index.edge_pair_info(EdgeId(2), EdgeId(1));
        assert_eq!(forward.len(), 1);
        assert!((forward[0].weight - 3.0).abs() < 1e-12);
        assert!((backward[0].d + forward[0].d).abs() < 1e-12);
        assert_eq!(backward[0].weight, forward[0].weight);
    }

    #[test]
    fn test_missing_twin_is_a_consistency_error() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), false).unwrap();
        assert!(index.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), true).is_err());
    }

    #[test]
    fn test_remove_edge_info_cleans_backward_entries() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), true).unwrap();
        index.add_pair_info(info(1, 3, 20.0, 1.0, 0.0), true).unwrap();
        index.add_pair_info(info(2, 3, 5.0, 1.0, 0.0), true).unwrap();
        index.remove_edge_info(EdgeId(1));
        assert!(index.edge_info(EdgeId(1)).is_empty());
        assert!(index.edge_pair_info(EdgeId(2), EdgeId(1)).is_empty());
        assert!(index.edge_pair_info(EdgeId(3), EdgeId(1)).is_empty());
        assert_eq!(index.size(), 2);
    }

    #[test]
    fn test_remove_single_point() {
        let mut index = PairedInfoIndex::new();
        index.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), true).unwrap();
        index.add_pair_info(info(1, 2, 30.0, 1.0, 0.0), true).unwrap();
        assert!(index.remove_pair_info(&info(1, 2, 10.0, 0.0, 0.0)));
        assert!(!index.remove_pair_info(&info(1, 2, 10.0, 0.0, 0.0)));
        assert_eq!(index.edge_pair_info(EdgeId(1), EdgeId(2)).len(), 1);
        assert_eq!(index.size(), 3);
    }

    #[test]
    fn test_add_all_merges_collisions() {
        let mut a = PairedInfoIndex::new();
        let mut b = PairedInfoIndex::new();
        a.add_pair_info(info(1, 2, 10.0, 1.0, 0.0), true).unwrap();
        b.add_pair_info(info(1, 2, 10.0, 2.0, 0.0), true).unwrap();
        b.add_pair_info(info(4, 5, 1.0, 1.0, 0.0), true).unwrap();
        a.add_all(&b).unwrap();
        assert_eq!(a.size(), 4);
        assert_eq!(a.edge_pair_info(EdgeId(2), EdgeId(1))[0].weight, 3.0);
    }

    #[test]
    fn test_graph_split_transfers_proportionally() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let long = graph.add_edge(v[0], v[1], "ACGTACGTACGTA", 1.0).unwrap();
        let other = graph.add_edge(v[1], v[2], "GTAGGCA", 1.0).unwrap();
        graph.discard_events();

        let mut index = PairedInfoIndex::new();
        index.init(&graph).unwrap();
        index.add_point(long, other, Point::new(10.0, 4.0, 0.0), true).unwrap();

        let (left, right) = graph.split_edge(long, 4).unwrap();
        graph.notify(&mut index).unwrap();

        let to_left = index.edge_pair_info(left, other);
        let to_right = index.edge_pair_info(right, other);
        assert!((to_left[0].weight - 1.6).abs() < 1e-9);
        assert!((to_right[0].weight - 2.4).abs() < 1e-9);
        assert_eq!(to_left[0].d, 10.0);
        assert_eq!(to_right[0].d, 6.0);
        assert!(index.edge_info(long).is_empty());
        assert!(index.edge_pair_info(other, long).is_empty());
    }

    #[test]
    fn test_graph_merge_shifts_distances() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTAC", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "TACGGA", 1.0).unwrap();
        let c = graph.add_edge(v[2], v[3], "GGATTT", 1.0).unwrap();
        graph.discard_events();

        let mut index = PairedInfoIndex::new();
        index.init(&graph).unwrap();
        index.add_point(b, c, Point::new(3.0, 1.0, 0.0), true).unwrap();

        let merged = graph.merge_path(&[a, b]).unwrap();
        graph.notify(&mut index).unwrap();

        let points = index.edge_pair_info(merged, c);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].d, 6.0);
        assert_eq!(index.edge_pair_info(c, merged)[0].d, -6.0);
    }
}
