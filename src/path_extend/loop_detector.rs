//! Loop detection
//!
//! Two kinds of cycles stop or redirect path growth:
//! - short loops, a forward edge and a loop-back edge between the same two
//!   vertices, recognised from local topology alone
//! - insert-size cycles, where the path suffix longer than the insert size
//!   already occurred earlier in the same path

use std::collections::BTreeMap;
use tracing::debug;

use super::bidirectional_path::BidirectionalPath;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};

/// For a forward loop edge `e` (`u -> v`), the loop-back edge `v -> u` and
/// the exit leaving `v`. Requires `v` to have one entry and two exits and
/// `u` two entries and one exit.
pub fn loop_and_exit(graph: &AssemblyGraph, e: EdgeId) -> Option<(EdgeId, EdgeId)> {
    let v = graph.edge_end(e);
    let start = graph.edge_start(e);
    if graph.outgoing_edge_count(v) != 2
        || graph.incoming_edge_count(v) != 1
        || graph.outgoing_edge_count(start) != 1
        || graph.incoming_edge_count(start) != 2
    {
        return None;
    }
    let mut loop_edge = None;
    let mut exit = None;
    for &out in graph.outgoing_edges(v) {
        if graph.edge_end(out) == start {
            loop_edge = Some(out);
        } else {
            exit = Some(out);
        }
    }
    Some((loop_edge?, exit?))
}

/// Whether `e` is part of a cycle of at most two edges.
pub fn edge_in_short_loop(graph: &AssemblyGraph, e: EdgeId) -> bool {
    let start = graph.edge_start(e);
    let end = graph.edge_end(e);
    graph
        .outgoing_edges(end)
        .iter()
        .any(|&out| graph.edge_end(out) == start)
}

/// Whether the last two edges of `path` go around a short loop and come back.
pub fn prev_edge_in_short_loop(graph: &AssemblyGraph, path: &BidirectionalPath<'_>) -> bool {
    if path.len() <= 1 {
        return false;
    }
    let e2 = path.at(path.len() - 1);
    let e1 = path.at(path.len() - 2);
    let v2 = graph.edge_end(e1);
    graph.outgoing_edge_count(v2) == 2
        && graph.edge_end(e2) == graph.edge_start(e1)
        && graph.edge_end(e1) == graph.edge_start(e2)
        && edge_in_short_loop(graph, e1)
}

/// Detects a path suffix longer than the insert size that already occurs
/// earlier in the path, and remembers the cycles it cut.
#[derive(Debug, Clone)]
pub struct InsertSizeLoopDetector<'g> {
    graph: &'g AssemblyGraph,
    min_cycle_len: usize,
    cycles: Vec<BidirectionalPath<'g>>,
    cycles_by_edge: BTreeMap<EdgeId, Vec<usize>>,
}

impl<'g> InsertSizeLoopDetector<'g> {
    pub fn new(graph: &'g AssemblyGraph, insert_size: usize) -> Self {
        Self {
            graph,
            min_cycle_len: insert_size,
            cycles: Vec::new(),
            cycles_by_edge: BTreeMap::new(),
        }
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Whether the last two edges of `path` already occur earlier in it.
    pub fn check_cycled_non_is(path: &BidirectionalPath<'_>) -> bool {
        if path.len() <= 2 {
            return false;
        }
        let last = path.sub_path(path.len() - 2);
        path.find_first(&last) != Some(path.len() - 2)
    }

    pub fn check_cycled(&self, path: &BidirectionalPath<'_>) -> bool {
        self.find_cycle_start(path).is_some()
    }

    /// Last position whose suffix is at least the insert size long.
    fn find_pos_is(&self, path: &BidirectionalPath<'_>) -> Option<usize> {
        let lengths = path.suffix_lengths();
        (0..path.len()).rev().find(|&i| lengths[i] >= self.min_cycle_len)
    }

    fn find_cycle_start(&self, path: &BidirectionalPath<'_>) -> Option<usize> {
        let i = self.find_pos_is(path)?;
        let last = path.sub_path(i);
        match path.find_first(&last) {
            Some(pos) if pos != i => Some(pos),
            _ => None,
        }
    }

    /// Cut the repeated suffix and return where the cycle starts.
    pub fn remove_cycle(&self, path: &mut BidirectionalPath<'_>) -> Option<usize> {
        let pos = self.find_cycle_start(path)?;
        let last_edge_pos = self.find_pos_is(path)?;
        debug!("Found insert size cycle at {}, cutting from {}", pos, last_edge_pos);
        path.pop_back_n(path.len() - last_edge_pos);
        Some(pos)
    }

    /// Remember `path[pos..]` (and its reverse complement) as a visited cycle.
    pub fn add_cycled_edges(&mut self, path: &BidirectionalPath<'g>, pos: usize) {
        if pos >= path.len() {
            debug!("Wrong position in insert size cycle");
            return;
        }
        let cycle = path.sub_path(pos);
        let conjugate = self.graph.is_symmetric().then(|| cycle.conjugate());
        self.store(cycle);
        if let Some(conjugate) = conjugate {
            self.store(conjugate);
        }
    }

    /// Whether the path tail runs around a cycle recorded before.
    pub fn in_existing_loop(&self, path: &BidirectionalPath<'_>) -> bool {
        let Some(back) = path.back() else {
            return false;
        };
        let Some(indices) = self.cycles_by_edge.get(&back) else {
            return false;
        };
        for &index in indices {
            let cycle = &self.cycles[index];
            let Some(pos) = path.find_last(cycle) else {
                continue;
            };
            let start = pos + cycle.len();
            let mut last_cycle_pos = start;
            let mut only_cycles = true;
            let mut i = start;
            while i + cycle.len() < path.len() {
                if !path.compare_from(i, cycle) {
                    only_cycles = false;
                    break;
                }
                last_cycle_pos = i + cycle.len();
                i += cycle.len();
            }
            if only_cycles && cycle.compare_from(0, &path.sub_path(last_cycle_pos)) {
                debug!("Path {} is inside a known cycle", path.id());
                return true;
            }
        }
        false
    }

    fn store(&mut self, cycle: BidirectionalPath<'g>) {
        let index = self.cycles.len();
        for e in cycle.edges() {
            let bucket = self.cycles_by_edge.entry(e).or_default();
            if bucket.last() != Some(&index) {
                bucket.push(index);
            }
        }
        self.cycles.push(cycle);
    }
}
