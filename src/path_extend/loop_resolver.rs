//! Short Loop Resolution
//! =====================
//!
//! A short loop is a forward edge `u -> v` together with a loop-back edge
//! `v -> u`. When a path ends on the forward edge, a resolver decides how
//! many times to go around before leaving through the exit.
//!
//! **Layman's Explanation:**
//! The path reached a roundabout. Coverage tells roughly how many laps the
//! genome takes (a stretch read three times as often as its neighbours was
//! probably passed three times). Paired reads can tell the same thing by
//! checking which lap count puts the exit at the distance the mates expect.
//!
//! **Expert Level:**
//! - Coverage: laps = `max(0, min(round(cov(fwd)/c) - 1, round(cov(back)/c)))`
//!   with `c` the mean coverage of the edges flanking the loop
//! - Paired info: try up to [`LoopResolver::ITER_COUNT`] laps, keep the one
//!   maximising the exit weight
//! - An implausibly long loop (longer than the insert size allows) gets one
//!   lap and a wide gap before the exit

use tracing::debug;

use super::bidirectional_path::{BidirectionalPath, Gap};
use super::extension_chooser::WeightCounter;
use super::loop_detector::loop_and_exit;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::core::math;

/// Drop trailing `[next, back]` repetitions so the path ends on the first
/// pass through the loop.
pub fn undo_cycles(path: &mut BidirectionalPath<'_>, next: EdgeId) {
    if path.len() <= 2 {
        return;
    }
    let Some(first) = path.back() else {
        return;
    };
    let second = next;
    while path.len() > 2 && path.at(path.len() - 1) == first && path.at(path.len() - 2) == second {
        path.pop_back_n(2);
    }
}

/// One lap: the loop-back edge, then the forward edge again.
pub fn make_cycle_step(path: &mut BidirectionalPath<'_>, e: EdgeId) {
    let Some(end) = path.back() else {
        return;
    };
    path.push_back(e);
    path.push_back(end);
}

pub trait ShortLoopResolver {
    fn resolve_short_loop(&self, path: &mut BidirectionalPath<'_>);
}

/// Counts laps from coverage.
pub struct CovShortLoopResolver<'g> {
    graph: &'g AssemblyGraph,
}

impl<'g> CovShortLoopResolver<'g> {
    pub fn new(graph: &'g AssemblyGraph) -> Self {
        Self { graph }
    }
}

impl ShortLoopResolver for CovShortLoopResolver<'_> {
    fn resolve_short_loop(&self, path: &mut BidirectionalPath<'_>) {
        let graph = self.graph;
        let Some((loop_edge, exit)) = path.back().and_then(|e| loop_and_exit(graph, e)) else {
            return;
        };
        undo_cycles(path, loop_edge);
        let Some(forward) = path.back() else {
            return;
        };

        let incoming = graph.incoming_edges(graph.edge_end(loop_edge));
        if incoming.len() != 2 {
            return;
        }
        let Some(&entry) = incoming.iter().find(|&&e| e != loop_edge) else {
            return;
        };

        let flank = (graph.coverage(entry) + graph.coverage(exit)) / 2.0;
        if !math::gr(flank, 0.0) {
            debug!("No flanking coverage around loop {}, leaving path as is", loop_edge);
            return;
        }
        let forward_laps = (graph.coverage(forward) / flank).round();
        let back_laps = (graph.coverage(loop_edge) / flank).round();
        let laps = (forward_laps - 1.0).min(back_laps).max(0.0) as usize;
        debug!("Coverage loop resolution: {} laps around {}", laps, loop_edge);

        for _ in 0..laps {
            make_cycle_step(path, loop_edge);
        }
        path.push_back(exit);
    }
}

/// Goes around once, then exits.
pub struct SimpleLoopResolver<'g> {
    graph: &'g AssemblyGraph,
}

impl<'g> SimpleLoopResolver<'g> {
    pub fn new(graph: &'g AssemblyGraph) -> Self {
        Self { graph }
    }
}

impl ShortLoopResolver for SimpleLoopResolver<'_> {
    fn resolve_short_loop(&self, path: &mut BidirectionalPath<'_>) {
        let Some(forward) = path.back() else {
            return;
        };
        if let Some((loop_edge, exit)) = loop_and_exit(self.graph, forward) {
            path.push_back(loop_edge);
            path.push_back(forward);
            path.push_back(exit);
        }
    }
}

/// Chooses the lap count whose exit is best supported by paired info.
pub struct LoopResolver<'a, 'g> {
    graph: &'g AssemblyGraph,
    counter: &'a dyn WeightCounter,
}

impl<'a, 'g> LoopResolver<'a, 'g> {
    pub const ITER_COUNT: usize = 10;
    /// Extra distance put before the exit of a loop too long to measure.
    pub const BASIC_INSERT_SIZE: i64 = 100;

    pub fn new(graph: &'g AssemblyGraph, counter: &'a dyn WeightCounter) -> Self {
        Self { graph, counter }
    }

    fn loop_plausible(&self, forward: EdgeId, loop_edge: EdgeId) -> bool {
        let single_loop = 2 * self.graph.length(forward) + self.graph.length(loop_edge);
        single_loop <= self.counter.library().is_max()
    }

    fn make_best_choice(&self, path: &mut BidirectionalPath<'_>, loop_edge: EdgeId, exit: EdgeId) {
        undo_cycles(path, loop_edge);
        let mut experiment = path.clone();
        let mut max_weight = self.counter.count_weight(&experiment, exit, 0);
        let mut diff = max_weight - self.counter.count_weight(&experiment, loop_edge, 0);
        let mut max_iter = 0;

        for i in 1..=Self::ITER_COUNT {
            if !math::gr(self.counter.count_weight(&experiment, loop_edge, 0), 0.0) {
                continue;
            }
            make_cycle_step(&mut experiment, loop_edge);
            let weight = self.counter.count_weight(&experiment, exit, 0);
            let weight2 = self.counter.count_weight(&experiment, loop_edge, 0);
            let same = math::eq(weight, max_weight);
            if math::gr(weight, max_weight)
                || (same && math::gr(weight - weight2, diff))
                || (same && math::eq(weight - weight2, diff) && i == 1)
            {
                max_weight = weight;
                max_iter = i;
                diff = weight - weight2;
            }
        }
        debug!("Paired loop resolution: {} laps around {}", max_iter, loop_edge);

        let plausible = path
            .back()
            .map_or(true, |forward| self.loop_plausible(forward, loop_edge));
        if !plausible && max_iter > 0 {
            make_cycle_step(path, loop_edge);
            let gap = self.graph.k() as i64 + Self::BASIC_INSERT_SIZE;
            path.push_back_with_gap(exit, Gap::new(gap));
        } else {
            for _ in 0..max_iter {
                make_cycle_step(path, loop_edge);
            }
            path.push_back(exit);
        }
    }
}

impl ShortLoopResolver for LoopResolver<'_, '_> {
    fn resolve_short_loop(&self, path: &mut BidirectionalPath<'_>) {
        if let Some((loop_edge, exit)) = path.back().and_then(|e| loop_and_exit(self.graph, e)) {
            self.make_best_choice(path, loop_edge, exit);
        }
    }
}
