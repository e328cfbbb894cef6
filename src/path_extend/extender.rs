//! Path Extenders
//! ==============
//!
//! One extender grows one path by one step at a time. Every extender is a
//! [`LoopDetectingExtender`] wrapped around a [`GrowStep`], the plain
//! "choose the next edge" logic:
//! - [`SimpleStep`] follows the only candidate the chooser accepts
//! - [`MultiStep`] also forks the path on a two-edge bulge
//! - [`ScaffoldingStep`] jumps from a sink to a distant source edge over a
//!   gap checked by a [`GapAnalyzer`]
//!
//! **Layman's Explanation:**
//! Walking along the graph, the extender asks at every junction which way
//! the paired reads point. Before and after each move it looks for two
//! traps: running around a small roundabout forever, and repeating a stretch
//! of road longer than a read pair can span.
//!
//! **Expert Level:**
//! - Insert-size cycles are cut and remembered so later paths stop early
//! - Short loops go to a coverage resolver or a paired-info resolver
//! - Unique edges claimed by one path cannot be taken by another

use tracing::debug;

use super::bidirectional_path::{BidirectionalPath, Gap, PathId};
use super::coverage_map::{GraphCoverageMap, UsedUniqueStorage};
use super::extension_chooser::{EdgeWithDistance, ExtensionChooser, WeightCounter};
use super::gap_analyzer::{GapAnalyzer, GapDescription};
use super::loop_detector::{edge_in_short_loop, prev_edge_in_short_loop, InsertSizeLoopDetector};
use super::loop_resolver::{CovShortLoopResolver, LoopResolver, ShortLoopResolver};
use super::path_container::PathContainer;
use crate::core::assembly_graph::{AssemblyGraph, EdgeId};

/// Shared state of one growth run.
pub struct GrowContext<'g> {
    graph: &'g AssemblyGraph,
    /// Grown paths with their conjugates
    pub paths: PathContainer<'g>,
    pub cover: GraphCoverageMap,
    pub used: UsedUniqueStorage,
}

impl<'g> GrowContext<'g> {
    pub fn new(graph: &'g AssemblyGraph, used: UsedUniqueStorage) -> Self {
        Self {
            graph,
            paths: PathContainer::new(),
            cover: GraphCoverageMap::new(),
            used,
        }
    }

    pub fn graph(&self) -> &'g AssemblyGraph {
        self.graph
    }

    /// Store `path` with its conjugate and index both in the coverage map.
    /// Conjugates only count as coverage on symmetric graphs.
    pub fn add_path(&mut self, path: BidirectionalPath<'g>) -> PathId {
        let index = self.paths.add_path(path);
        let symmetric = self.graph.is_symmetric();
        let (path, conjugate) = self.paths.pair_mut(index);
        self.cover.subscribe(path);
        if symmetric {
            self.cover.subscribe(conjugate);
        }
        2 * index
    }

    /// Rebuild the partner of path `id` from its current edges.
    pub fn refresh_partner(&mut self, id: PathId) {
        let symmetric = self.graph.is_symmetric();
        let (path, conjugate) = self.paths.pair_mut(id / 2);
        let (source, target) = if id % 2 == 0 {
            (path, conjugate)
        } else {
            (conjugate, path)
        };
        self.cover.sync(source);
        rebuild_conjugate(&mut self.cover, source, target, symmetric);
    }
}

/// Replace `target` by the reverse complement of `source`, keeping the id
/// and the coverage map in step.
pub(crate) fn rebuild_conjugate<'g>(
    cover: &mut GraphCoverageMap,
    source: &BidirectionalPath<'g>,
    target: &mut BidirectionalPath<'g>,
    subscribe: bool,
) {
    let id = target.id();
    if subscribe {
        cover.sync(target);
        cover.unsubscribe(target);
    }
    *target = source.conjugate();
    target.set_id(id);
    if subscribe {
        cover.subscribe(target);
    }
}

pub trait PathExtender<'g> {
    /// Extend `path` by one step; `false` when it cannot grow any further.
    fn make_grow_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool;

    /// Step until stuck. Returns whether anything was added.
    fn grow_path(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        let mut grew = false;
        while self.make_grow_step(path, ctx) {
            ctx.cover.sync(path);
            grew = true;
        }
        ctx.cover.sync(path);
        grew
    }
}

/// The plain extension logic wrapped by [`LoopDetectingExtender`].
pub trait GrowStep<'g> {
    fn simple_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool;

    /// Paired weights used to resolve short loops, if the step has any.
    fn weight_counter(&self) -> Option<&dyn WeightCounter>;
}

pub struct LoopDetectingExtender<'g, S> {
    graph: &'g AssemblyGraph,
    step: S,
    detector: InsertSizeLoopDetector<'g>,
    investigate_short_loops: bool,
    use_coverage_resolver: bool,
}

impl<'g, S: GrowStep<'g>> LoopDetectingExtender<'g, S> {
    pub fn new(
        graph: &'g AssemblyGraph,
        step: S,
        insert_size: usize,
        investigate_short_loops: bool,
        use_coverage_resolver: bool,
    ) -> Self {
        Self {
            graph,
            step,
            detector: InsertSizeLoopDetector::new(graph, insert_size),
            investigate_short_loops,
            use_coverage_resolver,
        }
    }

    pub fn loop_detector(&self) -> &InsertSizeLoopDetector<'g> {
        &self.detector
    }

    fn can_investigate_short_loop(&self) -> bool {
        self.investigate_short_loops
            && (self.use_coverage_resolver || self.step.weight_counter().is_some())
    }

    /// Cut an insert-size cycle off the path end and remember it.
    fn detect_cycle(&mut self, path: &mut BidirectionalPath<'g>) -> bool {
        if !self.detector.check_cycled(path) {
            return false;
        }
        match self.detector.remove_cycle(path) {
            Some(pos) => {
                self.detector.add_cycled_edges(path, pos);
                true
            }
            None => false,
        }
    }

    fn resolve_short_loop(&self, path: &mut BidirectionalPath<'g>) -> bool {
        if self.use_coverage_resolver {
            self.resolve_short_loop_with(path, &CovShortLoopResolver::new(self.graph))
        } else if let Some(counter) = self.step.weight_counter() {
            self.resolve_short_loop_with(path, &LoopResolver::new(self.graph, counter))
        } else {
            false
        }
    }

    fn resolve_short_loop_with(&self, path: &mut BidirectionalPath<'g>, resolver: &dyn ShortLoopResolver) -> bool {
        let mut length = path.length();
        let mut result = false;
        while path.back().is_some_and(|e| edge_in_short_loop(self.graph, e)) {
            resolver.resolve_short_loop(path);
            if path.length() == length {
                return result;
            }
            result = true;
            length = path.length();
        }
        true
    }

    fn in_short_loop(&self, path: &BidirectionalPath<'g>) -> bool {
        path.back().is_some_and(|e| edge_in_short_loop(self.graph, e))
    }
}

impl<'g, S: GrowStep<'g>> PathExtender<'g> for LoopDetectingExtender<'g, S> {
    fn make_grow_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        if self.detector.in_existing_loop(path) {
            debug!("Path {} is in an existing loop", path.id());
            return false;
        }
        let investigate = self.can_investigate_short_loop();

        if self.detect_cycle(path) {
            false
        } else if investigate && self.use_coverage_resolver && self.in_short_loop(path) {
            debug!("Edge in short loop");
            self.resolve_short_loop(path)
        } else if investigate && self.use_coverage_resolver && prev_edge_in_short_loop(self.graph, path) {
            debug!("Previous edge in short loop");
            path.pop_back();
            self.resolve_short_loop(path)
        } else {
            let result = self.step.simple_step(path, ctx);
            if self.detect_cycle(path) {
                false
            } else if investigate && self.in_short_loop(path) {
                debug!("Edge in short loop after step");
                self.resolve_short_loop(path)
            } else if investigate && prev_edge_in_short_loop(self.graph, path) {
                debug!("Previous edge in short loop after step");
                path.pop_back();
                self.resolve_short_loop(path)
            } else {
                result
            }
        }
    }
}

/// Successors of the path end, all at distance 0.
fn following_edges(graph: &AssemblyGraph, path: &BidirectionalPath<'_>) -> Vec<EdgeWithDistance> {
    path.back()
        .map(|e| {
            graph
                .outgoing_edges(graph.edge_end(e))
                .iter()
                .map(|&next| EdgeWithDistance::new(next, 0))
                .collect()
        })
        .unwrap_or_default()
}

/// A weight-based chooser must not step into (or stay on) a short loop it is
/// not allowed to investigate.
fn blocked_by_short_loop(
    graph: &AssemblyGraph,
    chooser: &dyn ExtensionChooser,
    investigate_short_loops: bool,
    path: &BidirectionalPath<'_>,
    candidate: EdgeId,
) -> bool {
    !investigate_short_loops
        && chooser.weight_counter_based()
        && (path.back().is_some_and(|e| edge_in_short_loop(graph, e)) || edge_in_short_loop(graph, candidate))
}

fn filter_candidates(
    graph: &AssemblyGraph,
    chooser: &dyn ExtensionChooser,
    investigate_short_loops: bool,
    path: &BidirectionalPath<'_>,
) -> Option<Vec<EdgeWithDistance>> {
    if path.is_empty() {
        return None;
    }
    let candidates = following_edges(graph, path);
    if candidates.len() == 1
        && blocked_by_short_loop(graph, chooser, investigate_short_loops, path, candidates[0].edge)
    {
        return None;
    }
    Some(chooser.filter(path, &candidates))
}

/// Claim a unique edge; fails when another path already holds it.
fn claim_unique(ctx: &mut GrowContext<'_>, e: EdgeId) -> bool {
    if ctx.used.unique_check_enabled() {
        if ctx.used.is_used_and_unique(e) {
            debug!("Edge {} is already used by a unique path", e);
            return false;
        }
        let graph = ctx.graph;
        ctx.used.insert(graph, e);
    }
    true
}

pub struct SimpleStep<'g> {
    graph: &'g AssemblyGraph,
    chooser: Box<dyn ExtensionChooser + 'g>,
    investigate_short_loops: bool,
}

impl<'g> SimpleStep<'g> {
    pub fn new(
        graph: &'g AssemblyGraph,
        chooser: Box<dyn ExtensionChooser + 'g>,
        investigate_short_loops: bool,
    ) -> Self {
        Self {
            graph,
            chooser,
            investigate_short_loops,
        }
    }
}

impl<'g> GrowStep<'g> for SimpleStep<'g> {
    fn simple_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        let Some(candidates) = filter_candidates(self.graph, self.chooser.as_ref(), self.investigate_short_loops, path)
        else {
            return false;
        };
        let [candidate] = candidates[..] else {
            return false;
        };
        if blocked_by_short_loop(self.graph, self.chooser.as_ref(), self.investigate_short_loops, path, candidate.edge) {
            return false;
        }
        if !claim_unique(ctx, candidate.edge) {
            return false;
        }
        path.push_back_with_gap(candidate.edge, Gap::new(candidate.distance));
        true
    }

    fn weight_counter(&self) -> Option<&dyn WeightCounter> {
        self.chooser.weight_counter()
    }
}

/// Like [`SimpleStep`], but a two-candidate bulge forks the path: the first
/// branch continues, the other is stored as a new path.
pub struct MultiStep<'g> {
    graph: &'g AssemblyGraph,
    chooser: Box<dyn ExtensionChooser + 'g>,
    investigate_short_loops: bool,
}

impl<'g> MultiStep<'g> {
    pub fn new(
        graph: &'g AssemblyGraph,
        chooser: Box<dyn ExtensionChooser + 'g>,
        investigate_short_loops: bool,
    ) -> Self {
        Self {
            graph,
            chooser,
            investigate_short_loops,
        }
    }

    fn is_bulge(&self, candidates: &[EdgeWithDistance]) -> bool {
        let first = candidates[0].edge;
        let start = self.graph.edge_start(first);
        let end = self.graph.edge_end(first);
        candidates
            .iter()
            .all(|c| self.graph.edge_start(c.edge) == start && self.graph.edge_end(c.edge) == end)
    }
}

impl<'g> GrowStep<'g> for MultiStep<'g> {
    fn simple_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        let Some(candidates) = filter_candidates(self.graph, self.chooser.as_ref(), self.investigate_short_loops, path)
        else {
            return false;
        };
        let Some(last) = candidates.last() else {
            return false;
        };
        if blocked_by_short_loop(self.graph, self.chooser.as_ref(), self.investigate_short_loops, path, last.edge) {
            return false;
        }
        match candidates.len() {
            1 => {}
            2 if self.is_bulge(&candidates) => {
                for other in &candidates[1..] {
                    let mut fork = path.clone();
                    fork.push_back_with_gap(other.edge, Gap::new(other.distance));
                    let id = ctx.add_path(fork);
                    debug!("Forked path {} from {} at bulge edge {}", id, path.id(), other.edge);
                }
            }
            _ => return false,
        }
        let first = candidates[0];
        path.push_back_with_gap(first.edge, Gap::new(first.distance));
        true
    }

    fn weight_counter(&self) -> Option<&dyn WeightCounter> {
        self.chooser.weight_counter()
    }
}

/// Extra chooser tried without the overlap requirement when the main one
/// cannot place an overlapping link.
pub struct RnaScaffolding<'g> {
    pub strict_chooser: Box<dyn ExtensionChooser + 'g>,
    pub min_overlap: i64,
}

pub struct ScaffoldingStep<'g> {
    graph: &'g AssemblyGraph,
    chooser: Box<dyn ExtensionChooser + 'g>,
    gap_analyzer: Box<dyn GapAnalyzer + 'g>,
    sources: Vec<EdgeWithDistance>,
    avoid_rc_connections: bool,
    check_sink: bool,
    rna: Option<RnaScaffolding<'g>>,
}

impl<'g> ScaffoldingStep<'g> {
    pub fn new(
        graph: &'g AssemblyGraph,
        chooser: Box<dyn ExtensionChooser + 'g>,
        gap_analyzer: Box<dyn GapAnalyzer + 'g>,
        avoid_rc_connections: bool,
        check_sink: bool,
    ) -> Self {
        let sources = graph
            .edges()
            .filter(|&e| graph.is_dead_start(graph.edge_start(e)))
            .map(|e| EdgeWithDistance::new(e, 0))
            .collect();
        Self {
            graph,
            chooser,
            gap_analyzer,
            sources,
            avoid_rc_connections,
            check_sink,
            rna: None,
        }
    }

    pub fn with_rna(mut self, rna: RnaScaffolding<'g>) -> Self {
        self.rna = Some(rna);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn add_candidate(
        &self,
        path: &mut BidirectionalPath<'g>,
        ctx: &mut GrowContext<'g>,
        candidates: &[EdgeWithDistance],
        min_overlap: Option<i64>,
    ) -> bool {
        let [EdgeWithDistance { edge, distance }] = candidates[..] else {
            return false;
        };
        let Some(back) = path.back() else {
            return false;
        };
        if edge == back || (self.avoid_rc_connections && edge == self.graph.conjugate(back)) {
            return false;
        }
        let mut extended = path.clone();
        extended.push_back(edge);
        if InsertSizeLoopDetector::check_cycled_non_is(&extended) {
            return false;
        }

        let k = self.graph.k();
        let gap = if self.check_sink {
            let description = GapDescription::new(back, edge, distance - k as i64);
            let Some(fixed) = self.gap_analyzer.fix_gap(&description) else {
                debug!("Gap between {} and {} could not be fixed", back, edge);
                return false;
            };
            let gap = fixed.to_gap(k);
            if min_overlap.is_some_and(|min| gap.overlap_after_trim(k) < min) {
                return false;
            }
            gap
        } else {
            if distance <= k as i64 {
                return false;
            }
            Gap::new(distance)
        };

        if !claim_unique(ctx, edge) {
            return false;
        }
        debug!("Scaffolding {} -> {} with gap {}", back, edge, gap.gap);
        path.push_back_with_gap(edge, gap);
        true
    }
}

impl<'g> GrowStep<'g> for ScaffoldingStep<'g> {
    fn simple_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        let Some(back) = path.back() else {
            return false;
        };
        if self.check_sink && !self.graph.is_dead_end(self.graph.edge_end(back)) {
            return false;
        }
        match &self.rna {
            None => {
                let candidates = self.chooser.filter(path, &self.sources);
                self.add_candidate(path, ctx, &candidates, None)
            }
            Some(rna) => {
                let candidates = self.chooser.filter(path, &self.sources);
                if self.add_candidate(path, ctx, &candidates, Some(rna.min_overlap)) {
                    return true;
                }
                let strict = rna.strict_chooser.filter(path, &self.sources);
                self.add_candidate(path, ctx, &strict, None)
            }
        }
    }

    fn weight_counter(&self) -> Option<&dyn WeightCounter> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;
    use crate::core::paired_reads::LibraryStats;
    use crate::paired_info::{PairedInfoIndex, Point};
    use crate::path_extend::extension_chooser::{ScaffoldingChooser, TrivialExtensionChooser};

    struct AcceptAll;

    impl ExtensionChooser for AcceptAll {
        fn filter(&self, _path: &BidirectionalPath<'_>, candidates: &[EdgeWithDistance]) -> Vec<EdgeWithDistance> {
            candidates.to_vec()
        }
    }

    struct KeepGap;

    impl GapAnalyzer for KeepGap {
        fn fix_gap(&self, gap: &GapDescription) -> Option<GapDescription> {
            Some(*gap)
        }
    }

    fn trivial<'g>(graph: &'g AssemblyGraph, insert_size: usize, use_cov: bool) -> LoopDetectingExtender<'g, SimpleStep<'g>> {
        let step = SimpleStep::new(graph, Box::new(TrivialExtensionChooser), true);
        LoopDetectingExtender::new(graph, step, insert_size, true, use_cov)
    }

    #[test]
    fn test_simple_extension_follows_chain() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTA", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "TAGGC", 1.0).unwrap();
        let c = graph.add_edge(v[2], v[3], "GCTTA", 1.0).unwrap();

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let mut extender = trivial(&graph, 100, false);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(extender.grow_path(&mut path, &mut ctx));
        assert_eq!(path, BidirectionalPath::from_edges(&graph, &[a, b, c]));
    }

    #[test]
    fn test_short_loop_resolved_by_coverage() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let e_in = graph.add_edge(v[0], v[1], "AACC", 20.0).unwrap();
        let fwd = graph.add_edge(v[1], v[2], "CCGG", 60.0).unwrap();
        let back = graph.add_edge(v[2], v[1], "GGTCC", 20.0).unwrap();
        let out = graph.add_edge(v[2], v[3], "GGAA", 20.0).unwrap();

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let mut extender = trivial(&graph, 1000, true);
        let mut path = BidirectionalPath::from_edges(&graph, &[e_in]);
        extender.grow_path(&mut path, &mut ctx);
        assert_eq!(
            path,
            BidirectionalPath::from_edges(&graph, &[e_in, fwd, back, fwd, out])
        );
    }

    #[test]
    fn test_insert_size_cycle_stops_growth() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v0 = graph.add_vertex();
        let v1 = graph.add_vertex();
        let a = graph.add_edge(v0, v1, "ACGTA", 1.0).unwrap(); // 3
        let b = graph.add_edge(v1, v0, "TAGAC", 1.0).unwrap(); // 3

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let step = SimpleStep::new(&graph, Box::new(TrivialExtensionChooser), false);
        let mut extender = LoopDetectingExtender::new(&graph, step, 5, false, false);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        extender.grow_path(&mut path, &mut ctx);
        assert_eq!(path, BidirectionalPath::from_edges(&graph, &[a, b]));
        assert_eq!(extender.loop_detector().cycle_count(), 1);
        assert!(!extender.make_grow_step(&mut path, &mut ctx));
    }

    #[test]
    fn test_used_unique_edge_blocks_second_path() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTA", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "TAGGCATTGC", 1.0).unwrap();

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::from_length(&graph, 5));
        ctx.used.insert(&graph, b);
        let mut extender = trivial(&graph, 100, false);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(!extender.grow_path(&mut path, &mut ctx));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_multi_step_forks_bulge() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTA", 1.0).unwrap();
        let x = graph.add_edge(v[1], v[2], "TACCGG", 1.0).unwrap();
        let y = graph.add_edge(v[1], v[2], "TATTGG", 1.0).unwrap();

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let step = MultiStep::new(&graph, Box::new(AcceptAll), false);
        let mut extender = LoopDetectingExtender::new(&graph, step, 100, false, false);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(extender.make_grow_step(&mut path, &mut ctx));
        assert_eq!(path, BidirectionalPath::from_edges(&graph, &[a, x]));
        assert_eq!(ctx.paths.len(), 1);
        assert_eq!(ctx.paths.get(0), &BidirectionalPath::from_edges(&graph, &[a, y]));
    }

    fn scaffold_fixture() -> (AssemblyGraph, EdgeId, EdgeId, PairedInfoIndex) {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTACGTACGT", 1.0).unwrap(); // 10
        let s = graph.add_edge(v[2], v[3], "CCCCCCCCCCCC", 1.0).unwrap(); // 10
        let mut index = PairedInfoIndex::new();
        index.add_point(a, s, Point::new(30.0, 3.0, 0.0), true).unwrap();
        (graph, a, s, index)
    }

    fn library() -> LibraryStats {
        LibraryStats {
            read_length: 10,
            insert_size: 40,
            insert_size_deviation: 2.0,
            avg_coverage: 10.0,
        }
    }

    #[test]
    fn test_scaffolding_jumps_from_sink() {
        let (graph, a, s, index) = scaffold_fixture();
        let chooser = ScaffoldingChooser::new(&graph, &index, library(), 0.5);
        let step = ScaffoldingStep::new(&graph, Box::new(chooser), Box::new(KeepGap), true, true);
        assert_eq!(step.source_count(), 2);

        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let mut extender = LoopDetectingExtender::new(&graph, step, 100, false, false);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(extender.make_grow_step(&mut path, &mut ctx));
        assert_eq!(path.back(), Some(s));
        assert_eq!(path.gap_at(1), Gap::new(20));
    }

    #[test]
    fn test_rna_scaffolding_falls_back_to_strict_chooser() {
        let (graph, a, s, index) = scaffold_fixture();
        let make = |strict_threshold: f64| {
            let chooser = ScaffoldingChooser::new(&graph, &index, library(), 0.5);
            let strict = ScaffoldingChooser::new(&graph, &index, library(), strict_threshold);
            ScaffoldingStep::new(&graph, Box::new(chooser), Box::new(KeepGap), true, true).with_rna(RnaScaffolding {
                strict_chooser: Box::new(strict),
                min_overlap: 0,
            })
        };
        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());

        // a 20 gap is no overlap, so only the strict chooser can place it
        let mut blocked = make(100.0);
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(!blocked.simple_step(&mut path, &mut ctx));

        let mut relaxed = make(1.0);
        assert!(relaxed.simple_step(&mut path, &mut ctx));
        assert_eq!(path.back(), Some(s));
    }

    #[test]
    fn test_scaffolding_without_sink_check_needs_real_gap() {
        let (graph, a, _, index) = scaffold_fixture();
        let chooser = ScaffoldingChooser::new(&graph, &index, library(), 0.5);
        let mut step = ScaffoldingStep::new(&graph, Box::new(chooser), Box::new(KeepGap), true, false);
        let mut ctx = GrowContext::new(&graph, UsedUniqueStorage::default());
        let mut path = BidirectionalPath::from_edges(&graph, &[a]);
        assert!(step.simple_step(&mut path, &mut ctx));
        assert_eq!(path.gap_at(1), Gap::new(20));
    }
}
