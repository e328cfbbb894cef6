//! Composite extension
//!
//! [`CompositeExtender`] tries its extenders in order at every step and
//! drives growth over all seeds. A [`RepeatDetector`] notices when a growing
//! path runs along the tail of a path grown earlier, and the two are merged
//! at their shared stretch instead of duplicating it.

use std::collections::BTreeSet;
use tracing::{debug, info};

use super::bidirectional_path::{compare_paths, BidirectionalPath, Gap, PathId};
use super::coverage_map::UsedUniqueStorage;
use super::extender::{
    rebuild_conjugate, GrowContext, LoopDetectingExtender, MultiStep, PathExtender, RnaScaffolding,
    ScaffoldingStep, SimpleStep,
};
use super::extension_chooser::{ExtensionChooser, PairedInfoChooser, ScaffoldingChooser, TrivialExtensionChooser};
use super::gap_analyzer::CompositeGapAnalyzer;
use super::path_container::PathContainer;
use crate::core::assembly_graph::AssemblyGraph;
use crate::core::paired_reads::LibraryStats;
use crate::paired_info::PairedInfoIndex;
use crate::utils::configuration::{GapCloserConfig, PathExtendConfig};

/// Finds an already grown path sharing a long tail with the current one.
#[derive(Debug, Clone)]
pub struct RepeatDetector {
    repeat_length: usize,
    used: BTreeSet<PathId>,
}

impl RepeatDetector {
    pub fn new(max_repeat_length: usize) -> Self {
        Self {
            repeat_length: 2 * max_repeat_length,
            used: BTreeSet::new(),
        }
    }

    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// Number of edges at the end of `p1` that also end at some position of
    /// `p2`, gaps included; at least 1 when `p2` contains the last edge.
    pub fn max_common_size(p1: &BidirectionalPath<'_>, p2: &BidirectionalPath<'_>) -> usize {
        let Some(last) = p1.back() else {
            return 0;
        };
        let pos1 = p1.len() - 1;
        p2.find_all(last)
            .into_iter()
            .map(|pos2| Self::common_size_at(p1, pos1, p2, pos2))
            .max()
            .unwrap_or(0)
    }

    fn common_size_at(p1: &BidirectionalPath<'_>, pos1: usize, p2: &BidirectionalPath<'_>, pos2: usize) -> usize {
        let mut i1 = pos1;
        let mut i2 = pos2;
        while i1 > 0 && i2 > 0 && p1.at(i1) == p2.at(i2) && p1.gap_at(i1) == p2.gap_at(i2) {
            i1 -= 1;
            i2 -= 1;
        }
        if p1.at(i1) == p2.at(i2) {
            pos1 - i1 + 1
        } else {
            (pos1 - i1).max(1)
        }
    }

    /// The path sharing the longest tail with `path` (longer than the repeat
    /// length), with the number of shared edges. Marks `path` as grown.
    pub fn repeat_path(&mut self, path: &BidirectionalPath<'_>, ctx: &GrowContext<'_>) -> Option<(PathId, usize)> {
        let back = path.back()?;
        let mut best: Option<(PathId, usize)> = None;
        for id in ctx.cover.covering_paths(back) {
            if !self.used.contains(&id) || id == path.id() || id == path.id() ^ 1 {
                continue;
            }
            let Some(other) = ctx.paths.by_id(id) else {
                continue;
            };
            let common = Self::max_common_size(path, other);
            if common == 0 {
                continue;
            }
            let repeat = path.length_at(path.len() - common);
            if repeat > self.repeat_length && best.map_or(true, |(_, size)| common > size) {
                debug!("Repeat of length {} shared with path {}", repeat, id);
                best = Some((id, common));
            }
        }
        self.used.insert(path.id());
        best
    }
}

pub struct CompositeExtender<'g> {
    graph: &'g AssemblyGraph,
    extenders: Vec<Box<dyn PathExtender<'g> + 'g>>,
    repeat_detector: RepeatDetector,
    detect_repeats_online: bool,
    max_repeat_length: usize,
    max_grow_rounds: usize,
    min_contig_length: usize,
    use_unique_edges: bool,
}

impl<'g> CompositeExtender<'g> {
    pub fn new(
        graph: &'g AssemblyGraph,
        extenders: Vec<Box<dyn PathExtender<'g> + 'g>>,
        config: &PathExtendConfig,
    ) -> Self {
        Self {
            graph,
            extenders,
            repeat_detector: RepeatDetector::new(config.max_repeat_length),
            detect_repeats_online: config.detect_repeats_online,
            max_repeat_length: config.max_repeat_length,
            max_grow_rounds: config.max_grow_rounds,
            min_contig_length: config.min_contig_length,
            use_unique_edges: config.use_unique_edges,
        }
    }

    /// The usual extender stack: a paired-info (or, without paired info, a
    /// trivial) extender, then optionally a scaffolder.
    pub fn from_config(
        graph: &'g AssemblyGraph,
        index: &'g PairedInfoIndex,
        library: &LibraryStats,
        config: &PathExtendConfig,
        gap_config: &GapCloserConfig,
    ) -> Self {
        let insert_size = library.is_max();
        let investigate = config.investigate_short_loops;
        let use_cov = config.resolve_short_loops;

        let chooser: Box<dyn ExtensionChooser + 'g> = if index.is_empty() {
            Box::new(TrivialExtensionChooser)
        } else {
            Box::new(PairedInfoChooser::new(
                index,
                library.clone(),
                config.weight_threshold,
                config.single_threshold,
            ))
        };
        let mut extenders: Vec<Box<dyn PathExtender<'g> + 'g>> = Vec::new();
        if config.multi_extend {
            let step = MultiStep::new(graph, chooser, investigate);
            extenders.push(Box::new(LoopDetectingExtender::new(graph, step, insert_size, investigate, use_cov)));
        } else {
            let step = SimpleStep::new(graph, chooser, investigate);
            extenders.push(Box::new(LoopDetectingExtender::new(graph, step, insert_size, investigate, use_cov)));
        }

        if config.scaffolding {
            let chooser = ScaffoldingChooser::new(graph, index, library.clone(), config.weight_threshold);
            let mut step = ScaffoldingStep::new(
                graph,
                Box::new(chooser),
                Box::new(CompositeGapAnalyzer::from_config(graph, gap_config)),
                config.avoid_rc_connections,
                config.check_sink,
            );
            if config.rna_scaffolding {
                let strict = ScaffoldingChooser::new(graph, index, library.clone(), 2.0 * config.weight_threshold);
                step = step.with_rna(RnaScaffolding {
                    strict_chooser: Box::new(strict),
                    min_overlap: config.rna_min_overlap,
                });
            }
            extenders.push(Box::new(LoopDetectingExtender::new(graph, step, insert_size, false, false)));
        }
        debug!("Built composite extender with {} extenders", extenders.len());
        Self::new(graph, extenders, config)
    }

    fn unique_storage(&self) -> UsedUniqueStorage {
        if self.use_unique_edges {
            UsedUniqueStorage::from_length(self.graph, self.max_repeat_length)
        } else {
            UsedUniqueStorage::default()
        }
    }

    /// Splice `path` onto the path it repeats. Returns whether a merge
    /// happened.
    fn merge_repeat(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        let Some((repeat_id, repeat_size)) = self.repeat_detector.repeat_path(path, ctx) else {
            return false;
        };
        let Some(repeat_path) = ctx.paths.by_id(repeat_id) else {
            return false;
        };
        let size = path.len();
        let repeat = path.sub_path(size - repeat_size);
        let Some(begin_repeat) = repeat_path.find_last(&repeat) else {
            debug!("Repeat of path {} not found in path {}", path.id(), repeat_id);
            return false;
        };
        let end_repeat = begin_repeat + repeat_size;
        debug!(
            "Merging {} shared edges of path {} into path {}",
            repeat_size,
            path.id(),
            repeat_id
        );

        let begin1 = path.sub_path_range(0, size - repeat_size);
        let begin2 = repeat_path.sub_path_range(0, begin_repeat);
        let end2 = repeat_path.sub_path(end_repeat);
        let end_gap = if end_repeat < repeat_path.len() {
            repeat_path.gap_at(end_repeat)
        } else {
            Gap::default()
        };
        let gap_in_repeat_path = repeat_path.gap_at(begin_repeat);
        let last = compare_paths(
            0,
            0,
            &path.sub_path_range(0, size - repeat_size + 1).conjugate(),
            &repeat_path.sub_path_range(0, begin_repeat + 1).conjugate(),
            self.max_repeat_length,
        );
        let mut gap = path.gap_at(size - repeat_size);

        path.clear();
        let Some(repeat_path) = ctx.paths.by_id_mut(repeat_id) else {
            return false;
        };
        repeat_path.clear();
        if begin2.is_empty() || last.1 != 0 {
            path.push_back_path(&begin1, Gap::default());
            repeat_path.push_back_path(&begin2, Gap::default());
        } else {
            gap = gap_in_repeat_path;
            path.push_back_path(&begin2, Gap::default());
            repeat_path.push_back_path(&begin1, Gap::default());
        }
        path.push_back_path(&repeat, gap);
        path.push_back_path(&end2, end_gap);
        ctx.refresh_partner(repeat_id);
        true
    }

    /// Grow every seed not yet covered, together with its conjugate.
    pub fn grow_all_paths(&mut self, seeds: &PathContainer<'g>, ctx: &mut GrowContext<'g>) {
        let graph = self.graph;
        let symmetric = graph.is_symmetric();
        for i in 0..seeds.len() {
            let seed = seeds.get(i);
            if ctx.used.unique_check_enabled() {
                let mut was_used = false;
                for e in seed.edges() {
                    if ctx.used.is_used_and_unique(e) {
                        was_used = true;
                        break;
                    }
                    ctx.used.insert(graph, e);
                }
                if was_used {
                    debug!("Seed {} starts on a used unique edge", i);
                    continue;
                }
            }
            if ctx.cover.is_covered(seed) {
                continue;
            }

            let index = ctx.add_path(seed.clone()) / 2;
            let (stored, stored_conjugate) = ctx.paths.pair_mut(index);
            let mut path = std::mem::replace(stored, BidirectionalPath::new(graph));
            let mut conjugate = std::mem::replace(stored_conjugate, BidirectionalPath::new(graph));

            let mut rounds = 0;
            loop {
                let before = path.length();
                rounds += 1;
                self.grow_path(&mut path, ctx);
                if symmetric {
                    rebuild_conjugate(&mut ctx.cover, &path, &mut conjugate, true);
                    self.grow_path(&mut conjugate, ctx);
                    rebuild_conjugate(&mut ctx.cover, &conjugate, &mut path, true);
                }
                if rounds >= self.max_grow_rounds || path.length() == before {
                    break;
                }
            }

            if path.check_conjugate_end(self.max_repeat_length) > 0 {
                debug!("Trimmed palindromic end of path {}", path.id());
            }
            ctx.cover.sync(&mut path);
            rebuild_conjugate(&mut ctx.cover, &path, &mut conjugate, symmetric);
            debug!("Grew {}", path);

            let (stored, stored_conjugate) = ctx.paths.pair_mut(index);
            *stored = path;
            *stored_conjugate = conjugate;
        }
    }

    /// Grow all seeds from scratch and keep paths of at least the minimal
    /// contig length.
    pub fn grow_all(&mut self, seeds: &PathContainer<'g>) -> PathContainer<'g> {
        info!("🌱 Growing paths from {} seeds", seeds.len());
        self.repeat_detector.clear();
        let mut ctx = GrowContext::new(self.graph, self.unique_storage());
        self.grow_all_paths(seeds, &mut ctx);

        let mut paths = ctx.paths;
        paths.filter_by_length(self.min_contig_length);
        info!(
            "✅ Path extension produced {} paths, total length {}",
            paths.len(),
            paths.total_length()
        );
        paths
    }
}

impl<'g> PathExtender<'g> for CompositeExtender<'g> {
    fn make_grow_step(&mut self, path: &mut BidirectionalPath<'g>, ctx: &mut GrowContext<'g>) -> bool {
        if self.detect_repeats_online && self.merge_repeat(path, ctx) {
            return false;
        }
        self.extenders
            .iter_mut()
            .any(|extender| extender.make_grow_step(path, ctx))
    }
}
