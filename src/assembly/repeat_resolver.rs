//! Paired-information Repeat Resolution
//! ====================================
//!
//! Splits vertices of an assembly graph whose incident edges can be told
//! apart by long-range paired information.
//!
//! **Layman's Explanation:**
//! A repeat is a crossroads where several roads come in and several go out,
//! and the map alone cannot tell which entrance leads to which exit. Read
//! pairs act like travellers who remember both where they came from and
//! where they went next. Grouping travellers whose stories agree tells us
//! which roads belong together, so the crossroads can be replaced by several
//! separate junctions.
//!
//! **Expert Level:**
//! - The resolver works on a copy of the input graph; paired information
//!   keeps pointing at edges of the original graph so distances stay valid
//!   while the copy is being rewritten
//! - Observations around a vertex are chained into `PathInfo`s, linked by a
//!   prefix/inclusion test, and colored by connected components
//! - `multi_split` materializes one vertex copy per color and prunes
//!   low-coverage copies that would only create new dead ends
//! - Optional reverse-complement mode keeps both strands of the copy in sync

use anyhow::{anyhow, Result};
use petgraph::unionfind::UnionFind;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, trace, warn};

use super::distance_counter::FastDistanceCounter;
use super::edge_info::{compare_edge_infos, Direction, EdgeInfo, PathInfo, DISTANCE_SLACK};
use super::paired_data::MixedPairedData;
use crate::core::assembly_graph::{AssemblyGraph, Conjugation, EdgeId, VertexId};
use crate::core::math;
use crate::core::paired_reads::LibraryStats;
use crate::paired_info::PairedInfoIndex;
use crate::utils::configuration::RepeatResolverConfig;

/// Observations lighter than this carry no evidence.
const MIN_WEIGHT: f64 = 1e-8;

/// How edges without usable paired information are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheatingMode {
    /// Vertices with unpaired incident edges are left alone.
    #[default]
    Off,
    /// Copies of locally suspicious edges are tracked as cheaters.
    Tracking,
    /// Additionally, unpaired edges get a color of their own instead of
    /// blocking the split, and observations far from the trusted distance
    /// are ignored.
    Permissive,
}

impl CheatingMode {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => CheatingMode::Off,
            1 => CheatingMode::Tracking,
            _ => CheatingMode::Permissive,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != CheatingMode::Off
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub symmetric_resolve: bool,
    pub inresolve_cutoff_proportion: f64,
    pub near_vertex: usize,
    pub max_distance: usize,
    pub max_repeat_length: usize,
    pub cheating_mode: CheatingMode,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from_config(&RepeatResolverConfig::default())
    }
}

impl ResolverSettings {
    pub fn from_config(config: &RepeatResolverConfig) -> Self {
        Self {
            symmetric_resolve: config.symmetric_resolve,
            inresolve_cutoff_proportion: config.inresolve_cutoff_proportion,
            near_vertex: config.near_vertex,
            max_distance: config.max_distance,
            max_repeat_length: config.max_repeat_length,
            cheating_mode: CheatingMode::from_level(config.cheating_mode),
        }
    }
}

/// Counters of one resolution run.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// Sum of MultiSplit result sizes over every attempted vertex.
    pub vertices_processed: usize,
    /// Vertices that were split into more than one copy.
    pub splits: usize,
    pub low_coverage_deleted: usize,
    pub orphan_observations: usize,
    /// Total length of edges without reliable paired information.
    pub cheater_length: usize,
    pub copies_not_found: usize,
    low_coverage_pending: usize,
    low_coverage_warn_at: usize,
}

impl Default for ResolverContext {
    fn default() -> Self {
        Self {
            vertices_processed: 0,
            splits: 0,
            low_coverage_deleted: 0,
            orphan_observations: 0,
            cheater_length: 0,
            copies_not_found: 0,
            low_coverage_pending: 0,
            low_coverage_warn_at: 1,
        }
    }
}

impl ResolverContext {
    /// Warnings are rate limited: each one doubles the threshold for the next.
    fn record_low_coverage(&mut self, deleted: usize) {
        self.low_coverage_deleted += deleted;
        self.low_coverage_pending += deleted;
        if self.low_coverage_pending > self.low_coverage_warn_at {
            self.low_coverage_warn_at *= 2;
            warn!(
                "Deleted {} just-created edges due to low coverage",
                self.low_coverage_pending
            );
            self.low_coverage_pending = 0;
        }
    }
}

/// Output of a finished run.
#[derive(Debug)]
pub struct ResolvedGraph {
    pub graph: AssemblyGraph,
    /// Resolved edge -> original edge.
    pub edge_labels: BTreeMap<EdgeId, EdgeId>,
    /// Resolved vertex -> original vertex.
    pub vertex_labels: BTreeMap<VertexId, VertexId>,
    pub context: ResolverContext,
}

pub struct RepeatResolver<'a> {
    old_graph: &'a AssemblyGraph,
    new_graph: AssemblyGraph,
    library: LibraryStats,
    settings: ResolverSettings,
    rc_mode: bool,
    paired_data: MixedPairedData,
    edge_labels: BTreeMap<EdgeId, EdgeId>,
    vertex_labels: BTreeMap<VertexId, VertexId>,
    global_cheaters: BTreeSet<EdgeId>,
    local_cheaters: BTreeMap<EdgeId, usize>,
    edge_infos: Vec<EdgeInfo>,
    edge_info_colors: Vec<Option<usize>>,
    distance_counter: FastDistanceCounter,
    context: ResolverContext,
}

impl<'a> RepeatResolver<'a> {
    /// Copy `old_graph` and its paired information into a fresh graph that
    /// the resolver is free to rewrite.
    pub fn new(
        old_graph: &'a AssemblyGraph,
        index: &PairedInfoIndex,
        library: LibraryStats,
        settings: ResolverSettings,
    ) -> Result<Self> {
        let mut rc_mode = settings.symmetric_resolve;
        if rc_mode && !old_graph.is_symmetric() {
            warn!("Symmetric resolve requested on a graph without conjugates, resolving strands independently");
            rc_mode = false;
        }
        if rc_mode && old_graph.vertices().any(|v| old_graph.conjugate_vertex(v) == v) {
            warn!("Graph has self-conjugate vertices, resolving strands independently");
            rc_mode = false;
        }

        let conjugation = if rc_mode {
            Conjugation::Symmetric
        } else {
            Conjugation::Asymmetric
        };
        let mut new_graph = AssemblyGraph::new(old_graph.k(), conjugation);

        let mut vertex_map: BTreeMap<VertexId, VertexId> = BTreeMap::new();
        let mut vertex_labels = BTreeMap::new();
        for v in old_graph.vertices() {
            if vertex_map.contains_key(&v) {
                continue;
            }
            if old_graph.incoming_edge_count(v) + old_graph.outgoing_edge_count(v) == 0 {
                continue;
            }
            let nv = new_graph.add_vertex();
            vertex_map.insert(v, nv);
            vertex_labels.insert(nv, v);
            if rc_mode {
                let (old_rc, new_rc) = (old_graph.conjugate_vertex(v), new_graph.conjugate_vertex(nv));
                vertex_map.insert(old_rc, new_rc);
                vertex_labels.insert(new_rc, old_rc);
            }
        }
        debug!("vertices copied");

        let mut edge_map: BTreeMap<EdgeId, EdgeId> = BTreeMap::new();
        let mut edge_labels = BTreeMap::new();
        for e in old_graph.edges() {
            if edge_map.contains_key(&e) {
                continue;
            }
            let image = |v: VertexId| {
                vertex_map
                    .get(&v)
                    .copied()
                    .ok_or_else(|| anyhow!("vertex {v} of edge {e} was not copied"))
            };
            let start = image(old_graph.edge_start(e))?;
            let end = image(old_graph.edge_end(e))?;
            let ne = new_graph.add_edge(start, end, old_graph.sequence(e), old_graph.coverage(e))?;
            edge_map.insert(e, ne);
            edge_labels.insert(ne, e);
            if rc_mode {
                let (old_rc, new_rc) = (old_graph.conjugate(e), new_graph.conjugate(ne));
                edge_map.insert(old_rc, new_rc);
                edge_labels.insert(new_rc, old_rc);
            }
        }
        debug!("edges copied");

        let (paired_data, paired_size, skipped) = MixedPairedData::from_index(index, |e1, e2| {
            if old_graph.contains_edge(e2) {
                edge_map.get(&e1).copied()
            } else {
                None
            }
        });
        if skipped > 0 {
            debug!("{} paired points refer to edges outside the graph", skipped);
        }

        let mut context = ResolverContext::default();
        let mut global_cheaters = BTreeSet::new();
        for (&old_edge, &new_edge) in &edge_map {
            let reliable = paired_data
                .edge_infos(new_edge)
                .iter()
                .any(|info| info.weight() > MIN_WEIGHT && info.d() >= 0.0);
            if !reliable {
                context.cheater_length += old_graph.length(old_edge);
                global_cheaters.insert(new_edge);
                trace!("Global cheater {}", new_edge);
            }
        }
        info!("Total length of edges with no paired info: {}", context.cheater_length);
        info!("Paired info size: {}", paired_size);

        new_graph.discard_events();

        Ok(Self {
            old_graph,
            new_graph,
            distance_counter: FastDistanceCounter::new(settings.max_distance),
            library,
            settings,
            rc_mode,
            paired_data,
            edge_labels,
            vertex_labels,
            global_cheaters,
            local_cheaters: BTreeMap::new(),
            edge_infos: Vec::new(),
            edge_info_colors: Vec::new(),
            context,
        })
    }

    pub fn graph(&self) -> &AssemblyGraph {
        &self.new_graph
    }

    pub fn context(&self) -> &ResolverContext {
        &self.context
    }

    pub fn is_symmetric(&self) -> bool {
        self.rc_mode
    }

    pub fn edge_label(&self, e: EdgeId) -> Option<EdgeId> {
        self.edge_labels.get(&e).copied()
    }

    pub fn vertex_label(&self, v: VertexId) -> Option<VertexId> {
        self.vertex_labels.get(&v).copied()
    }

    pub fn is_global_cheater(&self, e: EdgeId) -> bool {
        self.global_cheaters.contains(&e)
    }

    pub fn paired_data(&self) -> &MixedPairedData {
        &self.paired_data
    }

    pub fn into_resolved(self) -> ResolvedGraph {
        ResolvedGraph {
            graph: self.new_graph,
            edge_labels: self.edge_labels,
            vertex_labels: self.vertex_labels,
            context: self.context,
        }
    }

    /// Split vertices until a full pass changes nothing.
    pub fn resolve_repeats(&mut self) -> Result<()> {
        info!("🔍 Resolving non-primitive repeats");
        let mut available: BTreeSet<VertexId> = self.new_graph.vertices().collect();
        let mut changed = true;

        while changed {
            changed = false;
            let order = self.vertex_order();
            info!("Got {} paired vertices, trying to split", order.len());

            for v in order {
                if !self.new_graph.contains_vertex(v) || !available.contains(&v) {
                    continue;
                }
                let neighbours: BTreeSet<VertexId> = self
                    .new_graph
                    .outgoing_edges(v)
                    .iter()
                    .map(|&e| self.new_graph.edge_end(e))
                    .chain(
                        self.new_graph
                            .incoming_edges(v)
                            .iter()
                            .map(|&e| self.new_graph.edge_start(e)),
                    )
                    .collect();

                if self.touches_global_cheater(v) {
                    debug!("Cheaters are near {}", v);
                    continue;
                }

                let targets = self.generate_vertex_paired_info(v);
                debug!("paired info size: {}", targets);
                let copies = self.split_resolve_vertex(v)?;
                available.remove(&v);
                self.new_graph.discard_events();

                debug!("Vertex {} resolved to {}", v, copies);
                self.context.vertices_processed += copies;
                if copies > 1 {
                    available.extend(neighbours);
                    self.context.splits += 1;
                    changed = true;
                }
            }
        }

        info!(
            "✅ {} vertices processed while resolving non-primitive repeats",
            self.context.vertices_processed
        );
        if self.context.low_coverage_deleted > 0 {
            info!(
                "Deleted {} low-coverage edge copies",
                self.context.low_coverage_deleted
            );
        }
        if self.context.orphan_observations > 0 {
            warn!(
                "{} observations were not included in any path",
                self.context.orphan_observations
            );
        }
        Ok(())
    }

    fn touches_global_cheater(&self, v: VertexId) -> bool {
        self.new_graph
            .outgoing_edges(v)
            .iter()
            .chain(self.new_graph.incoming_edges(v))
            .any(|e| self.global_cheaters.contains(e))
    }

    /// Symmetric mode visits vertices grouped into components joined by
    /// edges shorter than the insert size; otherwise newest vertices first.
    fn vertex_order(&self) -> Vec<VertexId> {
        let vertices: Vec<VertexId> = self.new_graph.vertices().collect();
        if !self.rc_mode {
            return vertices.into_iter().rev().collect();
        }

        let position: BTreeMap<VertexId, usize> =
            vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut components = UnionFind::<usize>::new(vertices.len());
        for e in self.new_graph.edges() {
            if self.new_graph.length(e) < self.library.insert_size {
                let a = position[&self.new_graph.edge_start(e)];
                let b = position[&self.new_graph.edge_end(e)];
                components.union(a, b);
            }
        }

        let mut component_min: BTreeMap<usize, VertexId> = BTreeMap::new();
        for (i, &v) in vertices.iter().enumerate() {
            let root = components.find(i);
            let entry = component_min.entry(root).or_insert(v);
            if v < *entry {
                *entry = v;
            }
        }

        let mut keyed: Vec<(VertexId, VertexId)> = vertices
            .iter()
            .enumerate()
            .map(|(i, &v)| (component_min[&components.find(i)], v))
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, v)| v).collect()
    }

    /// Collect the observations anchored on edges around `v`, measured from
    /// `v`. Returns the number of distinct original edges they reach.
    pub fn generate_vertex_paired_info(&mut self, v: VertexId) -> usize {
        self.edge_infos.clear();
        self.edge_info_colors.clear();
        self.local_cheaters.clear();

        let trusted = self.library.insert_size as f64 - self.library.read_length as f64;
        let near = self.settings.near_vertex as f64;
        let mut targets = BTreeSet::new();

        let sides = [
            (Direction::Outgoing, self.new_graph.outgoing_edges(v).to_vec()),
            (Direction::Incoming, self.new_graph.incoming_edges(v).to_vec()),
        ];
        for (direction, edges) in sides {
            for e in edges {
                for info in self.paired_data.edge_infos(e) {
                    if info.weight() < MIN_WEIGHT || info.d() < -MIN_WEIGHT {
                        continue;
                    }
                    let shift = match direction {
                        Direction::Incoming => self.new_graph.length(info.first) as f64,
                        Direction::Outgoing => 0.0,
                    };
                    let from_vertex = info.d() - shift;
                    let suspicious = from_vertex + (self.old_graph.length(info.second) as f64)
                        < trusted - near
                        || from_vertex > trusted + near;
                    if self.settings.cheating_mode == CheatingMode::Permissive && suspicious {
                        self.local_cheaters.entry(info.first).or_insert(0);
                        trace!("ignored {} at {} from vertex", info, from_vertex);
                    } else {
                        self.edge_infos
                            .push(EdgeInfo::new(info, direction, info.second, from_vertex));
                        targets.insert(info.second);
                    }
                }
            }
        }

        self.edge_infos.sort_by(compare_edge_infos);
        targets.len()
    }

    /// Color the observations gathered for `v` and split it. Returns the
    /// number of resulting vertex copies; 1 means nothing was split.
    pub fn split_resolve_vertex(&mut self, v: VertexId) -> Result<usize> {
        if self.settings.cheating_mode.is_enabled() {
            let incident = self.new_graph.incident_edges(v);
            if incident.iter().any(|e| self.global_cheaters.contains(e)) {
                debug!("Can not resolve vertex {} because of incident cheater edge", v);
                return Ok(1);
            }
            if !incident.is_empty() && self.edge_infos.is_empty() {
                debug!("Can not resolve vertex {} because of zero sized info", v);
                return Ok(1);
            }
        }
        self.color_edge_infos(v);
        Ok(self.multi_split(v)?.len())
    }

    /// Chain each anchor's observations into maximal `follows` sequences and
    /// drop chains contained in another one.
    pub fn convert_edge_infos_to_paths(&mut self) -> Vec<PathInfo> {
        let old = self.old_graph;
        let mut result = Vec::new();
        let mut used_anchors = BTreeSet::new();

        for i in 0..self.edge_infos.len() {
            let anchor = self.edge_infos[i].info.first;
            if !used_anchors.insert(anchor) {
                continue;
            }
            let mut infos: Vec<EdgeInfo> = self.edge_infos[i..]
                .iter()
                .filter(|ei| ei.info.first == anchor)
                .copied()
                .collect();
            infos.sort_by(compare_edge_infos);

            let mut used_indexes = BTreeSet::new();
            let mut anchor_paths: Vec<PathInfo> = Vec::new();
            for ext in 0..infos.len() {
                if used_indexes.contains(&ext) {
                    continue;
                }

                // a second candidate at any step makes the chain ambiguous
                let mut backwards = Vec::new();
                let mut back = ext;
                loop {
                    let mut step = back;
                    for t in (1..=back).rev() {
                        if infos[back].follows(&infos[t - 1], old) {
                            if step != back {
                                step = back;
                                break;
                            }
                            step = t - 1;
                        }
                    }
                    if step == back {
                        break;
                    }
                    backwards.push(step);
                    back = step;
                }

                let mut forwards = Vec::new();
                let mut fwd = ext;
                loop {
                    let mut step = fwd;
                    for t in fwd + 1..infos.len() {
                        if infos[t].follows(&infos[fwd], old) {
                            if step != fwd {
                                step = fwd;
                                break;
                            }
                            step = t;
                        }
                    }
                    if step == fwd {
                        break;
                    }
                    forwards.push(step);
                    fwd = step;
                    used_indexes.insert(fwd);
                }

                let mut path = PathInfo::new(anchor);
                for &b in backwards.iter().rev() {
                    path.push(infos[b].info);
                }
                path.push(infos[ext].info);
                for &f in &forwards {
                    path.push(infos[f].info);
                }

                let mut included = false;
                for existing in &anchor_paths {
                    if self.prefix_or_included(&path, existing, 0.0, 0.0) == 2 {
                        debug!("PATH {} inside {}", path, existing);
                        included = true;
                        break;
                    }
                }
                if !included {
                    anchor_paths.push(path);
                }
            }

            for j in 0..anchor_paths.len() {
                let mut included = false;
                for k in j + 1..anchor_paths.len() {
                    if self.prefix_or_included(&anchor_paths[j], &anchor_paths[k], 0.0, 0.0) == 2 {
                        included = true;
                        break;
                    }
                }
                if !included {
                    result.push(anchor_paths[j].clone());
                }
            }
        }
        result
    }

    /// Align `path1` inside `path2` after shifting both to a common origin.
    ///
    /// Returns 2 when `path1` is fully contained in `path2`, 1 when it
    /// continues past the end of `path2` (or starts right after it), and 0
    /// when the two disagree.
    pub fn prefix_or_included(&mut self, path1: &PathInfo, path2: &PathInfo, shift1: f64, shift2: f64) -> u8 {
        let (len1, len2) = (path1.len(), path2.len());
        if len1 < 2 || len2 < 2 {
            return 0;
        }
        let mismatch = |i: usize, j: usize| {
            path2.edge_at(j) != path1.edge_at(i)
                || (path1.distance_at(i) - shift1 - path2.distance_at(j) + shift2).abs()
                    > path1.var_at(i) + path2.var_at(j) + DISTANCE_SLACK
        };

        let mut i = 1;
        let mut j = 1;
        while mismatch(i, j) {
            j += 1;
            if j == len2 {
                break;
            }
        }

        if j < len2 {
            while j < len2 && i < len1 {
                if mismatch(i, j) {
                    return 0;
                }
                i += 1;
                j += 1;
            }
            return if i < len1 { 1 } else { 2 };
        }

        let old = self.old_graph;
        let last = len2 - 1;
        let gap = self.distance_counter.distance(
            old,
            old.edge_end(path2.edge_at(last)),
            old.edge_start(path1.edge_at(1)),
        ) as f64;
        let offset = path1.distance_at(1) - shift1 - path2.distance_at(last) + shift2
            - old.length(path2.edge_at(last)) as f64
            - gap;
        if offset.abs() < DISTANCE_SLACK + path1.var_at(1) + path2.var_at(last) {
            1
        } else {
            0
        }
    }

    fn anchor_shift(&self, anchor: EdgeId, v: VertexId) -> f64 {
        if self.new_graph.edge_end(anchor) == v {
            self.new_graph.length(anchor) as f64
        } else {
            if self.new_graph.edge_start(anchor) != v {
                warn!("Path anchor {} does not touch vertex {}", anchor, v);
            }
            0.0
        }
    }

    /// Whether two paths around `v` must end up on the same vertex copy.
    pub fn paths_adjacent(&mut self, path1: &PathInfo, path2: &PathInfo, v: VertexId) -> bool {
        if path1.anchor == path2.anchor
            && self.new_graph.length(path1.anchor) > self.settings.max_repeat_length
        {
            return true;
        }
        let shift1 = self.anchor_shift(path1.anchor, v);
        let shift2 = self.anchor_shift(path2.anchor, v);
        let opposite_sides = (shift1 == 0.0) != (shift2 == 0.0);
        if opposite_sides || path1.anchor == path2.anchor {
            self.prefix_or_included(path1, path2, shift1, shift2) != 0
                || self.prefix_or_included(path2, path1, shift2, shift1) != 0
        } else {
            false
        }
    }

    /// Connected components of the adjacency relation, numbered from 0.
    fn color_paths(&mut self, paths: &[PathInfo], v: VertexId) -> Vec<usize> {
        let n = paths.len();
        let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in i + 1..n {
                if self.paths_adjacent(&paths[i], &paths[j], v) {
                    neighbours[i].push(j);
                    neighbours[j].push(i);
                }
            }
        }

        let mut colors: Vec<Option<usize>> = vec![None; n];
        let mut next_color = 0;
        for start in 0..n {
            if colors[start].is_some() {
                continue;
            }
            colors[start] = Some(next_color);
            let mut stack = vec![start];
            while let Some(current) = stack.pop() {
                for &next in &neighbours[current] {
                    if colors[next].is_none() {
                        colors[next] = Some(next_color);
                        stack.push(next);
                    }
                }
            }
            next_color += 1;
        }
        colors.into_iter().map(|c| c.unwrap_or_default()).collect()
    }

    fn color_edge_infos(&mut self, v: VertexId) {
        let paths = self.convert_edge_infos_to_paths();
        let path_colors = self.color_paths(&paths, v);
        for (path, color) in paths.iter().zip(&path_colors) {
            debug!("PATH {} color {}", path, color);
        }

        let count = self.edge_infos.len();
        self.edge_info_colors = vec![None; count];
        for i in 0..count {
            let info = self.edge_infos[i].info;
            let colors: BTreeSet<usize> = paths
                .iter()
                .zip(&path_colors)
                .filter(|(path, _)| path.contains(&info))
                .map(|(_, &color)| color)
                .collect();

            match colors.len() {
                0 => {
                    warn!("{} not included in any path", info);
                    self.context.orphan_observations += 1;
                }
                1 => self.edge_info_colors[i] = colors.first().copied(),
                n => {
                    self.edge_infos[i].info.point.weight /= n as f64;
                    let mut rest = colors.iter().copied();
                    self.edge_info_colors[i] = rest.next();
                    for color in rest {
                        self.edge_infos.push(self.edge_infos[i]);
                        self.edge_info_colors.push(Some(color));
                    }
                }
            }
        }
    }

    /// Split `v` into one copy per color. Returns the new vertices, or `[v]`
    /// when the vertex is left as it is.
    pub fn multi_split(&mut self, v: VertexId) -> Result<Vec<VertexId>> {
        let outgoing = self.new_graph.outgoing_edges(v).to_vec();
        let incoming = self.new_graph.incoming_edges(v).to_vec();
        let incident: Vec<EdgeId> = outgoing.iter().chain(&incoming).copied().collect();

        if !(self.new_graph.split_condition(v, &outgoing) && self.new_graph.split_condition(v, &incoming)) {
            debug!("Splitting of {} blocked by split condition", v);
            return Ok(vec![v]);
        }

        let mut edge_counts: BTreeMap<EdgeId, usize> = incident.iter().map(|&e| (e, 0)).collect();
        let mut max_color = 0;
        for (ei, color) in self.edge_infos.iter().zip(&self.edge_info_colors) {
            if let Some(c) = *color {
                max_color = max_color.max(c);
            }
            *edge_counts.entry(ei.info.first).or_insert(0) += 1;
        }
        if max_color == 0 {
            debug!("Nothing to split at {}", v);
            return Ok(vec![v]);
        }
        let mut color_count = max_color + 1;

        let mut nonpaired = 0;
        let unpaired: Vec<EdgeId> = edge_counts
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&e, _)| e)
            .collect();
        for e in unpaired {
            nonpaired += 1;
            if self.settings.cheating_mode != CheatingMode::Permissive {
                debug!("Edge {} without pair info blocks split", e);
                return Ok(vec![v]);
            }
            let mut added = false;
            for info in self.paired_data.edge_infos(e) {
                if info.weight() < MIN_WEIGHT {
                    continue;
                }
                self.edge_infos
                    .push(EdgeInfo::new(info, Direction::Outgoing, info.second, info.d().trunc()));
                self.edge_info_colors.push(Some(color_count));
                added = true;
            }
            if added {
                color_count += 1;
            }
        }
        if nonpaired > 0 {
            warn!("Added {} non-paired edges", nonpaired);
        }

        // every incident edge must land on some copy
        for &e in &incident {
            let colored = self
                .edge_infos
                .iter()
                .zip(&self.edge_info_colors)
                .any(|(ei, c)| ei.info.first == e && c.is_some());
            if !colored {
                debug!("Edge {} has only uncolored info, {} left as is", e, v);
                return Ok(vec![v]);
            }
        }
        debug!("splitting {} into {} parts", v, color_count);

        for (&e, &count) in &edge_counts {
            if count > 1 {
                self.paired_data.delete_edge_info(e);
            } else if count == 1 {
                let mut edge_colors = self
                    .edge_infos
                    .iter()
                    .zip(&self.edge_info_colors)
                    .filter(|(ei, _)| ei.info.first == e)
                    .map(|(_, c)| *c);
                let updated = edge_colors.next().flatten();
                if edge_colors.any(|c| c != updated) {
                    warn!("Different colors found for one colored edge info");
                }
                if let Some(color) = updated {
                    let (infos, colors): (Vec<EdgeInfo>, Vec<Option<usize>>) = self
                        .edge_infos
                        .drain(..)
                        .zip(self.edge_info_colors.drain(..))
                        .filter(|(ei, c)| !(ei.info.first == e && *c == Some(color)))
                        .unzip();
                    self.edge_infos = infos;
                    self.edge_info_colors = colors;
                    for info in self.paired_data.edge_infos(e) {
                        self.edge_infos
                            .push(EdgeInfo::new(info, Direction::Outgoing, info.second, 0.0));
                        self.edge_info_colors.push(Some(color));
                    }
                    self.paired_data.delete_edge_info(e);
                }
            }
        }

        let mut old_coverage: BTreeMap<EdgeId, f64> = BTreeMap::new();
        let mut colored_coverage: Vec<BTreeMap<EdgeId, f64>> = vec![BTreeMap::new(); color_count];
        for (ei, color) in self.edge_infos.iter().zip(&self.edge_info_colors) {
            if let Some(c) = *color {
                *old_coverage.entry(ei.info.first).or_insert(0.0) += ei.info.weight();
                *colored_coverage[c].entry(ei.info.first).or_insert(0.0) += ei.info.weight();
            }
        }

        let cutting_coverage =
            self.library.avg_coverage * self.settings.inresolve_cutoff_proportion / 2.0;
        let original_label = self.vertex_labels.get(&v).copied();
        let mut copy_counts: BTreeMap<EdgeId, usize> = BTreeMap::new();
        let mut live: Vec<(EdgeId, EdgeId)> = Vec::new();
        let mut result = Vec::new();
        let mut not_found = 0;

        for (color, coverage) in colored_coverage.iter().enumerate() {
            let mut split_edges = Vec::new();
            let mut coefficients = Vec::new();
            for (&e, &weight) in coverage {
                if math::eq(weight, 0.0) {
                    debug!("Zero covered pair info");
                    continue;
                }
                split_edges.push(e);
                if let Some(seen) = self.local_cheaters.get_mut(&e) {
                    *seen += 1;
                }
                coefficients.push(weight / old_coverage[&e]);
            }
            if split_edges.is_empty() || !self.new_graph.split_condition(v, &split_edges) {
                continue;
            }

            let (nv, copies) = self.new_graph.split_vertex(v, &split_edges, &coefficients)?;
            result.push(nv);
            if let Some(label) = original_label {
                self.vertex_labels.insert(nv, label);
                if self.rc_mode {
                    self.vertex_labels.insert(
                        self.new_graph.conjugate_vertex(nv),
                        self.old_graph.conjugate_vertex(label),
                    );
                }
            }

            let mut images: BTreeMap<EdgeId, EdgeId> = BTreeMap::new();
            for &(orig, copy) in &copies {
                images.insert(orig, copy);
                *copy_counts.entry(orig).or_insert(0) += 1;
                if let Some(label) = self.edge_labels.get(&orig).copied() {
                    self.edge_labels.insert(copy, label);
                    if self.rc_mode {
                        self.edge_labels
                            .insert(self.new_graph.conjugate(copy), self.old_graph.conjugate(label));
                    }
                }
                if self.settings.cheating_mode.is_enabled() {
                    match self.local_cheaters.get(&orig) {
                        Some(0) => not_found += 1,
                        Some(_) => {
                            self.global_cheaters.insert(copy);
                        }
                        None => {}
                    }
                }
            }

            for (ei, c) in self.edge_infos.iter().zip(&self.edge_info_colors) {
                if *c == Some(color) {
                    if let Some(&copy) = images.get(&ei.info.first) {
                        self.paired_data.replace_first_edge(&ei.info, copy);
                    }
                }
            }

            let mut low_coverage = 0;
            for &(orig, copy) in &copies {
                if !self.new_graph.contains_edge(copy) {
                    continue;
                }
                let creates_dead_end = (self.new_graph.is_dead_start(nv) && !self.new_graph.is_dead_start(v))
                    || (self.new_graph.is_dead_end(nv) && !self.new_graph.is_dead_end(v));
                let prunable = copy_counts[&orig] > 1
                    && self.new_graph.coverage(copy) < cutting_coverage
                    && creates_dead_end
                    && edge_counts.get(&orig).copied().unwrap_or(0) > 1;
                if prunable {
                    if let Some(count) = copy_counts.get_mut(&orig) {
                        *count -= 1;
                    }
                    debug!("Deleting just created copy {} of {} because of low coverage", copy, orig);
                    low_coverage += 1;
                    self.delete_copy(copy)?;
                } else {
                    live.push((orig, copy));
                }
            }
            if low_coverage > 0 {
                self.context.record_low_coverage(low_coverage);
            }
        }
        if not_found > 0 {
            warn!("For {} edges, no copies of them were found", not_found);
            self.context.copies_not_found += not_found;
        }

        if self.rc_mode {
            for &(proto, copy) in &live {
                let count = copy_counts.get(&proto).copied().unwrap_or(0);
                if count > 1 {
                    self.global_cheaters.insert(self.new_graph.conjugate(copy));
                } else if count == 1 {
                    let conj_proto = self.new_graph.conjugate(proto);
                    let conj_copy = self.new_graph.conjugate(copy);
                    if conj_copy != copy {
                        for info in self.paired_data.edge_infos(conj_proto) {
                            self.paired_data.replace_first_edge(&info, conj_copy);
                        }
                    }
                }
            }
        }

        for &e in &incident {
            self.paired_data.delete_edge_info(e);
            self.global_cheaters.remove(&e);
            if self.rc_mode {
                let conj = self.new_graph.conjugate(e);
                self.paired_data.delete_edge_info(conj);
                self.global_cheaters.remove(&conj);
            }
        }
        self.new_graph.force_delete_vertex(v)?;

        debug!("{} split into {} copies", v, result.len());
        Ok(result)
    }

    fn delete_copy(&mut self, copy: EdgeId) -> Result<()> {
        self.paired_data.delete_edge_info(copy);
        self.global_cheaters.remove(&copy);
        if self.rc_mode {
            let conj = self.new_graph.conjugate(copy);
            self.paired_data.delete_edge_info(conj);
            self.global_cheaters.remove(&conj);
        }
        let start = self.new_graph.edge_start(copy);
        let end = self.new_graph.edge_end(copy);
        self.new_graph.delete_edge(copy)?;
        self.new_graph.delete_vertex_if_isolated(start)?;
        if end != start {
            self.new_graph.delete_vertex_if_isolated(end)?;
        }
        Ok(())
    }
}
