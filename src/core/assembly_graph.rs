//! Compressed de Bruijn Assembly Graph
//! ===================================
//!
//! Vertices are junctions, edges are non-branching sequence segments. Every
//! edge stores its full nucleotide sequence including the k-base overlap with
//! its neighbours, so `length(e) = sequence.len() - k` counts k+1-mers.
//!
//! A graph is built once in one of two strand modes ([`Conjugation`]):
//! a symmetric graph keeps every vertex and edge paired with its reverse
//! complement and mirrors every mutation onto the partner, an asymmetric
//! graph treats each element as its own conjugate.
//!
//! Topology changes that other structures must follow (merges, glues,
//! splits, additions and deletions) are recorded in an event journal which
//! observers drain through [`AssemblyGraph::notify`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::utils::configuration::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Strand handling of a graph, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjugation {
    /// Both strands are stored; every element has a reverse-complement twin.
    #[default]
    Symmetric,
    /// Single strand; every element is its own conjugate.
    Asymmetric,
}

impl Conjugation {
    pub fn is_symmetric(self) -> bool {
        matches!(self, Conjugation::Symmetric)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    pub start: VertexId,
    pub end: VertexId,
    pub sequence: String,
    /// Average k-mer coverage
    pub coverage: f64,
    pub conjugate: EdgeId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VertexData {
    pub incoming: Vec<EdgeId>,
    pub outgoing: Vec<EdgeId>,
    pub conjugate: VertexId,
}

/// Topology change notifications, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    Add {
        edge: EdgeId,
    },
    Delete {
        edge: EdgeId,
    },
    /// `old_edges` were concatenated into `new_edge`; lengths are recorded
    /// because the old edges are gone by the time observers run.
    Merge {
        old_edges: Vec<EdgeId>,
        old_lengths: Vec<usize>,
        new_edge: EdgeId,
    },
    /// `first` was glued onto `second`, both replaced by `new_edge`.
    Glue {
        new_edge: EdgeId,
        first: EdgeId,
        second: EdgeId,
    },
    Split {
        old_edge: EdgeId,
        old_length: usize,
        new_edge1: EdgeId,
        new_edge1_length: usize,
        new_edge2: EdgeId,
    },
}

/// Anything that must stay consistent with graph topology.
pub trait GraphObserver {
    fn on_event(&mut self, event: &GraphEvent) -> Result<()>;
}

/// Flat serializable form of a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub k: usize,
    #[serde(default)]
    pub conjugation: Conjugation,
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexRecord {
    pub id: usize,
    pub conjugate: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub sequence: String,
    pub coverage: f64,
    pub conjugate: usize,
}

fn graph_error(message: impl Into<String>) -> anyhow::Error {
    PipelineError::GraphError {
        message: message.into(),
    }
    .into()
}

pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            'a' => 't',
            't' => 'a',
            'c' => 'g',
            'g' => 'c',
            other => other,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AssemblyGraph {
    k: usize,
    conjugation: Conjugation,
    vertices: BTreeMap<VertexId, VertexData>,
    edges: BTreeMap<EdgeId, EdgeData>,
    next_id: usize,
    events: Vec<GraphEvent>,
}

impl AssemblyGraph {
    pub fn new(k: usize, conjugation: Conjugation) -> Self {
        Self {
            k,
            conjugation,
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            next_id: 1,
            events: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn conjugation(&self) -> Conjugation {
        self.conjugation
    }

    pub fn is_symmetric(&self) -> bool {
        self.conjugation.is_symmetric()
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ----- read accessors -------------------------------------------------
    //
    // Accessors taking a handle panic on stale handles, the same way graph
    // indices do in petgraph. Mutators validate and return errors instead.

    fn edge(&self, e: EdgeId) -> &EdgeData {
        &self.edges[&e]
    }

    fn vertex(&self, v: VertexId) -> &VertexData {
        &self.vertices[&v]
    }

    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.edges.contains_key(&e)
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.vertices.contains_key(&v)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    /// Vertices in ascending id order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices.keys().copied()
    }

    pub fn edge_start(&self, e: EdgeId) -> VertexId {
        self.edge(e).start
    }

    pub fn edge_end(&self, e: EdgeId) -> VertexId {
        self.edge(e).end
    }

    pub fn outgoing_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.vertex(v).outgoing
    }

    pub fn incoming_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.vertex(v).incoming
    }

    pub fn outgoing_edge_count(&self, v: VertexId) -> usize {
        self.vertex(v).outgoing.len()
    }

    pub fn incoming_edge_count(&self, v: VertexId) -> usize {
        self.vertex(v).incoming.len()
    }

    pub fn is_dead_start(&self, v: VertexId) -> bool {
        self.incoming_edge_count(v) == 0
    }

    pub fn is_dead_end(&self, v: VertexId) -> bool {
        self.outgoing_edge_count(v) == 0
    }

    pub fn length(&self, e: EdgeId) -> usize {
        self.edge(e).sequence.len().saturating_sub(self.k)
    }

    pub fn coverage(&self, e: EdgeId) -> f64 {
        self.edge(e).coverage
    }

    pub fn sequence(&self, e: EdgeId) -> &str {
        &self.edge(e).sequence
    }

    pub fn int_id(&self, e: EdgeId) -> usize {
        e.0
    }

    pub fn vertex_int_id(&self, v: VertexId) -> usize {
        v.0
    }

    /// Reverse-complement partner; the edge itself on an asymmetric graph.
    pub fn conjugate(&self, e: EdgeId) -> EdgeId {
        match self.conjugation {
            Conjugation::Symmetric => self.edge(e).conjugate,
            Conjugation::Asymmetric => e,
        }
    }

    pub fn conjugate_vertex(&self, v: VertexId) -> VertexId {
        match self.conjugation {
            Conjugation::Symmetric => self.vertex(v).conjugate,
            Conjugation::Asymmetric => v,
        }
    }

    /// Set average coverage of `e` and, on a symmetric graph, of its twin.
    pub fn set_coverage(&mut self, e: EdgeId, coverage: f64) {
        let twin = self.conjugate(e);
        if let Some(data) = self.edges.get_mut(&e) {
            data.coverage = coverage;
        }
        if let Some(data) = self.edges.get_mut(&twin) {
            data.coverage = coverage;
        }
    }

    /// Incoming and outgoing edges of `v` without duplicates (a loop is
    /// listed once).
    pub fn incident_edges(&self, v: VertexId) -> Vec<EdgeId> {
        let data = self.vertex(v);
        let mut seen = BTreeSet::new();
        data.outgoing
            .iter()
            .chain(data.incoming.iter())
            .copied()
            .filter(|e| seen.insert(*e))
            .collect()
    }

    // ----- events ---------------------------------------------------------

    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn discard_events(&mut self) {
        self.events.clear();
    }

    /// Deliver every pending event to `observer` and clear the journal.
    pub fn notify(&mut self, observer: &mut dyn GraphObserver) -> Result<()> {
        for event in self.take_events() {
            observer.on_event(&event)?;
        }
        Ok(())
    }

    // ----- mutators -------------------------------------------------------

    /// Add a vertex; on a symmetric graph its conjugate is created too.
    pub fn add_vertex(&mut self) -> VertexId {
        let v = VertexId(self.fresh_id());
        match self.conjugation {
            Conjugation::Symmetric => {
                let cv = VertexId(self.fresh_id());
                self.vertices.insert(
                    v,
                    VertexData {
                        conjugate: cv,
                        ..Default::default()
                    },
                );
                self.vertices.insert(
                    cv,
                    VertexData {
                        conjugate: v,
                        ..Default::default()
                    },
                );
            }
            Conjugation::Asymmetric => {
                self.vertices.insert(
                    v,
                    VertexData {
                        conjugate: v,
                        ..Default::default()
                    },
                );
            }
        }
        v
    }

    fn link_edge(&mut self, e: EdgeId, data: EdgeData) {
        let (start, end) = (data.start, data.end);
        self.edges.insert(e, data);
        if let Some(v) = self.vertices.get_mut(&start) {
            v.outgoing.push(e);
        }
        if let Some(v) = self.vertices.get_mut(&end) {
            v.incoming.push(e);
        }
        self.events.push(GraphEvent::Add { edge: e });
    }

    /// Add an edge carrying `sequence` (including both k-overlaps). On a
    /// symmetric graph the reverse-complement edge is created between the
    /// conjugate vertices, unless the edge is its own reverse complement.
    pub fn add_edge(
        &mut self,
        start: VertexId,
        end: VertexId,
        sequence: &str,
        coverage: f64,
    ) -> Result<EdgeId> {
        if !self.contains_vertex(start) || !self.contains_vertex(end) {
            return Err(graph_error(format!(
                "cannot add edge between unknown vertices {start} and {end}"
            )));
        }
        if sequence.len() <= self.k {
            return Err(graph_error(format!(
                "edge sequence of length {} is not longer than k = {}",
                sequence.len(),
                self.k
            )));
        }

        let e = EdgeId(self.fresh_id());
        match self.conjugation {
            Conjugation::Asymmetric => {
                self.link_edge(
                    e,
                    EdgeData {
                        start,
                        end,
                        sequence: sequence.to_string(),
                        coverage,
                        conjugate: e,
                    },
                );
            }
            Conjugation::Symmetric => {
                let rc = reverse_complement(sequence);
                let conj_start = self.conjugate_vertex(end);
                let conj_end = self.conjugate_vertex(start);
                let self_conjugate = conj_start == start && rc == sequence;
                if self_conjugate {
                    self.link_edge(
                        e,
                        EdgeData {
                            start,
                            end,
                            sequence: sequence.to_string(),
                            coverage,
                            conjugate: e,
                        },
                    );
                } else {
                    let ce = EdgeId(self.fresh_id());
                    self.link_edge(
                        e,
                        EdgeData {
                            start,
                            end,
                            sequence: sequence.to_string(),
                            coverage,
                            conjugate: ce,
                        },
                    );
                    self.link_edge(
                        ce,
                        EdgeData {
                            start: conj_start,
                            end: conj_end,
                            sequence: rc,
                            coverage,
                            conjugate: e,
                        },
                    );
                }
            }
        }
        Ok(e)
    }

    fn unlink_edge(&mut self, e: EdgeId) {
        if let Some(data) = self.edges.remove(&e) {
            if let Some(v) = self.vertices.get_mut(&data.start) {
                v.outgoing.retain(|x| *x != e);
            }
            if let Some(v) = self.vertices.get_mut(&data.end) {
                v.incoming.retain(|x| *x != e);
            }
            self.events.push(GraphEvent::Delete { edge: e });
        }
    }

    /// Delete an edge and, on a symmetric graph, its twin.
    pub fn delete_edge(&mut self, e: EdgeId) -> Result<()> {
        if !self.contains_edge(e) {
            return Err(graph_error(format!("cannot delete unknown edge {e}")));
        }
        let twin = self.conjugate(e);
        self.unlink_edge(e);
        if twin != e {
            self.unlink_edge(twin);
        }
        Ok(())
    }

    fn is_isolated(&self, v: VertexId) -> bool {
        self.vertices
            .get(&v)
            .map(|d| d.incoming.is_empty() && d.outgoing.is_empty())
            .unwrap_or(true)
    }

    /// Delete an isolated vertex (and its conjugate).
    pub fn delete_vertex(&mut self, v: VertexId) -> Result<()> {
        if !self.contains_vertex(v) {
            return Err(graph_error(format!("cannot delete unknown vertex {v}")));
        }
        let cv = self.conjugate_vertex(v);
        if !self.is_isolated(v) || !self.is_isolated(cv) {
            return Err(graph_error(format!(
                "cannot delete vertex {v}: it still has incident edges"
            )));
        }
        self.vertices.remove(&v);
        self.vertices.remove(&cv);
        Ok(())
    }

    /// Delete `v` if nothing is attached to it or its conjugate any more.
    pub fn delete_vertex_if_isolated(&mut self, v: VertexId) -> Result<bool> {
        if self.contains_vertex(v) && self.is_isolated(v) && self.is_isolated(self.conjugate_vertex(v)) {
            self.delete_vertex(v)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Delete `v` together with every incident edge.
    pub fn force_delete_vertex(&mut self, v: VertexId) -> Result<()> {
        if !self.contains_vertex(v) {
            return Err(graph_error(format!("cannot delete unknown vertex {v}")));
        }
        let cv = self.conjugate_vertex(v);
        let mut incident = self.incident_edges(v);
        if cv != v {
            incident.extend(self.incident_edges(cv));
        }
        for e in incident {
            if self.contains_edge(e) {
                self.delete_edge(e)?;
            }
        }
        self.delete_vertex(v)
    }

    /// Whether `v` may be split along `splitting_edges`. Splitting is refused
    /// when a self-conjugate edge or vertex is involved (the two strands could
    /// not be split independently) or when an edge is not incident to `v`.
    pub fn split_condition(&self, v: VertexId, splitting_edges: &[EdgeId]) -> bool {
        if !self.contains_vertex(v) {
            return false;
        }
        if self.is_symmetric() && self.conjugate_vertex(v) == v {
            return false;
        }
        splitting_edges.iter().all(|&e| {
            self.contains_edge(e)
                && (self.edge_start(e) == v || self.edge_end(e) == v)
                && (!self.is_symmetric() || self.conjugate(e) != e)
        })
    }

    /// Create a new vertex holding copies of `splitting_edges`; copy `i`
    /// receives `coefficients[i]` of the original coverage. The originals stay
    /// attached to `v`. Returns the new vertex and `(original, copy)` pairs.
    pub fn split_vertex(
        &mut self,
        v: VertexId,
        splitting_edges: &[EdgeId],
        coefficients: &[f64],
    ) -> Result<(VertexId, Vec<(EdgeId, EdgeId)>)> {
        if splitting_edges.len() != coefficients.len() {
            return Err(graph_error(format!(
                "split of {v}: {} edges but {} coefficients",
                splitting_edges.len(),
                coefficients.len()
            )));
        }
        if !self.split_condition(v, splitting_edges) {
            return Err(graph_error(format!("split condition fails at {v}")));
        }

        let new_vertex = self.add_vertex();
        let conj_v = self.conjugate_vertex(v);
        let conj_new = self.conjugate_vertex(new_vertex);
        let mut copies: Vec<(EdgeId, EdgeId)> = Vec::with_capacity(splitting_edges.len());
        let mut copied: BTreeMap<EdgeId, EdgeId> = BTreeMap::new();

        for (&e, &coefficient) in splitting_edges.iter().zip(coefficients) {
            if let Some(&done) = copied.get(&e) {
                copies.push((e, done));
                continue;
            }
            // the twin was copied already by this split: the copy's twin is ours
            let twin = self.conjugate(e);
            if twin != e {
                if let Some(&twin_copy) = copied.get(&twin) {
                    let copy = self.conjugate(twin_copy);
                    copied.insert(e, copy);
                    copies.push((e, copy));
                    continue;
                }
            }

            let data = self.edge(e).clone();
            let remap = |x: VertexId| {
                if x == v {
                    new_vertex
                } else if x == conj_v && conj_v != v {
                    conj_new
                } else {
                    x
                }
            };
            let copy = self.add_edge(
                remap(data.start),
                remap(data.end),
                &data.sequence,
                data.coverage * coefficient,
            )?;
            copied.insert(e, copy);
            copies.push((e, copy));
        }

        debug!("split {} into {} with {} edges", v, new_vertex, copies.len());
        Ok((new_vertex, copies))
    }

    /// Concatenate a chain of adjacent edges into one edge.
    pub fn merge_path(&mut self, path: &[EdgeId]) -> Result<EdgeId> {
        if path.len() < 2 {
            return Err(graph_error("merge needs at least two edges"));
        }
        for e in path {
            if !self.contains_edge(*e) {
                return Err(graph_error(format!("cannot merge unknown edge {e}")));
            }
        }
        for pair in path.windows(2) {
            if self.edge_end(pair[0]) != self.edge_start(pair[1]) {
                return Err(graph_error(format!(
                    "edges {} and {} are not adjacent",
                    pair[0], pair[1]
                )));
            }
        }

        let k = self.k;
        let mut sequence = self.sequence(path[0]).to_string();
        let mut total_coverage = 0.0;
        let mut total_length = 0usize;
        for (i, &e) in path.iter().enumerate() {
            if i > 0 {
                sequence.push_str(&self.sequence(e)[k..]);
            }
            total_coverage += self.coverage(e) * self.length(e) as f64;
            total_length += self.length(e);
        }
        let coverage = if total_length > 0 {
            total_coverage / total_length as f64
        } else {
            0.0
        };
        let old_lengths: Vec<usize> = path.iter().map(|&e| self.length(e)).collect();
        let start = self.edge_start(path[0]);
        let end = self.edge_end(path[path.len() - 1]);
        let inner: Vec<VertexId> = path[1..].iter().map(|&e| self.edge_start(e)).collect();

        let new_edge = self.add_edge(start, end, &sequence, coverage)?;
        self.events.push(GraphEvent::Merge {
            old_edges: path.to_vec(),
            old_lengths: old_lengths.clone(),
            new_edge,
        });
        let new_twin = self.conjugate(new_edge);
        if new_twin != new_edge {
            self.events.push(GraphEvent::Merge {
                old_edges: path.iter().rev().map(|&e| self.conjugate(e)).collect(),
                old_lengths: old_lengths.iter().rev().copied().collect(),
                new_edge: new_twin,
            });
        }

        for &e in path {
            if self.contains_edge(e) {
                self.delete_edge(e)?;
            }
        }
        for v in inner {
            self.delete_vertex_if_isolated(v)?;
        }
        Ok(new_edge)
    }

    /// Glue `first` onto `second`: both are replaced by one edge on
    /// `second`'s endpoints carrying the summed coverage.
    pub fn glue_edges(&mut self, first: EdgeId, second: EdgeId) -> Result<EdgeId> {
        if !self.contains_edge(first) || !self.contains_edge(second) || first == second {
            return Err(graph_error(format!("cannot glue {first} onto {second}")));
        }
        let data = self.edge(second).clone();
        let coverage = {
            let len = self.length(second).max(1) as f64;
            (self.coverage(first) * self.length(first) as f64
                + self.coverage(second) * self.length(second) as f64)
                / len
        };
        let first_start = self.edge_start(first);
        let first_end = self.edge_end(first);

        let new_edge = self.add_edge(data.start, data.end, &data.sequence, coverage)?;
        self.events.push(GraphEvent::Glue {
            new_edge,
            first,
            second,
        });
        let new_twin = self.conjugate(new_edge);
        if new_twin != new_edge {
            self.events.push(GraphEvent::Glue {
                new_edge: new_twin,
                first: self.conjugate(first),
                second: self.conjugate(second),
            });
        }
        self.delete_edge(first)?;
        if self.contains_edge(second) {
            self.delete_edge(second)?;
        }
        self.delete_vertex_if_isolated(first_start)?;
        if first_end != first_start {
            self.delete_vertex_if_isolated(first_end)?;
        }
        Ok(new_edge)
    }

    /// Split `e` after `position` k+1-mers into two edges joined by a new
    /// vertex.
    pub fn split_edge(&mut self, e: EdgeId, position: usize) -> Result<(EdgeId, EdgeId)> {
        if !self.contains_edge(e) {
            return Err(graph_error(format!("cannot split unknown edge {e}")));
        }
        let old_length = self.length(e);
        if position == 0 || position >= old_length {
            return Err(graph_error(format!(
                "split position {position} outside edge {e} of length {old_length}"
            )));
        }
        if self.is_symmetric() && self.conjugate(e) == e {
            return Err(graph_error(format!("cannot split self-conjugate edge {e}")));
        }

        let k = self.k;
        let data = self.edge(e).clone();
        let middle = self.add_vertex();
        let left = &data.sequence[..position + k];
        let right = &data.sequence[position..];
        let first = self.add_edge(data.start, middle, left, data.coverage)?;
        let second = self.add_edge(middle, data.end, right, data.coverage)?;

        self.events.push(GraphEvent::Split {
            old_edge: e,
            old_length,
            new_edge1: first,
            new_edge1_length: position,
            new_edge2: second,
        });
        if self.is_symmetric() {
            // the twin of the right piece is the left piece of the twin
            self.events.push(GraphEvent::Split {
                old_edge: self.conjugate(e),
                old_length,
                new_edge1: self.conjugate(second),
                new_edge1_length: old_length - position,
                new_edge2: self.conjugate(first),
            });
        }
        self.delete_edge(e)?;
        Ok((first, second))
    }

    // ----- snapshots ------------------------------------------------------

    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            k: self.k,
            conjugation: self.conjugation,
            vertices: self
                .vertices
                .iter()
                .map(|(v, data)| VertexRecord {
                    id: v.0,
                    conjugate: data.conjugate.0,
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(e, data)| EdgeRecord {
                    id: e.0,
                    start: data.start.0,
                    end: data.end.0,
                    sequence: data.sequence.clone(),
                    coverage: data.coverage,
                    conjugate: data.conjugate.0,
                })
                .collect(),
        }
    }

    /// Rebuild a graph from a snapshot, checking handle and strand
    /// consistency.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = AssemblyGraph::new(snapshot.k, snapshot.conjugation);
        let mut max_id = 0usize;

        for record in &snapshot.vertices {
            let conjugate = match graph.conjugation {
                Conjugation::Symmetric => VertexId(record.conjugate),
                Conjugation::Asymmetric => VertexId(record.id),
            };
            graph.vertices.insert(
                VertexId(record.id),
                VertexData {
                    conjugate,
                    ..Default::default()
                },
            );
            max_id = max_id.max(record.id);
        }
        for record in snapshot.edges {
            let (start, end) = (VertexId(record.start), VertexId(record.end));
            if !graph.contains_vertex(start) || !graph.contains_vertex(end) {
                return Err(graph_error(format!(
                    "edge {} references a missing vertex",
                    record.id
                )));
            }
            if record.sequence.len() <= graph.k {
                return Err(graph_error(format!(
                    "edge {} is not longer than k",
                    record.id
                )));
            }
            let e = EdgeId(record.id);
            let conjugate = match graph.conjugation {
                Conjugation::Symmetric => EdgeId(record.conjugate),
                Conjugation::Asymmetric => e,
            };
            graph.link_edge(
                e,
                EdgeData {
                    start,
                    end,
                    sequence: record.sequence,
                    coverage: record.coverage,
                    conjugate,
                },
            );
            max_id = max_id.max(record.id);
        }
        graph.next_id = max_id + 1;
        graph.discard_events();

        if graph.is_symmetric() {
            for (v, data) in &graph.vertices {
                match graph.vertices.get(&data.conjugate) {
                    Some(twin) if twin.conjugate == *v => {}
                    _ => {
                        return Err(graph_error(format!(
                            "vertex {v} has an inconsistent conjugate"
                        )))
                    }
                }
            }
            for (e, data) in &graph.edges {
                let twin = graph.edges.get(&data.conjugate).ok_or_else(|| {
                    graph_error(format!("edge {e} has a missing conjugate"))
                })?;
                if twin.conjugate != *e
                    || twin.start != graph.vertices[&data.end].conjugate
                    || twin.end != graph.vertices[&data.start].conjugate
                {
                    return Err(graph_error(format!(
                        "edge {e} has an inconsistent conjugate"
                    )));
                }
            }
        }
        Ok(graph)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open graph file: {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse graph file: {}", path.display()))?;
        Self::from_snapshot(snapshot)
    }
}
