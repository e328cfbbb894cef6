//! Vertex-local views of paired information
//! =======================================
//!
//! While one vertex is being resolved, every observation anchored on one of
//! its incident edges is re-expressed as an [`EdgeInfo`]: the same pair info,
//! plus the side of the vertex it came from and its distance measured from
//! the vertex itself. Chains of mutually consistent observations become
//! [`PathInfo`]s, the unit the coloring works on.

use std::cmp::Ordering;
use std::fmt;

use crate::core::assembly_graph::{AssemblyGraph, EdgeId};
use crate::paired_info::PairInfo;

/// Fixed slack added to variance windows when comparing distances.
pub const DISTANCE_SLACK: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A pair info seen from a vertex. `info.first` lives in the resolved graph,
/// `info.second` in the original one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeInfo {
    pub info: PairInfo,
    pub direction: Direction,
    pub edge: EdgeId,
    pub distance: f64,
}

impl EdgeInfo {
    pub fn new(info: PairInfo, direction: Direction, edge: EdgeId, distance: f64) -> Self {
        Self {
            info,
            direction,
            edge,
            distance,
        }
    }

    /// Whether the target of `previous` sits directly before our target in
    /// the original graph, at a distance consistent with both observations.
    pub fn follows(&self, previous: &EdgeInfo, old_graph: &AssemblyGraph) -> bool {
        old_graph.edge_end(previous.info.second) == old_graph.edge_start(self.info.second)
            && ((old_graph.length(previous.info.second) as f64 + previous.info.d()) - self.info.d()).abs()
                < DISTANCE_SLACK + self.info.var() + previous.info.var()
    }
}

/// Ordering used for the per-vertex info list: anchor id, then distance
/// (1e-5 resolution), then target id.
pub fn compare_edge_infos(a: &EdgeInfo, b: &EdgeInfo) -> Ordering {
    a.info
        .first
        .cmp(&b.info.first)
        .then_with(|| distance_bucket(a.info.d()).cmp(&distance_bucket(b.info.d())))
        .then_with(|| a.info.second.cmp(&b.info.second))
}

fn distance_bucket(d: f64) -> i64 {
    (d * 1e5).round() as i64
}

/// An anchor edge followed by a chain of observations it carries.
///
/// Position 0 is the anchor itself at distance 0; position `i > 0` is the
/// target of `chain[i - 1]` at its recorded distance.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub anchor: EdgeId,
    pub chain: Vec<PairInfo>,
}

impl PathInfo {
    pub fn new(anchor: EdgeId) -> Self {
        Self {
            anchor,
            chain: Vec::new(),
        }
    }

    pub fn push(&mut self, info: PairInfo) {
        self.chain.push(info);
    }

    /// Number of positions, anchor included.
    pub fn len(&self) -> usize {
        self.chain.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn edge_at(&self, i: usize) -> EdgeId {
        if i == 0 {
            self.anchor
        } else {
            self.chain[i - 1].second
        }
    }

    pub fn distance_at(&self, i: usize) -> f64 {
        if i == 0 {
            0.0
        } else {
            self.chain[i - 1].d()
        }
    }

    /// Variance of the observation that placed position `i` (`i >= 1`).
    pub fn var_at(&self, i: usize) -> f64 {
        self.chain[i - 1].var()
    }

    /// Whether position `l >= 1` carries the observation `info`.
    pub fn contains(&self, info: &PairInfo) -> bool {
        info.first == self.anchor
            && (1..self.len()).any(|l| {
                self.edge_at(l) == info.second && (info.d() - self.distance_at(l)).abs() < 1e-5
            })
    }
}

impl fmt::Display for PathInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.anchor)?;
        for info in &self.chain {
            write!(f, " -> {}({:.1})", info.second, info.d())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;
    use crate::paired_info::Point;

    #[test]
    fn test_follows_requires_adjacency_and_distance() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let anchor = graph.add_edge(v[0], v[1], "ACGTACG", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "CGTTAGCTAG", 1.0).unwrap(); // 7
        let c = graph.add_edge(v[2], v[3], "TAGCC", 1.0).unwrap();

        let first = EdgeInfo::new(
            PairInfo::new(anchor, b, Point::new(4.0, 1.0, 0.0)),
            Direction::Outgoing,
            b,
            4.0,
        );
        let second = EdgeInfo::new(
            PairInfo::new(anchor, c, Point::new(11.05, 1.0, 0.0)),
            Direction::Outgoing,
            c,
            11.05,
        );
        let far = EdgeInfo::new(
            PairInfo::new(anchor, c, Point::new(13.0, 1.0, 1.0)),
            Direction::Outgoing,
            c,
            13.0,
        );
        assert!(second.follows(&first, &graph));
        assert!(!first.follows(&second, &graph));
        assert!(!far.follows(&first, &graph));
    }

    #[test]
    fn test_path_info_positions() {
        let mut path = PathInfo::new(EdgeId(1));
        path.push(PairInfo::new(EdgeId(1), EdgeId(5), Point::new(10.0, 1.0, 2.0)));
        path.push(PairInfo::new(EdgeId(1), EdgeId(7), Point::new(30.0, 1.0, 0.5)));
        assert_eq!(path.len(), 3);
        assert_eq!(path.edge_at(0), EdgeId(1));
        assert_eq!(path.edge_at(2), EdgeId(7));
        assert_eq!(path.distance_at(0), 0.0);
        assert_eq!(path.distance_at(1), 10.0);
        assert_eq!(path.var_at(2), 0.5);
        assert!(path.contains(&PairInfo::new(EdgeId(1), EdgeId(7), Point::new(30.0, 9.0, 0.0))));
        assert!(!path.contains(&PairInfo::new(EdgeId(2), EdgeId(7), Point::new(30.0, 9.0, 0.0))));
        assert_eq!(path.to_string(), "e1 -> e5(10.0) -> e7(30.0)");
    }

    #[test]
    fn test_ordering_groups_by_anchor_then_distance() {
        let mk = |first: usize, second: usize, d: f64| {
            EdgeInfo::new(
                PairInfo::new(EdgeId(first), EdgeId(second), Point::new(d, 1.0, 0.0)),
                Direction::Outgoing,
                EdgeId(second),
                d,
            )
        };
        let mut infos = vec![mk(2, 1, 0.0), mk(1, 9, 20.0), mk(1, 3, 20.0), mk(1, 4, 5.0)];
        infos.sort_by(compare_edge_infos);
        let order: Vec<_> = infos.iter().map(|ei| (ei.info.first.0, ei.info.second.0)).collect();
        assert_eq!(order, vec![(1, 4), (1, 3), (1, 9), (2, 1)]);
    }
}
