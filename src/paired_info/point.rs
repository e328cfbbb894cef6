use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

use crate::core::assembly_graph::EdgeId;
use crate::core::math;

/// One distance observation between two edges.
///
/// Two points occupy the same histogram slot when their distances round to
/// the same integer; colliding points are merged with [`Point::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub d: f64,
    pub weight: f64,
    pub var: f64,
}

impl Point {
    pub fn new(d: f64, weight: f64, var: f64) -> Self {
        Self { d, weight, var }
    }

    /// Histogram slot of this point.
    pub fn key(&self) -> i64 {
        math::round_to_zero(self.d)
    }

    /// Union of the two `[d - var, d + var]` intervals, weights summed.
    pub fn merge(&self, other: &Point) -> Point {
        let left = (self.d - self.var).min(other.d - other.var);
        let right = (self.d + self.var).max(other.d + other.var);
        Point {
            d: (left + right) * 0.5,
            weight: self.weight + other.weight,
            var: (right - left) * 0.5,
        }
    }

    /// The same observation expressed between the conjugates of edges of
    /// lengths `l1` and `l2`.
    pub fn conjugate(&self, l1: usize, l2: usize) -> Point {
        Point {
            d: self.d + l2 as f64 - l1 as f64,
            ..*self
        }
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point { d: -self.d, ..self }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Point: distance = {}, weight = {}, variance = {}",
            self.d, self.weight, self.var
        )
    }
}

/// Whether the variance windows of two points overlap.
pub fn clusters_intersect(p1: &Point, p2: &Point) -> bool {
    math::le(p1.d, p2.d + p1.var + p2.var) && math::le(p2.d, p1.d + p1.var + p2.var)
}

/// An observation anchored on an ordered pair of edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairInfo {
    pub first: EdgeId,
    pub second: EdgeId,
    pub point: Point,
}

impl PairInfo {
    pub fn new(first: EdgeId, second: EdgeId, point: Point) -> Self {
        Self {
            first,
            second,
            point,
        }
    }

    pub fn d(&self) -> f64 {
        self.point.d
    }

    pub fn weight(&self) -> f64 {
        self.point.weight
    }

    pub fn var(&self) -> f64 {
        self.point.var
    }

    /// An edge observed with itself at distance zero has no twin.
    pub fn is_symmetric(&self) -> bool {
        self.first == self.second && self.point.key() == 0
    }

    /// The same observation seen from the second edge.
    pub fn backward(&self) -> PairInfo {
        PairInfo {
            first: self.second,
            second: self.first,
            point: -self.point,
        }
    }
}

impl fmt::Display for PairInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PairInfo({} -> {}, {})", self.first, self.second, self.point)
    }
}
