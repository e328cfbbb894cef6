use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::core::assembly_graph::{AssemblyGraph, EdgeId};

/// Paired-end library statistics
///
/// These are the numbers every consumer of paired information needs:
/// - read length and insert size, which bound where a mate can land
/// - the insert size spread, used for the plausibility ceiling `is_max`
/// - average k-mer coverage of the graph, used to normalise weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryStats {
    pub read_length: usize,
    pub insert_size: usize,
    pub insert_size_deviation: f64,
    pub avg_coverage: f64,
}

impl Default for LibraryStats {
    fn default() -> Self {
        Self {
            read_length: 100,
            insert_size: 300,
            insert_size_deviation: 30.0,
            avg_coverage: 30.0,
        }
    }
}

impl LibraryStats {
    /// Upper insert size bound (mean + 3 sigma).
    pub fn is_max(&self) -> usize {
        self.insert_size + (3.0 * self.insert_size_deviation).round() as usize
    }

    /// Mean and deviation of an observed insert size sample, keeping the
    /// other fields.
    pub fn with_insert_sizes(mut self, observed: &[usize]) -> Result<Self> {
        if observed.is_empty() {
            return Err(anyhow!("Cannot estimate insert size from an empty sample"));
        }
        let n = observed.len() as f64;
        let mean = observed.iter().sum::<usize>() as f64 / n;
        let variance = observed
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        self.insert_size = mean.round() as usize;
        self.insert_size_deviation = variance.sqrt();
        Ok(self)
    }
}

/// Alignment of one read onto a chain of consecutive graph edges.
///
/// `start_pos` is the offset of the read start inside the first edge,
/// `end_pos` the offset of the read end inside the last edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingPath {
    pub edges: Vec<EdgeId>,
    pub start_pos: usize,
    pub end_pos: usize,
}

impl MappingPath {
    pub fn new(edges: Vec<EdgeId>, start_pos: usize, end_pos: usize) -> Self {
        Self {
            edges,
            start_pos,
            end_pos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Length of the part of edge `i` actually covered by the read.
    pub fn corrected_length(&self, graph: &AssemblyGraph, i: usize) -> usize {
        let mut length = graph.length(self.edges[i]);
        if i == 0 {
            length = length.saturating_sub(self.start_pos);
        }
        if i + 1 == self.edges.len() {
            length = length.saturating_sub(graph.length(self.edges[i]).saturating_sub(self.end_pos));
        }
        length
    }
}

/// Both mates of a read pair mapped onto the graph, with the distance
/// between the two read starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedReadPair {
    pub first: MappingPath,
    pub second: MappingPath,
    pub distance: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    #[test]
    fn test_is_max_uses_three_sigma() {
        let stats = LibraryStats {
            insert_size: 200,
            insert_size_deviation: 10.0,
            ..Default::default()
        };
        assert_eq!(stats.is_max(), 230);
    }

    #[test]
    fn test_insert_size_estimation() {
        let stats = LibraryStats::default()
            .with_insert_sizes(&[290, 300, 310])
            .unwrap();
        assert_eq!(stats.insert_size, 300);
        assert!((stats.insert_size_deviation - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!(LibraryStats::default().with_insert_sizes(&[]).is_err());
    }

    #[test]
    fn test_corrected_length_trims_ends() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let a = graph.add_vertex();
        let b = graph.add_vertex();
        let c = graph.add_vertex();
        let e1 = graph.add_edge(a, b, "ACGTACGTAC", 1.0).unwrap();
        let e2 = graph.add_edge(b, c, "TACGGATTCA", 1.0).unwrap();

        let path = MappingPath::new(vec![e1, e2], 2, 4);
        assert_eq!(path.corrected_length(&graph, 0), 5);
        assert_eq!(path.corrected_length(&graph, 1), 4);

        let single = MappingPath::new(vec![e1], 1, 5);
        assert_eq!(single.corrected_length(&graph, 0), 4);
    }
}
