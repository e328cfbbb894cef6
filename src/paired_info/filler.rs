use anyhow::Result;
use rayon::prelude::*;
use tracing::info;

use super::index::PairedInfoIndex;
use super::point::Point;
use crate::core::assembly_graph::AssemblyGraph;
use crate::core::paired_reads::MappedReadPair;

/// Turns mapped read pairs into paired observations.
pub struct PairedIndexFiller<'a> {
    graph: &'a AssemblyGraph,
    chunk_size: usize,
}

impl<'a> PairedIndexFiller<'a> {
    pub fn new(graph: &'a AssemblyGraph) -> Self {
        Self {
            graph,
            chunk_size: 10_000,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Every edge of the first mate is linked to every edge of the second
    /// mate at the distance between their starts, weighted by the product of
    /// the mapped spans.
    pub fn process_pair(&self, index: &mut PairedInfoIndex, pair: &MappedReadPair) -> Result<()> {
        let (path1, path2) = (&pair.first, &pair.second);
        let mut distance1 = pair.distance as i64 + path1.start_pos as i64 - path2.start_pos as i64;
        for i in 0..path1.len() {
            let mut distance2 = distance1;
            for j in 0..path2.len() {
                let weight = path1.corrected_length(self.graph, i) as f64
                    * path2.corrected_length(self.graph, j) as f64;
                index.add_point(
                    path1.edges[i],
                    path2.edges[j],
                    Point::new(distance2 as f64, weight, 0.0),
                    true,
                )?;
                distance2 += self.graph.length(path2.edges[j]) as i64;
            }
            distance1 -= self.graph.length(path1.edges[i]) as i64;
        }
        Ok(())
    }

    /// Fill `index` from `pairs`. Chunks are processed on the rayon pool into
    /// private indices which are merged afterwards.
    pub fn fill(&self, index: &mut PairedInfoIndex, pairs: &[MappedReadPair]) -> Result<()> {
        index.init(self.graph)?;
        info!("🔗 Processing {} paired reads", pairs.len());

        let partial: Vec<PairedInfoIndex> = pairs
            .par_chunks(self.chunk_size)
            .map(|chunk| -> Result<PairedInfoIndex> {
                let mut local = PairedInfoIndex::new();
                for pair in chunk {
                    self.process_pair(&mut local, pair)?;
                }
                Ok(local)
            })
            .collect::<Result<Vec<_>>>()?;

        for local in &partial {
            index.add_all(local)?;
        }
        info!("✅ Paired info index holds {} points", index.size());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;
    use crate::core::paired_reads::MappingPath;

    #[test]
    fn test_single_pair_distances_and_weights() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTACGTACGTA", 1.0).unwrap(); // 10
        let b = graph.add_edge(v[1], v[2], "GTAGGCAGGCA", 1.0).unwrap(); // 8
        let c = graph.add_edge(v[2], v[3], "GCAATTCCG", 1.0).unwrap(); // 6

        let pair = MappedReadPair {
            first: MappingPath::new(vec![a], 2, 9),
            second: MappingPath::new(vec![b, c], 1, 4),
            distance: 20,
        };
        let filler = PairedIndexFiller::new(&graph);
        let mut index = PairedInfoIndex::new();
        filler.process_pair(&mut index, &pair).unwrap();

        let ab = index.edge_pair_info(a, b);
        let ac = index.edge_pair_info(a, c);
        assert_eq!(ab[0].d, 21.0);
        assert_eq!(ab[0].weight, 7.0 * 7.0);
        assert_eq!(ac[0].d, 29.0);
        assert_eq!(ac[0].weight, 7.0 * 4.0);
        assert_eq!(index.edge_pair_info(c, a)[0].d, -29.0);
    }

    #[test]
    fn test_parallel_fill_matches_sequential() {
        let mut graph = AssemblyGraph::new(3, Conjugation::Asymmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTACGTACGTA", 1.0).unwrap();
        let b = graph.add_edge(v[1], v[2], "GTAGGCAGGCA", 1.0).unwrap();

        let pairs: Vec<MappedReadPair> = (0..50)
            .map(|i| MappedReadPair {
                first: MappingPath::new(vec![a], 0, 10),
                second: MappingPath::new(vec![b], 0, 8),
                distance: 12 + (i % 3),
            })
            .collect();

        let mut sequential = PairedInfoIndex::new();
        PairedIndexFiller::new(&graph)
            .with_chunk_size(usize::MAX)
            .fill(&mut sequential, &pairs)
            .unwrap();
        let mut parallel = PairedInfoIndex::new();
        PairedIndexFiller::new(&graph)
            .with_chunk_size(7)
            .fill(&mut parallel, &pairs)
            .unwrap();

        assert_eq!(sequential.size(), parallel.size());
        let total = |index: &PairedInfoIndex| -> f64 {
            index.edge_pair_info(a, b).iter().map(|p| p.weight).sum()
        };
        assert!((total(&sequential) - total(&parallel)).abs() < 1e-6);
        assert!(!sequential.edge_pair_info(a, a).is_empty());
    }
}
