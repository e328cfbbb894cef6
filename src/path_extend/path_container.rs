use super::bidirectional_path::{BidirectionalPath, PathId};
use crate::core::assembly_graph::AssemblyGraph;

/// Paths stored together with their reverse complements.
///
/// The pair at index `i` carries ids `2i` (primary strand) and `2i + 1`
/// (conjugate). Ids are reassigned whenever pairs are reordered or dropped.
#[derive(Debug, Clone, Default)]
pub struct PathContainer<'g> {
    pairs: Vec<(BidirectionalPath<'g>, BidirectionalPath<'g>)>,
}

impl<'g> PathContainer<'g> {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// One single-edge seed per conjugate pair of edges.
    pub fn seeds(graph: &'g AssemblyGraph) -> Self {
        let mut container = Self::new();
        for e in graph.edges() {
            if graph.conjugate(e) < e {
                continue;
            }
            container.add_path(BidirectionalPath::from_edges(graph, &[e]));
        }
        container
    }

    pub fn add_pair(&mut self, path: BidirectionalPath<'g>, conjugate: BidirectionalPath<'g>) -> usize {
        let index = self.pairs.len();
        self.pairs.push((path, conjugate));
        self.assign_ids(index);
        index
    }

    pub fn add_path(&mut self, path: BidirectionalPath<'g>) -> usize {
        let conjugate = path.conjugate();
        self.add_pair(path, conjugate)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, i: usize) -> &BidirectionalPath<'g> {
        &self.pairs[i].0
    }

    pub fn get_conjugate(&self, i: usize) -> &BidirectionalPath<'g> {
        &self.pairs[i].1
    }

    pub fn pair_mut(&mut self, i: usize) -> (&mut BidirectionalPath<'g>, &mut BidirectionalPath<'g>) {
        let (path, conjugate) = &mut self.pairs[i];
        (path, conjugate)
    }

    pub fn by_id(&self, id: PathId) -> Option<&BidirectionalPath<'g>> {
        let (path, conjugate) = self.pairs.get(id / 2)?;
        Some(if id % 2 == 0 { path } else { conjugate })
    }

    pub fn by_id_mut(&mut self, id: PathId) -> Option<&mut BidirectionalPath<'g>> {
        let (path, conjugate) = self.pairs.get_mut(id / 2)?;
        Some(if id % 2 == 0 { path } else { conjugate })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(BidirectionalPath<'g>, BidirectionalPath<'g>)> + '_ {
        self.pairs.iter()
    }

    /// Longest primary strand first; ties keep their order.
    pub fn sort_by_length(&mut self) {
        self.pairs.sort_by(|a, b| b.0.length().cmp(&a.0.length()));
        self.reassign_ids();
    }

    /// Drop empty pairs and pairs shorter than `min_length`.
    pub fn filter_by_length(&mut self, min_length: usize) {
        self.pairs
            .retain(|(path, _)| !path.is_empty() && path.length() >= min_length);
        self.reassign_ids();
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn total_length(&self) -> usize {
        self.pairs.iter().map(|(path, _)| path.length()).sum()
    }

    fn reassign_ids(&mut self) {
        for i in 0..self.pairs.len() {
            self.assign_ids(i);
        }
    }

    fn assign_ids(&mut self, index: usize) {
        let (path, conjugate) = &mut self.pairs[index];
        path.set_id(2 * index);
        conjugate.set_id(2 * index + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly_graph::Conjugation;

    #[test]
    fn test_seeds_one_per_conjugate_pair() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Symmetric);
        let v: Vec<_> = (0..3).map(|_| graph.add_vertex()).collect();
        let a = graph.add_edge(v[0], v[1], "ACGTA", 1.0).unwrap();
        graph.add_edge(v[1], v[2], "TAGGC", 1.0).unwrap();

        let seeds = PathContainer::seeds(&graph);
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds.get(0).front(), Some(a));
        assert_eq!(seeds.get_conjugate(0).front(), Some(graph.conjugate(a)));
        assert_eq!(seeds.get_conjugate(1).id(), 3);
        assert_eq!(seeds.by_id(1).and_then(|p| p.front()), Some(graph.conjugate(a)));
    }

    #[test]
    fn test_sort_and_filter_reassign_ids() {
        let mut graph = AssemblyGraph::new(2, Conjugation::Asymmetric);
        let v: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        let short = graph.add_edge(v[0], v[1], "ACG", 1.0).unwrap(); // 1
        let long = graph.add_edge(v[2], v[3], "ACGTACGT", 1.0).unwrap(); // 6

        let mut container = PathContainer::new();
        container.add_path(BidirectionalPath::from_edges(&graph, &[short]));
        container.add_path(BidirectionalPath::from_edges(&graph, &[long]));
        container.add_path(BidirectionalPath::new(&graph));
        container.sort_by_length();
        assert_eq!(container.get(0).front(), Some(long));
        assert_eq!(container.get(0).id(), 0);

        container.filter_by_length(2);
        assert_eq!(container.len(), 1);
        assert_eq!(container.total_length(), 6);
        assert_eq!(container.get_conjugate(0).id(), 1);
    }
}
