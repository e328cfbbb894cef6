use std::collections::BTreeMap;

use crate::core::assembly_graph::EdgeId;
use crate::core::math;
use crate::paired_info::{PairInfo, PairedInfoIndex};

/// Paired information linking edges of the graph being resolved (`first`)
/// to edges of the original graph (`second`).
///
/// The two id spaces may collide, so no backward twins are kept and removal
/// never touches entries keyed by another edge. Two infos are the same entry
/// when they agree on both edges and on the distance.
#[derive(Debug, Clone, Default)]
pub struct MixedPairedData {
    infos: BTreeMap<EdgeId, Vec<PairInfo>>,
    size: usize,
}

impl MixedPairedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every point of `index` for which `image(e1, e2)` names the
    /// resolved-graph anchor. Returns the number of points seen and skipped.
    pub fn from_index(
        index: &PairedInfoIndex,
        image: impl Fn(EdgeId, EdgeId) -> Option<EdgeId>,
    ) -> (Self, usize, usize) {
        let mut data = Self::new();
        let mut seen = 0;
        let mut skipped = 0;
        for (e1, e2, histogram) in index.iter() {
            for point in histogram.values() {
                seen += 1;
                match image(e1, e2) {
                    Some(new_first) => {
                        data.insert(PairInfo::new(new_first, e2, *point));
                    }
                    None => skipped += 1,
                }
            }
        }
        (data, seen, skipped)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Insert unless an equal entry exists. Returns whether it was inserted.
    pub fn insert(&mut self, info: PairInfo) -> bool {
        let bucket = self.infos.entry(info.first).or_default();
        let present = bucket
            .iter()
            .any(|x| x.second == info.second && math::eq(x.d(), info.d()));
        if present {
            return false;
        }
        let at = bucket.partition_point(|x| {
            (x.second, x.d()) < (info.second, info.d())
        });
        bucket.insert(at, info);
        self.size += 1;
        true
    }

    /// All infos anchored on `edge`, ordered by target then distance.
    pub fn edge_infos(&self, edge: EdgeId) -> Vec<PairInfo> {
        self.infos.get(&edge).cloned().unwrap_or_default()
    }

    pub fn delete_edge_info(&mut self, edge: EdgeId) {
        if let Some(bucket) = self.infos.remove(&edge) {
            self.size -= bucket.len();
        }
    }

    /// Re-anchor a copy of `info` on `new_first`. The original entry stays
    /// until its edge is cleared.
    pub fn replace_first_edge(&mut self, info: &PairInfo, new_first: EdgeId) {
        self.insert(PairInfo::new(new_first, info.second, info.point));
    }
}
