pub mod filler;
pub mod index;
pub mod normalizer;
pub mod point;

pub use filler::PairedIndexFiller;
pub use index::{Histogram, PairInfoRecord, PairedInfoIndex};
pub use normalizer::{
    fill_normalized_index, CoverageNormalizer, InsertSizeNormalizer, JumpingNormalizer,
    TrivialNormalizer, WeightNormalizer,
};
pub use point::{clusters_intersect, PairInfo, Point};
