//! Repeat resolution over paired information
//!
//! **Production Code**: `repeat_resolver.rs` - vertex splitting driven by paired info
//! **Support**: `edge_info.rs`, `paired_data.rs`, `distance_counter.rs`

pub mod distance_counter;
pub mod edge_info;
pub mod paired_data;
pub mod repeat_resolver;

pub use distance_counter::FastDistanceCounter;
pub use edge_info::{Direction, EdgeInfo, PathInfo};
pub use paired_data::MixedPairedData;
pub use repeat_resolver::{
    CheatingMode, RepeatResolver, ResolvedGraph, ResolverContext, ResolverSettings,
};
