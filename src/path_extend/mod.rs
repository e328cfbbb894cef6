//! Path extension: growing contigs edge by edge through the assembly graph
//! guided by paired information.

pub mod bidirectional_path;
pub mod composite;
pub mod coverage_map;
pub mod extender;
pub mod extension_chooser;
pub mod gap_analyzer;
pub mod loop_detector;
pub mod loop_resolver;
pub mod path_container;

pub use bidirectional_path::{compare_paths, BidirectionalPath, Gap, PathEvent, PathId};
pub use composite::{CompositeExtender, RepeatDetector};
pub use coverage_map::{GraphCoverageMap, UsedUniqueStorage};
pub use extender::{
    GrowContext, GrowStep, LoopDetectingExtender, MultiStep, PathExtender, RnaScaffolding, ScaffoldingStep,
    SimpleStep,
};
pub use extension_chooser::{
    EdgeWithDistance, ExtensionChooser, PairedInfoChooser, PairedInfoWeightCounter, ScaffoldingChooser,
    TrivialExtensionChooser, WeightCounter,
};
pub use gap_analyzer::{CompositeGapAnalyzer, GapAnalyzer, GapDescription, HammingGapAnalyzer, LAGapAnalyzer};
pub use loop_detector::{edge_in_short_loop, loop_and_exit, prev_edge_in_short_loop, InsertSizeLoopDetector};
pub use loop_resolver::{CovShortLoopResolver, LoopResolver, ShortLoopResolver, SimpleLoopResolver};
pub use path_container::PathContainer;
