pub mod assembly_graph;
pub mod math;
pub mod paired_reads;

// Re-export key types for resolution and extension
pub use assembly_graph::{
    AssemblyGraph, Conjugation, EdgeId, GraphEvent, GraphObserver, GraphSnapshot, VertexId,
};
pub use paired_reads::{LibraryStats, MappedReadPair, MappingPath};
