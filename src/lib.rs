//! # PathForge - Repeat Resolution and Path Extension
//!
//! The graph-level core of a de Bruijn assembler: paired information
//! between edges, vertex splitting that resolves repeats, and growth of
//! contigs through the graph guided by the same paired information.

pub mod assembly;
pub mod core;
pub mod paired_info;
pub mod path_extend;
pub mod utils;

// Re-export commonly used types at crate level
pub use crate::assembly::{RepeatResolver, ResolvedGraph};
pub use crate::core::{AssemblyGraph, Conjugation, EdgeId, LibraryStats, VertexId};
pub use crate::paired_info::PairedInfoIndex;
pub use crate::path_extend::{BidirectionalPath, CompositeExtender, PathContainer};

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;

/// Error type used throughout the crate
pub type Error = anyhow::Error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_result_type() -> Result<()> {
        let success: Result<i32> = Ok(42);
        let error: Result<i32> = Err(anyhow::anyhow!("test error"));

        assert!(success.is_ok());
        assert_eq!(success?, 42);

        assert!(error.is_err());
        assert!(error.unwrap_err().to_string().contains("test error"));
        Ok(())
    }

    #[test]
    fn test_module_exports() {
        let graph = AssemblyGraph::new(21, Conjugation::Symmetric);
        let seeds = PathContainer::seeds(&graph);
        assert!(seeds.is_empty());
        assert!(PairedInfoIndex::new().is_empty());
    }
}
