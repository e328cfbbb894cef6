pub mod configuration;
pub mod format_writers;

pub use configuration::{ConfigurationManager, PipelineConfiguration, PipelineError};
