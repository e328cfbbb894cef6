use anyhow::Result;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::paired_reads::LibraryStats;

/// Configuration for repeat resolution and path extension
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfiguration {
    /// General settings
    pub general: GeneralConfig,
    /// Paired-end library statistics
    pub library: LibraryConfig,
    /// Vertex-splitting repeat resolver
    pub repeat_resolver: RepeatResolverConfig,
    /// Path extension engine
    pub path_extend: PathExtendConfig,
    /// Gap analyzers used by scaffolding
    pub gap_closer: GapCloserConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub name: String,
    /// K-mer size of the input graph
    pub k: usize,
    /// Output directory
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub read_length: usize,
    pub insert_size: usize,
    pub insert_size_deviation: f64,
    /// Average k-mer coverage of the graph
    pub avg_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatResolverConfig {
    /// Resolve one strand and mirror the result onto the conjugate
    pub symmetric_resolve: bool,
    /// Split copies below `avg_coverage * proportion / 2` may be pruned
    pub inresolve_cutoff_proportion: f64,
    /// Tolerance around the trusted distance in permissive cheating mode
    pub near_vertex: usize,
    /// Search depth of the distance counter
    pub max_distance: usize,
    /// Edges longer than this are never resolved through
    pub max_repeat_length: usize,
    /// 0 = off, 1 = tracking, 2 = permissive
    pub cheating_mode: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathExtendConfig {
    pub max_repeat_length: usize,
    /// Count short loop traversals from coverage instead of paired weights
    pub resolve_short_loops: bool,
    /// Hand paths that enter a short loop to a loop resolver
    pub investigate_short_loops: bool,
    pub use_unique_edges: bool,
    /// Re-grow rounds of a path and its conjugate
    pub max_grow_rounds: usize,
    pub min_contig_length: usize,
    /// Reject scaffolding links into the path's own conjugate
    pub avoid_rc_connections: bool,
    /// Scaffold only at sinks
    pub check_sink: bool,
    pub weight_threshold: f64,
    pub single_threshold: f64,
    /// Add a scaffolding extender after the simple one
    pub scaffolding: bool,
    /// Fork on two-candidate bulges
    pub multi_extend: bool,
    /// Try a strict chooser demanding `rna_min_overlap` before the regular one
    pub rna_scaffolding: bool,
    pub rna_min_overlap: i64,
    /// Merge a path into an already grown one sharing its tail
    pub detect_repeats_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GapCloserConfig {
    pub min_gap_score: f64,
    pub short_overlap_threshold: usize,
    pub basic_overlap_length: usize,
    pub may_overlap_threshold: i64,
    pub must_overlap_threshold: i64,
    pub artificial_gap: i64,
    pub min_la_length: usize,
    pub flank_multiplication_coefficient: f64,
    pub flank_addition_coefficient: i64,
    pub min_identity: f64,
    pub use_hamming: bool,
    pub use_la: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log output format (json, pretty, compact)
    pub format: String,
    /// Log file path (optional)
    pub file_path: Option<PathBuf>,
}

/// Custom error types for better error handling
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Input/Output error: {message}")]
    IOError { message: String },

    #[error("Graph error: {message}")]
    GraphError { message: String },

    #[error("Validation error: {field} is invalid: {reason}")]
    ValidationError { field: String, reason: String },
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IOError {
            message: err.to_string(),
        }
    }
}

fn invalid(field: &str, reason: &str) -> PipelineError {
    PipelineError::ValidationError {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

impl LibraryConfig {
    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            read_length: self.read_length,
            insert_size: self.insert_size,
            insert_size_deviation: self.insert_size_deviation,
            avg_coverage: self.avg_coverage,
        }
    }
}

impl PipelineConfiguration {
    /// Check parameter ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let k = self.general.k;
        if k == 0 {
            return Err(invalid("general.k", "must be greater than 0"));
        }
        if self.library.read_length <= k {
            return Err(invalid("library.read_length", "must be greater than k"));
        }
        if self.library.insert_size <= self.library.read_length {
            return Err(invalid("library.insert_size", "must be greater than read_length"));
        }
        if self.library.avg_coverage <= 0.0 {
            return Err(invalid("library.avg_coverage", "must be greater than 0"));
        }
        if self.gap_closer.min_gap_score <= 0.0 || self.gap_closer.min_gap_score > 1.0 {
            return Err(invalid("gap_closer.min_gap_score", "must be in (0, 1]"));
        }
        if self.gap_closer.must_overlap_threshold > self.gap_closer.may_overlap_threshold {
            return Err(invalid(
                "gap_closer.must_overlap_threshold",
                "must not exceed may_overlap_threshold",
            ));
        }
        if self.repeat_resolver.inresolve_cutoff_proportion < 0.0 {
            return Err(invalid(
                "repeat_resolver.inresolve_cutoff_proportion",
                "must not be negative",
            ));
        }
        if self.repeat_resolver.cheating_mode > 2 {
            return Err(invalid("repeat_resolver.cheating_mode", "must be 0, 1 or 2"));
        }
        if self.path_extend.max_grow_rounds == 0 {
            warn!("path_extend.max_grow_rounds is 0, paths will not be re-grown");
        }
        Ok(())
    }
}

/// Configuration manager with validation and environment integration
pub struct ConfigurationManager {
    config: PipelineConfiguration,
    config_path: Option<PathBuf>,
}

impl ConfigurationManager {
    /// Load configuration from multiple sources
    pub fn new() -> Result<Self, PipelineError> {
        Self::load_from_default_locations()
    }

    /// Create configuration manager with pure defaults (no file dependencies)
    pub fn new_with_defaults() -> Result<Self, PipelineError> {
        Self::from_config(PipelineConfiguration::default())
    }

    pub fn from_config(config: PipelineConfiguration) -> Result<Self, PipelineError> {
        let manager = Self {
            config,
            config_path: None,
        };
        manager.validate_configuration()?;
        Ok(manager)
    }

    /// Load configuration from specific file
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, PipelineError> {
        let config_path = config_path.as_ref().to_path_buf();
        let config = Self::load_config_from_file(&config_path)?;

        let manager = Self {
            config,
            config_path: Some(config_path),
        };

        manager.validate_configuration()?;
        Ok(manager)
    }

    /// Defaults, then `config/default.toml`, the user config, a local
    /// `config.toml` and finally `PFORGE__SECTION__KEY` variables.
    fn load_from_default_locations() -> Result<Self, PipelineError> {
        let mut config_builder = Config::builder();

        if let Ok(embedded_config) = std::fs::read_to_string("./config/default.toml") {
            config_builder =
                config_builder.add_source(File::from_str(&embedded_config, FileFormat::Toml));
        } else {
            info!("No config/default.toml found, using built-in defaults");
        }

        if let Ok(system_config) = env::var("PFORGE_SYSTEM_CONFIG") {
            config_builder =
                config_builder.add_source(File::with_name(&system_config).required(false));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("path-forge").join("config.toml");
            config_builder = config_builder.add_source(File::from(user_config).required(false));
        }

        config_builder = config_builder.add_source(File::with_name("config").required(false));

        config_builder =
            config_builder.add_source(Environment::with_prefix("PFORGE").separator("__"));

        // Try to build configuration, fallback to default if it fails
        let config: PipelineConfiguration = match config_builder.build() {
            Ok(built_config) => match built_config.try_deserialize() {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        "Failed to deserialize configuration: {}, using built-in defaults",
                        e
                    );
                    PipelineConfiguration::default()
                }
            },
            Err(e) => {
                warn!(
                    "Failed to build configuration: {}, using built-in defaults",
                    e
                );
                PipelineConfiguration::default()
            }
        };

        let manager = Self {
            config,
            config_path: None,
        };

        manager.validate_configuration()?;
        Ok(manager)
    }

    fn load_config_from_file(path: &Path) -> Result<PipelineConfiguration, PipelineError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate configuration parameters
    fn validate_configuration(&self) -> Result<(), PipelineError> {
        info!("🔍 Validating configuration...");
        self.config.validate()?;
        info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Create the output directory if it does not exist yet
    pub fn ensure_output_dir(&self) -> Result<(), PipelineError> {
        let dir = &self.config.general.output_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| PipelineError::IOError {
                message: format!("Failed to create directory {}: {}", dir.display(), e),
            })?;
            info!("📁 Created directory: {}", dir.display());
        }
        Ok(())
    }

    /// Setup logging based on configuration
    pub fn setup_logging(&self) -> Result<(), PipelineError> {
        use tracing_appender::rolling;
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Check if global subscriber is already set
        if tracing::dispatcher::has_been_set() {
            info!("⏭️  Logging already initialized, skipping setup");
            return Ok(());
        }

        let level = &self.config.logging.level;
        let format = &self.config.logging.format;

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = tracing_subscriber::registry().with(env_filter);

        let file_writer = self.config.logging.file_path.as_ref().map(|file_path| {
            let file_appender = rolling::daily(
                file_path.parent().unwrap_or(Path::new(".")),
                file_path
                    .file_name()
                    .unwrap_or(std::ffi::OsStr::new("path-forge.log")),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // the guard flushes on drop; logging lives as long as the process
            std::mem::forget(guard);
            non_blocking
        });

        match (format.as_str(), file_writer) {
            ("json", Some(writer)) => {
                let layer = fmt::layer().json().with_target(true).with_writer(writer);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
            ("json", None) => {
                let layer = fmt::layer().json().with_target(true).with_thread_ids(true);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
            ("compact", Some(writer)) => {
                let layer = fmt::layer().compact().with_writer(writer);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
            ("compact", None) => {
                let layer = fmt::layer().compact();
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
            (_, Some(writer)) => {
                let layer = fmt::layer().with_writer(writer);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
            (_, None) => {
                // "pretty" or default - without timestamps for cleaner console output
                let layer = fmt::layer().without_time().with_target(false);
                let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
            }
        }

        info!(
            "📝 Logging initialized with level: {}, format: {}",
            level, format
        );
        Ok(())
    }

    /// Get configuration reference
    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    /// Get mutable configuration reference
    pub fn config_mut(&mut self) -> &mut PipelineConfiguration {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Save current configuration to file
    pub fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<(), PipelineError> {
        let toml_string = toml::to_string_pretty(&self.config).map_err(|e| {
            PipelineError::ConfigurationError {
                message: format!("Failed to serialize configuration: {e}"),
            }
        })?;

        std::fs::write(path.as_ref(), toml_string).map_err(|e| PipelineError::IOError {
            message: format!("Failed to write configuration file: {e}"),
        })?;

        info!("💾 Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Conservative settings: no scaffolding, no cheating, strict gap scores.
    pub fn create_minimal_config() -> PipelineConfiguration {
        let mut config = PipelineConfiguration::default();
        config.general.name = "path-forge-minimal".to_string();
        config.repeat_resolver.cheating_mode = 0;
        config.path_extend.scaffolding = false;
        config.path_extend.multi_extend = false;
        config.path_extend.investigate_short_loops = false;
        config.gap_closer.use_la = false;
        config.logging.file_path = None;
        config
    }

    /// Aggressive settings for fragmented graphs: permissive cheating mode,
    /// scaffolding with both gap analyzers and bulge forking.
    pub fn create_permissive_config() -> PipelineConfiguration {
        let mut config = PipelineConfiguration::default();
        config.general.name = "path-forge-permissive".to_string();
        config.repeat_resolver.cheating_mode = 2;
        config.repeat_resolver.inresolve_cutoff_proportion = 0.3;
        config.path_extend.scaffolding = true;
        config.path_extend.multi_extend = true;
        config.path_extend.check_sink = false;
        config.gap_closer.use_hamming = true;
        config.gap_closer.use_la = true;
        config.gap_closer.min_gap_score = 0.8;
        config
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "path-forge".to_string(),
            k: 55,
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        let stats = LibraryStats::default();
        Self {
            read_length: stats.read_length,
            insert_size: stats.insert_size,
            insert_size_deviation: stats.insert_size_deviation,
            avg_coverage: stats.avg_coverage,
        }
    }
}

impl Default for RepeatResolverConfig {
    fn default() -> Self {
        Self {
            symmetric_resolve: true,
            inresolve_cutoff_proportion: 0.5,
            near_vertex: 5,
            max_distance: 1000,
            max_repeat_length: 2000,
            cheating_mode: 0,
        }
    }
}

impl Default for PathExtendConfig {
    fn default() -> Self {
        Self {
            max_repeat_length: 8000,
            resolve_short_loops: true,
            investigate_short_loops: true,
            use_unique_edges: true,
            max_grow_rounds: 10,
            min_contig_length: 0,
            avoid_rc_connections: true,
            check_sink: true,
            weight_threshold: 0.5,
            single_threshold: 0.001,
            scaffolding: true,
            multi_extend: false,
            rna_scaffolding: false,
            rna_min_overlap: 0,
            detect_repeats_online: true,
        }
    }
}

impl Default for GapCloserConfig {
    fn default() -> Self {
        Self {
            min_gap_score: 0.9,
            short_overlap_threshold: 10,
            basic_overlap_length: 10,
            may_overlap_threshold: 10,
            must_overlap_threshold: -10,
            artificial_gap: 10,
            min_la_length: 10,
            flank_multiplication_coefficient: 0.5,
            flank_addition_coefficient: 5,
            min_identity: 0.9,
            use_hamming: true,
            use_la: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self {
            config: PipelineConfiguration::default(),
            config_path: None,
        }
    }
}

/// Utility functions for configuration management
pub mod config_utils {
    use super::*;

    /// Validate a configuration file without keeping it
    pub fn validate_config_file<P: AsRef<Path>>(path: P) -> Result<(), PipelineError> {
        let config = ConfigurationManager::load_config_from_file(path.as_ref())?;
        config.validate()
    }

    /// Generate a template configuration file
    pub fn generate_config_template<P: AsRef<Path>>(path: P) -> Result<(), PipelineError> {
        let template_config = PipelineConfiguration::default();

        let toml_string = toml::to_string_pretty(&template_config).map_err(|e| {
            PipelineError::ConfigurationError {
                message: format!("Failed to serialize template: {e}"),
            }
        })?;

        std::fs::write(path.as_ref(), toml_string).map_err(|e| PipelineError::IOError {
            message: format!("Failed to write template: {e}"),
        })?;

        Ok(())
    }
}
