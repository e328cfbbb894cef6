use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use path_forge::assembly::{RepeatResolver, ResolverSettings};
use path_forge::utils::configuration::config_utils;
use path_forge::utils::format_writers::{write_contigs_fasta, write_gfa, write_graph_edges, write_path_edges};
use path_forge::utils::{ConfigurationManager, PipelineConfiguration};
use path_forge::{AssemblyGraph, CompositeExtender, PairedInfoIndex, PathContainer};

#[derive(Parser)]
#[command(name = "path-forge")]
#[command(about = "Repeat resolution and path extension over de Bruijn assembly graphs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Number of threads (defaults to all cores)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Output directory (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split repeat vertices using paired information
    Resolve {
        /// Graph snapshot (JSON)
        graph: PathBuf,

        /// Paired information records (JSON)
        paired_info: PathBuf,
    },

    /// Grow contigs through the graph
    Extend {
        /// Graph snapshot (JSON)
        graph: PathBuf,

        /// Paired information records (JSON); without it only unambiguous
        /// extensions are made
        #[arg(short, long)]
        paired_info: Option<PathBuf>,

        /// Minimum contig length (overrides config)
        #[arg(short = 'l', long)]
        min_contig_length: Option<usize>,
    },

    /// Check a configuration file
    ValidateConfig {
        /// Configuration file
        file: PathBuf,
    },

    /// Write the default configuration as TOML
    GenerateConfig {
        /// Destination file
        file: PathBuf,
    },
}

fn load_manager(path: Option<&Path>) -> Result<ConfigurationManager> {
    let manager = match path {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new()?,
    };
    Ok(manager)
}

fn init_fmt_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .init();
}

fn output_dir(cli_output: Option<PathBuf>, config: &PipelineConfiguration) -> Result<PathBuf> {
    let dir = cli_output.unwrap_or_else(|| config.general.output_dir.clone());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir)
}

fn resolve(config: &PipelineConfiguration, graph: &Path, paired_info: &Path, out: &Path) -> Result<()> {
    let graph = AssemblyGraph::load_json(graph)?;
    let index = PairedInfoIndex::load_json(paired_info)?;
    info!(
        "📊 Loaded graph with {} edges and {} paired points",
        graph.edge_count(),
        index.size()
    );

    let settings = ResolverSettings::from_config(&config.repeat_resolver);
    let mut resolver = RepeatResolver::new(&graph, &index, config.library.stats(), settings)?;
    resolver.resolve_repeats()?;
    let resolved = resolver.into_resolved();

    let snapshot_path = out.join("resolved_graph.json");
    let file = std::fs::File::create(&snapshot_path)
        .with_context(|| format!("Failed to create graph file: {}", snapshot_path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &resolved.graph.to_snapshot())
        .with_context(|| format!("Failed to write graph file: {}", snapshot_path.display()))?;
    write_graph_edges(&resolved.graph, out.join("resolved_edges.fasta"))?;
    write_gfa(&resolved.graph, &PathContainer::new(), out.join("resolved_graph.gfa"))?;

    println!("✅ Repeat resolution completed");
    println!("   Edges: {} -> {}", graph.edge_count(), resolved.graph.edge_count());
    println!("   Vertices split: {}", resolved.context.splits);
    println!("   Low coverage copies deleted: {}", resolved.context.low_coverage_deleted);
    Ok(())
}

fn extend(
    config: &PipelineConfiguration,
    graph: &Path,
    paired_info: Option<&Path>,
    out: &Path,
) -> Result<()> {
    let graph = AssemblyGraph::load_json(graph)?;
    let index = match paired_info {
        Some(path) => PairedInfoIndex::load_json(path)?,
        None => PairedInfoIndex::new(),
    };

    let library = config.library.stats();
    let mut extender =
        CompositeExtender::from_config(&graph, &index, &library, &config.path_extend, &config.gap_closer);
    let seeds = PathContainer::seeds(&graph);
    let mut paths = extender.grow_all(&seeds);
    paths.sort_by_length();

    write_contigs_fasta(&paths, out.join("contigs.fasta"))?;
    write_path_edges(&paths, out.join("contig_paths.txt"))?;
    write_gfa(&graph, &paths, out.join("assembly_graph.gfa"))?;

    println!("✅ Path extension completed");
    println!("   Contigs: {}", paths.len());
    println!("   Total length: {} bp", paths.total_length());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match cli.command {
        Commands::Resolve { .. } | Commands::Extend { .. } => Some(load_manager(cli.config.as_deref())?),
        _ => None,
    };

    // Initialize logging: the configured subscriber unless --verbose asks for debug output
    match &manager {
        Some(manager) if !cli.verbose => manager.setup_logging()?,
        _ => init_fmt_logging(cli.verbose),
    }

    let threads = cli.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to initialize thread pool")?;

    match cli.command {
        Commands::Resolve { graph, paired_info } => {
            let config = manager.map(|m| m.config().clone()).unwrap_or_default();
            let out = output_dir(cli.output, &config)?;
            resolve(&config, &graph, &paired_info, &out)?;
        }
        Commands::Extend {
            graph,
            paired_info,
            min_contig_length,
        } => {
            let mut config = manager.map(|m| m.config().clone()).unwrap_or_default();
            if let Some(min) = min_contig_length {
                config.path_extend.min_contig_length = min;
            }
            let out = output_dir(cli.output, &config)?;
            extend(&config, &graph, paired_info.as_deref(), &out)?;
        }
        Commands::ValidateConfig { file } => {
            config_utils::validate_config_file(&file)?;
            println!("✅ Configuration is valid: {}", file.display());
        }
        Commands::GenerateConfig { file } => {
            config_utils::generate_config_template(&file)?;
            println!("📝 Wrote configuration template: {}", file.display());
        }
    }

    Ok(())
}
