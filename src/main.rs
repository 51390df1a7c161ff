use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use model_parts::builder::{build_model, BuiltModel};
use model_parts::checkpoint::list_checkpoints;
use model_parts::{get_dependencies, Graph, Model, ModelConfig, Session};

type Backend = NdArray<f32>;

#[derive(Debug, Parser)]
#[command(author, version, about = "Model parts inspection and checkpoint CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the parts, their dependencies and variables
    Inspect(ConfigArgs),
    /// Initialize the model and save every part with a save checkpoint
    Save(ConfigArgs),
    /// Initialize the model and load every part with a load checkpoint
    Load(ConfigArgs),
    /// List the checkpoints stored in a directory
    List(ListArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to model configuration JSON file
    #[arg(long)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Directory holding checkpoint files
    #[arg(long)]
    dir: PathBuf,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => inspect_command(args),
        Commands::Save(args) => save_command(args),
        Commands::Load(args) => load_command(args),
        Commands::List(args) => list_command(args),
    }
}

fn load_config(path: &Path) -> Result<ModelConfig> {
    info!("Loading configuration from: {:?}", path);

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: ModelConfig = serde_json::from_str(&config_str)
        .with_context(|| "Failed to parse config JSON")?;

    Ok(config)
}

fn build(path: &Path) -> Result<(Graph, BuiltModel)> {
    let config = load_config(path)?;
    let mut graph = Graph::new();
    let built = build_model(&config, &mut graph)
        .with_context(|| format!("Failed to build model from {:?}", path))?;
    Ok((graph, built))
}

fn inspect_command(args: ConfigArgs) -> Result<()> {
    let (graph, built) = build(&args.config)?;

    for part in built.parts() {
        let base = part.base();
        println!(
            "{} [{}] scope={}{}",
            part.name(),
            base.kind(),
            base.scope().name(),
            if base.is_reused() { " (reused)" } else { "" }
        );
        let deps: Vec<_> = get_dependencies(part)
            .iter()
            .skip(1)
            .map(|p| p.name().to_string())
            .collect();
        if !deps.is_empty() {
            println!("  depends on: {}", deps.join(", "));
        }
        if !base.is_reused() {
            for variable in graph.global_variables(base.scope().name()) {
                println!("  {} {:?}", variable.name(), variable.shape());
            }
        }
    }

    Ok(())
}

fn save_command(args: ConfigArgs) -> Result<()> {
    let (graph, built) = build(&args.config)?;
    let model = Model::from_roots(built.decoders());

    let mut session = Session::<Backend>::new(Default::default());
    session.initialize(&graph).context("Failed to initialize variables")?;

    let written = model.save(&graph, &session).context("Failed to save model parts")?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

fn load_command(args: ConfigArgs) -> Result<()> {
    let (graph, built) = build(&args.config)?;
    let model = Model::from_roots(built.decoders());

    let mut session = Session::<Backend>::new(Default::default());
    session.initialize(&graph).context("Failed to initialize variables")?;

    let loaded = model.load(&graph, &mut session).context("Failed to load model parts")?;
    info!("{} of {} parts restored from checkpoints", loaded, model.len());
    Ok(())
}

fn list_command(args: ListArgs) -> Result<()> {
    let checkpoints = list_checkpoints(&args.dir)
        .with_context(|| format!("Failed to list checkpoints in {:?}", args.dir))?;

    for checkpoint in checkpoints {
        println!(
            "{}\tscope={}\tvariables={}\ttimestamp={}",
            checkpoint.path.display(),
            checkpoint.scope,
            checkpoint.num_variables,
            checkpoint.timestamp
        );
    }
    Ok(())
}
