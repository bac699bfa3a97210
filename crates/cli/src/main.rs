mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use trellis_lib::TrellisConfig;
use trellis_lib::project::Project;

use crate::cmd::TailorArgs;
use crate::output::{OutputFormat, print_error};

/// trellis - On-demand build graph for monorepos
#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Build root (default: current directory)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Configuration file (default: <root>/trellis.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Add BUILD targets for files that no target owns
  Tailor(TailorArgs),

  /// List targets
  List {
    /// Directories to list (default: the whole repository)
    dirs: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },

  /// Show the explicit and injected dependencies of a target
  Dependencies {
    /// Target address, e.g. src/app:bin
    address: String,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<ExitCode> {
  let root = match cli.root {
    Some(root) => root,
    None => std::env::current_dir().context("Failed to determine current directory")?,
  };
  let root = dunce::canonicalize(&root).with_context(|| format!("Build root not found: {}", root.display()))?;
  debug!(root = %root.display(), "resolved build root");
  let mut config = match &cli.config {
    Some(path) => TrellisConfig::load(path)?,
    None => TrellisConfig::load_from_root(&root)?,
  };

  match cli.command {
    Commands::Tailor(args) => {
      // Overrides apply before opening so a custom BUILD name is also discovered.
      config.tailor = args.options(&config.tailor)?;
      let project = open_project(root, config)?;
      cmd::cmd_tailor(&project, args)
    }
    Commands::List { dirs, format } => {
      let project = open_project(root, config)?;
      cmd::cmd_list(&project, &dirs, format)?;
      Ok(ExitCode::SUCCESS)
    }
    Commands::Dependencies { address, format } => {
      let project = open_project(root, config)?;
      cmd::cmd_dependencies(&project, &address, format)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn open_project(root: PathBuf, config: TrellisConfig) -> Result<Project> {
  Project::open(root, config).context("Failed to register rules")
}
