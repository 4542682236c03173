use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::reduce::ChunkingMode;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
}

#[derive(Parser)]
#[command(name = "ctxr")]
#[command(
    about = "Assemble budget-aware context packages for questions asked at a specific file"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress spinners, summaries and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log filter when CONTEXTOR_LOG is unset (e.g. debug, contextor=trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble a context package for an anchor file within a token budget
    Context(ContextArgs),

    /// Show the import neighbourhood of a file
    Graph(GraphArgs),

    /// Reduce one file the way the ladder would
    Reduce(ReduceArgs),

    /// Display project tree structure
    Tree(TreeArgs),

    /// Initialize a contextor.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// File the question is asked at
    #[arg(value_name = "ANCHOR")]
    pub anchor: PathBuf,

    /// Project root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Token budget; defaults to `budget.token_budget` from the config
    #[arg(long)]
    pub budget: Option<usize>,

    /// Emit the full assembly result as JSON
    #[arg(long)]
    pub json: bool,

    /// Print per-level demand to stderr
    #[arg(long)]
    pub level_report: bool,

    /// Copy the rendered context to the clipboard
    #[arg(long)]
    pub clipboard: bool,

    /// Skip definition lookups at every level
    #[arg(long)]
    pub no_resolver: bool,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum GraphFormat {
    Table,
    Json,
    Dot,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// File whose imports to show
    pub file: PathBuf,

    /// Project root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Expansion depth (0, 1 or 2)
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub depth: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = GraphFormat::Table)]
    pub format: GraphFormat,
}

#[derive(Args, Debug)]
pub struct ReduceArgs {
    /// File to reduce
    pub file: PathBuf,

    /// Reduction mode
    #[arg(long, value_enum, default_value_t = ChunkingMode::Semantic)]
    pub mode: ChunkingMode,

    /// Files at or under this many lines are kept whole
    #[arg(long, default_value_t = 150)]
    pub threshold: usize,

    /// Token cap for the reduced output
    #[arg(long, default_value_t = 2000)]
    pub cap: usize,

    /// Emit the reduction as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct TreeArgs {
    /// Root directory to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Additional glob patterns to ignore
    #[arg(short, long)]
    pub ignore: Vec<String>,

    /// Maximum depth to traverse
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
