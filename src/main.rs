use anyhow::Result;
use clap::Parser;
use contextor::cli::{AppContext, Cli, Commands};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays parseable
    let filter = EnvFilter::try_from_env("CONTEXTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
    };

    match cli.command {
        Commands::Context(args) => contextor::core::context_run(args, &ctx),
        Commands::Graph(args) => contextor::core::graph::run(args, &ctx),
        Commands::Reduce(args) => contextor::core::reduce::run(args, &ctx),
        Commands::Tree(args) => contextor::core::tree_run(args, &ctx),
        Commands::Init(args) => contextor::infra::config::init(args, &ctx),
        Commands::Completions(args) => contextor::completion::run(args),
    }
}
