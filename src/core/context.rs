//! Context assembly command
//!
//! Drives the assembler for one anchor: resolves the budget, shows a spinner
//! while the ladder runs, then writes the package to stdout, a file or the
//! clipboard. Summary and warnings go to stderr so stdout stays pipeable.

use std::fs; // file IO
use std::path::Path; // paths
use std::time::Duration; // spinner tick

use anyhow::{Context, Result}; // error context
use indicatif::{ProgressBar, ProgressStyle}; // CLI progress
use owo_colors::OwoColorize; // stderr styling
use tabled::settings::Style; // level report table
use tabled::{Table, Tabled};

use crate::cli::{AppContext, ContextArgs};
use crate::core::ladder::{AssemblyRequest, AssemblyResult, ContextAssembler, LevelReport};
use crate::infra::config::load_config_from;
use crate::infra::utils::PathUtils;

#[derive(Tabled)]
struct LevelRow
{
    level: String,
    demand: usize,
    tokens: usize,
    fit: &'static str,
}

impl From<&LevelReport> for LevelRow
{
    fn from(r: &LevelReport) -> Self
    {
        Self {
            level: r.name.clone(),
            demand: r.demand,
            tokens: r.tokens,
            fit: if r.fit { "yes" } else { "no" },
        }
    }
}

pub fn run(
    args: ContextArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let root = PathUtils::canonical_or_normalized(&args.root);
    let config = load_config_from(&root)?;

    let mut assembler = ContextAssembler::from_config(&config)?;
    if args.no_resolver
    {
        assembler = assembler.without_resolver();
    }
    let budget = args
        .budget
        .unwrap_or_else(|| assembler.default_budget());
    if budget == 0
    {
        anyhow::bail!("--budget must be positive");
    }

    let request = AssemblyRequest { anchor: args.anchor.clone(), root: root.clone(), budget };

    let spinner = spinner(ctx, &args.anchor)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcome = runtime.block_on(assembler.assemble(&request));
    spinner.finish_and_clear();
    let result = outcome?;

    let payload = if args.json
    {
        serde_json::to_string_pretty(&result)?
    }
    else
    {
        result
            .rendered_context
            .clone()
    };

    match &args.output
    {
        Some(path) =>
        {
            fs::write(path, &payload)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => print!("{payload}"),
    }

    if args.clipboard
    {
        copy_to_clipboard(&result.rendered_context)?;
        if !ctx.quiet
        {
            eprintln!("Copied to clipboard");
        }
    }

    if args.level_report && !ctx.quiet
    {
        eprintln!("{}", level_table(&result));
    }

    if !ctx.quiet
    {
        report(&result, ctx);
    }
    Ok(())
}

fn spinner(
    ctx: &AppContext,
    anchor: &Path,
) -> Result<ProgressBar>
{
    if ctx.quiet
    {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.set_message(format!("assembling context for {}", anchor.display()));
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn level_table(result: &AssemblyResult) -> String
{
    let rows: Vec<LevelRow> = result
        .levels_tried
        .iter()
        .map(LevelRow::from)
        .collect();
    if rows.is_empty()
    {
        return format!("no ladder levels tried ({})", result.outcome.label());
    }
    Table::new(&rows)
        .with(Style::rounded())
        .to_string()
}

/// One-line summary plus one line per warning, on stderr
fn report(
    result: &AssemblyResult,
    ctx: &AppContext,
)
{
    let summary = format!(
        "{} · {} · {} / {} tokens · {} files",
        result.level_used,
        result
            .outcome
            .label(),
        result.total_tokens,
        result.budget,
        result
            .files_included
            .len()
    );
    if ctx.no_color
    {
        eprintln!("{summary}");
    }
    else
    {
        eprintln!("{}", summary.dimmed());
    }

    for warning in &result.warnings
    {
        if ctx.no_color
        {
            eprintln!("warning: {}", warning.label());
        }
        else
        {
            eprintln!("{} {}", "warning:".yellow(), warning.label());
        }
    }
}

fn copy_to_clipboard(s: &str) -> Result<()>
{
    let mut cb = arboard::Clipboard::new().context("clipboard init")?;
    cb.set_text(s.to_string())
        .context("clipboard set")?;
    Ok(())
}
