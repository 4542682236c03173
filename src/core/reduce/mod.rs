//! Filepath: src/core/reduce/mod.rs
//! Syntax-aware content reduction.
//!
//! A file is rendered verbatim, as its semantic items (signatures, types,
//! exports with bodies elided), as its type definitions only, or as a line
//! window. Grammar problems of any kind fall through to the line window;
//! reduction never fails.

mod chunk;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cli::{AppContext, ReduceArgs};
use crate::core::tokens::TokenEstimator;
use crate::infra::config::load_config_from;
use crate::infra::io::read_text;
use crate::infra::line_index::LineIndex;
use crate::lang::LanguageRegistry;

/// Requested rendering of a related file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ChunkingMode {
    Full,
    Semantic,
    TypesOnly,
    None,
}

impl ChunkingMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Semantic => "semantic",
            Self::TypesOnly => "types_only",
            Self::None => "none",
        }
    }
}

/// What the reducer actually produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionKind {
    Full,
    Semantic,
    TypesOnly,
    Truncated,
}

impl ReductionKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Semantic => "semantic",
            Self::TypesOnly => "types_only",
            Self::Truncated => "truncated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReduceOptions {
    /// Files at or under this many lines are kept whole; also the
    /// truncation window
    pub chunk_threshold_lines: usize,
    pub token_cap: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reduction {
    pub text: String,
    pub mode_used: ReductionKind,
    pub lines: usize,
    pub tokens: usize,
    pub items_total: usize,
    pub items_kept: usize,
}

pub struct ContentReducer {
    registry: Arc<LanguageRegistry>,
    estimator: Arc<TokenEstimator>,
}

impl ContentReducer {
    pub fn new(registry: Arc<LanguageRegistry>, estimator: Arc<TokenEstimator>) -> Self {
        Self { registry, estimator }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    fn comment_prefix(&self, path: &Path) -> &'static str {
        self.registry
            .for_path(path)
            .map(|p| p.comment_prefix())
            .unwrap_or("//")
    }

    fn finish(&self, text: String, mode_used: ReductionKind, items_total: usize, items_kept: usize) -> Reduction {
        Reduction {
            lines: LineIndex::build(text.as_bytes()).line_count(),
            tokens: self.estimator.estimate(&text),
            text,
            mode_used,
            items_total,
            items_kept,
        }
    }

    /// Reduce one file's content. Never fails.
    pub fn reduce(&self, path: &Path, content: &str, mode: ChunkingMode, opts: &ReduceOptions) -> Reduction {
        let total_lines = LineIndex::build(content.as_bytes()).line_count();
        let cap = opts.token_cap.max(1);

        let small = total_lines <= opts.chunk_threshold_lines;
        if mode == ChunkingMode::Full || (small && mode != ChunkingMode::None) {
            if self.estimator.estimate(content) <= cap {
                return self.finish(content.to_string(), ReductionKind::Full, 0, 0);
            }
            trace!(path = %path.display(), "full content over cap; downgrading to semantic");
        }

        let types_only = match mode {
            ChunkingMode::None => return self.truncate(path, content, total_lines, opts),
            ChunkingMode::TypesOnly => true,
            ChunkingMode::Full | ChunkingMode::Semantic => false,
        };

        match self.chunk(path, content, types_only, cap) {
            Some(r) => r,
            None => self.truncate(path, content, total_lines, opts),
        }
    }

    /// Greedy item inclusion; `None` means "fall back to truncation"
    fn chunk(&self, path: &Path, content: &str, types_only: bool, cap: usize) -> Option<Reduction> {
        let profile = self.registry.for_path(path)?;
        let grammar = profile.grammar()?;
        let items = chunk::collect_items(grammar, profile.keeps_docstrings(), content, types_only)?;
        if items.is_empty() {
            return None;
        }

        let mut text = String::new();
        let mut running = 0;
        let mut kept = 0;
        for item in &items {
            let piece = if kept == 0 {
                item.text.clone()
            } else {
                format!("\n\n{}", item.text)
            };
            let t = self.estimator.estimate(&piece);
            if running + t > cap {
                break;
            }
            running += t;
            text.push_str(&piece);
            kept += 1;
        }

        if kept == 0 {
            return None;
        }
        if kept < items.len() {
            text.push_str(&format!(
                "\n\n{} {} more items truncated",
                profile.comment_prefix(),
                items.len() - kept
            ));
        }
        text.push('\n');

        let kind = if types_only {
            ReductionKind::TypesOnly
        } else {
            ReductionKind::Semantic
        };
        debug!(path = %path.display(), items = items.len(), kept, "reduced by captures");
        Some(self.finish(text, kind, items.len(), kept))
    }

    /// First `chunk_threshold_lines` lines, also bounded by the token cap
    fn truncate(&self, path: &Path, content: &str, total_lines: usize, opts: &ReduceOptions) -> Reduction {
        let index = LineIndex::build(content.as_bytes());
        let cap = opts.token_cap.max(1);
        let limit = opts.chunk_threshold_lines.max(1).min(total_lines);

        let mut tokens = 0;
        let mut kept_lines = 0;
        for line in 0..limit {
            let t = self.estimator.estimate(index.window(content, line, 1));
            if tokens + t > cap {
                break;
            }
            tokens += t;
            kept_lines += 1;
        }

        if kept_lines >= total_lines {
            return self.finish(content.to_string(), ReductionKind::Full, 0, 0);
        }

        let mut text = index.window(content, 0, kept_lines).to_string();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!(
            "{} ... (truncated, {} total lines)\n",
            self.comment_prefix(path),
            total_lines
        ));
        self.finish(text, ReductionKind::Truncated, 0, 0)
    }

    /// Block around a definition at `line` (0-based): the smallest semantic
    /// capture covering it, bodies kept, or a plain line window.
    pub fn definition_snippet(&self, path: &Path, content: &str, line: usize, max_lines: usize) -> String {
        let index = LineIndex::build(content.as_bytes());
        let max_lines = max_lines.max(1);

        let span = self
            .registry
            .for_path(path)
            .and_then(|p| p.grammar())
            .and_then(|g| chunk::enclosing_capture(g, content, line));

        let Some((lo, hi)) = span else {
            return index.window(content, line, max_lines).to_string();
        };

        let first = index.line_of_byte(lo);
        let last = index.line_of_byte(hi.saturating_sub(1));
        let count = last + 1 - first;
        if count <= max_lines {
            return index.window(content, first, count).to_string();
        }

        let mut text = index.window(content, first, max_lines).to_string();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&format!(
            "{} ... (truncated, {} total lines)\n",
            self.comment_prefix(path),
            count
        ));
        text
    }
}

pub fn run(args: ReduceArgs, ctx: &AppContext) -> Result<()> {
    let content = read_text(&args.file)?;
    let dir = args
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let config = load_config_from(dir).unwrap_or_default();

    let registry = Arc::new(LanguageRegistry::new()?);
    let estimator = Arc::new(TokenEstimator::from_config(&config.tokens).context("Failed to set up token estimator")?);
    let reducer = ContentReducer::new(registry, estimator);

    let opts = ReduceOptions {
        chunk_threshold_lines: args.threshold,
        token_cap: args.cap,
    };
    let reduction = reducer.reduce(&args.file, &content, args.mode, &opts);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reduction)?);
        return Ok(());
    }

    print!("{}", reduction.text);
    if !ctx.quiet {
        let summary = format!(
            "{} · {} lines · {} tokens · {}/{} items",
            reduction.mode_used.label(),
            reduction.lines,
            reduction.tokens,
            reduction.items_kept,
            reduction.items_total
        );
        if ctx.no_color {
            eprintln!("{summary}");
        } else {
            eprintln!("{}", summary.dimmed());
        }
    }
    Ok(())
}
