//! Result model of an assembly and the markdown shapes of its sections.

use std::path::PathBuf;

use serde::Serialize;

use crate::core::graph::Relationship;
use crate::core::reduce::ReductionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    WholeProject,
    Fit,
    Exhausted,
    AnchorOverBudget,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::WholeProject => "whole_project",
            Self::Fit => "fit",
            Self::Exhausted => "exhausted",
            Self::AnchorOverBudget => "anchor_over_budget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    CurrentFileExceedsBudget,
    AllLevelsExceededBudget,
}

impl Warning {
    pub fn label(self) -> &'static str {
        match self {
            Self::CurrentFileExceedsBudget => "current_file_exceeds_budget",
            Self::AllLevelsExceededBudget => "all_levels_exceeded_budget",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Anchor,
    Overview,
    Related,
    Definitions,
    Project,
}

/// Why a file is in the package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSource {
    Anchor,
    Outgoing,
    Incoming,
    Transitive,
    Definition,
    Project,
}

impl From<Relationship> for BlockSource {
    fn from(rel: Relationship) -> Self {
        match rel {
            Relationship::Outgoing => Self::Outgoing,
            Relationship::Incoming => Self::Incoming,
            Relationship::Transitive => Self::Transitive,
        }
    }
}

impl BlockSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Anchor => "anchor",
            Self::Outgoing => "imported",
            Self::Incoming => "imports this file",
            Self::Transitive => "transitive",
            Self::Definition => "definition",
            Self::Project => "project",
        }
    }
}

/// How a block's text was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockMode {
    Full,
    Semantic,
    TypesOnly,
    Truncated,
    Definition,
}

impl From<ReductionKind> for BlockMode {
    fn from(kind: ReductionKind) -> Self {
        match kind {
            ReductionKind::Full => Self::Full,
            ReductionKind::Semantic => Self::Semantic,
            ReductionKind::TypesOnly => Self::TypesOnly,
            ReductionKind::Truncated => Self::Truncated,
        }
    }
}

impl BlockMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Semantic => "semantic",
            Self::TypesOnly => "types only",
            Self::Truncated => "truncated",
            Self::Definition => "definition",
        }
    }
}

/// One rendered file unit; the assembler never holds two for one path
#[derive(Debug, Clone)]
pub(super) struct ContentBlock {
    pub path: PathBuf,
    pub mode_used: BlockMode,
    pub source: BlockSource,
    pub rendered_text: String,
    pub token_count: usize,
}

/// A rendered section; its tokens are the sum of its blocks
#[derive(Debug, Clone)]
pub(super) struct Section {
    pub kind: SectionKind,
    pub text: String,
    pub tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedFile {
    pub path: PathBuf,
    pub tokens: usize,
    pub source: BlockSource,
    pub mode: BlockMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub kind: SectionKind,
    pub tokens: usize,
}

/// What one ladder attempt would have cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub name: String,
    /// Tokens with no allocation stop
    pub demand: usize,
    /// Tokens actually rendered
    pub tokens: usize,
    pub fit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyResult {
    pub level_used: String,
    pub outcome: Outcome,
    pub rendered_context: String,
    pub total_tokens: usize,
    pub budget: usize,
    pub files_included: Vec<IncludedFile>,
    pub sections: Vec<SectionSummary>,
    pub warnings: Vec<Warning>,
    pub levels_tried: Vec<LevelReport>,
}

impl AssemblyResult {
    pub(super) fn from_parts(
        level_used: &str,
        outcome: Outcome,
        budget: usize,
        sections: Vec<Section>,
        blocks: &[ContentBlock],
        warnings: Vec<Warning>,
        levels_tried: Vec<LevelReport>,
    ) -> Self {
        // Every section ends in its own blank line, so the text is a plain
        // concatenation and each separator is already in some section's tokens
        let rendered_context: String = sections.iter().map(|s| s.text.as_str()).collect();
        Self {
            level_used: level_used.to_string(),
            outcome,
            rendered_context,
            total_tokens: sections.iter().map(|s| s.tokens).sum(),
            budget,
            files_included: blocks
                .iter()
                .map(|b| IncludedFile {
                    path: b.path.clone(),
                    tokens: b.token_count,
                    source: b.source,
                    mode: b.mode_used,
                })
                .collect(),
            sections: sections
                .iter()
                .map(|s| SectionSummary {
                    kind: s.kind,
                    tokens: s.tokens,
                })
                .collect(),
            warnings,
            levels_tried,
        }
    }

    pub fn has_warning(&self, warning: Warning) -> bool {
        self.warnings.contains(&warning)
    }
}

/// Fenced code block with a trailing newline
pub(super) fn fenced(fence: &str, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + fence.len() + 10);
    out.push_str("```");
    out.push_str(fence);
    out.push('\n');
    out.push_str(body);
    if !body.is_empty() && !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("```\n");
    out
}

/// Heading, blank line, fenced body, blank line
fn titled(heading: &str, fence: &str, body: &str) -> String {
    format!("{heading}\n\n{}\n", fenced(fence, body))
}

pub(super) fn anchor_text(rel: &str, fence: &str, content: &str) -> String {
    titled(&format!("## Current file: {rel}"), fence, content)
}

pub(super) fn file_text(rel: &str, fence: &str, note: &str, content: &str) -> String {
    titled(&format!("### {rel} ({note})"), fence, content)
}

pub(super) fn definition_text(rel: &str, fence: &str, identifier: &str, snippet: &str) -> String {
    titled(&format!("### {rel} (definition of `{identifier}`)"), fence, snippet)
}

pub(super) fn overview_text(tree: &str) -> String {
    titled("## Project structure", "", tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_close_on_their_own_line() {
        assert_eq!(fenced("rust", "fn a() {}"), "```rust\nfn a() {}\n```\n");
        assert_eq!(fenced("rust", "fn a() {}\n"), "```rust\nfn a() {}\n```\n");
        assert_eq!(fenced("", ""), "```\n```\n");
    }

    #[test]
    fn rendered_blocks_carry_their_own_separator() {
        let anchor = anchor_text("src/a.rs", "rust", "fn a() {}");
        assert_eq!(anchor, "## Current file: src/a.rs\n\n```rust\nfn a() {}\n```\n\n");
        assert!(overview_text("src/\n").ends_with("```\n\n"));
    }

    #[test]
    fn totals_are_section_sums() {
        let sections = vec![
            Section {
                kind: SectionKind::Anchor,
                text: "a".into(),
                tokens: 7,
            },
            Section {
                kind: SectionKind::Related,
                text: "b".into(),
                tokens: 5,
            },
        ];
        let r = AssemblyResult::from_parts("standard", Outcome::Fit, 100, sections, &[], vec![], vec![]);
        assert_eq!(r.total_tokens, 12);
        assert_eq!(r.rendered_context, "ab");
        assert_eq!(r.sections.len(), 2);
    }
}
