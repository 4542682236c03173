//! Filepath: src/core/tree.rs
//! Directory tree with per-file line counts as `name:lines`, e.g. `main.rs:100`.
//!
//! One tree model serves two renderings:
//! - plain text for the overview section of a context package
//! - colored output for the `tree` command (via ptree + owo-colors)
//!
//! BTreeMap children keep the ordering deterministic.

use anyhow::Result;
use owo_colors::OwoColorize;
use ptree::TreeBuilder;
use ptree::print_config::PrintConfig;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{AppContext, TreeArgs};
use crate::core::scan::{ProjectScan, ProjectScanner};
use crate::infra::config::load_config_from;
use crate::lang::LanguageRegistry;

pub fn run(args: TreeArgs, ctx: &AppContext) -> Result<()> {
    let root = dunce::canonicalize(&args.path).unwrap_or(args.path.clone());
    let config = load_config_from(&root).unwrap_or_default();

    // Combine config ignore patterns with CLI args
    let mut ignore_patterns = config.ignore_patterns.clone();
    ignore_patterns.extend(args.ignore);

    let registry = Arc::new(LanguageRegistry::new()?);
    let scanner = ProjectScanner::new(&ignore_patterns, registry)?.with_options(&config.scan);
    let scan = scanner.scan(&root);

    let tree = TreeNode::from_scan(&scan, args.depth);

    if !ctx.quiet {
        if ctx.no_color {
            print!("{}", tree.render_plain()?);
        } else {
            tree.print_colored()?;
        }
    }

    Ok(())
}

#[derive(Debug)]
pub struct TreeNode {
    name: String,
    is_dir: bool,
    /// For files, total line count; None for directories.
    line_count: Option<usize>,
    children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    fn new(name: String, is_dir: bool) -> Self {
        Self {
            name,
            is_dir,
            line_count: None,
            children: BTreeMap::new(),
        }
    }

    /// Build from scanned files; paths deeper than `max_depth` are cut at
    /// their directory.
    pub fn from_scan(scan: &ProjectScan, max_depth: Option<usize>) -> Self {
        let root_name = scan
            .root
            .file_name()
            .unwrap_or(scan.root.as_os_str())
            .to_string_lossy()
            .to_string();
        let mut tree = TreeNode::new(root_name, true);
        for file in &scan.files {
            if let Ok(rel) = file.path.strip_prefix(&scan.root) {
                tree.insert(rel, file.lines, max_depth, 0);
            }
        }
        tree
    }

    fn insert(&mut self, relative: &Path, lines: usize, max_depth: Option<usize>, depth: usize) {
        if let Some(max) = max_depth
            && depth >= max
        {
            return;
        }

        let mut components = relative.components();
        let Some(first) = components.next() else {
            return;
        };
        let remaining = components.as_path();
        let name = first.as_os_str().to_string_lossy().to_string();
        let is_dir = !remaining.as_os_str().is_empty();

        let entry = self
            .children
            .entry(name.clone())
            .or_insert_with(|| TreeNode::new(name, is_dir));

        if is_dir {
            entry.insert(remaining, lines, max_depth, depth + 1);
        } else {
            entry.line_count = Some(lines);
        }
    }

    /// Plain text (no ANSI), used inside context packages.
    pub fn render_plain(&self) -> Result<String> {
        let tree = self.to_ptree(false);
        let mut buf: Vec<u8> = Vec::new();
        ptree::write_tree_with(&tree, &mut buf, &PrintConfig::default())?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Colored terminal output for the `tree` command.
    pub fn print_colored(&self) -> Result<()> {
        let tree = self.to_ptree(true);
        ptree::print_tree(&tree)?;
        Ok(())
    }

    fn to_ptree(&self, color: bool) -> ptree::item::StringItem {
        let mut builder = TreeBuilder::new(format_node_label(self, color));
        add_children_to_builder(&mut builder, &self.children, color);
        builder.build()
    }
}

fn add_children_to_builder(builder: &mut TreeBuilder, children: &BTreeMap<String, TreeNode>, color: bool) {
    for child in children.values() {
        if child.children.is_empty() {
            builder.add_empty_child(format_node_label(child, color));
        } else {
            builder.begin_child(format_node_label(child, color));
            add_children_to_builder(builder, &child.children, color);
            builder.end_child();
        }
    }
}

/// Directories get a trailing `/`, files an appended `:lines`.
fn format_node_label(node: &TreeNode, color: bool) -> String {
    if node.is_dir {
        if color {
            format!("{}/", node.name.blue())
        } else {
            format!("{}/", node.name)
        }
    } else {
        let name = if color {
            color_by_ext(&node.name)
        } else {
            node.name.clone()
        };
        match node.line_count {
            Some(n) => format!("{name}:{n}"),
            None => name,
        }
    }
}

fn color_by_ext(name: &str) -> String {
    match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some("rs") => name.yellow().to_string(),
        Some("py") => name.green().to_string(),
        Some("js" | "jsx" | "ts" | "tsx") => name.cyan().to_string(),
        Some("go") => name.magenta().to_string(),
        Some("c" | "cpp" | "cc" | "cxx" | "h" | "hpp") => name.red().to_string(),
        Some("toml" | "yaml" | "yml" | "json") => name.bright_blue().to_string(),
        _ => name.to_string(),
    }
}
