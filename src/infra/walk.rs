//! Filepath: src/infra/walk.rs
//! Gitignore-aware project walker.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Prunes dependency/build directories (`node_modules`, `target`, ...) early
//! - Extra ignore globs from config (early prune + late filter)
//! - Hidden files skipped unless asked for; `.git` is always pruned
//! - Deterministic ordering so scans, indexes and tests are stable
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::trace;

/// Directory names never worth scanning for context
pub const DEPENDENCY_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    "dist",
    "build",
    ".next",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "site-packages",
    "Pods",
    ".gradle",
];

/// Walker over a project root with dependency pruning and extra globs.
pub struct ProjectWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Include hidden (dot) files; default false
    include_hidden: bool,

    /// Prune `DEPENDENCY_DIRS`; default true
    prune_dependencies: bool,

    /// Maximum recursion depth; default None (unbounded)
    max_depth: Option<usize>,
}

impl ProjectWalker
{
    /// Build a walker with additional ignore patterns (e.g. "**/*.min.js",
    /// "fixtures/**"). Patterns match on paths relative to the root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            ignore_patterns: builder.build()?,
            include_hidden: false,
            prune_dependencies: true,
            max_depth: None,
        })
    }

    /// Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// Keep or prune dependency directories.
    pub fn with_prune_dependencies(
        mut self,
        prune: bool,
    ) -> Self
    {
        self.prune_dependencies = prune;
        self
    }

    /// Limit recursion depth (`None` = unbounded).
    pub fn with_max_depth(
        mut self,
        depth: Option<usize>,
    ) -> Self
    {
        self.max_depth = depth;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        // Respect .ignore/.gitignore/.git/info/exclude and global gitignore.
        // require_git(false): a fixture without `git init` still honours .gitignore
        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        b.require_git(false);

        b.follow_links(false);
        b.max_depth(self.max_depth);

        // Early directory pruning (dependency dirs + extra globs)
        let extra = self
            .ignore_patterns
            .clone();
        let prune_deps = self.prune_dependencies;
        let root_owned = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .map(|ft| ft.is_dir())
                .unwrap_or(false);
            if !is_dir || ent.depth() == 0
            {
                return true;
            }

            let name = ent
                .file_name()
                .to_string_lossy();
            if name == ".git" || (prune_deps && DEPENDENCY_DIRS.contains(&name.as_ref()))
            {
                trace!(dir = %ent.path().display(), "pruned dependency directory");
                return false;
            }

            let rel = ent
                .path()
                .strip_prefix(&root_owned)
                .unwrap_or(ent.path());
            !extra.is_match(rel)
        });

        b
    }

    /// Traverse files under `root`. Returns a **sorted** list of absolute paths.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            .filter_map(|res| match res
            {
                Ok(entry) => Some(entry),
                Err(err) =>
                {
                    trace!(%err, "walk entry skipped");
                    None
                }
            })
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            // Late file-level filtering using the RELATIVE path
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        out.sort();

        out
    }
}
