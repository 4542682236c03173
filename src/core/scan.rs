//! Filepath: src/core/scan.rs
//! Project scanner: one gitignore-aware walk, per-file size and line
//! counts (parallel), a token estimate for the whole project and the
//! plain-text directory tree used by the overview section.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::core::tokens::tokens_for_len;
use crate::core::tree::TreeNode;
use crate::infra::io::read_file_smart;
use crate::infra::config::ScanConfig;
use crate::infra::line_index::count_lines;
use crate::infra::walk::ProjectWalker;
use crate::lang::{FileSet, LanguageId, LanguageRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A file some language profile handles
    Source,
    /// Other readable text (docs, config)
    Text,
    /// NUL bytes in the head; never rendered
    Binary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub kind: FileKind,
    pub language: Option<LanguageId>,
    pub lines: usize,
    pub bytes: u64,
}

impl ScannedFile {
    pub fn is_text(&self) -> bool {
        self.kind != FileKind::Binary
    }
}

/// Immutable snapshot of a project; shared as `Arc` through the cache.
#[derive(Debug, Clone)]
pub struct ProjectScan {
    pub root: PathBuf,
    pub files: Vec<ScannedFile>,
    pub tree_rendering: String,
    /// Heuristic tokens of every text file's raw content
    pub total_tokens: usize,
    file_set: FileSet,
}

impl ProjectScan {
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: Vec::new(),
            tree_rendering: String::new(),
            total_tokens: 0,
            file_set: FileSet::default(),
        }
    }

    /// All scanned paths, for filesystem-free import resolution
    pub fn file_set(&self) -> &FileSet {
        &self.file_set
    }

    /// Paths of files some language profile understands
    pub fn source_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| f.kind == FileKind::Source)
            .map(|f| f.path.clone())
            .collect()
    }

    pub fn get(&self, path: &Path) -> Option<&ScannedFile> {
        self.files
            .binary_search_by(|f| f.path.as_path().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }
}

pub struct ProjectScanner {
    walker: ProjectWalker,
    registry: Arc<LanguageRegistry>,
}

impl ProjectScanner {
    pub fn new(ignore_patterns: &[String], registry: Arc<LanguageRegistry>) -> Result<Self> {
        Ok(Self {
            walker: ProjectWalker::new(ignore_patterns)?,
            registry,
        })
    }

    /// Apply the `[scan]` walk options
    pub fn with_options(mut self, opts: &ScanConfig) -> Self {
        self.walker = self
            .walker
            .with_include_hidden(opts.include_hidden)
            .with_prune_dependencies(!opts.include_dependencies)
            .with_max_depth(opts.max_depth);
        self
    }

    /// Scan `root`. Unreadable files are skipped; an unreadable root yields
    /// an empty scan.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn scan(&self, root: &Path) -> ProjectScan {
        if !root.is_dir() {
            warn!("project root is not a readable directory");
            return ProjectScan::empty(root);
        }

        let paths = self.walker.walk_files(root);

        // Read in parallel; order is restored by the sorted walk
        let files: Vec<ScannedFile> = paths
            .par_iter()
            .filter_map(|path| match read_file_smart(path) {
                Ok(content) => {
                    let binary = content.looks_binary();
                    let bytes = content.as_bytes();
                    let language = self.registry.language_of(path);
                    let kind = match (binary, language) {
                        (true, _) => FileKind::Binary,
                        (false, Some(_)) => FileKind::Source,
                        (false, None) => FileKind::Text,
                    };
                    Some(ScannedFile {
                        path: path.clone(),
                        kind,
                        language,
                        lines: if binary { 0 } else { count_lines(bytes) },
                        bytes: bytes.len() as u64,
                    })
                }
                Err(err) => {
                    trace!(path = %path.display(), error = %err, "unreadable file skipped");
                    None
                }
            })
            .collect();

        let total_tokens = files
            .iter()
            .filter(|f| f.is_text())
            .map(|f| tokens_for_len(f.bytes as usize))
            .sum();

        let file_set = FileSet::new(files.iter().map(|f| f.path.clone()));

        let mut scan = ProjectScan {
            root: root.to_path_buf(),
            files,
            tree_rendering: String::new(),
            total_tokens,
            file_set,
        };

        scan.tree_rendering = match TreeNode::from_scan(&scan, None).render_plain() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "tree rendering failed");
                String::new()
            }
        };

        debug!(files = scan.files.len(), total_tokens, "project scanned");
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> Result<ProjectScanner> {
        ProjectScanner::new(&[], Arc::new(LanguageRegistry::new()?))
    }

    #[test]
    fn scan_classifies_and_counts() -> Result<()> {
        let tmp = TempDir::new()?;
        let root = dunce::canonicalize(tmp.path())?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/lib.rs"), "pub fn a() {}\npub fn b() {}\n")?;
        fs::write(root.join("notes.md"), "# notes\n")?;
        fs::write(root.join("logo.png"), b"\x89PNG\r\n\x1a\n\0\0\0")?;

        let scan = scanner()?.scan(&root);
        assert_eq!(scan.files.len(), 3);

        let lib = scan.get(&root.join("src/lib.rs")).expect("lib.rs scanned");
        assert_eq!(lib.kind, FileKind::Source);
        assert_eq!(lib.language, Some(LanguageId::Rust));
        assert_eq!(lib.lines, 2);

        let png = scan.get(&root.join("logo.png")).expect("png scanned");
        assert_eq!(png.kind, FileKind::Binary);

        // Binary bytes are not part of the token estimate
        let text_bytes = 28 + 8;
        assert_eq!(scan.total_tokens, tokens_for_len(28) + tokens_for_len(8));
        assert!(scan.total_tokens <= text_bytes);
        assert_eq!(scan.source_files(), vec![root.join("src/lib.rs")]);
        assert!(scan.file_set().contains(&root.join("notes.md")));
        assert!(scan.tree_rendering.contains("lib.rs:2"));
        Ok(())
    }

    #[test]
    fn missing_root_scans_empty() -> Result<()> {
        let tmp = TempDir::new()?;
        let scan = scanner()?.scan(&tmp.path().join("nope"));
        assert!(scan.files.is_empty());
        assert_eq!(scan.total_tokens, 0);
        Ok(())
    }

    #[test]
    fn scan_options_widen_or_narrow_the_walk() -> Result<()> {
        let tmp = TempDir::new()?;
        let root = dunce::canonicalize(tmp.path())?;
        fs::create_dir_all(root.join(".github"))?;
        fs::create_dir_all(root.join("node_modules/dep"))?;
        fs::create_dir_all(root.join("src/deep"))?;
        fs::write(root.join(".github/ci.yml"), "on: push\n")?;
        fs::write(root.join("node_modules/dep/index.js"), "module.exports = 1;\n")?;
        fs::write(root.join("src/deep/leaf.rs"), "pub fn leaf() {}\n")?;
        fs::write(root.join("main.rs"), "fn main() {}\n")?;

        let default = scanner()?.scan(&root);
        assert_eq!(default.files.len(), 2);

        let wide = scanner()?
            .with_options(&ScanConfig {
                include_hidden: true,
                include_dependencies: true,
                max_depth: None,
            })
            .scan(&root);
        assert!(wide.get(&root.join(".github/ci.yml")).is_some());
        assert!(wide.get(&root.join("node_modules/dep/index.js")).is_some());

        let shallow = scanner()?
            .with_options(&ScanConfig {
                max_depth: Some(1),
                ..ScanConfig::default()
            })
            .scan(&root);
        assert_eq!(shallow.source_files(), vec![root.join("main.rs")]);
        Ok(())
    }
}
