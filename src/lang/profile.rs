//! Filepath: src/lang/profile.rs
//! One trait per language family: how imports look, how they resolve, which
//! names are built in, and (optionally) the tree-sitter grammar and capture
//! queries the reducer and resolver run.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tree_sitter::{Language, Query};

use crate::infra::utils::PathUtils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageId {
    C,
    Cpp,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Go,
    Rust,
    Ruby,
    Php,
    Java,
    Kotlin,
    Swift,
    Elixir,
    Lua,
    Css,
}

impl LanguageId {
    pub fn label(self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::Elixir => "elixir",
            Self::Lua => "lua",
            Self::Css => "css",
        }
    }
}

/// Static description of a grammar, compiled into a [`Grammar`] once.
pub struct GrammarSpec {
    /// Captures for semantic mode (signatures, types, exports); capture name `@item`
    pub semantic_query: &'static str,
    /// Captures for types-only mode
    pub types_query: &'static str,
    /// Node kinds whose `body` field is elided
    pub function_kinds: &'static [&'static str],
    /// Body node kinds that may be replaced by the marker
    pub body_kinds: &'static [&'static str],
    /// Preceding sibling kinds glued to a capture (attributes, decorators)
    pub leading_kinds: &'static [&'static str],
    /// Leaf kinds the resolver treats as identifiers
    pub identifier_kinds: &'static [&'static str],
    /// Replacement text for an elided body
    pub elision: &'static str,
}

/// A compiled tree-sitter grammar with its capture queries
pub struct Grammar {
    pub language: Language,
    pub semantic: Query,
    pub types: Query,
    pub function_kinds: &'static [&'static str],
    pub body_kinds: &'static [&'static str],
    pub leading_kinds: &'static [&'static str],
    pub identifier_kinds: &'static [&'static str],
    pub elision: &'static str,
}

impl Grammar {
    pub fn compile(language: Language, spec: GrammarSpec) -> Result<Self> {
        let semantic = Query::new(&language, spec.semantic_query)
            .context("Failed to compile semantic capture query")?;
        let types = Query::new(&language, spec.types_query)
            .context("Failed to compile types-only capture query")?;
        Ok(Self {
            language,
            semantic,
            types,
            function_kinds: spec.function_kinds,
            body_kinds: spec.body_kinds,
            leading_kinds: spec.leading_kinds,
            identifier_kinds: spec.identifier_kinds,
            elision: spec.elision,
        })
    }

    /// Compile, logging and discarding a broken grammar so the language
    /// falls back to truncation instead of failing startup.
    pub fn compile_or_warn(id: LanguageId, language: Language, spec: GrammarSpec) -> Option<Self> {
        match Self::compile(language, spec) {
            Ok(g) => Some(g),
            Err(err) => {
                tracing::warn!(language = id.label(), error = %format!("{err:#}"), "grammar disabled");
                None
            }
        }
    }
}

/// Snapshot of project files used to resolve imports without touching disk.
///
/// When empty, resolution falls back to probing the filesystem.
#[derive(Debug, Default, Clone)]
pub struct FileSet {
    files: HashSet<PathBuf>,
    by_name: BTreeMap<String, Vec<PathBuf>>,
}

impl FileSet {
    pub fn new<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let mut set = Self::default();
        for p in paths {
            if let Some(name) = p.file_name() {
                set.by_name
                    .entry(name.to_string_lossy().into_owned())
                    .or_default()
                    .push(p.clone());
            }
            set.files.insert(p);
        }
        for list in set.by_name.values_mut() {
            list.sort();
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Files whose path ends with `suffix` (component-wise), shortest first.
    pub fn find_suffix(&self, suffix: &Path) -> Vec<&PathBuf> {
        let Some(name) = suffix.file_name() else {
            return Vec::new();
        };
        let mut hits: Vec<&PathBuf> = self
            .by_name
            .get(name.to_string_lossy().as_ref())
            .map(|v| v.iter().filter(|p| p.ends_with(suffix)).collect())
            .unwrap_or_default();
        hits.sort_by_key(|p| (p.components().count(), p.as_path()));
        hits
    }

    /// Files directly inside `dir`, sorted
    pub fn files_in_dir(&self, dir: &Path) -> Vec<&PathBuf> {
        let mut out: Vec<&PathBuf> = self.files.iter().filter(|p| p.parent() == Some(dir)).collect();
        out.sort();
        out
    }
}

/// What a profile sees of the project while resolving imports.
pub struct ProjectView<'a> {
    pub root: &'a Path,
    pub files: &'a FileSet,
    go_module: OnceLock<Option<String>>,
}

impl<'a> ProjectView<'a> {
    pub fn new(root: &'a Path, files: &'a FileSet) -> Self {
        Self {
            root,
            files,
            go_module: OnceLock::new(),
        }
    }

    /// Does `path` exist as a project file? Normalized lexically first.
    pub fn probe(&self, path: &Path) -> Option<PathBuf> {
        let p = PathUtils::normalize(path);
        if !p.starts_with(self.root) {
            return None;
        }
        let found = if self.files.is_empty() {
            p.is_file()
        } else {
            self.files.contains(&p)
        };
        found.then_some(p)
    }

    /// First existing candidate among `base` + each extension suffix
    pub fn probe_with(&self, base: &Path, suffixes: &[&str]) -> Option<PathBuf> {
        let base_str = base.as_os_str().to_string_lossy();
        suffixes
            .iter()
            .find_map(|sfx| self.probe(Path::new(&format!("{base_str}{sfx}"))))
    }

    /// Files under the root whose path ends with `suffix`, shortest first
    pub fn find_suffix(&self, suffix: &Path) -> Option<PathBuf> {
        if self.files.is_empty() {
            // Without a snapshot only conventional roots are probed
            return ["", "src", "lib", "app"]
                .iter()
                .find_map(|base| self.probe(&self.root.join(base).join(suffix)));
        }
        self.files.find_suffix(suffix).into_iter().next().cloned()
    }

    /// Source files directly inside `dir` with one of `extensions`, sorted
    pub fn files_in_dir(&self, dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        let dir = PathUtils::normalize(dir);
        if !dir.starts_with(self.root) {
            return Vec::new();
        }
        let has_ext = |p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e))
        };
        if !self.files.is_empty() {
            return self
                .files
                .files_in_dir(&dir)
                .into_iter()
                .filter(|p| has_ext(p))
                .cloned()
                .collect();
        }
        let mut out: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && has_ext(p))
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Module path declared in the root `go.mod`, read once per view
    pub fn go_module(&self) -> Option<&str> {
        self.go_module
            .get_or_init(|| {
                let text = std::fs::read_to_string(self.root.join("go.mod")).ok()?;
                text.lines()
                    .map(str::trim)
                    .find_map(|l| l.strip_prefix("module "))
                    .map(|m| m.trim().trim_matches('"').to_string())
            })
            .as_deref()
    }
}

/// Per-language import and syntax knowledge.
pub trait LanguageProfile: Send + Sync {
    fn id(&self) -> LanguageId;

    /// File extensions (without dot) handled by this profile
    fn extensions(&self) -> &'static [&'static str];

    /// Markdown fence label
    fn fence(&self) -> &'static str {
        self.id().label()
    }

    /// Line-comment prefix used for reducer annotations
    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    /// Ordered import patterns; capture group 1 is the raw import string
    fn import_patterns(&self) -> &[Regex];

    /// Apply the patterns in order, dedup preserving first occurrence
    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut seen = IndexSet::new();
        for re in self.import_patterns() {
            for caps in re.captures_iter(content) {
                if let Some(m) = caps.get(1) {
                    let raw = m.as_str().trim();
                    if !raw.is_empty() {
                        seen.insert(raw.to_string());
                    }
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Standard library / third-party import that never lives in the project
    fn is_external(&self, raw: &str) -> bool;

    /// Resolve a raw import from `source`; `None` when nothing in the project matches
    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf>;

    fn grammar(&self) -> Option<&Grammar> {
        None
    }

    /// Keywords and built-in names never sent to the definition provider
    fn builtins(&self) -> &'static [&'static str] {
        &[]
    }

    /// Keep docstrings when eliding function bodies
    fn keeps_docstrings(&self) -> bool {
        false
    }
}

/// Compile a list of import patterns
pub fn compile_patterns(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("Invalid import pattern: {p}")))
        .collect()
}

/// Directory of the importing file (the root when it has no parent)
pub fn source_dir<'a>(source: &'a Path, project: &ProjectView<'a>) -> &'a Path {
    source.parent().unwrap_or(project.root)
}
