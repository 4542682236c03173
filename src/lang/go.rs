//! Filepath: src/lang/go.rs
//! Go imports name packages (directories). An import inside the module
//! declared by `go.mod` resolves to one representative file of that package.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexSet;
use regex::Regex;

use super::profile::{Grammar, GrammarSpec, LanguageId, LanguageProfile, ProjectView, compile_patterns};

const SEMANTIC_QUERY: &str = r#"
(function_declaration) @item
(method_declaration) @item
(type_declaration) @item
(const_declaration) @item
"#;

const TYPES_QUERY: &str = r#"
(type_declaration) @item
"#;

/// Top-level standard library packages
const STDLIB_ROOTS: &[&str] = &[
    "archive", "bufio", "bytes", "cmp", "compress", "container", "context", "crypto", "database",
    "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go", "hash", "html", "image",
    "index", "io", "iter", "log", "maps", "math", "mime", "net", "os", "path", "plugin", "reflect",
    "regexp", "runtime", "slices", "sort", "strconv", "strings", "sync", "syscall", "testing",
    "text", "time", "unicode", "unique", "unsafe",
];

const BUILTINS: &[&str] = &[
    "err", "nil", "true", "false", "iota", "string", "int", "int8", "int16", "int32", "int64",
    "uint", "uint8", "uint16", "uint32", "uint64", "float32", "float64", "byte", "rune", "bool",
    "error", "any", "make", "new", "len", "cap", "append", "copy", "delete", "panic", "recover",
    "close", "fmt", "ctx", "context", "main", "init",
];

pub struct GoProfile {
    patterns: Vec<Regex>,
    grammar: Option<Grammar>,
}

impl GoProfile {
    pub fn new() -> Result<Self> {
        let patterns = compile_patterns(&[
            // import "x"  /  import alias "x"
            r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#,
            // import ( ... ) block; inner specs are split below
            r#"(?ms)^\s*import\s*\((.*?)\)"#,
        ])?;

        let grammar = Grammar::compile_or_warn(
            LanguageId::Go,
            tree_sitter_go::LANGUAGE.into(),
            GrammarSpec {
                semantic_query: SEMANTIC_QUERY,
                types_query: TYPES_QUERY,
                function_kinds: &["function_declaration", "method_declaration", "func_literal"],
                body_kinds: &["block"],
                leading_kinds: &[],
                identifier_kinds: &["identifier", "type_identifier"],
                elision: "{ ... }",
            },
        );

        Ok(Self { patterns, grammar })
    }
}

impl LanguageProfile for GoProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Go
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut seen = IndexSet::new();
        for caps in self.patterns[0].captures_iter(content) {
            if let Some(m) = caps.get(1) {
                seen.insert(m.as_str().to_string());
            }
        }
        for caps in self.patterns[1].captures_iter(content) {
            let Some(block) = caps.get(1) else { continue };
            for line in block.as_str().lines() {
                // Each spec line holds at most one quoted path
                let line = line.split("//").next().unwrap_or("");
                if let Some(start) = line.find('"')
                    && let Some(len) = line[start + 1..].find('"')
                {
                    seen.insert(line[start + 1..start + 1 + len].to_string());
                }
            }
        }
        seen.into_iter().collect()
    }

    fn is_external(&self, raw: &str) -> bool {
        let first = raw.split('/').next().unwrap_or(raw);
        STDLIB_ROOTS.contains(&first) || matches!(first, "golang.org" | "google.golang.org" | "gopkg.in")
    }

    fn resolve(&self, raw: &str, _source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let rel = match project.go_module() {
            Some(module) if raw == module => "",
            Some(module) => raw.strip_prefix(module)?.strip_prefix('/')?,
            // No go.mod: treat the path as root-relative
            None => raw,
        };
        let dir = project.root.join(rel);

        let files: Vec<PathBuf> = project
            .files_in_dir(&dir, &["go"])
            .into_iter()
            .filter(|p| !p.to_string_lossy().ends_with("_test.go"))
            .collect();

        // Prefer the file named after the package directory
        let pkg = dir.file_name().map(|n| format!("{}.go", n.to_string_lossy()));
        files
            .iter()
            .find(|p| pkg.as_deref().is_some_and(|want| p.file_name().is_some_and(|n| n == want)))
            .or_else(|| files.first())
            .cloned()
    }

    fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    fn builtins(&self) -> &'static [&'static str] {
        BUILTINS
    }
}
