//! Filepath: src/lang/python.rs
//! Python imports: `import a.b`, `from a.b import c`, relative dots.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexSet;
use regex::Regex;

use super::profile::{
    Grammar, GrammarSpec, LanguageId, LanguageProfile, ProjectView, compile_patterns, source_dir,
};

const SEMANTIC_QUERY: &str = r#"
(decorated_definition) @item
(function_definition) @item
(class_definition) @item
"#;

const TYPES_QUERY: &str = r#"
(decorated_definition definition: (class_definition)) @item
(class_definition) @item
"#;

/// Standard library plus the usual third-party heavyweights
const EXTERNAL_MODULES: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "collections", "concurrent", "contextlib", "copy",
    "csv", "dataclasses", "datetime", "decimal", "enum", "functools", "glob", "hashlib", "heapq",
    "http", "importlib", "inspect", "io", "itertools", "json", "logging", "math", "multiprocessing",
    "operator", "os", "pathlib", "pickle", "random", "re", "shutil", "signal", "socket", "sqlite3",
    "string", "struct", "subprocess", "sys", "tempfile", "threading", "time", "traceback", "typing",
    "typing_extensions", "unittest", "urllib", "uuid", "warnings", "weakref", "xml", "zipfile",
    "__future__", "django", "fastapi", "flask", "pydantic", "sqlalchemy", "numpy", "pandas",
    "requests", "httpx", "pytest", "starlette", "celery", "redis", "boto3", "attr", "attrs",
    "click", "yaml", "jinja2", "aiohttp", "uvicorn", "rest_framework",
];

const BUILTINS: &[&str] = &[
    "self", "cls", "print", "len", "range", "str", "int", "float", "bool", "dict", "list", "set",
    "tuple", "object", "type", "None", "True", "False", "isinstance", "issubclass", "super",
    "Exception", "ValueError", "TypeError", "KeyError", "RuntimeError", "open", "enumerate", "zip",
    "map", "filter", "sorted", "min", "max", "sum", "any", "all", "getattr", "setattr", "hasattr",
    "property", "staticmethod", "classmethod", "__init__", "__name__", "kwargs", "args",
];

pub struct PythonProfile {
    patterns: Vec<Regex>,
    grammar: Option<Grammar>,
}

impl PythonProfile {
    pub fn new() -> Result<Self> {
        let patterns = compile_patterns(&[
            // from .a.b import (x, y as z)
            r"(?m)^[ \t]*from[ \t]+([.\w]+)[ \t]+import[ \t]+(\([^)]*\)|[^\n#]+)",
            // import a.b as c, d
            r"(?m)^[ \t]*import[ \t]+([^\n#]+)",
        ])?;

        let grammar = Grammar::compile_or_warn(
            LanguageId::Python,
            tree_sitter_python::LANGUAGE.into(),
            GrammarSpec {
                semantic_query: SEMANTIC_QUERY,
                types_query: TYPES_QUERY,
                function_kinds: &["function_definition"],
                body_kinds: &["block"],
                leading_kinds: &[],
                identifier_kinds: &["identifier"],
                elision: "...",
            },
        );

        Ok(Self { patterns, grammar })
    }
}

/// Names listed after `import`, without aliases or parentheses
fn imported_names(list: &str) -> impl Iterator<Item = &str> {
    list.trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .filter_map(|item| item.split_whitespace().next())
        .filter(|name| *name != "*" && *name != "\\")
}

impl LanguageProfile for PythonProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Python
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut seen = IndexSet::new();

        // from-imports: the module, plus module.name for submodule imports
        for caps in self.patterns[0].captures_iter(content) {
            let (Some(module), Some(names)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let module = module.as_str();
            if module.chars().all(|c| c == '.') {
                // `from . import views` imports sibling modules
                for name in imported_names(names.as_str()) {
                    seen.insert(format!("{module}{name}"));
                }
                continue;
            }
            seen.insert(module.to_string());
            for name in imported_names(names.as_str()) {
                seen.insert(format!("{module}.{name}"));
            }
        }

        // plain imports: every comma-separated module, alias dropped
        for caps in self.patterns[1].captures_iter(content) {
            if let Some(list) = caps.get(1) {
                for name in imported_names(list.as_str()) {
                    seen.insert(name.to_string());
                }
            }
        }

        seen.into_iter().collect()
    }

    fn is_external(&self, raw: &str) -> bool {
        if raw.starts_with('.') {
            return false;
        }
        let first = raw.split('.').next().unwrap_or(raw);
        EXTERNAL_MODULES.contains(&first)
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let dots = raw.chars().take_while(|c| *c == '.').count();
        let rest = &raw[dots..];
        let rel: PathBuf = rest.split('.').filter(|s| !s.is_empty()).collect();

        // Candidate bases: relative imports climb from the source directory,
        // absolute imports try the root, common source roots, then the source dir
        let bases: Vec<PathBuf> = if dots > 0 {
            let mut dir = source_dir(source, project).to_path_buf();
            for _ in 1..dots {
                dir = dir.parent()?.to_path_buf();
            }
            vec![dir]
        } else {
            vec![
                project.root.to_path_buf(),
                project.root.join("src"),
                project.root.join("app"),
                source_dir(source, project).to_path_buf(),
            ]
        };

        bases.iter().find_map(|base| {
            let target = base.join(&rel);
            if rel.as_os_str().is_empty() {
                // `from . import x` fell back to the package itself
                return project.probe(&target.join("__init__.py"));
            }
            project
                .probe_with(&target, &[".py", ".pyi"])
                .or_else(|| project.probe(&target.join("__init__.py")))
        })
    }

    fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    fn builtins(&self) -> &'static [&'static str] {
        BUILTINS
    }

    fn keeps_docstrings(&self) -> bool {
        true
    }
}
