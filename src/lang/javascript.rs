//! Filepath: src/lang/javascript.rs
//! JavaScript, TypeScript and TSX share one import model (ES modules,
//! CommonJS `require`, dynamic `import()`); they differ in grammar.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

use super::profile::{
    Grammar, GrammarSpec, LanguageId, LanguageProfile, ProjectView, compile_patterns, source_dir,
};

const JS_SEMANTIC_QUERY: &str = r#"
(export_statement) @item
(function_declaration) @item
(generator_function_declaration) @item
(class_declaration) @item
(lexical_declaration (variable_declarator value: (arrow_function))) @item
"#;

const JS_TYPES_QUERY: &str = r#"
(class_declaration) @item
"#;

const TS_SEMANTIC_QUERY: &str = r#"
(export_statement) @item
(function_declaration) @item
(generator_function_declaration) @item
(class_declaration) @item
(abstract_class_declaration) @item
(interface_declaration) @item
(type_alias_declaration) @item
(enum_declaration) @item
(lexical_declaration (variable_declarator value: (arrow_function))) @item
"#;

const TS_TYPES_QUERY: &str = r#"
(export_statement declaration: (interface_declaration)) @item
(export_statement declaration: (type_alias_declaration)) @item
(export_statement declaration: (enum_declaration)) @item
(interface_declaration) @item
(type_alias_declaration) @item
(enum_declaration) @item
"#;

/// Extension probes for a bare or relative module specifier
const PROBES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".mjs",
    ".cjs",
    ".d.ts",
    ".vue",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/index.jsx",
    "/index.mjs",
];

/// Alias roots tried for bare specifiers that are not known packages
const ALIAS_ROOTS: &[&str] = &["src", "app", "lib", ""];

/// Node built-ins and common packages (first path segment)
const EXTERNAL_PACKAGES: &[&str] = &[
    "fs", "path", "os", "http", "https", "url", "util", "crypto", "events", "stream", "child_process",
    "assert", "buffer", "net", "zlib", "readline", "worker_threads", "react", "react-dom", "vue",
    "svelte", "next", "nuxt", "express", "koa", "fastify", "lodash", "axios", "rxjs", "jquery",
    "moment", "dayjs", "zod", "redux", "vitest", "jest", "mocha", "chai", "typescript", "webpack",
    "vite", "tslib", "uuid", "dotenv", "graphql", "prisma", "mongoose", "sequelize", "electron",
];

const BUILTINS: &[&str] = &[
    "console", "window", "document", "undefined", "null", "this", "Promise", "Array", "Object",
    "String", "Number", "Boolean", "JSON", "Math", "Date", "Error", "Map", "Set", "Symbol",
    "require", "module", "exports", "process", "setTimeout", "setInterval", "async", "await",
    "const", "let", "var", "return", "string", "number", "boolean", "any", "unknown", "void",
    "never", "Record", "Partial", "Readonly", "Pick", "Omit", "React", "props", "e", "err",
];

pub struct JavaScriptProfile {
    id: LanguageId,
    patterns: Vec<Regex>,
    grammar: Option<Grammar>,
}

impl JavaScriptProfile {
    fn with_grammar(id: LanguageId, grammar: Option<Grammar>) -> Result<Self> {
        let patterns = compile_patterns(&[
            // import x from 'm'; export { y } from "m"; multi-line named lists
            r#"(?m)^\s*(?:import|export)\s[^;'"]*?\bfrom\s*['"]([^'"]+)['"]"#,
            // side-effect import 'm'
            r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#,
            // require('m')
            r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
            // dynamic import('m')
            r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
        ])?;
        Ok(Self { id, patterns, grammar })
    }

    pub fn javascript() -> Result<Self> {
        let grammar = Grammar::compile_or_warn(
            LanguageId::JavaScript,
            tree_sitter_javascript::LANGUAGE.into(),
            spec(JS_SEMANTIC_QUERY, JS_TYPES_QUERY, &["identifier"]),
        );
        Self::with_grammar(LanguageId::JavaScript, grammar)
    }

    pub fn typescript() -> Result<Self> {
        let grammar = Grammar::compile_or_warn(
            LanguageId::TypeScript,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            spec(TS_SEMANTIC_QUERY, TS_TYPES_QUERY, &["identifier", "type_identifier"]),
        );
        Self::with_grammar(LanguageId::TypeScript, grammar)
    }

    pub fn tsx() -> Result<Self> {
        let grammar = Grammar::compile_or_warn(
            LanguageId::Tsx,
            tree_sitter_typescript::LANGUAGE_TSX.into(),
            spec(TS_SEMANTIC_QUERY, TS_TYPES_QUERY, &["identifier", "type_identifier"]),
        );
        Self::with_grammar(LanguageId::Tsx, grammar)
    }
}

fn spec(
    semantic_query: &'static str,
    types_query: &'static str,
    identifier_kinds: &'static [&'static str],
) -> GrammarSpec {
    GrammarSpec {
        semantic_query,
        types_query,
        function_kinds: &[
            "function_declaration",
            "generator_function_declaration",
            "function_expression",
            "arrow_function",
            "method_definition",
        ],
        body_kinds: &["statement_block"],
        leading_kinds: &[],
        identifier_kinds,
        elision: "{ ... }",
    }
}

/// Probe `base` with every module extension; ESM `.js` specifiers also map to `.ts`
fn probe_module(base: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
    if let Some(hit) = project.probe_with(base, PROBES) {
        return Some(hit);
    }
    let s = base.to_string_lossy();
    for (js, ts) in [(".js", ".ts"), (".js", ".tsx"), (".jsx", ".tsx"), (".mjs", ".mts")] {
        if let Some(stem) = s.strip_suffix(js)
            && let Some(hit) = project.probe(Path::new(&format!("{stem}{ts}")))
        {
            return Some(hit);
        }
    }
    None
}

impl LanguageProfile for JavaScriptProfile {
    fn id(&self) -> LanguageId {
        self.id
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self.id {
            LanguageId::TypeScript => &["ts", "mts", "cts"],
            LanguageId::Tsx => &["tsx"],
            _ => &["js", "jsx", "mjs", "cjs", "vue", "svelte"],
        }
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        if raw.starts_with("node:") || raw.starts_with("http:") || raw.starts_with("https:") {
            return true;
        }
        if raw.starts_with('.') || raw.starts_with('/') || raw.starts_with("@/") || raw.starts_with("~/")
        {
            return false;
        }
        // Scoped packages: @scope/pkg
        if raw.starts_with('@') {
            return !raw.starts_with("@app/") && !raw.starts_with("@src/");
        }
        let first = raw.split('/').next().unwrap_or(raw);
        EXTERNAL_PACKAGES.contains(&first)
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        // Relative and root-absolute specifiers
        if raw.starts_with('.') {
            return probe_module(&source_dir(source, project).join(raw), project);
        }
        if let Some(rest) = raw.strip_prefix('/') {
            return probe_module(&project.root.join(rest), project);
        }

        // Alias prefixes: @/x and ~/x point at src/ (or the root)
        let bare = raw
            .strip_prefix("@/")
            .or_else(|| raw.strip_prefix("~/"))
            .or_else(|| raw.strip_prefix("@app/"))
            .or_else(|| raw.strip_prefix("@src/"))
            .unwrap_or(raw);

        ALIAS_ROOTS
            .iter()
            .find_map(|base| probe_module(&project.root.join(base).join(bare), project))
    }

    fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    fn builtins(&self) -> &'static [&'static str] {
        BUILTINS
    }
}
