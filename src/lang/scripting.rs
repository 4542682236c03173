//! Filepath: src/lang/scripting.rs
//! Path-based imports: Ruby `require`, Lua `require` with dots, CSS/SCSS
//! `@import`/`@use`. Reduction for these uses truncation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

use super::profile::{LanguageId, LanguageProfile, ProjectView, compile_patterns, source_dir};

// ----------------------------------------------------------------------- Ruby

const RUBY_EXTERNAL: &[&str] = &[
    "json", "set", "yaml", "date", "time", "net/http", "uri", "securerandom", "digest", "fileutils",
    "open3", "csv", "logger", "optparse", "rails", "active_record", "active_support", "sinatra",
    "rspec", "minitest", "rake", "bundler", "nokogiri", "sidekiq", "pry",
];

pub struct RubyProfile {
    patterns: Vec<Regex>,
}

impl RubyProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[
                // require_relative keeps a marker so resolution knows its base
                r#"(?m)^\s*require_relative\s*\(?\s*['"]([^'"]+)['"]"#,
                r#"(?m)^\s*(?:require|load)\s*\(?\s*['"]([^'"]+)['"]"#,
            ])?,
        })
    }
}

impl LanguageProfile for RubyProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Ruby
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rb", "rake"]
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut out: indexmap::IndexSet<String> = indexmap::IndexSet::new();
        for caps in self.patterns[0].captures_iter(content) {
            if let Some(m) = caps.get(1) {
                // Relative requires are made explicit as ./path
                let raw = m.as_str();
                let raw = if raw.starts_with('.') { raw.to_string() } else { format!("./{raw}") };
                out.insert(raw);
            }
        }
        for caps in self.patterns[1].captures_iter(content) {
            if let Some(m) = caps.get(1) {
                out.insert(m.as_str().to_string());
            }
        }
        out.into_iter().collect()
    }

    fn is_external(&self, raw: &str) -> bool {
        RUBY_EXTERNAL.contains(&raw) || RUBY_EXTERNAL.iter().any(|e| raw.starts_with(&format!("{e}/")))
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        if raw.starts_with('.') {
            return project.probe_with(&source_dir(source, project).join(raw), &["", ".rb"]);
        }
        ["lib", "app", ""]
            .iter()
            .find_map(|base| project.probe_with(&project.root.join(base).join(raw), &["", ".rb"]))
    }
}

// ------------------------------------------------------------------------ Lua

const LUA_EXTERNAL: &[&str] = &["string", "table", "math", "io", "os", "coroutine", "debug", "utf8", "vim", "socket", "lfs", "cjson"];

pub struct LuaProfile {
    patterns: Vec<Regex>,
}

impl LuaProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[r#"\brequire\s*\(?\s*['"]([^'"]+)['"]"#])?,
        })
    }
}

impl LanguageProfile for LuaProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Lua
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["lua"]
    }

    fn comment_prefix(&self) -> &'static str {
        "--"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        let first = raw.split('.').next().unwrap_or(raw);
        LUA_EXTERNAL.contains(&first)
    }

    fn resolve(&self, raw: &str, _source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let rel: PathBuf = raw.split('.').collect();
        ["", "lua", "src"].iter().find_map(|base| {
            let target = project.root.join(base).join(&rel);
            project
                .probe_with(&target, &[".lua"])
                .or_else(|| project.probe(&target.join("init.lua")))
        })
    }
}

// -------------------------------------------------------------------- CSS/SCSS

pub struct CssProfile {
    patterns: Vec<Regex>,
}

impl CssProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[
                r#"(?m)^\s*@(?:import|use|forward)\s+(?:url\(\s*)?['"]([^'"]+)['"]"#,
            ])?,
        })
    }
}

impl LanguageProfile for CssProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Css
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["css", "scss", "sass", "less"]
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        raw.starts_with("http:") || raw.starts_with("https:") || raw.starts_with("//") || raw.starts_with("sass:") || raw.starts_with('~')
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let base = source_dir(source, project).join(raw);

        // SCSS partials: _name.scss next to the import path
        let partial = match (base.parent(), base.file_name()) {
            (Some(dir), Some(name)) => Some(dir.join(format!("_{}", name.to_string_lossy()))),
            _ => None,
        };

        project
            .probe_with(&base, &["", ".css", ".scss", ".sass", ".less"])
            .or_else(|| partial.and_then(|p| project.probe_with(&p, &["", ".scss", ".sass"])))
    }
}
