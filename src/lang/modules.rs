//! Filepath: src/lang/modules.rs
//! Namespaced module systems. Imports name a namespace path rather than a
//! file, so resolution turns the namespace into a path suffix and matches it
//! against project files (Java, Kotlin, PHP, Elixir) or a module directory
//! (Swift). None of these carry a grammar; reduction uses truncation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

use super::profile::{LanguageId, LanguageProfile, ProjectView, compile_patterns, source_dir};
use crate::infra::utils::NameUtils;

/// Dotted namespace → relative path with extension (`a.b.C` → `a/b/C.ext`)
fn dotted_path(raw: &str, sep: char, ext: &str) -> PathBuf {
    let mut path: PathBuf = raw.split(sep).filter(|s| !s.is_empty()).collect();
    path.set_extension(ext);
    path
}

// ---------------------------------------------------------------- Java/Kotlin

const JVM_EXTERNAL_PREFIXES: &[&str] = &[
    "java.", "javax.", "jakarta.", "kotlin.", "kotlinx.", "android.", "androidx.", "org.springframework.",
    "org.junit.", "org.apache.", "org.slf4j.", "com.google.", "com.fasterxml.", "lombok.", "io.reactivex.",
];

pub struct JvmProfile {
    id: LanguageId,
    patterns: Vec<Regex>,
}

impl JvmProfile {
    pub fn java() -> Result<Self> {
        Ok(Self {
            id: LanguageId::Java,
            patterns: compile_patterns(&[r"(?m)^\s*import\s+(?:static\s+)?([\w.]+)(?:\.\*)?\s*;"])?,
        })
    }

    pub fn kotlin() -> Result<Self> {
        Ok(Self {
            id: LanguageId::Kotlin,
            patterns: compile_patterns(&[r"(?m)^\s*import\s+([\w.]+)(?:\.\*)?(?:\s+as\s+\w+)?"])?,
        })
    }
}

impl LanguageProfile for JvmProfile {
    fn id(&self) -> LanguageId {
        self.id
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self.id {
            LanguageId::Kotlin => &["kt", "kts"],
            _ => &["java"],
        }
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        JVM_EXTERNAL_PREFIXES.iter().any(|p| raw.starts_with(p))
    }

    fn resolve(&self, raw: &str, _source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        // Type import first; for static/member imports drop the last segment
        let segments: Vec<&str> = raw.split('.').collect();
        for take in (1..=segments.len()).rev().take(2) {
            let ns = segments[..take].join(".");
            for ext in ["java", "kt"] {
                if let Some(hit) = project.find_suffix(&dotted_path(&ns, '.', ext)) {
                    return Some(hit);
                }
            }
        }
        None
    }
}

// ------------------------------------------------------------------------ PHP

const PHP_EXTERNAL_PREFIXES: &[&str] = &[
    "Illuminate\\", "Symfony\\", "Doctrine\\", "Psr\\", "GuzzleHttp\\", "Monolog\\", "Carbon\\",
    "PHPUnit\\", "Laravel\\",
];

pub struct PhpProfile {
    patterns: Vec<Regex>,
}

impl PhpProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[
                // require/include with a literal path
                r#"(?m)\b(?:require|require_once|include|include_once)\s*\(?\s*(?:__DIR__\s*\.\s*)?['"]([^'"]+)['"]"#,
                // use App\Models\User;  (function/const forms too)
                r"(?m)^\s*use\s+(?:function\s+|const\s+)?\\?([A-Za-z_][\w\\]*)",
            ])?,
        })
    }
}

impl LanguageProfile for PhpProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Php
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["php"]
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        PHP_EXTERNAL_PREFIXES.iter().any(|p| raw.starts_with(p))
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        if raw.contains('\\') || !raw.contains('.') {
            // Namespace: PSR-4 style suffix match, tolerating a lowercase root dir
            let rel = dotted_path(raw, '\\', "php");
            let mut parts: Vec<String> =
                rel.iter().map(|s| s.to_string_lossy().into_owned()).collect();
            if let Some(hit) = project.find_suffix(&rel) {
                return Some(hit);
            }
            if parts.len() > 1 {
                parts.remove(0);
                return project.find_suffix(&parts.iter().collect::<PathBuf>());
            }
            return None;
        }
        let raw = raw.trim_start_matches('/');
        project
            .probe(&source_dir(source, project).join(raw))
            .or_else(|| project.probe(&project.root.join(raw)))
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }
}

// ---------------------------------------------------------------------- Swift

const SWIFT_SYSTEM_MODULES: &[&str] = &[
    "Foundation", "UIKit", "SwiftUI", "Combine", "XCTest", "Darwin", "Dispatch", "os", "AppKit",
    "CoreData", "CoreGraphics", "MapKit", "Vapor", "Alamofire",
];

pub struct SwiftProfile {
    patterns: Vec<Regex>,
}

impl SwiftProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[
                r"(?m)^\s*(?:@testable\s+)?import\s+(?:(?:struct|class|enum|protocol|func|typealias)\s+)?([\w.]+)",
            ])?,
        })
    }
}

impl LanguageProfile for SwiftProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Swift
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["swift"]
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        let module = raw.split('.').next().unwrap_or(raw);
        SWIFT_SYSTEM_MODULES.contains(&module)
    }

    fn resolve(&self, raw: &str, _source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let module = raw.split('.').next().unwrap_or(raw);

        // SwiftPM layout: Sources/<Module>/*.swift, prefer <Module>.swift
        let dir = project.root.join("Sources").join(module);
        let files = project.files_in_dir(&dir, &["swift"]);
        let named = format!("{module}.swift");
        files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == named.as_str()))
            .or_else(|| files.first())
            .cloned()
            .or_else(|| project.find_suffix(Path::new(&named)))
    }
}

// --------------------------------------------------------------------- Elixir

const ELIXIR_EXTERNAL_ROOTS: &[&str] = &[
    "Enum", "Map", "List", "String", "Kernel", "GenServer", "Supervisor", "Agent", "Task", "Logger",
    "Application", "Process", "Keyword", "IO", "File", "Path", "Ecto", "Phoenix", "Plug", "Jason",
    "ExUnit", "Mix", "Absinthe", "Oban",
];

pub struct ElixirProfile {
    patterns: Vec<Regex>,
}

impl ElixirProfile {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: compile_patterns(&[
                r"(?m)^\s*(?:alias|import|use|require)\s+([A-Z][\w]*(?:\.[A-Z][\w]*)*)",
            ])?,
        })
    }
}

impl LanguageProfile for ElixirProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Elixir
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ex", "exs"]
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn is_external(&self, raw: &str) -> bool {
        let first = raw.split('.').next().unwrap_or(raw);
        ELIXIR_EXTERNAL_ROOTS.contains(&first)
    }

    fn resolve(&self, raw: &str, _source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        // MyApp.Accounts.User → lib/my_app/accounts/user.ex
        let segments: Vec<String> = raw.split('.').map(NameUtils::snake_case).collect();
        let mut rel: PathBuf = segments.iter().collect();
        rel.set_extension("ex");
        project
            .probe(&project.root.join("lib").join(&rel))
            .or_else(|| project.find_suffix(&rel))
    }
}
