//! Filepath: src/lang/rust.rs
//! Rust: `use` paths (with brace groups), `mod x;` and `extern crate`.
//!
//! Resolution works on the module tree: `crate::` starts at the crate's
//! `src/`, `self::`/`super::` start at the importing file's module directory,
//! and the longest prefix of the path that names a file wins.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexSet;
use regex::Regex;

use super::profile::{Grammar, GrammarSpec, LanguageId, LanguageProfile, ProjectView, compile_patterns};

const SEMANTIC_QUERY: &str = r#"
(function_item) @item
(function_signature_item) @item
(struct_item) @item
(enum_item) @item
(union_item) @item
(trait_item) @item
(type_item) @item
(impl_item) @item
(const_item) @item
(static_item) @item
(macro_definition) @item
"#;

const TYPES_QUERY: &str = r#"
(struct_item) @item
(enum_item) @item
(union_item) @item
(trait_item) @item
(type_item) @item
"#;

/// Crates that are never part of the project tree
const EXTERNAL_ROOTS: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

const BUILTINS: &[&str] = &[
    "self", "Self", "super", "crate", "String", "Vec", "Option", "Some", "None", "Result", "Ok",
    "Err", "Box", "Rc", "Arc", "HashMap", "HashSet", "BTreeMap", "BTreeSet", "str", "bool",
    "char", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64", "i128",
    "isize", "f32", "f64", "println", "print", "eprintln", "format", "vec", "write", "writeln",
    "assert", "assert_eq", "assert_ne", "panic", "todo", "unimplemented", "unreachable", "Default",
    "Clone", "Copy", "Debug", "Display", "PartialEq", "Eq", "Hash", "Into", "From", "Iterator",
    "main", "new", "len", "iter", "map", "unwrap", "clone", "to_string", "as_str", "push",
];

pub struct RustProfile {
    patterns: Vec<Regex>,
    grammar: Option<Grammar>,
}

impl RustProfile {
    pub fn new() -> Result<Self> {
        let patterns = compile_patterns(&[
            // use a::b::{c, d::e};  (optionally pub / pub(crate))
            r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([^;]+);",
            // mod name;   (declaration only, inline `mod x { }` has no semicolon)
            r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_][A-Za-z0-9_]*)\s*;",
            // extern crate foo;
            r"(?m)^\s*extern\s+crate\s+([A-Za-z_][A-Za-z0-9_]*)",
        ])?;

        let grammar = Grammar::compile_or_warn(
            LanguageId::Rust,
            tree_sitter_rust::LANGUAGE.into(),
            GrammarSpec {
                semantic_query: SEMANTIC_QUERY,
                types_query: TYPES_QUERY,
                function_kinds: &["function_item", "closure_expression"],
                body_kinds: &["block"],
                leading_kinds: &["attribute_item"],
                identifier_kinds: &["identifier", "type_identifier"],
                elision: "{ ... }",
            },
        );

        Ok(Self { patterns, grammar })
    }
}

/// Expand one `use` tree into flat paths: `a::{b, c::d}` → `a::b`, `a::c::d`.
/// Aliases (`as x`) and globs are stripped; `self` inside a group names the prefix.
pub fn expand_use_tree(tree: &str) -> Vec<String> {
    let compact: String = tree.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = Vec::new();
    expand_into("", &compact, &mut out);
    out
}

fn expand_into(prefix: &str, tree: &str, out: &mut Vec<String>) {
    let tree = tree.trim().trim_start_matches("::");

    // Brace group: split top-level items and recurse
    if let Some(open) = tree.find('{')
        && tree.ends_with('}')
    {
        let head = tree[..open].trim().trim_end_matches("::");
        let next_prefix = join_path(prefix, head);
        for item in split_top_level(&tree[open + 1..tree.len() - 1]) {
            if item.trim() == "self" {
                out.push(next_prefix.clone());
            } else {
                expand_into(&next_prefix, item, out);
            }
        }
        return;
    }

    // Strip `as alias` and trailing glob
    let path = tree.split(" as ").next().unwrap_or(tree).trim();
    let path = path.trim_end_matches("::*").trim_end_matches('*').trim_end_matches("::");
    if !path.is_empty() {
        out.push(join_path(prefix, path));
    }
}

fn join_path(prefix: &str, tail: &str) -> String {
    match (prefix.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}::{tail}"),
    }
}

fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Directory holding the crate root (`src/` of the nearest crate)
fn crate_src_dir(source: &Path, root: &Path) -> PathBuf {
    let mut cur = source.parent();
    while let Some(dir) = cur {
        if !dir.starts_with(root) {
            break;
        }
        if dir.file_name().is_some_and(|n| n == "src") {
            return dir.to_path_buf();
        }
        if dir.join("Cargo.toml").is_file() {
            return dir.join("src");
        }
        cur = dir.parent();
    }
    root.join("src")
}

/// Directory that holds the children of the module defined by `source`
fn module_dir(source: &Path) -> Option<PathBuf> {
    let parent = source.parent()?;
    let stem = source.file_stem()?.to_string_lossy();
    if matches!(stem.as_ref(), "mod" | "lib" | "main") {
        Some(parent.to_path_buf())
    } else {
        Some(parent.join(stem.as_ref()))
    }
}

/// Longest prefix of `segments` naming `x.rs` or `x/mod.rs` under `base`
fn resolve_segments(base: &Path, segments: &[&str], project: &ProjectView<'_>) -> Option<PathBuf> {
    for take in (1..=segments.len()).rev() {
        let mut path = base.to_path_buf();
        for seg in &segments[..take] {
            path.push(seg);
        }
        if let Some(hit) = project.probe_with(&path, &[".rs"]) {
            return Some(hit);
        }
        if let Some(hit) = project.probe(&path.join("mod.rs")) {
            return Some(hit);
        }
    }
    None
}

impl LanguageProfile for RustProfile {
    fn id(&self) -> LanguageId {
        LanguageId::Rust
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn fence(&self) -> &'static str {
        "rust"
    }

    fn import_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn extract_imports(&self, content: &str) -> Vec<String> {
        let mut seen = IndexSet::new();
        for (i, re) in self.patterns.iter().enumerate() {
            for caps in re.captures_iter(content) {
                let Some(m) = caps.get(1) else { continue };
                match i {
                    // `mod x;` names a child of the current module
                    1 => {
                        seen.insert(format!("self::{}", m.as_str()));
                    }
                    0 => {
                        for path in expand_use_tree(m.as_str()) {
                            seen.insert(path);
                        }
                    }
                    _ => {
                        seen.insert(m.as_str().to_string());
                    }
                }
            }
        }
        seen.into_iter().collect()
    }

    fn is_external(&self, raw: &str) -> bool {
        let first = raw.split("::").next().unwrap_or(raw);
        EXTERNAL_ROOTS.contains(&first)
    }

    fn resolve(&self, raw: &str, source: &Path, project: &ProjectView<'_>) -> Option<PathBuf> {
        let segments: Vec<&str> = raw.split("::").filter(|s| !s.is_empty()).collect();
        let (&first, rest) = segments.split_first()?;

        match first {
            "crate" => resolve_segments(&crate_src_dir(source, project.root), rest, project),
            "self" => resolve_segments(&module_dir(source)?, rest, project),
            "super" => {
                // Each leading `super` climbs one module
                let mut dir = module_dir(source)?;
                let mut rest = rest;
                dir = dir.parent()?.to_path_buf();
                while let Some((&"super", tail)) = rest.split_first() {
                    dir = dir.parent()?.to_path_buf();
                    rest = tail;
                }
                if rest.is_empty() {
                    // `use super::*` style: the parent module file itself
                    let parent_file = dir.with_extension("rs");
                    return project
                        .probe(&parent_file)
                        .or_else(|| project.probe(&dir.join("mod.rs")));
                }
                resolve_segments(&dir, rest, project)
            }
            // Bare path: a module declared at the crate root, else an external crate
            _ => resolve_segments(&crate_src_dir(source, project.root), &segments, project),
        }
    }

    fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    fn builtins(&self) -> &'static [&'static str] {
        BUILTINS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::profile::FileSet;

    #[test]
    fn use_trees_expand_to_flat_paths() {
        assert_eq!(
            expand_use_tree("crate::models::{user::User, post::{Post, Draft as D}, self}"),
            vec![
                "crate::models::user::User",
                "crate::models::post::Post",
                "crate::models::post::Draft",
                "crate::models",
            ]
        );
        assert_eq!(expand_use_tree("super::*"), vec!["super"]);
    }

    #[test]
    fn extraction_covers_use_mod_and_extern_crate() -> Result<()> {
        let profile = RustProfile::new()?;
        let src = "use std::io;\npub(crate) use crate::db::Pool;\nmod handlers;\nmod inline { }\nextern crate serde;\nuse std::io;\n";
        assert_eq!(
            profile.extract_imports(src),
            vec!["std::io", "crate::db::Pool", "self::handlers", "serde"]
        );
        assert!(profile.is_external("std::io"));
        assert!(!profile.is_external("crate::db::Pool"));
        Ok(())
    }

    #[test]
    fn resolves_crate_self_and_super_paths() -> Result<()> {
        let profile = RustProfile::new()?;
        let root = Path::new("/p");
        let files = FileSet::new([
            PathBuf::from("/p/src/main.rs"),
            PathBuf::from("/p/src/db.rs"),
            PathBuf::from("/p/src/handlers/mod.rs"),
            PathBuf::from("/p/src/handlers/users.rs"),
        ]);
        let view = ProjectView::new(root, &files);
        let main = Path::new("/p/src/main.rs");
        let users = Path::new("/p/src/handlers/users.rs");

        assert_eq!(
            profile.resolve("crate::db::Pool", main, &view),
            Some(PathBuf::from("/p/src/db.rs"))
        );
        assert_eq!(
            profile.resolve("self::handlers", main, &view),
            Some(PathBuf::from("/p/src/handlers/mod.rs"))
        );
        assert_eq!(
            profile.resolve("super::super::db::Pool", users, &view),
            Some(PathBuf::from("/p/src/db.rs"))
        );
        assert_eq!(
            profile.resolve("super::super::super::db", users, &view),
            None,
            "climbing above the crate root finds nothing"
        );
        assert_eq!(
            profile.resolve("crate::handlers::users::list", main, &view),
            Some(PathBuf::from("/p/src/handlers/users.rs"))
        );
        assert_eq!(profile.resolve("serde::Serialize", main, &view), None);
        Ok(())
    }

    #[test]
    fn super_from_nested_module_reaches_sibling() -> Result<()> {
        let profile = RustProfile::new()?;
        let root = Path::new("/p");
        let files = FileSet::new([
            PathBuf::from("/p/src/lib.rs"),
            PathBuf::from("/p/src/api/mod.rs"),
            PathBuf::from("/p/src/api/auth.rs"),
            PathBuf::from("/p/src/api/routes.rs"),
        ]);
        let view = ProjectView::new(root, &files);
        assert_eq!(
            profile.resolve("super::auth::Token", Path::new("/p/src/api/routes.rs"), &view),
            Some(PathBuf::from("/p/src/api/auth.rs"))
        );
        Ok(())
    }
}
