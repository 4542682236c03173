//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::path::{Component, Path, PathBuf};

// Tree-sitter types for node helpers
use tree_sitter::Node;

/// Path helpers shared by resolution, the resolver and rendering
pub struct PathUtils;

impl PathUtils
{
    /// Lexically normalize a path: drop `.` and fold `..` without touching
    /// the filesystem. A `..` that would climb past the root is kept.
    pub fn normalize(path: &Path) -> PathBuf
    {
        let mut out: Vec<Component> = Vec::new();

        for comp in path.components()
        {
            match comp
            {
                Component::CurDir =>
                {}
                Component::ParentDir =>
                {
                    // Fold against a normal segment, otherwise keep
                    match out.last()
                    {
                        Some(Component::Normal(_)) =>
                        {
                            out.pop();
                        }
                        Some(Component::RootDir) | Some(Component::Prefix(_)) =>
                        {}
                        _ => out.push(comp),
                    }
                }
                other => out.push(other),
            }
        }

        out.iter()
            .collect()
    }

    /// True when `path` lies under `root` (both normalized lexically)
    pub fn is_under(
        path: &Path,
        root: &Path,
    ) -> bool
    {
        Self::normalize(path).starts_with(Self::normalize(root))
    }

    /// Forward-slash display of `path` relative to `root` (falls back to full)
    pub fn display_rel(
        path: &Path,
        root: &Path,
    ) -> String
    {
        let rel = path
            .strip_prefix(root)
            .unwrap_or(path);
        Self::to_slash(rel)
    }

    /// Render a path with `/` separators on every platform
    pub fn to_slash(path: &Path) -> String
    {
        path.components()
            .filter_map(|c| match c
            {
                Component::Normal(s) => Some(s.to_string_lossy()),
                Component::ParentDir => Some("..".into()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Canonicalize when possible, else normalize lexically
    pub fn canonical_or_normalized(path: &Path) -> PathBuf
    {
        dunce::canonicalize(path).unwrap_or_else(|_| Self::normalize(path))
    }
}

/// Identifier-case helpers
pub struct NameUtils;

impl NameUtils
{
    /// `MyApp.HTTPClient` segment → `my_app` / `http_client`
    pub fn snake_case(name: &str) -> String
    {
        // Pre-allocate with a simple heuristic
        let mut out = String::with_capacity(name.len() + 4);
        let chars: Vec<char> = name
            .chars()
            .collect();

        for (i, &c) in chars
            .iter()
            .enumerate()
        {
            if c.is_uppercase()
            {
                // Boundary: lower→Upper, or the last capital of an acronym
                let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
                let acronym_end = i > 0
                    && chars[i - 1].is_uppercase()
                    && chars
                        .get(i + 1)
                        .is_some_and(|n| n.is_lowercase());
                if prev_lower || acronym_end
                {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            }
            else
            {
                out.push(c);
            }
        }

        out
    }
}

/// Common Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// 0-based inclusive row span of a node
    pub fn row_span(node: Node) -> (usize, usize)
    {
        (node.start_position().row, node.end_position().row)
    }

    /// Best-effort declared name of a declaration node.
    ///
    /// Follows the usual field chain (`name`, then the wrapped `declaration`,
    /// `definition` or `declarator`) and finally looks one level down for a
    /// spec/declarator child (Go `type_spec`, JS `variable_declarator`).
    pub fn declared_name<'a>(
        node: Node,
        bytes: &'a [u8],
    ) -> Option<&'a str>
    {
        Self::declared_name_at(node, bytes, 0)
    }

    fn declared_name_at<'a>(
        node: Node,
        bytes: &'a [u8],
        depth: usize,
    ) -> Option<&'a str>
    {
        // Declarations nest shallowly; anything deeper is a body
        if depth > 4
        {
            return None;
        }

        // Direct name field wins, unless it is itself a declarator chain
        if let Some(name) = node.child_by_field_name("name")
        {
            if name.named_child_count() == 0
            {
                return name
                    .utf8_text(bytes)
                    .ok();
            }
            return Self::declared_name_at(name, bytes, depth + 1);
        }

        // Bare identifiers terminate declarator chains (C/C++)
        if matches!(
            node.kind(),
            "identifier" | "type_identifier" | "field_identifier" | "qualified_identifier"
        )
        {
            return node
                .utf8_text(bytes)
                .ok();
        }

        for field in ["declaration", "definition", "declarator", "type"]
        {
            if let Some(child) = node.child_by_field_name(field)
                && let Some(name) = Self::declared_name_at(child, bytes, depth + 1)
            {
                return Some(name);
            }
        }

        // One level down into spec-like children
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor)
        {
            if matches!(
                child.kind(),
                "type_spec" | "const_spec" | "variable_declarator" | "type_alias"
            ) && let Some(name) = Self::declared_name_at(child, bytes, depth + 1)
            {
                return Some(name);
            }
        }

        None
    }

    /// Python docstring of a function/class body block, if the first
    /// statement is a bare string literal.
    pub fn python_docstring<'a>(body: Node<'a>) -> Option<Node<'a>>
    {
        // First named statement in the block
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement"
        {
            return None;
        }

        // The statement must be exactly one string literal
        let expr = first.named_child(0)?;
        (expr.kind() == "string" && first.named_child_count() == 1).then_some(first)
    }
}
