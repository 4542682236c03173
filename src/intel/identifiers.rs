//! Identifier extraction from the anchor file.
//!
//! With a grammar, identifier-kind leaves are collected in source order.
//! Without one, capitalized words stand in for type references.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use tree_sitter::{Node, Parser};

use crate::infra::line_index::LineIndex;
use crate::intel::protocol::utf16_column;
use crate::lang::LanguageProfile;

/// First occurrence of a referenced name (zero-based position)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierRef {
    pub name: String,
    pub line: u32,
    /// UTF-16 code units, as definition requests carry it
    pub column: u32,
    pub type_like: bool,
}

fn is_type_like(kind: &str, name: &str) -> bool {
    kind == "type_identifier" || name.chars().next().is_some_and(char::is_uppercase)
}

/// Parent kinds whose `name` field declares something. Paths such as
/// `scoped_identifier` also use `name`, for a reference.
const DECLARING_SUFFIXES: &[&str] =
    &["_item", "_definition", "_declaration", "_declarator", "_spec", "_signature", "_variant"];

fn declares(kind: &str) -> bool {
    DECLARING_SUFFIXES.iter().any(|s| kind.ends_with(s))
}

/// The node names the item it sits in (`fn name`, `class Name`)
fn is_declaration_site(node: Node) -> bool {
    node.parent()
        .filter(|p| declares(p.kind()))
        .and_then(|p| p.child_by_field_name("name"))
        .is_some_and(|n| n.id() == node.id())
}

fn keep(name: &str, builtins: &[&str]) -> bool {
    name.chars().count() >= 2 && !builtins.contains(&name)
}

/// Distinct identifiers worth a definition lookup: type-like names first,
/// then the rest, each group in source order, capped at `max`.
pub fn extract_identifiers(profile: &dyn LanguageProfile, content: &str, max: usize) -> Vec<IdentifierRef> {
    let found = match profile.grammar() {
        Some(grammar) => from_tree(grammar, profile.builtins(), content),
        None => from_text(profile.builtins(), content),
    };

    let (mut types, rest): (Vec<_>, Vec<_>) = found.into_values().partition(|r| r.type_like);
    types.extend(rest);
    types.truncate(max);
    types
}

fn from_tree(grammar: &crate::lang::Grammar, builtins: &[&str], content: &str) -> IndexMap<String, IdentifierRef> {
    let mut out = IndexMap::new();
    let mut parser = Parser::new();
    if parser.set_language(&grammar.language).is_err() {
        return out;
    }
    let Some(tree) = parser.parse(content, None) else {
        return out;
    };
    let bytes = content.as_bytes();

    let mut cursor = tree.walk();
    'walk: loop {
        let node = cursor.node();
        if grammar.identifier_kinds.contains(&node.kind())
            && !is_declaration_site(node)
            && let Ok(name) = node.utf8_text(bytes)
            && keep(name, builtins)
            && !out.contains_key(name)
        {
            let pos = node.start_position();
            out.insert(
                name.to_string(),
                IdentifierRef {
                    name: name.to_string(),
                    line: pos.row as u32,
                    column: utf16_column(content, node.start_byte(), pos.column),
                    type_like: is_type_like(node.kind(), name),
                },
            );
        }

        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'walk;
            }
        }
    }
    out
}

fn from_text(builtins: &[&str], content: &str) -> IndexMap<String, IdentifierRef> {
    let mut out = IndexMap::new();
    let Ok(word) = Regex::new(r"\b[A-Z][A-Za-z0-9_]+\b") else {
        return out;
    };
    let index = LineIndex::build(content.as_bytes());
    for m in word.find_iter(content) {
        let name = m.as_str();
        if !keep(name, builtins) || out.contains_key(name) {
            continue;
        }
        let line = index.line_of_byte(m.start());
        let line_start = index.byte_range(line, line + 1).map_or(0, |(lo, _)| lo);
        out.insert(
            name.to_string(),
            IdentifierRef {
                name: name.to_string(),
                line: line as u32,
                column: utf16_column(content, m.start(), m.start() - line_start),
                type_like: true,
            },
        );
    }
    out
}
