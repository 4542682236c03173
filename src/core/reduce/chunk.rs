//! Tree-sitter side of the reducer: capture collection, containment
//! filtering, leading-sibling extension and body elision.

use std::cmp::Reverse;

use tree_sitter::{Node, Parser, QueryCursor, StreamingIterator, Tree};

use crate::infra::utils::TsNodeUtils;
use crate::lang::Grammar;

/// One top-level capture, rendered with its function bodies elided
#[derive(Debug, Clone)]
pub(super) struct Item {
    pub text: String,
}

fn parse(grammar: &Grammar, content: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&grammar.language).ok()?;
    parser.parse(content, None)
}

/// Captured nodes in source order, dropping any node inside an earlier one
fn outermost_captures<'t>(grammar: &Grammar, tree: &'t Tree, content: &str, types_only: bool) -> Vec<Node<'t>> {
    let query = if types_only { &grammar.types } else { &grammar.semantic };
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), content.as_bytes());

    let mut nodes: Vec<Node<'t>> = Vec::new();
    while let Some(m) = matches.next() {
        for cap in m.captures {
            nodes.push(cap.node);
        }
    }
    nodes.sort_by_key(|n| (n.start_byte(), Reverse(n.end_byte())));
    nodes.dedup_by_key(|n| (n.start_byte(), n.end_byte()));

    let mut kept: Vec<Node<'t>> = Vec::with_capacity(nodes.len());
    let mut last_end = 0;
    for node in nodes {
        if !kept.is_empty() && node.start_byte() < last_end {
            continue;
        }
        last_end = node.end_byte();
        kept.push(node);
    }
    kept
}

/// Start of `node` pulled back over attribute/decorator siblings and the
/// indentation in front of it
fn item_start(grammar: &Grammar, node: Node, content: &str) -> usize {
    let mut start = node.start_byte();
    let mut prev = node.prev_named_sibling();
    while let Some(p) = prev {
        if !grammar.leading_kinds.contains(&p.kind()) {
            break;
        }
        start = p.start_byte();
        prev = p.prev_named_sibling();
    }

    let line_start = content[..start].rfind('\n').map_or(0, |i| i + 1);
    if content[line_start..start].chars().all(|c| c == ' ' || c == '\t') {
        line_start
    } else {
        start
    }
}

/// Body replacement for one function-like node
fn elide_body(grammar: &Grammar, keeps_docstrings: bool, body: Node) -> Option<(usize, usize, String)> {
    if keeps_docstrings && let Some(doc) = TsNodeUtils::python_docstring(body) {
        if doc.end_byte() >= body.end_byte() {
            return None;
        }
        let indent = " ".repeat(doc.start_position().column);
        return Some((doc.end_byte(), body.end_byte(), format!("\n{indent}{}", grammar.elision)));
    }
    Some((body.start_byte(), body.end_byte(), grammar.elision.to_string()))
}

/// Outermost function bodies under `node`, sorted by position
fn elisions(grammar: &Grammar, keeps_docstrings: bool, node: Node) -> Vec<(usize, usize, String)> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if grammar.function_kinds.contains(&n.kind())
            && let Some(body) = n.child_by_field_name("body")
            && grammar.body_kinds.contains(&body.kind())
        {
            // Nested functions disappear with the body
            if let Some(e) = elide_body(grammar, keeps_docstrings, body) {
                out.push(e);
            }
            continue;
        }
        let mut cursor = n.walk();
        stack.extend(n.named_children(&mut cursor));
    }
    out.sort_by_key(|e| e.0);
    out
}

fn render(grammar: &Grammar, keeps_docstrings: bool, node: Node, content: &str) -> Item {
    let start = item_start(grammar, node, content);
    let end = node.end_byte();

    let mut text = String::with_capacity(end - start);
    let mut cursor = start;
    for (lo, hi, replacement) in elisions(grammar, keeps_docstrings, node) {
        if lo < cursor {
            continue;
        }
        text.push_str(&content[cursor..lo]);
        text.push_str(&replacement);
        cursor = hi;
    }
    text.push_str(&content[cursor..end]);
    Item { text }
}

/// Items of `content` for semantic or types-only reduction.
/// `None` when parsing fails; an empty list when nothing was captured.
pub(super) fn collect_items(
    grammar: &Grammar,
    keeps_docstrings: bool,
    content: &str,
    types_only: bool,
) -> Option<Vec<Item>> {
    let tree = parse(grammar, content)?;
    let items = outermost_captures(grammar, &tree, content, types_only)
        .into_iter()
        .map(|node| render(grammar, keeps_docstrings, node, content))
        .collect();
    Some(items)
}

/// Byte range of the smallest semantic capture covering `line` (0-based),
/// bodies intact
pub(super) fn enclosing_capture(grammar: &Grammar, content: &str, line: usize) -> Option<(usize, usize)> {
    let tree = parse(grammar, content)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&grammar.semantic, tree.root_node(), content.as_bytes());

    let mut best: Option<Node> = None;
    while let Some(m) = matches.next() {
        for cap in m.captures {
            let (first, last) = TsNodeUtils::row_span(cap.node);
            if line < first || line > last {
                continue;
            }
            let size = cap.node.end_byte() - cap.node.start_byte();
            if best.is_none_or(|b| size < b.end_byte() - b.start_byte()) {
                best = Some(cap.node);
            }
        }
    }
    best.map(|node| (item_start(grammar, node, content), node.end_byte()))
}
