//! In-process definition provider backed by a declaration index.
//!
//! Every grammar-backed source file is parsed once; each semantic capture
//! with a recoverable name becomes a declaration site. A request reads the
//! word under the cursor and answers with every site declaring that name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rayon::prelude::*;
use tracing::{debug, instrument};
use tree_sitter::{Parser, QueryCursor, StreamingIterator};

use crate::core::scan::ProjectScan;
use crate::infra::io::read_text;
use crate::infra::utils::TsNodeUtils;
use crate::intel::protocol::{
    DefinitionProvider, DefinitionRequest, DefinitionResponse, Location, Position, Range, byte_column, path_to_uri,
    utf16_column,
};
use crate::lang::LanguageRegistry;

/// Captures that wrap another item's name rather than declaring one
const NON_DECLARING: &[&str] = &["impl_item", "decorated_definition", "export_statement"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct Site {
    path: PathBuf,
    range: Range,
}

#[derive(Debug, Default)]
pub struct LocalSymbolProvider {
    sites: BTreeMap<String, Vec<Site>>,
}

fn declarations(registry: &LanguageRegistry, path: &Path) -> Vec<(String, Site)> {
    let Some(grammar) = registry.for_path(path).and_then(|p| p.grammar()) else {
        return Vec::new();
    };
    let Ok(content) = read_text(path) else {
        return Vec::new();
    };
    let mut parser = Parser::new();
    if parser.set_language(&grammar.language).is_err() {
        return Vec::new();
    }
    let Some(tree) = parser.parse(&content, None) else {
        return Vec::new();
    };

    let bytes = content.as_bytes();
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&grammar.semantic, tree.root_node(), bytes);
    let mut out = Vec::new();
    while let Some(m) = matches.next() {
        for cap in m.captures {
            if NON_DECLARING.contains(&cap.node.kind()) {
                continue;
            }
            let Some(name) = TsNodeUtils::declared_name(cap.node, bytes) else {
                continue;
            };
            let name_node = cap.node.child_by_field_name("name").unwrap_or(cap.node);
            let start = name_node.start_position();
            let end = name_node.end_position();
            out.push((
                name.to_string(),
                Site {
                    path: path.to_path_buf(),
                    range: Range {
                        start: Position {
                            line: start.row as u32,
                            character: utf16_column(&content, name_node.start_byte(), start.column),
                        },
                        end: Position {
                            line: end.row as u32,
                            character: utf16_column(&content, name_node.end_byte(), end.column),
                        },
                    },
                },
            ));
        }
    }
    out
}

/// Identifier-ish word covering the UTF-16 `column` on `line`
fn word_at(content: &str, line: u32, column: u32) -> Option<&str> {
    let text = content.lines().nth(line as usize)?;
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let at = byte_column(text, column)?;
    if !text[at..].chars().next().is_some_and(is_word) {
        return None;
    }
    let start = text[..at]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word(c))
        .last()
        .map_or(at, |(i, _)| i);
    let end = text[at..]
        .char_indices()
        .find(|&(_, c)| !is_word(c))
        .map_or(text.len(), |(i, _)| at + i);
    Some(&text[start..end])
}

impl LocalSymbolProvider {
    /// Index every source file of `scan` in parallel
    #[instrument(skip_all, fields(files = scan.files.len()))]
    pub fn build(scan: &ProjectScan, registry: &LanguageRegistry) -> Self {
        let found: Vec<Vec<(String, Site)>> = scan
            .source_files()
            .par_iter()
            .map(|path| declarations(registry, path))
            .collect();

        let mut sites: BTreeMap<String, Vec<Site>> = BTreeMap::new();
        for (name, site) in found.into_iter().flatten() {
            sites.entry(name).or_default().push(site);
        }
        let provider = Self { sites };
        debug!(names = provider.len(), "declaration index built");
        provider
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn lookup(&self, name: &str) -> DefinitionResponse {
        let Some(sites) = self.sites.get(name) else {
            return DefinitionResponse::Empty;
        };
        let mut locations: Vec<Location> = sites
            .iter()
            .map(|s| Location {
                uri: path_to_uri(&s.path),
                range: s.range,
            })
            .collect();
        match locations.len() {
            0 => DefinitionResponse::Empty,
            1 => DefinitionResponse::Single(locations.remove(0)),
            _ => DefinitionResponse::Many(locations),
        }
    }
}

#[async_trait]
impl DefinitionProvider for LocalSymbolProvider {
    async fn definition(&self, request: DefinitionRequest) -> Result<DefinitionResponse> {
        let content = read_text(&request.file)
            .with_context(|| format!("Failed to read {}", request.file.display()))?;
        Ok(match word_at(&content, request.line, request.column) {
            Some(name) => self.lookup(name),
            None => DefinitionResponse::Empty,
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scan::ProjectScanner;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn word_at_finds_whole_identifier() {
        let src = "let a = make_user(Pool::new());\n";
        assert_eq!(word_at(src, 0, 10), Some("make_user"));
        assert_eq!(word_at(src, 0, 18), Some("Pool"));
        assert_eq!(word_at(src, 0, 3), None);
        assert_eq!(word_at(src, 4, 0), None);
        assert_eq!(word_at(src, 0, 200), None);
    }

    #[test]
    fn word_at_counts_utf16_units() {
        let src = "let s = \"日本語\"; let p = connect();\n";
        // 23 UTF-16 units precede `connect`, 29 bytes do
        assert_eq!(word_at(src, 0, 23), Some("connect"));
        assert_eq!(word_at(src, 0, 26), Some("connect"));
        assert_eq!(word_at(src, 0, 29), None);
        assert_eq!(word_at(src, 0, 9), Some("日本語"));
    }

    #[tokio::test]
    async fn answers_from_declarations() -> Result<()> {
        let tmp = TempDir::new()?;
        let root = dunce::canonicalize(tmp.path())?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/db.rs"), "pub struct Pool;\n\npub fn connect() -> Pool { Pool }\n")?;
        fs::write(root.join("src/main.rs"), "mod db;\nfn main() { let p = db::connect(); }\n")?;

        let registry = Arc::new(LanguageRegistry::new()?);
        let scan = ProjectScanner::new(&[], Arc::clone(&registry))?.scan(&root);
        let provider = LocalSymbolProvider::build(&scan, &registry);

        let resp = provider
            .definition(DefinitionRequest {
                file: root.join("src/main.rs"),
                line: 1,
                column: 25,
            })
            .await?;
        let targets = resp.into_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].path, root.join("src/db.rs"));
        assert_eq!(targets[0].range.start.line, 2);

        assert_eq!(provider.lookup("Missing"), DefinitionResponse::Empty);
        assert!(matches!(provider.lookup("Pool"), DefinitionResponse::Single(_)));
        Ok(())
    }

    #[tokio::test]
    async fn identifiers_after_multibyte_text_still_resolve() -> Result<()> {
        let tmp = TempDir::new()?;
        let root = dunce::canonicalize(tmp.path())?;
        fs::create_dir_all(root.join("src"))?;
        fs::write(root.join("src/db.rs"), "pub struct Pool;\n\npub fn connect() -> Pool { Pool }\n")?;
        let anchor = root.join("src/main.rs");
        fs::write(
            &anchor,
            "mod db;\nfn main() { let s = \"日本語日本語\"; let p = connect(); let q = db::Pool::new(); }\n",
        )?;

        let registry = Arc::new(LanguageRegistry::new()?);
        let scan = ProjectScanner::new(&[], Arc::clone(&registry))?.scan(&root);
        let provider = LocalSymbolProvider::build(&scan, &registry);
        let profile = registry.for_path(&anchor).expect("rust profile");
        let ids = crate::intel::extract_identifiers(profile.as_ref(), &read_text(&anchor)?, 40);

        for name in ["connect", "Pool"] {
            let id = ids.iter().find(|i| i.name == name).expect("identifier extracted");
            let targets = provider
                .definition(DefinitionRequest {
                    file: anchor.clone(),
                    line: id.line,
                    column: id.column,
                })
                .await?
                .into_targets();
            assert_eq!(targets.len(), 1, "{name}");
            assert_eq!(targets[0].path, root.join("src/db.rs"));
        }
        Ok(())
    }
}
