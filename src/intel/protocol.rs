//! Filepath: src/intel/protocol.rs
//! Definition lookups as a code-intelligence service answers them.
//!
//! Responses arrive as one location, a list of locations, a list of
//! location links, or nothing. All of them normalize to
//! [`DefinitionTarget`] `{path, range}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Zero-based line/character position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn point(line: u32, character: u32) -> Self {
        let p = Position { line, character };
        Self { start: p, end: p }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_selection_range: Option<Range>,
    pub target_uri: String,
    pub target_range: Range,
    pub target_selection_range: Range,
}

/// Any of the shapes a definition request may return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefinitionResponse {
    Empty,
    Single(Location),
    Links(Vec<LocationLink>),
    Many(Vec<Location>),
}

/// A normalized definition location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionTarget {
    pub path: PathBuf,
    pub range: Range,
}

/// `file://` URIs become paths; bare absolute paths pass through
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => {
            let p = Path::new(uri);
            p.is_absolute().then(|| p.to_path_buf())
        }
    }
}

pub fn path_to_uri(path: &Path) -> String {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

impl DefinitionResponse {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Flatten into targets, dropping URIs that are not local files
    pub fn into_targets(self) -> Vec<DefinitionTarget> {
        let pairs: Vec<(String, Range)> = match self {
            Self::Empty => Vec::new(),
            Self::Single(loc) => vec![(loc.uri, loc.range)],
            Self::Many(locs) => locs.into_iter().map(|l| (l.uri, l.range)).collect(),
            // The selection range points at the name, not the whole item
            Self::Links(links) => links
                .into_iter()
                .map(|l| (l.target_uri, l.target_selection_range))
                .collect(),
        };
        pairs
            .into_iter()
            .filter_map(|(uri, range)| uri_to_path(&uri).map(|path| DefinitionTarget { path, range }))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Single(_) => false,
            Self::Many(v) => v.is_empty(),
            Self::Links(v) => v.is_empty(),
        }
    }
}

/// Where the identifier under question sits (zero-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionRequest {
    pub file: PathBuf,
    pub line: u32,
    /// UTF-16 code units from the start of the line
    pub column: u32,
}

/// UTF-16 column of the byte offset `byte`, which sits `byte_column` bytes
/// into its line. Parsers report byte columns; the wire counts UTF-16 units.
pub fn utf16_column(content: &str, byte: usize, byte_column: usize) -> u32 {
    byte.checked_sub(byte_column)
        .and_then(|line_start| content.get(line_start..byte))
        .map_or(0, |prefix| prefix.encode_utf16().count() as u32)
}

/// Byte offset into `line` of a UTF-16 column, if it lands on a char boundary
pub fn byte_column(line: &str, utf16: u32) -> Option<usize> {
    let mut units = 0u32;
    for (i, c) in line.char_indices() {
        if units == utf16 {
            return Some(i);
        }
        if units > utf16 {
            return None;
        }
        units += c.len_utf16() as u32;
    }
    (units == utf16).then_some(line.len())
}

/// A code-intelligence service able to answer "go to definition"
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    async fn definition(&self, request: DefinitionRequest) -> anyhow::Result<DefinitionResponse>;

    fn name(&self) -> &str {
        "provider"
    }
}
