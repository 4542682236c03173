use std::path::PathBuf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// The anchor imports the target
    Outgoing,
    /// The target imports the anchor
    Incoming,
    /// Reached through a depth-1 file
    Transitive,
}

impl Relationship {
    pub fn label(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Transitive => "transitive",
        }
    }
}

/// One resolved import relation. `source` imports `target`, except for
/// incoming edges where `source` is the anchor's importer seen from the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEdge {
    pub source: PathBuf,
    pub target: PathBuf,
    pub relationship: Relationship,
    pub depth: u8,
    pub via: Option<PathBuf>,
}

impl ImportEdge {
    /// The file this edge brings into view (the non-anchor end)
    pub fn related(&self) -> &PathBuf {
        match self.relationship {
            Relationship::Incoming => &self.source,
            _ => &self.target,
        }
    }
}

/// Depth-bounded neighbourhood of an anchor file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportGraph {
    pub anchor: PathBuf,
    pub outgoing: Vec<ImportEdge>,
    pub incoming: Vec<ImportEdge>,
    pub transitive: Vec<ImportEdge>,
}

impl ImportGraph {
    pub fn empty(anchor: PathBuf) -> Self {
        Self {
            anchor,
            ..Self::default()
        }
    }

    /// Every edge: outgoing, then incoming, then transitive
    pub fn all(&self) -> impl Iterator<Item = &ImportEdge> {
        self.outgoing
            .iter()
            .chain(self.incoming.iter())
            .chain(self.transitive.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.incoming.is_empty() && self.transitive.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outgoing.len() + self.incoming.len() + self.transitive.len()
    }
}
