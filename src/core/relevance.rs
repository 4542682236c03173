//! Filepath: src/core/relevance.rs
//! Candidate ranking for related files.
//!
//! Depth first, then relationship weight plus a small directory-proximity
//! bonus. The sort is stable so equal scores keep extraction order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::core::graph::{ImportGraph, Relationship};
use crate::infra::config::RelevanceConfig;
use crate::infra::utils::PathUtils;

const PROXIMITY_WEIGHT: f64 = 0.1;
const SAME_DIR: f64 = 0.7;
const SHARED_PREFIX: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub relationship: Relationship,
    pub depth: u8,
    pub via: Option<PathBuf>,
    pub relevance_score: f64,
}

/// One candidate per related file, in graph order, unscored
pub fn candidates_from_graph(graph: &ImportGraph) -> Vec<CandidateFile> {
    graph
        .all()
        .map(|edge| CandidateFile {
            path: edge.related().clone(),
            relationship: edge.relationship,
            depth: edge.depth,
            via: edge.via.clone(),
            relevance_score: 0.0,
        })
        .collect()
}

fn relationship_weight(rel: Relationship) -> f64 {
    match rel {
        Relationship::Outgoing => 1.0,
        Relationship::Incoming => 0.8,
        Relationship::Transitive => 0.5,
    }
}

/// 0.7 for the anchor's own directory, otherwise the shared-prefix ratio scaled
fn proximity(anchor: &Path, candidate: &Path) -> f64 {
    let (Some(a), Some(c)) = (anchor.parent(), candidate.parent()) else {
        return 0.0;
    };
    if a == c {
        return SAME_DIR;
    }
    let a: Vec<_> = a.components().collect();
    let c: Vec<_> = c.components().collect();
    let shared = a.iter().zip(&c).take_while(|(x, y)| x == y).count();
    let longest = a.len().max(c.len());
    if longest == 0 {
        return 0.0;
    }
    SHARED_PREFIX * shared as f64 / longest as f64
}

pub fn relevance_score(candidate: &CandidateFile, anchor: &Path) -> f64 {
    relationship_weight(candidate.relationship) + PROXIMITY_WEIGHT * proximity(anchor, &candidate.path)
}

/// Score, filter and order candidates. Pure; equal keys keep input order.
pub fn score_and_sort<F>(candidates: Vec<CandidateFile>, anchor: &Path, filter: F) -> Vec<CandidateFile>
where
    F: Fn(&CandidateFile) -> bool,
{
    let mut out: Vec<CandidateFile> = candidates
        .into_iter()
        .filter(|c| filter(c))
        .map(|mut c| {
            c.relevance_score = relevance_score(&c, anchor);
            c
        })
        .collect();

    out.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| b.relevance_score.total_cmp(&a.relevance_score))
    });
    out
}

/// Does a file mostly define types? Used to filter candidates at
/// types-only levels.
#[derive(Debug, Clone)]
pub struct TypeLikeness {
    markers: Vec<String>,
    ratio: f64,
    type_defs: Regex,
    fn_defs: Regex,
}

impl TypeLikeness {
    pub fn new(cfg: &RelevanceConfig) -> Result<Self> {
        let type_defs = Regex::new(
            r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:abstract\s+)?(?:interface|type|struct|enum|class|trait|union|typedef|protocol|record)\s+\w",
        )
        .context("Invalid type-definition pattern")?;
        let fn_defs = Regex::new(
            r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|function|func)\s+\w",
        )
        .context("Invalid function-definition pattern")?;
        Ok(Self {
            markers: cfg.type_name_markers.iter().map(|m| m.to_lowercase()).collect(),
            ratio: cfg.type_ratio,
            type_defs,
            fn_defs,
        })
    }

    /// Path has a marker as a component stem, or ends with a dotted marker
    pub fn name_matches(&self, path: &Path) -> bool {
        let slash = PathUtils::to_slash(path).to_lowercase();
        self.markers.iter().any(|marker| {
            if marker.starts_with('.') {
                return slash.ends_with(marker.as_str());
            }
            slash.split('/').any(|component| {
                let stem = component.split('.').next().unwrap_or(component);
                stem == marker
            })
        })
    }

    /// At least one type definition, and no fewer than `ratio` per function
    pub fn content_matches(&self, content: &str) -> bool {
        let types = self.type_defs.find_iter(content).count();
        let fns = self.fn_defs.find_iter(content).count();
        types > 0 && types as f64 >= self.ratio * fns as f64
    }

    pub fn matches(&self, path: &Path, content: &str) -> bool {
        self.name_matches(path) || self.content_matches(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(path: &str, relationship: Relationship, depth: u8) -> CandidateFile {
        CandidateFile {
            path: PathBuf::from(path),
            relationship,
            depth,
            via: None,
            relevance_score: 0.0,
        }
    }

    #[test]
    fn depth_then_relationship_then_proximity() {
        let anchor = Path::new("/p/src/api/handler.ts");
        let sorted = score_and_sort(
            vec![
                cand("/p/src/db/deep.ts", Relationship::Transitive, 2),
                cand("/p/lib/caller.ts", Relationship::Incoming, 1),
                cand("/p/lib/util.ts", Relationship::Outgoing, 1),
                cand("/p/src/api/sibling.ts", Relationship::Outgoing, 1),
            ],
            anchor,
            |_| true,
        );
        let order: Vec<_> = sorted.iter().map(|c| c.path.to_string_lossy().into_owned()).collect();
        assert_eq!(
            order,
            vec!["/p/src/api/sibling.ts", "/p/lib/util.ts", "/p/lib/caller.ts", "/p/src/db/deep.ts"]
        );
        assert!(sorted[0].relevance_score > sorted[1].relevance_score);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let anchor = Path::new("/p/a.py");
        let sorted = score_and_sort(
            vec![
                cand("/p/z.py", Relationship::Outgoing, 1),
                cand("/p/b.py", Relationship::Outgoing, 1),
            ],
            anchor,
            |_| true,
        );
        assert_eq!(sorted[0].path, PathBuf::from("/p/z.py"));
        assert_eq!(sorted[1].path, PathBuf::from("/p/b.py"));
    }

    #[test]
    fn filter_drops_candidates() {
        let sorted = score_and_sort(
            vec![
                cand("/p/types.ts", Relationship::Outgoing, 1),
                cand("/p/service.ts", Relationship::Outgoing, 1),
            ],
            Path::new("/p/main.ts"),
            |c| c.path.ends_with("types.ts"),
        );
        assert_eq!(sorted.len(), 1);
    }

    #[test]
    fn type_likeness_by_name_and_content() -> Result<()> {
        let t = TypeLikeness::new(&RelevanceConfig::default())?;
        assert!(t.name_matches(Path::new("/p/src/types.ts")));
        assert!(t.name_matches(Path::new("/p/app/models/user.py")));
        assert!(t.name_matches(Path::new("/p/web/api.d.ts")));
        assert!(!t.name_matches(Path::new("/p/src/prototypes.ts")));

        assert!(t.content_matches("export interface User { id: string }\nexport type Id = string;\n"));
        assert!(t.content_matches("pub struct A;\npub enum B { X }\nfn helper() {}\n"));
        assert!(!t.content_matches("def run():\n    pass\n\ndef stop():\n    pass\n"));
        assert!(!t.content_matches(""));
        Ok(())
    }
}
