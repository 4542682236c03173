//! Filepath: src/core/graph/mod.rs
//! Import graph: raw extraction through the language profiles, resolution to
//! absolute in-project paths, the reverse index, and depth-bounded expansion
//! around an anchor file. Also the `graph` command.

mod index;
mod types;

pub use index::ReverseImportIndex;
pub use types::{ImportEdge, ImportGraph, Relationship};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indexmap::IndexSet;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use rayon::prelude::*;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{debug, instrument, trace};

use crate::cli::{AppContext, GraphArgs, GraphFormat};
use crate::core::scan::ProjectScanner;
use crate::infra::cache::{CacheKey, CacheKind, CacheTag, ImportList, ProjectCache};
use crate::infra::config::load_config_from;
use crate::infra::io::read_text;
use crate::infra::utils::PathUtils;
use crate::lang::{FileSet, LanguageId, LanguageRegistry, ProjectView};

/// Resolve one raw import by probing the filesystem (no project snapshot).
pub fn resolve_import(
    registry: &LanguageRegistry,
    raw: &str,
    source: &Path,
    root: &Path,
    language: LanguageId,
) -> Option<PathBuf> {
    let files = FileSet::default();
    let view = ProjectView::new(root, &files);
    ImportGraphBuilder::resolve_with(registry, raw, source, &view, language)
}

pub struct ImportGraphBuilder {
    registry: Arc<LanguageRegistry>,
    cache: Arc<ProjectCache>,
}

impl ImportGraphBuilder {
    pub fn new(registry: Arc<LanguageRegistry>, cache: Arc<ProjectCache>) -> Self {
        Self { registry, cache }
    }

    /// Raw import strings of `content`, in first-occurrence order
    pub fn extract_imports(&self, content: &str, language: LanguageId) -> Vec<String> {
        self.registry
            .get(language)
            .map(|p| p.extract_imports(content))
            .unwrap_or_default()
    }

    pub fn resolve_import(
        &self,
        raw: &str,
        source: &Path,
        project: &ProjectView<'_>,
        language: LanguageId,
    ) -> Option<PathBuf> {
        Self::resolve_with(&self.registry, raw, source, project, language)
    }

    fn resolve_with(
        registry: &LanguageRegistry,
        raw: &str,
        source: &Path,
        project: &ProjectView<'_>,
        language: LanguageId,
    ) -> Option<PathBuf> {
        let profile = registry.get(language)?;

        // Denylist short-circuits before any probing
        if profile.is_external(raw) {
            return None;
        }

        let hit = profile.resolve(raw, source, project)?;
        let hit = PathUtils::normalize(&hit);
        if !hit.starts_with(project.root) || hit == source {
            return None;
        }
        Some(hit)
    }

    /// Raw imports of one file, cached per path
    fn raw_imports(&self, file: &Path, language: LanguageId) -> Arc<ImportList> {
        self.cache.get_or_compute(
            CacheKey::new(CacheKind::Imports, file),
            None,
            &[CacheTag::File(file.to_path_buf()), CacheTag::Project],
            || match read_text(file) {
                Ok(content) => ImportList(self.extract_imports(&content, language)),
                Err(err) => {
                    trace!(path = %file.display(), error = %err, "unreadable file skipped");
                    ImportList::default()
                }
            },
        )
    }

    /// Distinct resolved targets of `file` (never `file` itself)
    pub fn forward_targets(&self, file: &Path, project: &ProjectView<'_>) -> Vec<PathBuf> {
        let Some(language) = self.registry.language_of(file) else {
            return Vec::new();
        };
        let raws = self.raw_imports(file, language);
        let mut targets = IndexSet::new();
        for raw in &raws.0 {
            if let Some(t) = self.resolve_import(raw, file, project, language) {
                targets.insert(t);
            }
        }
        targets.into_iter().collect()
    }

    pub fn build_forward_edges(&self, file: &Path, project: &ProjectView<'_>) -> Vec<ImportEdge> {
        self.forward_targets(file, project)
            .into_iter()
            .map(|target| ImportEdge {
                source: file.to_path_buf(),
                target,
                relationship: Relationship::Outgoing,
                depth: 1,
                via: None,
            })
            .collect()
    }

    /// Forward-extract every file in parallel and invert
    #[instrument(skip_all, fields(files = files.len()))]
    pub fn build_reverse_index(&self, files: &[PathBuf], project: &ProjectView<'_>) -> ReverseImportIndex {
        let forward: Vec<(PathBuf, Vec<PathBuf>)> = files
            .par_iter()
            .map(|f| (f.clone(), self.forward_targets(f, project)))
            .collect();
        let index = ReverseImportIndex::from_forward(forward);
        debug!(sources = index.sources(), edges = index.edge_count(), "reverse index built");
        index
    }

    /// Neighbourhood of `file` up to `depth` (0, 1 or 2)
    #[instrument(skip(self, index, project), fields(file = %file.display()))]
    pub fn import_graph(
        &self,
        file: &Path,
        depth: u8,
        index: &ReverseImportIndex,
        project: &ProjectView<'_>,
    ) -> ImportGraph {
        let mut graph = ImportGraph::empty(file.to_path_buf());
        if depth == 0 {
            return graph;
        }

        let mut seen: HashSet<PathBuf> = HashSet::from([file.to_path_buf()]);

        // Anchor's own imports are always extracted fresh
        for target in self.forward_targets(file, project) {
            if seen.insert(target.clone()) {
                graph.outgoing.push(ImportEdge {
                    source: file.to_path_buf(),
                    target,
                    relationship: Relationship::Outgoing,
                    depth: 1,
                    via: None,
                });
            }
        }

        for importer in index.importers_of(file) {
            if seen.insert(importer.clone()) {
                graph.incoming.push(ImportEdge {
                    source: importer.clone(),
                    target: file.to_path_buf(),
                    relationship: Relationship::Incoming,
                    depth: 1,
                    via: None,
                });
            }
        }

        if depth >= 2 {
            // Each depth-1 file is expanded exactly once
            let first_ring: Vec<PathBuf> = graph
                .outgoing
                .iter()
                .chain(graph.incoming.iter())
                .map(|e| e.related().clone())
                .collect();

            for near in first_ring {
                let targets = match index.imports_of(&near) {
                    Some(t) => t.to_vec(),
                    None => self.forward_targets(&near, project),
                };
                for target in targets {
                    if seen.insert(target.clone()) {
                        graph.transitive.push(ImportEdge {
                            source: near.clone(),
                            target,
                            relationship: Relationship::Transitive,
                            depth: 2,
                            via: Some(near.clone()),
                        });
                    }
                }
            }
        }

        debug!(
            outgoing = graph.outgoing.len(),
            incoming = graph.incoming.len(),
            transitive = graph.transitive.len(),
            "import graph expanded"
        );
        graph
    }
}

// ------------------------------------------------------------- graph command

#[derive(Tabled, Serialize)]
struct EdgeRow {
    relationship: &'static str,
    depth: u8,
    file: String,
    via: String,
}

pub fn run(args: GraphArgs, ctx: &AppContext) -> Result<()> {
    let root = dunce::canonicalize(&args.root)
        .with_context(|| format!("Project root not found: {}", args.root.display()))?;
    let file = dunce::canonicalize(&args.file)
        .with_context(|| format!("File not found: {}", args.file.display()))?;
    let config = load_config_from(&root).unwrap_or_default();

    let registry = Arc::new(LanguageRegistry::new()?);
    let scanner = ProjectScanner::new(&config.ignore_patterns, Arc::clone(&registry))?.with_options(&config.scan);
    let builder = ImportGraphBuilder::new(Arc::clone(&registry), Arc::new(ProjectCache::disabled()));

    let pb = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    };

    pb.set_message("scanning project");
    let scan = scanner.scan(&root);
    pb.set_message("indexing imports");
    let view = ProjectView::new(&root, scan.file_set());
    let index = builder.build_reverse_index(&scan.source_files(), &view);
    let graph = builder.import_graph(&file, args.depth, &index, &view);
    pb.finish_and_clear();

    let rows: Vec<EdgeRow> = graph
        .all()
        .map(|e| EdgeRow {
            relationship: e.relationship.label(),
            depth: e.depth,
            file: PathUtils::display_rel(e.related(), &root),
            via: e
                .via
                .as_ref()
                .map(|v| PathUtils::display_rel(v, &root))
                .unwrap_or_default(),
        })
        .collect();

    match args.format {
        GraphFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        GraphFormat::Dot => {
            println!("{}", to_dot(&graph, &root));
        }
        GraphFormat::Table => {
            if rows.is_empty() {
                if !ctx.quiet {
                    println!("No in-project imports found for {}", PathUtils::display_rel(&file, &root));
                }
            } else {
                println!("{}", Table::new(&rows).with(Style::rounded()));
                if !ctx.quiet {
                    let summary = format!(
                        "{} outgoing, {} incoming, {} transitive",
                        graph.outgoing.len(),
                        graph.incoming.len(),
                        graph.transitive.len()
                    );
                    if ctx.no_color {
                        eprintln!("{summary}");
                    } else {
                        eprintln!("{}", summary.dimmed());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Graphviz DOT with root-relative node labels
fn to_dot(graph: &ImportGraph, root: &Path) -> String {
    let mut g: DiGraph<String, &'static str> = DiGraph::new();
    let mut nodes = std::collections::HashMap::new();
    let mut node_for = |g: &mut DiGraph<String, &'static str>, p: &Path| {
        *nodes
            .entry(p.to_path_buf())
            .or_insert_with(|| g.add_node(PathUtils::display_rel(p, root)))
    };

    for edge in graph.all() {
        let a = node_for(&mut g, &edge.source);
        let b = node_for(&mut g, &edge.target);
        g.add_edge(a, b, edge.relationship.label());
    }

    format!("{}", Dot::new(&g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
    }

    fn fixture(files: &[(&str, &str)]) -> Result<Fixture> {
        let tmp = TempDir::new()?;
        let root = dunce::canonicalize(tmp.path())?;
        for (rel, body) in files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, body)?;
        }
        Ok(Fixture { _tmp: tmp, root })
    }

    fn builder() -> Result<ImportGraphBuilder> {
        Ok(ImportGraphBuilder::new(
            Arc::new(LanguageRegistry::new()?),
            Arc::new(ProjectCache::disabled()),
        ))
    }

    #[test]
    fn depth_one_collects_outgoing_and_incoming() -> Result<()> {
        let fx = fixture(&[
            ("app/main.py", "from app import models\nimport os\n"),
            ("app/__init__.py", ""),
            ("app/models.py", "class User: pass\n"),
            ("app/views.py", "from app.main import run\n"),
        ])?;
        let b = builder()?;
        let files: Vec<PathBuf> =
            ["app/main.py", "app/__init__.py", "app/models.py", "app/views.py"].iter().map(|r| fx.root.join(r)).collect();
        let set = FileSet::new(files.clone());
        let view = ProjectView::new(&fx.root, &set);
        let index = b.build_reverse_index(&files, &view);

        let graph = b.import_graph(&fx.root.join("app/main.py"), 1, &index, &view);
        let out: Vec<_> = graph.outgoing.iter().map(|e| e.target.clone()).collect();
        assert_eq!(out, vec![fx.root.join("app/__init__.py"), fx.root.join("app/models.py")]);
        let inc: Vec<_> = graph.incoming.iter().map(|e| e.source.clone()).collect();
        assert_eq!(inc, vec![fx.root.join("app/views.py")]);
        assert!(graph.transitive.is_empty());
        Ok(())
    }

    #[test]
    fn depth_zero_is_empty() -> Result<()> {
        let b = builder()?;
        let files = FileSet::default();
        let view = ProjectView::new(Path::new("/nowhere"), &files);
        let graph = b.import_graph(Path::new("/nowhere/a.py"), 0, &ReverseImportIndex::default(), &view);
        assert!(graph.is_empty());
        Ok(())
    }

    #[test]
    fn cycles_expand_each_file_once() -> Result<()> {
        let fx = fixture(&[
            ("a.py", "import b\n"),
            ("b.py", "import a\nimport c\n"),
            ("c.py", "import a\n"),
        ])?;
        let b = builder()?;
        let files: Vec<PathBuf> = ["a.py", "b.py", "c.py"].iter().map(|r| fx.root.join(r)).collect();
        let set = FileSet::new(files.clone());
        let view = ProjectView::new(&fx.root, &set);
        let index = b.build_reverse_index(&files, &view);

        let graph = b.import_graph(&fx.root.join("a.py"), 2, &index, &view);
        let related: Vec<_> = graph.all().map(|e| e.related().clone()).collect();
        assert_eq!(related, vec![fx.root.join("b.py"), fx.root.join("c.py")]);
        // b is both imported and an importer of a; it is listed once, as outgoing
        assert_eq!(graph.outgoing.len(), 1);
        assert_eq!(graph.incoming.len(), 1);
        assert!(graph.transitive.is_empty());
        Ok(())
    }

    #[test]
    fn transitive_edges_record_via() -> Result<()> {
        let fx = fixture(&[
            ("src/main.rs", "mod api;\nfn main() {}\n"),
            ("src/api.rs", "use crate::db::Pool;\n"),
            ("src/db.rs", "pub struct Pool;\n"),
        ])?;
        let b = builder()?;
        let files: Vec<PathBuf> = ["src/main.rs", "src/api.rs", "src/db.rs"].iter().map(|r| fx.root.join(r)).collect();
        let set = FileSet::new(files.clone());
        let view = ProjectView::new(&fx.root, &set);
        let index = b.build_reverse_index(&files, &view);

        let graph = b.import_graph(&fx.root.join("src/main.rs"), 2, &index, &view);
        assert_eq!(graph.transitive.len(), 1);
        let edge = &graph.transitive[0];
        assert_eq!(edge.target, fx.root.join("src/db.rs"));
        assert_eq!(edge.via, Some(fx.root.join("src/api.rs")));
        assert_eq!(edge.depth, 2);
        Ok(())
    }

    #[test]
    fn filesystem_resolution_and_denylist() -> Result<()> {
        let fx = fixture(&[("web/app.ts", "import x from './util'\n"), ("web/util.ts", "export const x = 1\n")])?;
        let registry = LanguageRegistry::new()?;
        let app = fx.root.join("web/app.ts");
        assert_eq!(
            resolve_import(&registry, "./util", &app, &fx.root, LanguageId::TypeScript),
            Some(fx.root.join("web/util.ts"))
        );
        assert_eq!(resolve_import(&registry, "react", &app, &fx.root, LanguageId::TypeScript), None);
        assert_eq!(resolve_import(&registry, "./app", &app, &fx.root, LanguageId::TypeScript), None);
        assert_eq!(resolve_import(&registry, "../../etc/passwd", &app, &fx.root, LanguageId::TypeScript), None);
        Ok(())
    }

    #[test]
    fn dot_output_names_relative_paths() -> Result<()> {
        let root = PathBuf::from("/p");
        let graph = ImportGraph {
            anchor: root.join("a.py"),
            outgoing: vec![ImportEdge {
                source: root.join("a.py"),
                target: root.join("lib/b.py"),
                relationship: Relationship::Outgoing,
                depth: 1,
                via: None,
            }],
            ..ImportGraph::default()
        };
        let dot = to_dot(&graph, &root);
        assert!(dot.contains("digraph"));
        assert!(dot.contains("lib/b.py"));
        assert!(dot.contains("outgoing"));
        Ok(())
    }
}
