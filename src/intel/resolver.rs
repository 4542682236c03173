//! Filepath: src/intel/resolver.rs
//! Concurrent definition lookups with per-request and overall deadlines.
//!
//! One request per identifier goes out through a `JoinSet`, bounded by a
//! semaphore. Answers are consumed in identifier order once the set drains
//! or the overall deadline passes; whatever is still in flight then is
//! aborted and ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aho_corasick::AhoCorasick;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, trace, warn};

use crate::core::reduce::ContentReducer;
use crate::infra::config::ResolverConfig;
use crate::infra::io::read_text;
use crate::infra::utils::PathUtils;
use crate::infra::walk::DEPENDENCY_DIRS;
use crate::intel::identifiers::{IdentifierRef, extract_identifiers};
use crate::intel::protocol::{DefinitionProvider, DefinitionRequest, DefinitionTarget, Range};
use crate::lang::LanguageRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub request_timeout: Duration,
    pub overall_timeout: Duration,
    pub max_identifiers: usize,
    pub concurrency: usize,
    pub definition_max_lines: usize,
}

impl ResolverSettings {
    pub fn from_config(cfg: &ResolverConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
            overall_timeout: Duration::from_millis(cfg.overall_timeout_ms),
            max_identifiers: cfg.max_identifiers,
            concurrency: cfg.concurrency.max(1),
            definition_max_lines: cfg.definition_max_lines,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

/// A kept definition, rendered and token-counted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub identifier: String,
    pub path: PathBuf,
    pub range: Range,
    pub snippet: String,
    pub tokens: usize,
}

pub struct DefinitionResolver {
    provider: Arc<dyn DefinitionProvider>,
    registry: Arc<LanguageRegistry>,
    reducer: Arc<ContentReducer>,
    settings: ResolverSettings,
    vendored: Option<AhoCorasick>,
}

impl DefinitionResolver {
    pub fn new(
        provider: Arc<dyn DefinitionProvider>,
        registry: Arc<LanguageRegistry>,
        reducer: Arc<ContentReducer>,
        settings: ResolverSettings,
    ) -> Self {
        let patterns: Vec<String> = DEPENDENCY_DIRS.iter().map(|d| format!("/{d}/")).collect();
        let vendored = match AhoCorasick::new(&patterns) {
            Ok(ac) => Some(ac),
            Err(err) => {
                warn!(error = %err, "dependency-directory matcher unavailable");
                None
            }
        };
        Self {
            provider,
            registry,
            reducer,
            settings,
            vendored,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Identifiers of the anchor worth looking up
    pub fn identifiers_for(&self, anchor: &Path, content: &str) -> Vec<IdentifierRef> {
        match self.registry.for_path(anchor) {
            Some(profile) => extract_identifiers(profile.as_ref(), content, self.settings.max_identifiers),
            None => Vec::new(),
        }
    }

    /// Path lies under a dependency directory (relative to `root`)
    fn is_vendored(&self, path: &Path, root: &Path) -> bool {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let slashed = format!("/{}", PathUtils::to_slash(rel));
        self.vendored.as_ref().is_some_and(|ac| ac.is_match(&slashed))
    }

    /// Fan out one request per identifier and gather whatever answers in time.
    /// Index `i` of the result holds the targets for `identifiers[i]`.
    async fn fetch_all(&self, anchor: &Path, identifiers: &[IdentifierRef]) -> Vec<Vec<DefinitionTarget>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let per_request = self.settings.request_timeout;
        let deadline = Instant::now() + self.settings.overall_timeout;

        let mut set = JoinSet::new();
        for (i, ident) in identifiers.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let request = DefinitionRequest {
                file: anchor.to_path_buf(),
                line: ident.line,
                column: ident.column,
            };
            let name = ident.name.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (i, Vec::new());
                };
                match timeout(per_request, provider.definition(request)).await {
                    Ok(Ok(resp)) => (i, resp.into_targets()),
                    Ok(Err(err)) => {
                        debug!(identifier = %name, error = %err, "definition request failed");
                        (i, Vec::new())
                    }
                    Err(_) => {
                        debug!(identifier = %name, "definition request timed out");
                        (i, Vec::new())
                    }
                }
            });
        }

        let mut answers = vec![Vec::new(); identifiers.len()];
        loop {
            match timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((i, targets)))) => answers[i] = targets,
                Ok(Some(Err(err))) => debug!(error = %err, "definition task aborted"),
                Ok(None) => break,
                Err(_) => {
                    debug!(pending = set.len(), "overall resolver deadline reached");
                    set.abort_all();
                    break;
                }
            }
        }
        answers
    }

    /// Look up definitions for `identifiers` and keep at most `max_files`,
    /// one per file, skipping the anchor, out-of-root and vendored targets.
    #[instrument(skip(self, identifiers), fields(anchor = %anchor.display(), identifiers = identifiers.len()))]
    pub async fn resolve_definitions(
        &self,
        anchor: &Path,
        root: &Path,
        identifiers: &[IdentifierRef],
        max_files: usize,
    ) -> Vec<Definition> {
        if max_files == 0 || identifiers.is_empty() {
            return Vec::new();
        }

        let answers = self.fetch_all(anchor, identifiers).await;
        let anchor_norm = PathUtils::normalize(anchor);

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut out = Vec::new();
        for (ident, targets) in identifiers.iter().zip(answers) {
            if out.len() >= max_files {
                break;
            }
            for target in targets {
                let path = PathUtils::normalize(&target.path);
                if path == anchor_norm
                    || !path.starts_with(root)
                    || self.is_vendored(&path, root)
                    || seen.contains(&path)
                {
                    trace!(identifier = %ident.name, path = %path.display(), "definition target skipped");
                    continue;
                }
                let content = match read_text(&path) {
                    Ok(c) => c,
                    Err(err) => {
                        trace!(path = %path.display(), error = %err, "unreadable definition file");
                        continue;
                    }
                };
                let snippet = self.reducer.definition_snippet(
                    &path,
                    &content,
                    target.range.start.line as usize,
                    self.settings.definition_max_lines,
                );
                let tokens = self.reducer.estimator().estimate(&snippet);
                seen.insert(path.clone());
                out.push(Definition {
                    identifier: ident.name.clone(),
                    path,
                    range: target.range,
                    snippet,
                    tokens,
                });
                break;
            }
        }

        debug!(kept = out.len(), "definitions resolved");
        out
    }
}
