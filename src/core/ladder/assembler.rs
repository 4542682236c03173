//! Filepath: src/core/ladder/assembler.rs
//! The context assembler: anchor first, whole project when it fits,
//! otherwise one attempt per ladder level until a level fits.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

use super::render::{
    self, AssemblyResult, BlockMode, BlockSource, ContentBlock, LevelReport, Outcome, Section, SectionKind,
    Warning,
};
use super::{Ladder, StrategyLevel};
use crate::core::graph::{ImportGraphBuilder, ReverseImportIndex};
use crate::core::reduce::{ChunkingMode, ContentReducer};
use crate::core::relevance::{TypeLikeness, candidates_from_graph, score_and_sort};
use crate::core::scan::{FileKind, ProjectScan, ProjectScanner};
use crate::core::tokens::TokenEstimator;
use crate::infra::cache::{CacheKey, CacheKind, CacheTag, ProjectCache};
use crate::infra::config::{BudgetConfig, Config, ProviderKind};
use crate::infra::io::read_text;
use crate::infra::utils::PathUtils;
use crate::intel::local::LocalSymbolProvider;
use crate::intel::protocol::DefinitionProvider;
use crate::intel::resolver::{Definition, DefinitionResolver, ResolverSettings};
use crate::lang::{LanguageRegistry, ProjectView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRequest {
    pub anchor: PathBuf,
    pub root: PathBuf,
    pub budget: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error("cannot read anchor file {}", path.display())]
    AnchorUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

enum ProviderSource {
    Disabled,
    Local,
    External(Arc<dyn DefinitionProvider>),
}

/// Everything one level attempt reads; fixed for the whole assembly
struct Inputs<'a> {
    anchor: &'a Path,
    root: &'a Path,
    budget: usize,
    anchor_section: &'a Section,
    anchor_block: &'a ContentBlock,
    scan: &'a ProjectScan,
    index: Option<&'a ReverseImportIndex>,
    definitions: &'a [Definition],
}

/// One ladder attempt before it is committed
struct Attempt {
    level: String,
    sections: Vec<Section>,
    blocks: Vec<ContentBlock>,
    demand: usize,
    stopped_early: bool,
}

impl Attempt {
    fn tokens(&self) -> usize {
        self.sections.iter().map(|s| s.tokens).sum()
    }

    fn fits(&self, budget: usize) -> bool {
        !self.stopped_early && self.demand <= budget
    }

    fn report(&self, budget: usize) -> LevelReport {
        LevelReport {
            name: self.level.clone(),
            demand: self.demand,
            tokens: self.tokens(),
            fit: self.fits(budget),
        }
    }
}

pub struct ContextAssembler {
    registry: Arc<LanguageRegistry>,
    scanner: ProjectScanner,
    graph: ImportGraphBuilder,
    reducer: Arc<ContentReducer>,
    ladder: Ladder,
    budget: BudgetConfig,
    resolver_settings: ResolverSettings,
    provider: ProviderSource,
    type_likeness: TypeLikeness,
    cache: Arc<ProjectCache>,
}

impl ContextAssembler {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ladder = Ladder::from_config(config)?;
        let registry = Arc::new(LanguageRegistry::new()?);
        let estimator = Arc::new(TokenEstimator::from_config(&config.tokens)?);
        let cache = Arc::new(ProjectCache::from_config(&config.cache));

        Ok(Self {
            scanner: ProjectScanner::new(&config.ignore_patterns, Arc::clone(&registry))?.with_options(&config.scan),
            graph: ImportGraphBuilder::new(Arc::clone(&registry), Arc::clone(&cache)),
            reducer: Arc::new(ContentReducer::new(Arc::clone(&registry), estimator)),
            registry,
            ladder,
            budget: config.budget.clone(),
            resolver_settings: ResolverSettings::from_config(&config.resolver),
            provider: match config.resolver.provider {
                ProviderKind::None => ProviderSource::Disabled,
                ProviderKind::Local => ProviderSource::Local,
            },
            type_likeness: TypeLikeness::new(&config.relevance)?,
            cache,
        })
    }

    /// Answer definition requests through `provider` instead of the local index
    pub fn with_provider(mut self, provider: Arc<dyn DefinitionProvider>) -> Self {
        self.provider = ProviderSource::External(provider);
        self
    }

    /// Run every level as if `resolver_enabled = false`
    pub fn without_resolver(mut self) -> Self {
        self.provider = ProviderSource::Disabled;
        self
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn default_budget(&self) -> usize {
        self.budget.token_budget
    }

    /// Forget cached data derived from `path`
    pub fn invalidate_file(&self, path: &Path) {
        self.cache.invalidate_file(path);
    }

    /// Forget every scan, index and import list
    pub fn invalidate_project(&self) {
        self.cache.invalidate_tag(&CacheTag::Project);
    }

    fn estimator(&self) -> &TokenEstimator {
        self.reducer.estimator()
    }

    fn fence_for(&self, path: &Path) -> &'static str {
        self.registry.fence_for(path)
    }

    fn scan(&self, root: &Path) -> Arc<ProjectScan> {
        self.cache.get_or_compute(
            CacheKey::new(CacheKind::Scan, root),
            None,
            &[CacheTag::Project],
            || self.scanner.scan(root),
        )
    }

    fn reverse_index(&self, scan: &ProjectScan) -> Arc<ReverseImportIndex> {
        self.cache.get_or_compute(
            CacheKey::new(CacheKind::ReverseIndex, &scan.root),
            None,
            &[CacheTag::Project],
            || {
                let view = ProjectView::new(&scan.root, scan.file_set());
                self.graph.build_reverse_index(&scan.source_files(), &view)
            },
        )
    }

    fn resolve_anchor(anchor: &Path, root: &Path) -> PathBuf {
        if let Ok(p) = dunce::canonicalize(anchor) {
            return p;
        }
        if anchor.is_relative()
            && let Ok(p) = dunce::canonicalize(root.join(anchor))
        {
            return p;
        }
        PathUtils::normalize(anchor)
    }

    /// Build a context package for `request`. Only an unreadable anchor is an error.
    #[instrument(skip(self), fields(anchor = %request.anchor.display(), budget = request.budget))]
    pub async fn assemble(&self, request: &AssemblyRequest) -> Result<AssemblyResult, AssembleError> {
        let root = PathUtils::canonical_or_normalized(&request.root);
        let anchor = Self::resolve_anchor(&request.anchor, &root);
        let budget = request.budget;

        let bytes = std::fs::read(&anchor).map_err(|source| AssembleError::AnchorUnreadable {
            path: anchor.clone(),
            source,
        })?;
        let anchor_content = String::from_utf8_lossy(&bytes).into_owned();

        // The anchor is charged first and never reduced
        let rel = PathUtils::display_rel(&anchor, &root);
        let text = render::anchor_text(&rel, self.fence_for(&anchor), &anchor_content);
        let tokens = self.estimator().estimate(&text);
        let anchor_block = ContentBlock {
            path: anchor.clone(),
            mode_used: BlockMode::Full,
            source: BlockSource::Anchor,
            rendered_text: text.clone(),
            token_count: tokens,
        };
        let anchor_section = Section {
            kind: SectionKind::Anchor,
            text,
            tokens,
        };

        if tokens > budget {
            warn!(tokens, budget, "anchor alone exceeds the budget");
            return Ok(AssemblyResult::from_parts(
                "anchor_only",
                Outcome::AnchorOverBudget,
                budget,
                vec![anchor_section],
                &[anchor_block],
                vec![Warning::CurrentFileExceedsBudget],
                Vec::new(),
            ));
        }

        let scan = self.scan(&root);
        if let Some(result) = self.whole_project(&scan, &anchor_section, &anchor_block, budget) {
            info!(files = result.files_included.len(), tokens = result.total_tokens, "whole project fits");
            return Ok(result);
        }

        let index = (self.ladder.max_import_depth() > 0).then(|| self.reverse_index(&scan));
        let definitions = self.fetch_definitions(&anchor, &root, &anchor_content, &scan).await;

        let inputs = Inputs {
            anchor: &anchor,
            root: &root,
            budget,
            anchor_section: &anchor_section,
            anchor_block: &anchor_block,
            scan: &scan,
            index: index.as_deref(),
            definitions: &definitions,
        };

        let mut reports = Vec::with_capacity(self.ladder.len());
        let mut last: Option<Attempt> = None;
        for level in self.ladder.iter() {
            let attempt = self.assemble_at_level(level, &inputs);
            let report = attempt.report(budget);
            debug!(
                level = %level.name,
                demand = report.demand,
                tokens = report.tokens,
                fit = report.fit,
                "level attempted"
            );
            reports.push(report);

            if attempt.fits(budget) {
                return Ok(AssemblyResult::from_parts(
                    &attempt.level,
                    Outcome::Fit,
                    budget,
                    attempt.sections,
                    &attempt.blocks,
                    Vec::new(),
                    reports,
                ));
            }
            last = Some(attempt);
        }

        let Some(attempt) = last else {
            // Unreachable with a validated ladder; fall back to the anchor alone
            return Ok(AssemblyResult::from_parts(
                "anchor_only",
                Outcome::Exhausted,
                budget,
                vec![anchor_section],
                &[anchor_block],
                vec![Warning::AllLevelsExceededBudget],
                reports,
            ));
        };

        warn!(level = %attempt.level, demand = attempt.demand, budget, "every level exceeded the budget");
        Ok(AssemblyResult::from_parts(
            &attempt.level,
            Outcome::Exhausted,
            budget,
            attempt.sections,
            &attempt.blocks,
            vec![Warning::AllLevelsExceededBudget],
            reports,
        ))
    }

    /// Every text file verbatim, anchor first, when the lot fits
    fn whole_project(
        &self,
        scan: &ProjectScan,
        anchor_section: &Section,
        anchor_block: &ContentBlock,
        budget: usize,
    ) -> Option<AssemblyResult> {
        if scan.total_tokens > budget {
            return None;
        }

        let others: Vec<&PathBuf> = scan
            .files
            .iter()
            .filter(|f| f.kind != FileKind::Binary && f.path != anchor_block.path)
            .map(|f| &f.path)
            .collect();

        let blocks: Vec<ContentBlock> = others
            .par_iter()
            .filter_map(|path| {
                let content = read_text(path).ok()?;
                let rel = PathUtils::display_rel(path, &scan.root);
                let text = render::file_text(&rel, self.fence_for(path), "project file", &content);
                Some(ContentBlock {
                    path: (*path).clone(),
                    mode_used: BlockMode::Full,
                    source: BlockSource::Project,
                    token_count: self.estimator().estimate(&text),
                    rendered_text: text,
                })
            })
            .collect();

        let project_tokens: usize = blocks.iter().map(|b| b.token_count).sum();
        if anchor_section.tokens + project_tokens > budget {
            return None;
        }

        let mut sections = vec![anchor_section.clone()];
        if !blocks.is_empty() {
            sections.push(Section {
                kind: SectionKind::Project,
                text: join_blocks(&blocks),
                tokens: project_tokens,
            });
        }
        let mut all = vec![anchor_block.clone()];
        all.extend(blocks);

        Some(AssemblyResult::from_parts(
            "whole_project",
            Outcome::WholeProject,
            budget,
            sections,
            &all,
            Vec::new(),
            Vec::new(),
        ))
    }

    /// Resolver results for the most generous enabled level, fetched once
    async fn fetch_definitions(
        &self,
        anchor: &Path,
        root: &Path,
        content: &str,
        scan: &ProjectScan,
    ) -> Vec<Definition> {
        let max_files = self.ladder.max_resolver_files();
        if max_files == 0 {
            return Vec::new();
        }

        let provider: Arc<dyn DefinitionProvider> = match &self.provider {
            ProviderSource::Disabled => {
                debug!("no definition provider; resolver disabled for every level");
                return Vec::new();
            }
            ProviderSource::External(p) => Arc::clone(p),
            ProviderSource::Local => self.cache.get_or_compute(
                CacheKey::new(CacheKind::Symbols, &scan.root),
                None,
                &[CacheTag::Project],
                || LocalSymbolProvider::build(scan, &self.registry),
            ),
        };

        let resolver = DefinitionResolver::new(
            provider,
            Arc::clone(&self.registry),
            Arc::clone(&self.reducer),
            self.resolver_settings,
        );
        let identifiers = resolver.identifiers_for(anchor, content);
        if identifiers.is_empty() {
            trace!("anchor has no identifiers worth resolving");
            return Vec::new();
        }
        debug!(
            provider = resolver.provider_name(),
            identifiers = identifiers.len(),
            max_files,
            "resolving definitions"
        );
        resolver.resolve_definitions(anchor, root, &identifiers, max_files).await
    }

    /// Render the candidate for one level and measure its demand
    fn assemble_at_level(&self, level: &StrategyLevel, inputs: &Inputs<'_>) -> Attempt {
        let mut sections = vec![inputs.anchor_section.clone()];
        let mut blocks = vec![inputs.anchor_block.clone()];
        let mut included: HashSet<PathBuf> = HashSet::from([inputs.anchor.to_path_buf()]);
        let mut demand = inputs.anchor_section.tokens;
        let mut stopped_early = false;

        let remaining = inputs.budget.saturating_sub(inputs.anchor_section.tokens);

        // Overview: min(share × remaining, cap), truncated by lines to fit
        let overview_alloc = ((remaining as f64 * self.budget.overview_share) as usize).min(self.budget.overview_cap);
        let overview = self.overview_section(&inputs.scan.tree_rendering, overview_alloc);
        let overview_tokens = overview.as_ref().map_or(0, |s| s.tokens);
        demand += overview_tokens;
        if let Some(section) = overview {
            sections.push(section);
        }

        let after_overview = remaining.saturating_sub(overview_tokens);
        let related_alloc = (after_overview as f64 * self.budget.related_share) as usize;

        // Related files
        let mut related_used = 0;
        if level.wants_related()
            && let Some(index) = inputs.index
        {
            let related = self.related_blocks(level, inputs, index);
            let (kept, kept_tokens, wanted, stopped) = take_within(related, related_alloc, &mut included);
            demand += wanted;
            stopped_early |= stopped;
            related_used = kept_tokens;
            if !kept.is_empty() {
                sections.push(Section {
                    kind: SectionKind::Related,
                    text: join_blocks(&kept),
                    tokens: kept_tokens,
                });
                blocks.extend(kept);
            }
        }

        // Definitions get what related files left over
        if level.wants_resolver() && !inputs.definitions.is_empty() {
            let defs_alloc = after_overview.saturating_sub(related_used);
            let candidates: Vec<ContentBlock> = inputs
                .definitions
                .iter()
                .filter(|d| !included.contains(&d.path))
                .take(level.max_resolver_files)
                .map(|d| {
                    let rel = PathUtils::display_rel(&d.path, inputs.root);
                    let text = render::definition_text(&rel, self.fence_for(&d.path), &d.identifier, &d.snippet);
                    ContentBlock {
                        path: d.path.clone(),
                        mode_used: BlockMode::Definition,
                        source: BlockSource::Definition,
                        token_count: self.estimator().estimate(&text),
                        rendered_text: text,
                    }
                })
                .collect();
            let (kept, kept_tokens, wanted, stopped) = take_within(candidates, defs_alloc, &mut included);
            demand += wanted;
            stopped_early |= stopped;
            if !kept.is_empty() {
                sections.push(Section {
                    kind: SectionKind::Definitions,
                    text: join_blocks(&kept),
                    tokens: kept_tokens,
                });
                blocks.extend(kept);
            }
        }

        Attempt {
            level: level.name.clone(),
            sections,
            blocks,
            demand,
            stopped_early,
        }
    }

    /// Related files for `level`: graph, ranking, filtering, reduction
    fn related_blocks(&self, level: &StrategyLevel, inputs: &Inputs<'_>, index: &ReverseImportIndex) -> Vec<ContentBlock> {
        let view = ProjectView::new(&inputs.scan.root, inputs.scan.file_set());
        let graph = self.graph.import_graph(inputs.anchor, level.import_depth, index, &view);

        // Read once; unreadable files drop out here
        let candidates = candidates_from_graph(&graph);
        let contents: Vec<Option<String>> = candidates.par_iter().map(|c| read_text(&c.path).ok()).collect();
        let texts: HashMap<PathBuf, String> = candidates
            .iter()
            .zip(contents)
            .filter_map(|(c, t)| t.map(|t| (c.path.clone(), t)))
            .collect();

        let types_only = level.chunking_mode == ChunkingMode::TypesOnly;
        let ranked = score_and_sort(candidates, inputs.anchor, |c| {
            texts
                .get(&c.path)
                .is_some_and(|t| !types_only || self.type_likeness.matches(&c.path, t))
        });

        let opts = level.reduce_options();
        ranked
            .par_iter()
            .take(level.max_related_files)
            .filter_map(|c| {
                let content = texts.get(&c.path)?;
                let reduction = self.reducer.reduce(&c.path, content, level.chunking_mode, &opts);
                let rel = PathUtils::display_rel(&c.path, inputs.root);
                let source = BlockSource::from(c.relationship);
                let mode = BlockMode::from(reduction.mode_used);
                let note = format!("{}, {}", source.label(), mode.label());
                let text = render::file_text(&rel, self.fence_for(&c.path), &note, &reduction.text);
                Some(ContentBlock {
                    path: c.path.clone(),
                    mode_used: mode,
                    source,
                    token_count: self.estimator().estimate(&text),
                    rendered_text: text,
                })
            })
            .collect()
    }

    /// Project tree within `allocation`, cut proportionally by lines
    fn overview_section(&self, tree: &str, allocation: usize) -> Option<Section> {
        if tree.trim().is_empty() || allocation == 0 {
            return None;
        }
        let full = render::overview_text(tree);
        let full_tokens = self.estimator().estimate(&full);
        if full_tokens <= allocation {
            return Some(Section {
                kind: SectionKind::Overview,
                text: full,
                tokens: full_tokens,
            });
        }

        let lines: Vec<&str> = tree.lines().collect();
        let mut keep = lines.len() * allocation / full_tokens.max(1);
        while keep > 0 {
            let cut = format!("{}\n... ({} more entries)\n", lines[..keep].join("\n"), lines.len() - keep);
            let text = render::overview_text(&cut);
            let tokens = self.estimator().estimate(&text);
            if tokens <= allocation {
                return Some(Section {
                    kind: SectionKind::Overview,
                    text,
                    tokens,
                });
            }
            keep -= 1;
        }
        None
    }
}

/// Keep blocks in order until the next would exceed `allocation`.
/// Returns (kept, kept tokens, demand of all fresh blocks, stopped early).
fn take_within(
    blocks: Vec<ContentBlock>,
    allocation: usize,
    included: &mut HashSet<PathBuf>,
) -> (Vec<ContentBlock>, usize, usize, bool) {
    let mut kept = Vec::new();
    let mut used = 0;
    let mut wanted = 0;
    let mut stopped = false;
    for block in blocks {
        if included.contains(&block.path) {
            continue;
        }
        wanted += block.token_count;
        if stopped || used + block.token_count > allocation {
            stopped = true;
            continue;
        }
        used += block.token_count;
        included.insert(block.path.clone());
        kept.push(block);
    }
    (kept, used, wanted, stopped)
}

fn join_blocks(blocks: &[ContentBlock]) -> String {
    blocks.iter().map(|b| b.rendered_text.as_str()).collect()
}
