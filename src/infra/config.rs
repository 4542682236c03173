use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};
use crate::core::ladder::StrategyLevel;

/// Config file names probed in priority order
pub const CONFIG_FILES: &[&str] =
    &["contextor.toml", ".contextor.toml", "contextor.yaml", "contextor.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Extra ignore globs (in addition to .gitignore and dependency dirs)
    pub ignore_patterns: Vec<String>,

    /// Project walk options
    pub scan: ScanConfig,

    /// Token budget and its sub-allocation
    pub budget: BudgetConfig,

    /// The strategy ladder, most to least expensive
    pub levels: Vec<StrategyLevel>,

    /// Definition resolver settings
    pub resolver: ResolverConfig,

    /// Token estimation
    pub tokens: TokensConfig,

    /// Scan/index cache
    pub cache: CacheConfig,

    /// Relevance tuning
    pub relevance: RelevanceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig
{
    /// Walk dotfiles and dot-directories (`.git` is always skipped)
    pub include_hidden: bool,
    /// Keep `node_modules`, `target`, `vendor` and friends
    pub include_dependencies: bool,
    /// Deepest directory level scanned; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig
{
    /// Default budget when the caller does not pass one
    pub token_budget: usize,
    /// Fraction of the post-anchor budget offered to the overview
    pub overview_share: f64,
    /// Hard ceiling on overview tokens
    pub overview_cap: usize,
    /// Fraction of the post-overview budget offered to related files
    pub related_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind
{
    /// No code intelligence; resolver levels degrade
    None,
    /// In-process declaration index
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig
{
    pub provider: ProviderKind,
    pub request_timeout_ms: u64,
    pub overall_timeout_ms: u64,
    pub max_identifiers: usize,
    pub concurrency: usize,
    /// Longest definition block rendered, in lines
    pub definition_max_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind
{
    Heuristic,
    Bpe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensConfig
{
    pub estimator: EstimatorKind,
    /// Model or encoding name for the BPE estimator
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig
{
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig
{
    /// Path fragments that mark a file as type-like
    pub type_name_markers: Vec<String>,
    /// Type definitions per function definition needed by content sniffing
    pub type_ratio: f64,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: vec![
                "**/*.min.js".to_string(),
                "**/*.map".to_string(),
                "**/*.lock".to_string(),
                "**/package-lock.json".to_string(),
                "**/.DS_Store".to_string(),
            ],
            scan: ScanConfig::default(),
            budget: BudgetConfig::default(),
            levels: StrategyLevel::default_ladder(),
            resolver: ResolverConfig::default(),
            tokens: TokensConfig::default(),
            cache: CacheConfig::default(),
            relevance: RelevanceConfig::default(),
        }
    }
}

impl Default for BudgetConfig
{
    fn default() -> Self
    {
        Self {
            token_budget: 32_000,
            overview_share: 0.05,
            overview_cap: 1_500,
            related_share: 0.7,
        }
    }
}

impl Default for ResolverConfig
{
    fn default() -> Self
    {
        Self {
            provider: ProviderKind::Local,
            request_timeout_ms: 2_000,
            overall_timeout_ms: 8_000,
            max_identifiers: 40,
            concurrency: 8,
            definition_max_lines: 60,
        }
    }
}

impl Default for TokensConfig
{
    fn default() -> Self
    {
        Self { estimator: EstimatorKind::Heuristic, model: "gpt-4o".to_string() }
    }
}

impl Default for CacheConfig
{
    fn default() -> Self
    {
        Self { enabled: true, ttl_secs: 300, capacity: 64 }
    }
}

impl Default for RelevanceConfig
{
    fn default() -> Self
    {
        Self {
            type_name_markers: [
                "types",
                "models",
                "model",
                "interfaces",
                "schema",
                "schemas",
                "dto",
                "entities",
                "entity",
                ".d.ts",
                "typings",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            type_ratio: 1.0,
        }
    }
}

/// Load configuration from the current directory and `CONTEXTOR_*` env vars
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration from `dir` (first matching config file wins), then
/// overlay environment variables such as `CONTEXTOR_BUDGET__TOKEN_BUDGET`.
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    for name in CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path.as_path()));
            break;
        }
    }

    // Environment overrides; "__" separates nested keys so snake_case survives
    builder = builder.add_source(
        config::Environment::with_prefix("CONTEXTOR")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("contextor.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::reduce::ChunkingMode;
    use tempfile::TempDir;

    #[test]
    fn defaults_round_trip_through_toml() -> Result<()>
    {
        let text = toml::to_string_pretty(&Config::default())?;
        let back: Config = toml::from_str(&text)?;
        assert_eq!(back.levels.len(), 5);
        assert_eq!(back.levels[0].name, "maximum");
        assert_eq!(back.budget.token_budget, 32_000);
        Ok(())
    }

    #[test]
    fn config_file_overrides_defaults() -> Result<()>
    {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path()
                .join("contextor.toml"),
            r#"
[budget]
token_budget = 1234

[[levels]]
name = "only"
import_depth = 1
resolver_enabled = false
chunking_mode = "types_only"
max_related_files = 3
max_resolver_files = 0
chunk_threshold_lines = 10
file_token_cap = 200
"#,
        )?;

        let cfg = load_config_from(tmp.path())?;
        assert_eq!(cfg.budget.token_budget, 1234);
        // Untouched fields keep their defaults
        assert!((cfg.budget.related_share - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.levels.len(), 1);
        assert_eq!(cfg.levels[0].chunking_mode, ChunkingMode::TypesOnly);
        Ok(())
    }

    #[test]
    fn missing_config_yields_defaults() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let cfg = load_config_from(tmp.path())?;
        assert_eq!(cfg.resolver.provider, ProviderKind::Local);
        assert_eq!(cfg.levels.len(), 5);
        Ok(())
    }

    #[test]
    fn scan_section_reaches_the_walker_options() -> Result<()>
    {
        let tmp = TempDir::new()?;
        std::fs::write(
            tmp.path()
                .join("contextor.toml"),
            "[scan]\ninclude_hidden = true\nmax_depth = 3\n",
        )?;

        let cfg = load_config_from(tmp.path())?;
        assert!(cfg.scan.include_hidden);
        assert!(!cfg.scan.include_dependencies);
        assert_eq!(cfg.scan.max_depth, Some(3));
        assert_eq!(Config::default().scan.max_depth, None);
        Ok(())
    }
}
