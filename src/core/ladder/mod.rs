//! Filepath: src/core/ladder/mod.rs
//! The strategy ladder: an ordered list of levels from most to least
//! expensive, validated once at startup and never mutated afterwards.

mod assembler;
mod render;

pub use assembler::{AssembleError, AssemblyRequest, ContextAssembler};
pub use render::{
    AssemblyResult, BlockMode, BlockSource, IncludedFile, LevelReport, Outcome, SectionKind, SectionSummary,
    Warning,
};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::reduce::{ChunkingMode, ReduceOptions};
use crate::infra::config::{BudgetConfig, Config};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyLevel {
    pub name: String,
    /// 0, 1 or 2
    pub import_depth: u8,
    pub resolver_enabled: bool,
    pub chunking_mode: ChunkingMode,
    pub max_related_files: usize,
    pub max_resolver_files: usize,
    pub chunk_threshold_lines: usize,
    pub file_token_cap: usize,
}

impl StrategyLevel {
    #[allow(clippy::too_many_arguments)]
    fn preset(
        name: &str,
        import_depth: u8,
        resolver_enabled: bool,
        chunking_mode: ChunkingMode,
        max_related_files: usize,
        max_resolver_files: usize,
        chunk_threshold_lines: usize,
        file_token_cap: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            import_depth,
            resolver_enabled,
            chunking_mode,
            max_related_files,
            max_resolver_files,
            chunk_threshold_lines,
            file_token_cap,
        }
    }

    /// maximum → standard → compact → types_only → minimal
    pub fn default_ladder() -> Vec<Self> {
        vec![
            Self::preset("maximum", 2, true, ChunkingMode::Full, 20, 15, 200, 4000),
            Self::preset("standard", 1, true, ChunkingMode::Semantic, 15, 10, 150, 2000),
            Self::preset("compact", 1, true, ChunkingMode::Semantic, 10, 5, 80, 1000),
            Self::preset("types_only", 1, false, ChunkingMode::TypesOnly, 8, 0, 40, 500),
            Self::preset("minimal", 0, false, ChunkingMode::None, 0, 0, 0, 0),
        ]
    }

    pub fn reduce_options(&self) -> ReduceOptions {
        ReduceOptions {
            chunk_threshold_lines: self.chunk_threshold_lines,
            token_cap: self.file_token_cap,
        }
    }

    /// The level renders related files at all
    pub fn wants_related(&self) -> bool {
        self.import_depth > 0 && self.max_related_files > 0 && self.chunking_mode != ChunkingMode::None
    }

    pub fn wants_resolver(&self) -> bool {
        self.resolver_enabled && self.max_resolver_files > 0
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LadderConfigError {
    #[error("the strategy ladder has no levels")]
    Empty,
    #[error("duplicate strategy level name: {0}")]
    DuplicateName(String),
    #[error("level {name}: import_depth {depth} is out of range (0..=2)")]
    DepthOutOfRange { name: String, depth: u8 },
    #[error("level {name}: chunking_mode none cannot include related files")]
    RelatedWithoutChunking { name: String },
    #[error("token budget must be positive")]
    ZeroBudget,
    #[error("budget share {name} = {value} must lie in [0, 1]")]
    ShareOutOfRange { name: &'static str, value: f64 },
}

/// Validated, immutable level list
#[derive(Debug, Clone)]
pub struct Ladder {
    levels: Vec<StrategyLevel>,
}

impl Ladder {
    pub fn new(levels: Vec<StrategyLevel>) -> Result<Self, LadderConfigError> {
        if levels.is_empty() {
            return Err(LadderConfigError::Empty);
        }
        let mut names = HashSet::new();
        for level in &levels {
            if !names.insert(level.name.as_str()) {
                return Err(LadderConfigError::DuplicateName(level.name.clone()));
            }
            if level.import_depth > 2 {
                return Err(LadderConfigError::DepthOutOfRange {
                    name: level.name.clone(),
                    depth: level.import_depth,
                });
            }
            if level.chunking_mode == ChunkingMode::None && level.max_related_files > 0 && level.import_depth > 0 {
                return Err(LadderConfigError::RelatedWithoutChunking {
                    name: level.name.clone(),
                });
            }
        }
        Ok(Self { levels })
    }

    /// Levels plus the budget section of `cfg`
    pub fn from_config(cfg: &Config) -> Result<Self, LadderConfigError> {
        validate_budget(&cfg.budget)?;
        Self::new(cfg.levels.clone())
    }

    pub fn levels(&self) -> &[StrategyLevel] {
        &self.levels
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyLevel> {
        self.levels.iter()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Largest resolver allowance among levels that use the resolver
    pub fn max_resolver_files(&self) -> usize {
        self.levels
            .iter()
            .filter(|l| l.wants_resolver())
            .map(|l| l.max_resolver_files)
            .max()
            .unwrap_or(0)
    }

    pub fn max_import_depth(&self) -> u8 {
        self.levels
            .iter()
            .filter(|l| l.wants_related())
            .map(|l| l.import_depth)
            .max()
            .unwrap_or(0)
    }
}

fn validate_budget(budget: &BudgetConfig) -> Result<(), LadderConfigError> {
    if budget.token_budget == 0 {
        return Err(LadderConfigError::ZeroBudget);
    }
    for (name, value) in [
        ("overview_share", budget.overview_share),
        ("related_share", budget.related_share),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(LadderConfigError::ShareOutOfRange { name, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ladder_is_valid_and_ordered() {
        let ladder = Ladder::from_config(&Config::default()).expect("default ladder validates");
        let names: Vec<_> = ladder.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["maximum", "standard", "compact", "types_only", "minimal"]);
        assert_eq!(ladder.max_resolver_files(), 15);
        assert_eq!(ladder.max_import_depth(), 2);

        // Each level is no more generous than the one before it
        for pair in ladder.levels().windows(2) {
            assert!(pair[0].max_related_files >= pair[1].max_related_files);
            assert!(pair[0].file_token_cap >= pair[1].file_token_cap);
            assert!(pair[0].import_depth >= pair[1].import_depth);
        }
    }

    #[test]
    fn invalid_ladders_are_rejected() {
        assert_eq!(Ladder::new(vec![]).unwrap_err(), LadderConfigError::Empty);

        let mut levels = StrategyLevel::default_ladder();
        levels[1].name = "maximum".into();
        assert_eq!(
            Ladder::new(levels).unwrap_err(),
            LadderConfigError::DuplicateName("maximum".into())
        );

        let mut levels = StrategyLevel::default_ladder();
        levels[0].import_depth = 3;
        assert!(matches!(
            Ladder::new(levels).unwrap_err(),
            LadderConfigError::DepthOutOfRange { depth: 3, .. }
        ));

        let mut levels = StrategyLevel::default_ladder();
        levels[4].max_related_files = 5;
        levels[4].import_depth = 1;
        assert!(matches!(
            Ladder::new(levels).unwrap_err(),
            LadderConfigError::RelatedWithoutChunking { .. }
        ));
    }

    #[test]
    fn budget_is_validated() {
        let mut cfg = Config::default();
        cfg.budget.token_budget = 0;
        assert_eq!(Ladder::from_config(&cfg).unwrap_err(), LadderConfigError::ZeroBudget);

        let mut cfg = Config::default();
        cfg.budget.related_share = 1.5;
        assert!(matches!(
            Ladder::from_config(&cfg).unwrap_err(),
            LadderConfigError::ShareOutOfRange { name: "related_share", .. }
        ));
    }

    #[test]
    fn unknown_level_fields_are_rejected() {
        let text = r#"
name = "x"
import_depth = 1
resolver_enabled = false
chunking_mode = "semantic"
max_related_files = 1
max_resolver_files = 0
chunk_threshold_lines = 10
file_token_cap = 100
colour = "blue"
"#;
        assert!(toml::from_str::<StrategyLevel>(text).is_err());
    }
}
