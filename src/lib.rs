//! **contextor** - budget-aware context assembly for code questions
//!
//! Given an anchor file, a project root and a token budget, contextor builds a
//! paste-ready context package: the anchor in full, its import neighbourhood
//! reduced with tree-sitter, definitions fetched through a code-intelligence
//! provider, and a project overview. A ladder of strategy levels trades
//! fidelity for size until the package fits.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Assembly engine - import graph, reducer, relevance and the strategy ladder
pub mod core {
    /// Token estimation (length heuristic or tiktoken BPE with caching)
    pub mod tokens;
    pub use tokens::{TokenEstimator, estimate_tokens};

    /// Project scanner: file enumeration, sizes and the overview tree
    pub mod scan;
    pub use scan::{ProjectScan, ProjectScanner, ScannedFile};

    /// Directory tree rendering (overview section and `tree` command)
    pub mod tree;
    pub use tree::run as tree_run;

    /// Import graph: extraction, resolution, reverse index, depth expansion
    pub mod graph;
    pub use graph::{ImportEdge, ImportGraph, ImportGraphBuilder, Relationship, ReverseImportIndex};

    /// Syntax-aware content reduction (full / semantic / types-only / truncation)
    pub mod reduce;
    pub use reduce::{ChunkingMode, ContentReducer, ReduceOptions, Reduction, ReductionKind};

    /// Candidate ranking and the types-only predicate
    pub mod relevance;
    pub use relevance::{CandidateFile, TypeLikeness, score_and_sort};

    /// Strategy ladder and the context assembler state machine
    pub mod ladder;
    pub use ladder::{
        AssembleError, AssemblyRequest, AssemblyResult, ContextAssembler, Ladder, LadderConfigError, Outcome,
        StrategyLevel, Warning,
    };

    /// `context` command: drive the assembler from the CLI
    pub mod context;
    pub use context::run as context_run;
}

/// Per-language knowledge behind one trait: imports, resolution, grammars
pub mod lang {
    /// `LanguageProfile` trait, grammar bundle and project view
    pub mod profile;
    pub use profile::{FileSet, Grammar, LanguageId, LanguageProfile, ProjectView};

    /// Extension → profile lookup table
    pub mod registry;
    pub use registry::LanguageRegistry;

    /// Rust (`use`, `mod`, `extern crate`)
    pub mod rust;

    /// Python (`import`, `from … import`)
    pub mod python;

    /// JavaScript, TypeScript and TSX
    pub mod javascript;

    /// Go (single and grouped imports via go.mod)
    pub mod go;

    /// C and C++ (`#include`)
    pub mod cfamily;

    /// Namespaced module systems: Java, Kotlin, PHP, Swift, Elixir
    pub mod modules;

    /// Path-based scripting imports: Ruby, Lua, CSS/SCSS
    pub mod scripting;
}

/// Code intelligence: definition lookups through an external provider
pub mod intel {
    /// Wire shapes of definition responses and their normalization
    pub mod protocol;
    pub use protocol::{
        DefinitionProvider, DefinitionRequest, DefinitionResponse, DefinitionTarget, Location,
        LocationLink, Position, Range,
    };

    /// Identifier extraction from the anchor file
    pub mod identifiers;
    pub use identifiers::{IdentifierRef, extract_identifiers};

    /// Concurrent, timeout-bounded definition resolver
    pub mod resolver;
    pub use resolver::{Definition, DefinitionResolver, ResolverSettings};

    /// In-process provider backed by a declaration index
    pub mod local;
    pub use local::LocalSymbolProvider;
}

/// Infrastructure - configuration, caching, I/O and walking
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, load_config, load_config_from};

    /// Typed, tag-invalidated cache for scans and indexes
    pub mod cache;
    pub use cache::{CacheKey, CacheKind, CacheTag, ProjectCache};

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart, read_text};

    /// Line indexing for truncation and definition windows
    pub mod line_index;
    pub use line_index::LineIndex;

    /// Gitignore-aware directory walking
    pub mod walk;
    pub use walk::ProjectWalker;

    /// Small helpers for paths and tree-sitter nodes
    pub mod utils;
}

// Strategic re-exports for library consumers
pub use cli::{AppContext, Cli, Commands};
pub use core::{AssemblyRequest, AssemblyResult, ContextAssembler, Outcome, Warning};
pub use infra::{Config, load_config};
pub use lang::{LanguageId, LanguageRegistry};
