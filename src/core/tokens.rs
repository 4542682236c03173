use anyhow::{Context, Result, anyhow};
use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use xxhash_rust::xxh64::Xxh64;

use crate::infra::config::{EstimatorKind, TokensConfig};

/// Bytes per token assumed by the length heuristic
pub const BYTES_PER_TOKEN: usize = 4;

/// Length heuristic: `ceil(bytes / 4)`
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_len(text.len())
}

/// Heuristic token count for a byte length (used by the scanner without reading)
pub fn tokens_for_len(len: usize) -> usize {
    len.div_ceil(BYTES_PER_TOKEN)
}

/// Token counter shared by every component of one assembler.
///
/// The heuristic variant is the default: it is stable across models and is
/// what the budget invariants are stated against. The BPE variant counts real
/// tiktoken tokens and memoizes counts by content hash.
pub enum TokenEstimator {
    Heuristic,
    Bpe(BpeCounter),
}

impl TokenEstimator {
    pub fn heuristic() -> Self {
        Self::Heuristic
    }

    pub fn from_config(cfg: &TokensConfig) -> Result<Self> {
        match cfg.estimator {
            EstimatorKind::Heuristic => Ok(Self::Heuristic),
            EstimatorKind::Bpe => Ok(Self::Bpe(BpeCounter::new(&cfg.model)?)),
        }
    }

    pub fn estimate(&self, text: &str) -> usize {
        match self {
            Self::Heuristic => estimate_tokens(text),
            Self::Bpe(counter) => counter.count(text),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Heuristic => "heuristic",
            Self::Bpe(_) => "bpe",
        }
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::heuristic()
    }
}

/// tiktoken-backed counter with a token count cache
pub struct BpeCounter {
    /// Byte Pair Encoding (BPE) tokenizer for counting tokens
    bpe: CoreBPE,

    /// Token count cache keyed by xxhash64 of the text
    cache: Cache<u64, usize>,
}

impl BpeCounter {
    /// Load the BPE for a model name ("gpt-4o") or an encoding name
    /// ("cl100k_base", "o200k_base"), case-insensitive.
    pub fn new(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        // Model name first, then encoding name
        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => return Err(anyhow!("Unsupported model/encoding: {model_or_encoding}")),
            },
        };

        Ok(Self {
            bpe,
            cache: Cache::new(100_000),
        })
    }

    pub fn count(&self, s: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(s.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        let t = self.bpe.encode_ordinary(s).len();
        self.cache.insert(key, t);

        t
    }
}
