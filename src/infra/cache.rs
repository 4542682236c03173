//! Filepath: src/infra/cache.rs
//! Typed, tag-invalidated cache for per-project derived data.
//!
//! Keys are `(kind, path)` pairs so a scan and a reverse index of the same
//! root never collide. Every entry carries tags; invalidating `Project` drops
//! everything, invalidating `File(p)` drops entries derived from `p`.
//! A disabled cache always misses and the engine behaves identically.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::core::graph::ReverseImportIndex;
use crate::core::scan::ProjectScan;
use crate::intel::local::LocalSymbolProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind
{
    Scan,
    ReverseIndex,
    Imports,
    Symbols,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey
{
    pub kind: CacheKind,
    pub path: PathBuf,
}

impl CacheKey
{
    pub fn new(
        kind: CacheKind,
        path: impl Into<PathBuf>,
    ) -> Self
    {
        Self { kind, path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag
{
    Project,
    File(PathBuf),
}

/// Raw import strings of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportList(pub Vec<String>);

/// The closed set of things the cache stores
#[derive(Clone)]
pub enum CacheValue
{
    Scan(Arc<ProjectScan>),
    ReverseIndex(Arc<ReverseImportIndex>),
    Imports(Arc<ImportList>),
    Symbols(Arc<LocalSymbolProvider>),
}

/// Conversion between a concrete cached type and `CacheValue`
pub trait Cached: Sized + Send + Sync + 'static
{
    fn wrap(value: Arc<Self>) -> CacheValue;
    fn peel(value: &CacheValue) -> Option<Arc<Self>>;
}

impl Cached for ProjectScan
{
    fn wrap(value: Arc<Self>) -> CacheValue
    {
        CacheValue::Scan(value)
    }

    fn peel(value: &CacheValue) -> Option<Arc<Self>>
    {
        match value
        {
            CacheValue::Scan(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Cached for ReverseImportIndex
{
    fn wrap(value: Arc<Self>) -> CacheValue
    {
        CacheValue::ReverseIndex(value)
    }

    fn peel(value: &CacheValue) -> Option<Arc<Self>>
    {
        match value
        {
            CacheValue::ReverseIndex(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Cached for ImportList
{
    fn wrap(value: Arc<Self>) -> CacheValue
    {
        CacheValue::Imports(value)
    }

    fn peel(value: &CacheValue) -> Option<Arc<Self>>
    {
        match value
        {
            CacheValue::Imports(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

impl Cached for LocalSymbolProvider
{
    fn wrap(value: Arc<Self>) -> CacheValue
    {
        CacheValue::Symbols(value)
    }

    fn peel(value: &CacheValue) -> Option<Arc<Self>>
    {
        match value
        {
            CacheValue::Symbols(v) => Some(Arc::clone(v)),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct Entry
{
    value: CacheValue,
    tags: SmallVec<[CacheTag; 2]>,
    expires_at: Instant,
}

/// Injected cache object; cheap to share behind an `Arc`
pub struct ProjectCache
{
    /// `None` = disabled (always miss)
    inner: Option<Cache<CacheKey, Entry>>,

    /// TTL applied when the caller does not pass one
    default_ttl: Duration,
}

impl ProjectCache
{
    pub fn new(
        capacity: u64,
        default_ttl: Duration,
    ) -> Self
    {
        let inner = Cache::builder()
            .max_capacity(capacity.max(1))
            .support_invalidation_closures()
            .build();
        Self { inner: Some(inner), default_ttl }
    }

    pub fn disabled() -> Self
    {
        Self { inner: None, default_ttl: Duration::ZERO }
    }

    pub fn from_config(cfg: &crate::infra::config::CacheConfig) -> Self
    {
        if cfg.enabled
        {
            Self::new(cfg.capacity, Duration::from_secs(cfg.ttl_secs))
        }
        else
        {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool
    {
        self.inner
            .is_some()
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// Expired entries and kind mismatches count as misses.
    pub fn get_or_compute<T, F>(
        &self,
        key: CacheKey,
        ttl: Option<Duration>,
        tags: &[CacheTag],
        compute: F,
    ) -> Arc<T>
    where
        T: Cached,
        F: FnOnce() -> T,
    {
        let Some(cache) = &self.inner
        else
        {
            return Arc::new(compute());
        };

        if let Some(entry) = cache.get(&key)
        {
            if entry.expires_at > Instant::now()
                && let Some(hit) = T::peel(&entry.value)
            {
                trace!(kind = ?key.kind, path = %key.path.display(), "cache hit");
                return hit;
            }
            cache.invalidate(&key);
        }

        let value = Arc::new(compute());
        let entry = Entry {
            value: T::wrap(Arc::clone(&value)),
            tags: tags
                .iter()
                .cloned()
                .collect(),
            expires_at: Instant::now() + ttl.unwrap_or(self.default_ttl),
        };
        cache.insert(key, entry);
        value
    }

    /// Drop every entry carrying `tag`
    pub fn invalidate_tag(
        &self,
        tag: &CacheTag,
    )
    {
        let Some(cache) = &self.inner
        else
        {
            return;
        };

        if *tag == CacheTag::Project
        {
            cache.invalidate_all();
            return;
        }

        let needle = tag.clone();
        if let Err(err) = cache.invalidate_entries_if(move |_, entry: &Entry| {
            entry
                .tags
                .contains(&needle)
        })
        {
            // Closure invalidation unavailable; fall back to a full flush
            warn!(%err, "tag invalidation failed, flushing cache");
            cache.invalidate_all();
        }
    }

    /// Drop entries derived from one file, plus project-wide aggregates
    /// (scans, reverse indexes, declaration indexes) that folded it in
    pub fn invalidate_file(
        &self,
        path: &Path,
    )
    {
        let Some(cache) = &self.inner
        else
        {
            return;
        };

        let needle = CacheTag::File(path.to_path_buf());
        if let Err(err) = cache.invalidate_entries_if(move |key: &CacheKey, entry: &Entry| {
            key.kind != CacheKind::Imports
                || entry
                    .tags
                    .contains(&needle)
        })
        {
            warn!(%err, "file invalidation failed, flushing cache");
            cache.invalidate_all();
        }
    }
}
