//! Reverse import index: target → distinct importers.
//!
//! Derived purely from forward extraction. The forward map is kept alongside
//! so a single source can be removed or re-indexed without a full rebuild
//! and without leaving edges from a deleted file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseImportIndex {
    /// source → resolved targets (deduped, extraction order)
    forward: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// target → importers (sorted, deduped)
    importers: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl ReverseImportIndex {
    pub fn from_forward<I>(forward: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, Vec<PathBuf>)>,
    {
        let mut index = Self::default();
        for (source, targets) in forward {
            index.update_source(source, targets);
        }
        index
    }

    /// Files importing `target`
    pub fn importers_of(&self, target: &Path) -> &[PathBuf] {
        self.importers.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolved imports of `source`, if it was indexed
    pub fn imports_of(&self, source: &Path) -> Option<&[PathBuf]> {
        self.forward.get(source).map(Vec::as_slice)
    }

    /// Drop every edge contributed by `source`
    pub fn remove_source(&mut self, source: &Path) {
        let Some(targets) = self.forward.remove(source) else {
            return;
        };
        for target in targets {
            if let Some(list) = self.importers.get_mut(&target) {
                list.retain(|s| s != source);
                if list.is_empty() {
                    self.importers.remove(&target);
                }
            }
        }
    }

    /// Replace the edges of one source with a fresh set of targets
    pub fn update_source(&mut self, source: PathBuf, targets: Vec<PathBuf>) {
        self.remove_source(&source);

        let mut deduped: Vec<PathBuf> = Vec::with_capacity(targets.len());
        for t in targets {
            if t != source && !deduped.contains(&t) {
                deduped.push(t);
            }
        }

        for target in &deduped {
            let list = self.importers.entry(target.clone()).or_default();
            if let Err(pos) = list.binary_search(&source) {
                list.insert(pos, source.clone());
            }
        }
        self.forward.insert(source, deduped);
    }

    /// Number of indexed source files
    pub fn sources(&self) -> usize {
        self.forward.len()
    }

    /// Number of distinct (source, target) edges
    pub fn edge_count(&self) -> usize {
        self.forward.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn importers_are_distinct_and_sorted() {
        let index = ReverseImportIndex::from_forward([
            (p("/c.py"), vec![p("/a.py"), p("/a.py")]),
            (p("/b.py"), vec![p("/a.py"), p("/b.py")]),
        ]);
        assert_eq!(index.importers_of(Path::new("/a.py")), &[p("/b.py"), p("/c.py")]);
        // Self-imports never become edges
        assert!(index.importers_of(Path::new("/b.py")).is_empty());
        assert_eq!(index.edge_count(), 2);
    }

    #[test]
    fn remove_source_leaves_no_stale_edges() {
        let mut index = ReverseImportIndex::from_forward([
            (p("/b.py"), vec![p("/a.py")]),
            (p("/c.py"), vec![p("/a.py")]),
        ]);
        index.remove_source(Path::new("/b.py"));
        assert_eq!(index.importers_of(Path::new("/a.py")), &[p("/c.py")]);
        index.remove_source(Path::new("/c.py"));
        assert!(index.importers_of(Path::new("/a.py")).is_empty());
        assert_eq!(index, ReverseImportIndex::default());
    }

    #[test]
    fn update_source_replaces_targets() {
        let mut index = ReverseImportIndex::from_forward([(p("/b.py"), vec![p("/a.py")])]);
        index.update_source(p("/b.py"), vec![p("/z.py")]);
        assert!(index.importers_of(Path::new("/a.py")).is_empty());
        assert_eq!(index.importers_of(Path::new("/z.py")), &[p("/b.py")]);
        assert_eq!(index.imports_of(Path::new("/b.py")), Some(&[p("/z.py")][..]));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let forward = vec![
            (p("/b.py"), vec![p("/a.py")]),
            (p("/a.py"), vec![p("/b.py")]),
        ];
        let first = ReverseImportIndex::from_forward(forward.clone());
        let second = ReverseImportIndex::from_forward(forward);
        assert_eq!(first, second);
    }
}
