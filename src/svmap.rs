// # SVMap — per-instance equivalence-map state
//
// Holds every supervoxel's VMap, the VersionId<->ShortVersionId bijection,
// and a cache of ancestry-to-short-ids lookups, all behind one read/write
// lock. One SVMap per datastore instance, owned exclusively by the
// `InstanceRegistry`.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Result, SvmapError};
use crate::types::{Label, ShortVersionId, Supervoxel, VersionId};
use crate::version_graph::VersionGraph;
use crate::vmap::VMap;

struct SvmapInner {
    fm: HashMap<Supervoxel, VMap>,
    versions: HashMap<VersionId, ShortVersionId>,
    versions_rev: HashMap<ShortVersionId, VersionId>,
    ancestry: HashMap<VersionId, Vec<ShortVersionId>>,
    num_versions: u8,
}

impl SvmapInner {
    fn new() -> Self {
        SvmapInner {
            fm: HashMap::new(),
            versions: HashMap::new(),
            versions_rev: HashMap::new(),
            ancestry: HashMap::new(),
            num_versions: 0,
        }
    }
}

/// Version-aware supervoxel map for one datastore instance. Every public
/// method takes care of its own locking; callers never see the guard.
pub struct SVMap {
    inner: RwLock<SvmapInner>,
}

impl SVMap {
    pub fn new() -> Self {
        SVMap {
            inner: RwLock::new(SvmapInner::new()),
        }
    }

    fn allocate_short_locked(inner: &mut SvmapInner, v: VersionId) -> Result<ShortVersionId> {
        if let Some(&short) = inner.versions.get(&v) {
            return Ok(short);
        }
        if inner.num_versions == 255 {
            return Err(SvmapError::VersionCapacityExceeded);
        }
        let short = ShortVersionId(inner.num_versions);
        inner.versions.insert(v, short);
        inner.versions_rev.insert(short, v);
        inner.num_versions += 1;
        Ok(short)
    }

    fn modify_locked(inner: &mut SvmapInner, sv: Supervoxel, vid: ShortVersionId, label: Label) -> bool {
        let current = inner.fm.get(&sv).cloned().unwrap_or_default();
        let (new_vm, changed) = current.modify(vid, label);
        if changed {
            inner.fm.insert(sv, new_vm);
        }
        changed
    }

    /// Take the write lock once and hand back a guard that allocates
    /// short-ids and applies `modify` calls within that single critical
    /// section — the shape `addMergeToMapping`/`addSplitToMapping`/etc. and
    /// log replay both need: one lock acquisition spanning an entire batch
    /// of updates, so a concurrent reader never observes half of a
    /// multi-supervoxel mutation applied and half not.
    pub fn write(&self) -> SvmapWriteGuard<'_> {
        SvmapWriteGuard {
            inner: self.inner.write(),
        }
    }

    /// Assign (or return the existing) short-id for `v`. Fails once 255
    /// versions are already resident — the 256th slot (index 255) is never
    /// handed out.
    pub fn allocate_short(&self, v: VersionId) -> Result<ShortVersionId> {
        self.write().allocate_short(v)
    }

    /// True if `v` already has an allocated short-id (i.e. has been loaded).
    pub fn has_version(&self, v: VersionId) -> bool {
        self.inner.read().versions.contains_key(&v)
    }

    pub fn num_versions(&self) -> u8 {
        self.inner.read().num_versions
    }

    /// Ordered short-ids of ancestors (including `v` itself, if named) that
    /// have mappings, current version first, root-ward after. Queries
    /// `graph` only on cache miss; ancestry is immutable once cached for a
    /// given `v`.
    pub fn ancestry_of(&self, v: VersionId, graph: &dyn VersionGraph) -> Result<Vec<ShortVersionId>> {
        let mut inner = self.inner.write();
        let cached = if let Some(c) = inner.ancestry.get(&v) {
            c.clone()
        } else {
            let ancestors = graph.ancestry(v)?;
            let mut short_ids = Vec::new();
            for ancestor in ancestors.iter().skip(1) {
                if let Some(&short) = inner.versions.get(ancestor) {
                    short_ids.push(short);
                }
            }
            inner.ancestry.insert(v, short_ids.clone());
            short_ids
        };
        if let Some(&short_v) = inner.versions.get(&v) {
            let mut out = Vec::with_capacity(cached.len() + 1);
            out.push(short_v);
            out.extend(cached);
            Ok(out)
        } else {
            Ok(cached)
        }
    }

    /// Resolve one supervoxel under an already-computed ancestry list.
    /// `(original-id, false)` when unmapped — self-mapping is not an error.
    pub fn map_one(&self, sv: Supervoxel, ancestry: &[ShortVersionId]) -> (Label, bool) {
        let inner = self.inner.read();
        match inner.fm.get(&sv) {
            None => (Label::from(sv), false),
            Some(vm) => match vm.value(ancestry) {
                Some(label) => (label, true),
                None => (Label::from(sv), false),
            },
        }
    }

    /// Resolve every supervoxel in `svs` as seen from `v`, looking up
    /// ancestry once and resolving each supervoxel under a read lock.
    pub fn map_many(
        &self,
        v: VersionId,
        svs: &[Supervoxel],
        graph: &dyn VersionGraph,
    ) -> Result<Vec<Label>> {
        let ancestry = self.ancestry_of(v, graph)?;
        let inner = self.inner.read();
        if inner.fm.is_empty() {
            return Ok(svs.iter().map(|&sv| Label::from(sv)).collect());
        }
        Ok(svs
            .iter()
            .map(|&sv| match inner.fm.get(&sv) {
                None => Label::from(sv),
                Some(vm) => vm.value(&ancestry).unwrap_or_else(|| Label::from(sv)),
            })
            .collect())
    }

    /// True iff this instance is likely to have some mapping visible from
    /// `v` — an empty `fm` or a version with no named ancestor means false.
    pub fn exists(&self, v: VersionId, graph: &dyn VersionGraph) -> Result<bool> {
        let ancestry = self.ancestry_of(v, graph)?;
        let inner = self.inner.read();
        Ok(!inner.fm.is_empty() && !ancestry.is_empty())
    }

    /// Record `label` for `sv` at short-version `vid`. A missing `sv` is
    /// treated as the empty VMap (mirrors the Go source's default-zero-value
    /// map semantics, made explicit rather than implicit). Returns whether
    /// the VMap actually changed.
    pub fn modify(&self, sv: Supervoxel, vid: ShortVersionId, label: Label) -> bool {
        self.write().modify(sv, vid, label)
    }
}

impl Default for SVMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-lock guard over one `SVMap`'s state. Held across an entire batch of
/// `allocate_short`/`modify` calls so a multi-supervoxel mutation, or a full
/// ancestor log replay, applies as one atomic critical section instead of
/// acquiring and releasing the lock per supervoxel.
pub struct SvmapWriteGuard<'a> {
    inner: parking_lot::RwLockWriteGuard<'a, SvmapInner>,
}

impl<'a> SvmapWriteGuard<'a> {
    pub fn allocate_short(&mut self, v: VersionId) -> Result<ShortVersionId> {
        SVMap::allocate_short_locked(&mut self.inner, v)
    }

    pub fn modify(&mut self, sv: Supervoxel, vid: ShortVersionId, label: Label) -> bool {
        SVMap::modify_locked(&mut self.inner, sv, vid, label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version_graph::InMemoryVersionGraph;

    fn graph_with_chain(n: u64) -> (InMemoryVersionGraph, Vec<VersionId>) {
        let mut g = InMemoryVersionGraph::new();
        let ids: Vec<VersionId> = (0..n).map(VersionId).collect();
        g.add_root(ids[0]);
        for i in 1..ids.len() {
            g.add_child(ids[i], ids[i - 1]);
        }
        (g, ids)
    }

    #[test]
    fn allocate_short_is_monotonic_and_stable() {
        let svm = SVMap::new();
        let v0 = VersionId(10);
        let v1 = VersionId(11);
        let s0 = svm.allocate_short(v0).unwrap();
        let s1 = svm.allocate_short(v1).unwrap();
        assert_eq!(s0, ShortVersionId(0));
        assert_eq!(s1, ShortVersionId(1));
        assert_eq!(svm.allocate_short(v0).unwrap(), s0);
        assert_eq!(svm.num_versions(), 2);
    }

    #[test]
    fn capacity_exhaustion_fails_at_256th() {
        let svm = SVMap::new();
        for i in 0..255u64 {
            svm.allocate_short(VersionId(i)).unwrap();
        }
        assert_eq!(svm.num_versions(), 255);
        let err = svm.allocate_short(VersionId(9999)).unwrap_err();
        assert!(matches!(err, SvmapError::VersionCapacityExceeded));
        assert_eq!(svm.num_versions(), 255);
    }

    #[test]
    fn missing_supervoxel_self_maps() {
        let svm = SVMap::new();
        let (g, ids) = graph_with_chain(1);
        svm.allocate_short(ids[0]).unwrap();
        let (label, found) = svm.map_one(Supervoxel(42), &svm.ancestry_of(ids[0], &g).unwrap());
        assert!(!found);
        assert_eq!(label, Label(42));
    }

    #[test]
    fn descendant_mapping_shadows_ancestor() {
        let svm = SVMap::new();
        let (g, ids) = graph_with_chain(2);
        let s0 = svm.allocate_short(ids[0]).unwrap();
        let s1 = svm.allocate_short(ids[1]).unwrap();
        svm.modify(Supervoxel(10), s0, Label(100));
        svm.modify(Supervoxel(10), s1, Label(200));

        assert_eq!(
            svm.map_many(ids[0], &[Supervoxel(10)], &g).unwrap(),
            vec![Label(100)]
        );
        assert_eq!(
            svm.map_many(ids[1], &[Supervoxel(10)], &g).unwrap(),
            vec![Label(200)]
        );
    }

    #[test]
    fn never_named_version_returns_input_unchanged() {
        let svm = SVMap::new();
        let (g, ids) = graph_with_chain(1);
        // svm never allocates a short-id for ids[0] and never writes a mapping.
        let mapped = svm.map_many(ids[0], &[Supervoxel(7)], &g).unwrap();
        assert_eq!(mapped, vec![Label(7)]);
        assert!(!svm.exists(ids[0], &g).unwrap());
    }
}
