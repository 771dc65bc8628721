// # VersionGraph collaborator
//
// The DAG of immutable versions and its ancestry queries live outside this
// crate in a real deployment. This module defines the trait boundary this
// crate consumes and ships an in-memory reference implementation so the
// crate is testable standalone.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{Result, SvmapError};
use crate::types::VersionId;

/// Ancestry and UUID-resolution surface the equivalence map consumes from
/// the datastore's version DAG. Implementations must return `ancestry`
/// root-ward, starting with `v` itself.
pub trait VersionGraph: Send + Sync {
    /// List of versions from `v` to the DAG root, inclusive, in root-ward
    /// order: `[v, parent(v), grandparent(v), ..., root]`.
    fn ancestry(&self, v: VersionId) -> Result<Vec<VersionId>>;

    /// Resolve an external UUID to its instance-global `VersionId`.
    fn version_from_uuid(&self, uuid: Uuid) -> Result<VersionId>;
}

/// Simple parent-pointer DAG used by this crate's own tests, and a
/// reasonable starting point for wiring a real version store.
#[derive(Debug, Default)]
pub struct InMemoryVersionGraph {
    parents: HashMap<VersionId, Option<VersionId>>,
    uuids: HashMap<Uuid, VersionId>,
}

impl InMemoryVersionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `v` as a root (no parent).
    pub fn add_root(&mut self, v: VersionId) {
        self.parents.insert(v, None);
    }

    /// Register `v` as a child of `parent`. `parent` must already be known.
    pub fn add_child(&mut self, v: VersionId, parent: VersionId) {
        self.parents.insert(v, Some(parent));
    }

    pub fn bind_uuid(&mut self, uuid: Uuid, v: VersionId) {
        self.uuids.insert(uuid, v);
    }
}

impl VersionGraph for InMemoryVersionGraph {
    fn ancestry(&self, v: VersionId) -> Result<Vec<VersionId>> {
        let mut chain = Vec::new();
        let mut cur = Some(v);
        while let Some(id) = cur {
            let parent = self.parents.get(&id).ok_or_else(|| {
                SvmapError::AncestryUnavailable(v, format!("unknown version {:?}", id))
            })?;
            chain.push(id);
            cur = *parent;
        }
        Ok(chain)
    }

    fn version_from_uuid(&self, uuid: Uuid) -> Result<VersionId> {
        self.uuids
            .get(&uuid)
            .copied()
            .ok_or_else(|| SvmapError::AncestryUnavailable(VersionId(0), format!("unbound uuid {uuid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestry_walks_to_root() {
        let mut g = InMemoryVersionGraph::new();
        let root = VersionId(0);
        let child = VersionId(1);
        let grandchild = VersionId(2);
        g.add_root(root);
        g.add_child(child, root);
        g.add_child(grandchild, child);

        assert_eq!(g.ancestry(grandchild).unwrap(), vec![grandchild, child, root]);
        assert_eq!(g.ancestry(root).unwrap(), vec![root]);
    }

    #[test]
    fn unknown_version_errors() {
        let g = InMemoryVersionGraph::new();
        assert!(g.ancestry(VersionId(42)).is_err());
    }
}
