// # VMap — compact per-supervoxel versioned mapping
//
// A VMap holds every `(ShortVersionId, Label)` pair ever written for one
// supervoxel, packed as a flat byte sequence: 9 bytes per entry, `[short-id
// u8][label u64 little-endian]`, in insertion order. Most supervoxels are
// never remapped, so the empty VMap costs zero bytes; for the ones that are,
// the entry count stays tiny (typically 1-3), so a linear scan beats the
// overhead of a hash map.

use crate::types::{Label, ShortVersionId};

const ENTRY_LEN: usize = 9;

/// Immutable, value-type compact encoding of `{short-version -> label}` for
/// one supervoxel. Cloning copies the backing bytes; there is no sharing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VMap(Vec<u8>);

impl VMap {
    /// The empty mapping: no version has ever written a label for this
    /// supervoxel.
    pub fn new() -> Self {
        VMap(Vec::new())
    }

    fn entries(&self) -> impl Iterator<Item = (ShortVersionId, Label)> + '_ {
        self.0.chunks_exact(ENTRY_LEN).map(|chunk| {
            let short = ShortVersionId(chunk[0]);
            let mut label_bytes = [0u8; 8];
            label_bytes.copy_from_slice(&chunk[1..ENTRY_LEN]);
            (short, Label(u64::from_le_bytes(label_bytes)))
        })
    }

    /// Resolve the label visible from `ancestry`, an ordered list of
    /// short-version ids running from the queried version toward the root.
    /// Returns the label of the first ancestor (in that order) that has an
    /// entry here — a descendant's mapping shadows an ancestor's. Returns
    /// `None` if no ancestor in the list has ever written this supervoxel.
    pub fn value(&self, ancestry: &[ShortVersionId]) -> Option<Label> {
        if self.0.is_empty() {
            return None;
        }
        for &vid in ancestry {
            for (entry_vid, label) in self.entries() {
                if entry_vid == vid {
                    return Some(label);
                }
            }
        }
        None
    }

    /// Produce the VMap that results from recording `label` for `vid`.
    ///
    /// If `vid` already maps to `label`, returns a clone of `self` unchanged
    /// and `changed = false` (idempotent). If `vid` has a different label,
    /// returns a new VMap with that entry's label overwritten. If `vid` has
    /// no entry, appends one. `self` is never mutated; the returned value is
    /// authoritative.
    pub fn modify(&self, vid: ShortVersionId, label: Label) -> (VMap, bool) {
        for (pos, (entry_vid, entry_label)) in self.entries().enumerate() {
            if entry_vid == vid {
                if entry_label == label {
                    return (self.clone(), false);
                }
                let mut out = self.0.clone();
                let start = pos * ENTRY_LEN + 1;
                out[start..start + 8].copy_from_slice(&label.0.to_le_bytes());
                return (VMap(out), true);
            }
        }
        let mut out = Vec::with_capacity(self.0.len() + ENTRY_LEN);
        out.extend_from_slice(&self.0);
        out.push(vid.0);
        out.extend_from_slice(&label.0.to_le_bytes());
        (VMap(out), true)
    }

    /// Number of `(short-version, label)` entries currently stored. Exposed
    /// mainly for tests and diagnostics.
    pub fn len(&self) -> usize {
        self.0.len() / ENTRY_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(id: u8) -> ShortVersionId {
        ShortVersionId(id)
    }

    fn lb(id: u64) -> Label {
        Label(id)
    }

    #[test]
    fn empty_vmap_resolves_nothing() {
        let vm = VMap::new();
        assert_eq!(vm.value(&[sv(0), sv(1)]), None);
        assert!(vm.is_empty());
    }

    #[test]
    fn modify_appends_new_entry() {
        let vm = VMap::new();
        let (vm, changed) = vm.modify(sv(3), lb(100));
        assert!(changed);
        assert_eq!(vm.len(), 1);
        assert_eq!(vm.value(&[sv(3)]), Some(lb(100)));
    }

    #[test]
    fn modify_is_idempotent() {
        let vm = VMap::new();
        let (vm, _) = vm.modify(sv(3), lb(100));
        let (vm2, changed) = vm.modify(sv(3), lb(100));
        assert!(!changed);
        assert_eq!(vm2, vm);
    }

    #[test]
    fn modify_overwrites_same_version_label() {
        let vm = VMap::new();
        let (vm, _) = vm.modify(sv(3), lb(100));
        let (vm, changed) = vm.modify(sv(3), lb(200));
        assert!(changed);
        assert_eq!(vm.len(), 1);
        assert_eq!(vm.value(&[sv(3)]), Some(lb(200)));
    }

    #[test]
    fn ancestry_order_shadows_ancestor() {
        let vm = VMap::new();
        let (vm, _) = vm.modify(sv(0), lb(100)); // written at parent
        let (vm, _) = vm.modify(sv(1), lb(200)); // written at child
        // Queried from the child: child's own entry shadows the parent's.
        assert_eq!(vm.value(&[sv(1), sv(0)]), Some(lb(200)));
        // Queried from the parent alone: parent's mapping is unaffected.
        assert_eq!(vm.value(&[sv(0)]), Some(lb(100)));
    }

    #[test]
    fn no_entry_for_any_ancestor_returns_none() {
        let vm = VMap::new();
        let (vm, _) = vm.modify(sv(5), lb(999));
        assert_eq!(vm.value(&[sv(0), sv(1), sv(2)]), None);
    }
}
