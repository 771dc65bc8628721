// # Core Identifiers
//
// Newtype wrappers for the handful of IDs that flow through the equivalence
// map. Kept as thin wrappers (rather than bare u64/u8) so the compiler
// catches a supervoxel id handed to a function expecting a label, and so
// that serialization and Debug output stay self-describing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Atomic 64-bit segmentation region identifier. Never split except by an
/// explicit supervoxel-split mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Supervoxel(pub u64);

/// 64-bit identifier of an aggregate body. Opaque, equal-by-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label(pub u64);

/// Instance-global identifier for one node of the version DAG, as handed
/// back by the `VersionGraph` collaborator. Opaque and immutable once
/// created; this crate never constructs one itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub u64);

/// SVMap-local 8-bit alias for a `VersionId`, assigned monotonically on
/// first observation and never recycled. Keeps `VMap` entries to 9 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShortVersionId(pub u8);

/// Caller-supplied identifier for one mutation, unique per version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutationId(pub u64);

/// UUID naming one equivalence-map instance (one segmentation data
/// instance, in DVID terms). Keys the `InstanceRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl From<u64> for Supervoxel {
    fn from(v: u64) -> Self {
        Supervoxel(v)
    }
}

impl From<u64> for Label {
    fn from(v: u64) -> Self {
        Label(v)
    }
}

impl From<Supervoxel> for Label {
    /// An unmapped supervoxel maps to itself; this conversion makes that
    /// identity mapping explicit at call sites that need a `Label`.
    fn from(sv: Supervoxel) -> Self {
        Label(sv.0)
    }
}
