// SVMap - version-aware supervoxel/label equivalence map
//
// Core library module for a compact, concurrency-safe mapping from
// supervoxel to label that is correct across every version of a
// content-versioned DAG of immutable snapshots. See DESIGN.md for the
// grounding ledger.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod log_store;
pub mod mutate;
pub mod registry;
pub mod repair;
pub mod replay;
pub mod svmap;
pub mod types;
pub mod version_graph;
pub mod vmap;

pub use error::{Result, SvmapError};
pub use mutate::MutationApplier;
pub use registry::InstanceRegistry;
pub use svmap::SVMap;
pub use types::{InstanceId, Label, MutationId, ShortVersionId, Supervoxel, VersionId};

/// Crate version, re-exported for diagnostics/banners the way the source
/// repository's `VERSION` constant is.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
