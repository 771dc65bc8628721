// # InstanceRegistry — process-wide resident state
//
// Process-wide `InstanceUUID -> SVMap`. `get_mapping` creates the SVMap on
// first request and lazily replays every not-yet-loaded ancestor's
// mutation log before returning it, so the caller always sees a map that
// covers the requested version. Not a hidden global: the registry is
// constructed explicitly and handed around by reference, and tests
// construct their own.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::diagnostics::{DiagnosticSink, TracingDiagnosticSink};
use crate::error::Result;
use crate::log_store::LogStore;
use crate::replay::LogReplayer;
use crate::svmap::SVMap;
use crate::types::{InstanceId, VersionId};
use crate::version_graph::VersionGraph;

/// Process-wide registry of resident `SVMap`s, one per datastore instance.
/// Uses a `DashMap` rather than `Arc<RwLock<HashMap<_, _>>>` so that
/// resolving one instance's map never blocks lookups for any other instance
/// (the migration this crate's source repository documents in
/// `common/concurrent_map.rs`'s "Manager with Registry" pattern).
pub struct InstanceRegistry {
    maps: DashMap<Uuid, Arc<SVMap>>,
    graph: Arc<dyn VersionGraph>,
    log_store: Arc<dyn LogStore>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl InstanceRegistry {
    pub fn new(graph: Arc<dyn VersionGraph>, log_store: Arc<dyn LogStore>) -> Self {
        InstanceRegistry {
            maps: DashMap::new(),
            graph,
            log_store,
            diagnostics: Arc::new(TracingDiagnosticSink),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn graph(&self) -> &dyn VersionGraph {
        self.graph.as_ref()
    }

    pub fn log_store(&self) -> &dyn LogStore {
        self.log_store.as_ref()
    }

    /// Return the SVMap for `instance`, creating it if absent, then
    /// initialise it to cover `v` by replaying every not-yet-loaded
    /// ancestor's mutation log. The DashMap shard lock used to
    /// create-if-absent is released before initialisation begins, so
    /// initialising one instance never serialises lookups for another.
    pub fn get_mapping(&self, instance: InstanceId, v: VersionId) -> Result<Arc<SVMap>> {
        let svm = {
            self.maps
                .entry(instance.0)
                .or_insert_with(|| Arc::new(SVMap::new()))
                .clone()
        };
        self.init_to_version(&svm, instance, v)?;
        Ok(svm)
    }

    /// Walk ancestors of `v` toward the root, replaying the log of each one
    /// not yet loaded, stopping at the first ancestor that already has a
    /// short-id (its own ancestors were necessarily loaded when it was).
    fn init_to_version(&self, svm: &SVMap, instance: InstanceId, v: VersionId) -> Result<()> {
        let ancestors = self.graph.ancestry(v)?;
        let replayer = LogReplayer::new(self.diagnostics.clone());
        for ancestor in ancestors {
            if svm.has_version(ancestor) {
                return Ok(());
            }
            let vid = svm.allocate_short(ancestor)?;
            replayer.replay_into(svm, instance, ancestor, vid, self.log_store.as_ref())?;
            tracing::info!(instance = %instance.0, version = ?ancestor, "loaded mapping log for ancestor version");
        }
        Ok(())
    }

    /// Snapshot of resident instance UUIDs, for diagnostics/tests.
    pub fn resident_instances(&self) -> Vec<Uuid> {
        self.maps.iter().map(|e| *e.key()).collect()
    }
}

/// Convenience constructor wiring both collaborators as the in-memory
/// reference implementations this crate ships, for standalone use and
/// tests that don't need a real DAG store or broker.
pub fn in_memory_registry() -> (
    InstanceRegistry,
    Arc<parking_lot::Mutex<crate::version_graph::InMemoryVersionGraph>>,
    Arc<crate::log_store::InMemoryLogStore>,
) {
    let graph = Arc::new(parking_lot::Mutex::new(crate::version_graph::InMemoryVersionGraph::new()));
    let log_store = crate::log_store::InMemoryLogStore::new();
    let registry = InstanceRegistry::new(Arc::new(LockedGraph(graph.clone())), log_store.clone());
    (registry, graph, log_store)
}

/// Adapter so tests can keep mutating an `InMemoryVersionGraph` (adding
/// versions as a DAG grows) while handing the registry a stable
/// `Arc<dyn VersionGraph>`.
struct LockedGraph(Arc<parking_lot::Mutex<crate::version_graph::InMemoryVersionGraph>>);

impl VersionGraph for LockedGraph {
    fn ancestry(&self, v: VersionId) -> Result<Vec<VersionId>> {
        self.0.lock().ancestry(v)
    }

    fn version_from_uuid(&self, uuid: Uuid) -> Result<VersionId> {
        self.0.lock().version_from_uuid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_store::{LogRecord, MappingOp};
    use crate::types::{Label, MutationId, Supervoxel};

    #[test]
    fn get_mapping_creates_and_reuses_instance() {
        let (registry, graph, _log_store) = in_memory_registry();
        let v0 = VersionId(0);
        graph.lock().add_root(v0);

        let instance = InstanceId(Uuid::new_v4());
        let svm1 = registry.get_mapping(instance, v0).unwrap();
        let svm2 = registry.get_mapping(instance, v0).unwrap();
        assert!(Arc::ptr_eq(&svm1, &svm2));
        assert_eq!(registry.resident_instances(), vec![instance.0]);
    }

    #[test]
    fn init_to_version_replays_ancestor_logs_lazily() {
        let (registry, graph, log_store) = in_memory_registry();
        let v0 = VersionId(0);
        let v1 = VersionId(1);
        graph.lock().add_root(v0);
        graph.lock().add_child(v1, v0);

        let instance = InstanceId(Uuid::new_v4());

        // Seed a mapping log at v0 before anything observes this instance.
        let op = MappingOp {
            mutation_id: MutationId(1),
            mapped: Label(100),
            originals: vec![Supervoxel(10)],
        };
        log_store.append(instance, v0, LogRecord::mapping_op(&op).unwrap()).unwrap();

        let svm = registry.get_mapping(instance, v1).unwrap();
        let ancestry = svm.ancestry_of(v1, registry.graph()).unwrap();
        let (label, found) = svm.map_one(Supervoxel(10), &ancestry);
        assert!(found);
        assert_eq!(label, Label(100));

        // A second request for the same (already-loaded) version must not
        // re-replay: has_version(v0) short-circuits init_to_version.
        let svm_again = registry.get_mapping(instance, v1).unwrap();
        assert!(Arc::ptr_eq(&svm, &svm_again));
    }
}
