// # MutationApplier — the four mutation operations
//
// Merge, arbitrary split, cleave, and supervoxel-split each resolve the
// target SVMap, take its write lock once via `SVMap::write` and apply every
// affected-supervoxel -> label write for the operation within that single
// critical section (so a concurrent reader never observes a multi-supervoxel
// mutation half-applied), then release the lock and append one or more
// MappingOp records to the mutation log. The guard is RAII-scoped so every
// exit path, including an early `?` return, releases the lock. A log-append
// failure is archived to a `failed-<topic>` sink and surfaced to the caller,
// but the in-memory mutation already applied stands — durability lags
// memory by design.

use std::sync::Arc;

use crate::error::{Result, SvmapError};
use crate::log_store::{failed_topic_name, LogRecord, MappingOp};
use crate::registry::InstanceRegistry;
use crate::types::{InstanceId, Label, MutationId, Supervoxel, VersionId};

pub struct MutationApplier {
    registry: Arc<InstanceRegistry>,
}

impl MutationApplier {
    pub fn new(registry: Arc<InstanceRegistry>) -> Self {
        MutationApplier { registry }
    }

    /// All supervoxels of the merged index map to `merged_label`. A single
    /// MappingOp records the whole set. Empty `supervoxels` is a no-op: no
    /// version is touched and nothing is logged.
    pub fn merge(
        &self,
        instance: InstanceId,
        v: VersionId,
        mutation_id: MutationId,
        supervoxels: &[Supervoxel],
        merged_label: Label,
    ) -> Result<()> {
        if supervoxels.is_empty() {
            return Ok(());
        }
        let svm = self.registry.get_mapping(instance, v)?;
        {
            let mut guard = svm.write();
            let vid = guard.allocate_short(v)?;
            for &sv in supervoxels {
                guard.modify(sv, vid, merged_label);
            }
        }
        let op = MappingOp {
            mutation_id,
            mapped: merged_label,
            originals: supervoxels.to_vec(),
        };
        self.append_or_archive(instance, v, &op)
    }

    /// Arbitrary split: each `(split_sv, remain_sv)` pair sends `split_sv`
    /// to `split_label` and `remain_sv` to `remain_label`. Two MappingOps
    /// are logged, one per destination label.
    pub fn split(
        &self,
        instance: InstanceId,
        v: VersionId,
        mutation_id: MutationId,
        splits: &[(Supervoxel, Supervoxel)],
        split_label: Label,
        remain_label: Label,
    ) -> Result<()> {
        if splits.is_empty() {
            return Ok(());
        }
        let svm = self.registry.get_mapping(instance, v)?;
        let mut split_set = Vec::with_capacity(splits.len());
        let mut remain_set = Vec::with_capacity(splits.len());
        {
            let mut guard = svm.write();
            let vid = guard.allocate_short(v)?;
            for &(split_sv, remain_sv) in splits {
                guard.modify(split_sv, vid, split_label);
                split_set.push(split_sv);
                guard.modify(remain_sv, vid, remain_label);
                remain_set.push(remain_sv);
            }
        }
        let split_op = MappingOp {
            mutation_id,
            mapped: split_label,
            originals: split_set,
        };
        self.append_or_archive(instance, v, &split_op)?;
        let remain_op = MappingOp {
            mutation_id,
            mapped: remain_label,
            originals: remain_set,
        };
        self.append_or_archive(instance, v, &remain_op)
    }

    /// Each cleaved supervoxel maps to `cleaved_label`. One MappingOp.
    pub fn cleave(
        &self,
        instance: InstanceId,
        v: VersionId,
        mutation_id: MutationId,
        cleaved_supervoxels: &[Supervoxel],
        cleaved_label: Label,
    ) -> Result<()> {
        if cleaved_supervoxels.is_empty() {
            return Ok(());
        }
        let svm = self.registry.get_mapping(instance, v)?;
        {
            let mut guard = svm.write();
            let vid = guard.allocate_short(v)?;
            for &sv in cleaved_supervoxels {
                guard.modify(sv, vid, cleaved_label);
            }
        }
        let op = MappingOp {
            mutation_id,
            mapped: cleaved_label,
            originals: cleaved_supervoxels.to_vec(),
        };
        self.append_or_archive(instance, v, &op)
    }

    /// The new `split_sv` and `remain_sv` inherit the *current* mapping of
    /// `source` at `v` (or `source` itself if unmapped), so a freshly
    /// introduced supervoxel transparently joins `source`'s body. One
    /// MappingOp with `originals = {split_sv, remain_sv}`.
    pub fn supervoxel_split(
        &self,
        instance: InstanceId,
        v: VersionId,
        mutation_id: MutationId,
        source: Supervoxel,
        split_sv: Supervoxel,
        remain_sv: Supervoxel,
    ) -> Result<()> {
        let svm = self.registry.get_mapping(instance, v)?;
        let ancestry = svm.ancestry_of(v, self.registry.graph())?;
        let (current_label, _) = svm.map_one(source, &ancestry);

        {
            let mut guard = svm.write();
            let vid = guard.allocate_short(v)?;
            guard.modify(split_sv, vid, current_label);
            guard.modify(remain_sv, vid, current_label);
        }

        let op = MappingOp {
            mutation_id,
            mapped: current_label,
            originals: vec![split_sv, remain_sv],
        };
        self.append_or_archive(instance, v, &op)
    }

    fn append_or_archive(&self, instance: InstanceId, v: VersionId, op: &MappingOp) -> Result<()> {
        let record = LogRecord::mapping_op(op)?;
        match self.registry.log_store().append(instance, v, record.clone()) {
            Ok(()) => Ok(()),
            Err(e) => {
                let topic = failed_topic_name(&instance.0.to_string());
                let bytes = bincode::serde::encode_to_vec(&record, bincode::config::standard())
                    .unwrap_or_default();
                // Best-effort archival; the append failure is surfaced to
                // the caller regardless of whether archival itself succeeds.
                let _ = self.registry.log_store().topic_append(&topic, bytes);
                Err(SvmapError::LogAppendFailed {
                    instance: instance.0.to_string(),
                    version: v,
                    source: e.to_string(),
                })
            }
        }
    }
}
