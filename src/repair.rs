// # Repair / reconstruction ("fix") flow
//
// Offline diagnostic procedure: replay an ancestor's SplitOp log entries
// (not MappingOp entries) and, for any split whose remaining or split label
// currently resolves to exactly one supervoxel, re-derive and write that
// supervoxel's mapping. A human-readable report records every step,
// including ones skipped because an index resolved to more than one
// supervoxel. Reuses `SVMap::modify` and the same lock-then-append
// discipline as `mutate`.

use std::io::Write;

use crate::error::Result;
use crate::log_store::{EntryType, LogRecord, MappingOp};
use crate::registry::InstanceRegistry;
use crate::types::{InstanceId, Label, Supervoxel, VersionId};

/// Label -> supervoxels lookup this flow needs. Real inverse indexing is
/// out of scope for this crate; the caller supplies whatever backs label
/// membership queries (e.g. an RLE/block-level index).
pub trait LabelIndex: Send + Sync {
    fn supervoxels_of(&self, label: Label) -> Result<Vec<Supervoxel>>;
}

/// Replay `instance`'s SplitOp log at `v`, re-deriving single-supervoxel
/// split/remain mappings, writing a line per step to `report`. Returns the
/// number of mappings re-derived.
pub fn fix(
    registry: &InstanceRegistry,
    instance: InstanceId,
    v: VersionId,
    index: &dyn LabelIndex,
    report: &mut dyn Write,
) -> Result<usize> {
    let svm = registry.get_mapping(instance, v)?;
    let vid = svm.allocate_short(v)?;
    let mut mappings_fixed = 0usize;

    let records = registry.log_store().stream(instance, v)?;
    for record in records.iter() {
        if !matches!(record.entry_type, EntryType::SplitOp) {
            continue;
        }
        let op = match record.decode_split_op() {
            Ok(op) => op,
            Err(e) => {
                let _ = writeln!(report, "unable to unmarshal split log message: {e}");
                continue;
            }
        };

        let mut remain_fixed: Option<Supervoxel> = None;
        match index.supervoxels_of(op.target) {
            Ok(remain_svs) if remain_svs.len() == 1 => {
                let sv = remain_svs[0];
                svm.modify(sv, vid, op.target);
                mappings_fixed += 1;
                remain_fixed = Some(sv);
                let mop = MappingOp {
                    mutation_id: op.mutation_id,
                    mapped: op.target,
                    originals: vec![sv],
                };
                if let Err(e) = log_mapping(registry, instance, v, &mop) {
                    let _ = writeln!(report, "unable to write mapping to log for op {mop:?}: {e}");
                }
            }
            Ok(remain_svs) => {
                let _ = writeln!(
                    report,
                    "Split {:?} -> {:?}. Remaining index has multiple supervoxels: {:?}",
                    op.target, op.new_label, remain_svs
                );
            }
            Err(e) => {
                let _ = writeln!(
                    report,
                    "unable to get label index for remaining label {:?}: {e}",
                    op.target
                );
                continue;
            }
        }

        let mut split_fixed: Option<Supervoxel> = None;
        match index.supervoxels_of(op.new_label) {
            Ok(split_svs) if split_svs.len() == 1 => {
                let sv = split_svs[0];
                svm.modify(sv, vid, op.new_label);
                mappings_fixed += 1;
                split_fixed = Some(sv);
                let mop = MappingOp {
                    mutation_id: op.mutation_id,
                    mapped: op.new_label,
                    originals: vec![sv],
                };
                if let Err(e) = log_mapping(registry, instance, v, &mop) {
                    let _ = writeln!(report, "unable to write mapping to log for op {mop:?}: {e}");
                }
            }
            Ok(split_svs) => {
                let _ = writeln!(
                    report,
                    "Split {:?} -> {:?}. Split index has multiple supervoxels: {:?}",
                    op.target, op.new_label, split_svs
                );
            }
            Err(e) => {
                let _ = writeln!(
                    report,
                    "unable to get label index for split label {:?}: {e}",
                    op.new_label
                );
                continue;
            }
        }

        let _ = writeln!(
            report,
            "Presumptive supervoxel {:?} split into {:?}, remains into {:?}",
            op.target, split_fixed, remain_fixed
        );
    }

    Ok(mappings_fixed)
}

fn log_mapping(registry: &InstanceRegistry, instance: InstanceId, v: VersionId, op: &MappingOp) -> Result<()> {
    let record = LogRecord::mapping_op(op)?;
    registry.log_store().append(instance, v, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_store::SplitOp;
    use crate::registry::in_memory_registry;
    use crate::types::MutationId;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MapIndex(Mutex<HashMap<Label, Vec<Supervoxel>>>);

    impl LabelIndex for MapIndex {
        fn supervoxels_of(&self, label: Label) -> Result<Vec<Supervoxel>> {
            Ok(self.0.lock().unwrap().get(&label).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn fix_rederives_single_supervoxel_splits() {
        let (registry, graph, log_store) = in_memory_registry();
        let v0 = VersionId(0);
        graph.lock().add_root(v0);
        let instance = InstanceId(uuid::Uuid::new_v4());

        let split = SplitOp {
            mutation_id: MutationId(1),
            target: Label(100),
            new_label: Label(200),
        };
        log_store.append(instance, v0, LogRecord::split_op(&split).unwrap()).unwrap();

        let mut index_map = HashMap::new();
        index_map.insert(Label(100), vec![Supervoxel(11)]);
        index_map.insert(Label(200), vec![Supervoxel(12)]);
        let index = MapIndex(Mutex::new(index_map));

        let mut report = Vec::new();
        let fixed = fix(&registry, instance, v0, &index, &mut report).unwrap();
        assert_eq!(fixed, 2);

        let svm = registry.get_mapping(instance, v0).unwrap();
        let mapped = svm
            .map_many(v0, &[Supervoxel(11), Supervoxel(12)], registry.graph())
            .unwrap();
        assert_eq!(mapped, vec![Label(100), Label(200)]);
    }

    #[test]
    fn fix_skips_multi_supervoxel_indices() {
        let (registry, graph, log_store) = in_memory_registry();
        let v0 = VersionId(0);
        graph.lock().add_root(v0);
        let instance = InstanceId(uuid::Uuid::new_v4());

        let split = SplitOp {
            mutation_id: MutationId(1),
            target: Label(100),
            new_label: Label(200),
        };
        log_store.append(instance, v0, LogRecord::split_op(&split).unwrap()).unwrap();

        let mut index_map = HashMap::new();
        index_map.insert(Label(100), vec![Supervoxel(11), Supervoxel(13)]);
        index_map.insert(Label(200), vec![Supervoxel(12)]);
        let index = MapIndex(Mutex::new(index_map));

        let mut report = Vec::new();
        let fixed = fix(&registry, instance, v0, &index, &mut report).unwrap();
        assert_eq!(fixed, 1);
        let report_text = String::from_utf8(report).unwrap();
        assert!(report_text.contains("multiple supervoxels"));
    }
}
