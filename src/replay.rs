// # LogReplayer
//
// Loads one ancestor's mutation log and applies it into an SVMap under that
// ancestor's bound short-version id. A malformed record is logged to the
// diagnostic sink and skipped; it must never abort the rest of the replay.
// Unknown entry-type tags are skipped silently (forward compatibility). The
// SVMap write lock is taken once for the whole stream and held for the
// duration of the replay, so a concurrent reader never observes some of an
// ancestor's mappings applied and others still pending — ancestors load
// serially, one lock span each.

use std::sync::Arc;

use crate::diagnostics::DiagnosticSink;
use crate::error::Result;
use crate::log_store::{EntryType, LogStore};
use crate::svmap::SVMap;
use crate::types::{InstanceId, ShortVersionId, VersionId};

pub struct LogReplayer {
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl LogReplayer {
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        LogReplayer { diagnostics }
    }

    /// Stream `instance`'s log for `version` and apply every MappingOp
    /// record into `svm` under short-id `vid`. Returns once the stream is
    /// exhausted (the log store closes its sending side on completion).
    pub fn replay_into(
        &self,
        svm: &SVMap,
        instance: InstanceId,
        version: VersionId,
        vid: ShortVersionId,
        log_store: &dyn LogStore,
    ) -> Result<()> {
        let records = log_store.stream(instance, version)?;
        let mut guard = svm.write();
        for record in records.iter() {
            match record.entry_type {
                EntryType::MappingOp => match record.decode_mapping_op() {
                    Ok(op) => {
                        for sv in op.originals {
                            guard.modify(sv, vid, op.mapped);
                        }
                    }
                    Err(e) => self.diagnostics.record_skipped(instance, version, &e.to_string()),
                },
                EntryType::SplitOp | EntryType::Other(_) => {
                    // Not a mapping record, or a tag newer than this build
                    // knows about; skip and continue.
                }
            }
        }
        Ok(())
    }
}
