// # Diagnostic sink
//
// A malformed mutation log record is logged and skipped, not fatal to
// replay, but the failure still needs to be surfaced somewhere a human or
// an alerting pipeline can see it. This trait lets a host swap in its own
// sink (a metrics counter, an alert webhook) without this crate hard-coding
// stdout.

use tracing::warn;

use crate::types::{InstanceId, VersionId};

/// Out-of-band destination for per-record replay failures that must not
/// abort the rest of the replay.
pub trait DiagnosticSink: Send + Sync {
    fn record_skipped(&self, instance: InstanceId, version: VersionId, reason: &str);
}

/// Default sink: emits a `tracing::warn!` event per skipped record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn record_skipped(&self, instance: InstanceId, version: VersionId, reason: &str) {
        warn!(
            instance = %instance.0,
            version = ?version,
            reason,
            "skipped malformed mutation log record"
        );
    }
}
