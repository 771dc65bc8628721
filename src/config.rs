// # Configuration
//
// Configuration for wiring a real log-store transport: broker servers, an
// optional activity-log topic override, an optional per-instance topic
// prefix, and per-instance topic suffixes. This crate doesn't dial a broker
// itself (that transport is an out-of-scope collaborator) but owns the
// naming logic a broker-backed `LogStore` would need, grounded on
// `storage/kafka.go`'s `KafkaConfig`.

use uuid::Uuid;

use crate::log_store::sanitize_topic;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Broker bootstrap servers (empty means no broker transport configured).
    pub servers: Vec<String>,
    /// Override for the activity-log topic; defaults to a host-derived name
    /// if unset.
    pub topic_activity: Option<String>,
    /// Prefix prepended to every per-instance mutation-log topic.
    pub topic_prefix: Option<String>,
    /// Per-instance topic suffix overrides, `(instance uuid, suffix)`.
    pub topic_suffixes: Vec<(Uuid, String)>,
}

impl Config {
    /// Any suffix configured for `instance`, or the empty string.
    pub fn topic_suffix(&self, instance: Uuid) -> &str {
        self.topic_suffixes
            .iter()
            .find(|(uuid, _)| *uuid == instance)
            .map(|(_, suffix)| suffix.as_str())
            .unwrap_or("")
    }

    /// Compose the mutation-log topic for one instance:
    /// `topic_prefix ‖ instance_uuid ‖ suffix?`.
    pub fn topic_for_instance(&self, instance: Uuid) -> String {
        let prefix = self.topic_prefix.as_deref().unwrap_or("");
        format!("{prefix}{instance}{}", self.topic_suffix(instance))
    }

    /// Sanitized activity-log topic name, defaulting to `svmapactivity-<host_id>`
    /// when no override is configured, mirroring `storage/kafka.go`'s
    /// `dvidactivity-<hostID>` default.
    pub fn activity_topic(&self, host_id: &str) -> String {
        let raw = self
            .topic_activity
            .clone()
            .unwrap_or_else(|| format!("svmapactivity-{host_id}"));
        sanitize_topic(&raw)
    }
}
