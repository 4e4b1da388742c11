//! Core types for fleet command execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role of a server in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Builds and packages releases
    Build,
    /// Routes traffic between nodes
    Router,
    /// Runs release workloads
    Compute,
    /// Development/scratch machine
    Dev,
}

impl ServerType {
    /// Get the registry name for this server type.
    pub fn name(&self) -> &'static str {
        match self {
            ServerType::Build => "build",
            ServerType::Router => "router",
            ServerType::Compute => "compute",
            ServerType::Dev => "dev",
        }
    }

    /// Parse a server type from its registry name.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "build" => Some(ServerType::Build),
            "router" => Some(ServerType::Router),
            "compute" => Some(ServerType::Compute),
            "dev" => Some(ServerType::Dev),
            _ => None,
        }
    }

    /// All known server types.
    pub fn known() -> &'static [ServerType] {
        &[
            ServerType::Build,
            ServerType::Router,
            ServerType::Compute,
            ServerType::Dev,
        ]
    }
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One server in the fleet registry.
///
/// Owned by the caller; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Unique registry id
    pub id: String,
    /// Human-readable name used in logs and summaries
    pub name: String,
    /// Role of the server
    #[serde(rename = "type")]
    pub kind: ServerType,
    /// Address the execution primitive connects to
    pub address: String,
}

impl Server {
    /// Create a new server descriptor.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ServerType,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            address: address.into(),
        }
    }
}

/// What the execution primitive reports for one completed command.
///
/// A remote command exiting non-zero is an unsuccessful execution, not an
/// error: `success` is false and `output` carries whatever was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Whether the remote command exited successfully
    pub success: bool,
    /// Captured output (stdout and stderr combined)
    pub output: String,
}

/// Why a target's dispatch attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The remote command ran and exited non-zero
    Command,
    /// The invocation was rejected before it could run
    Invalid,
    /// The task did not finish within its per-task budget and was abandoned
    Timeout,
    /// All retry attempts were spent on a transient failure
    ExhaustedRetries,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Command => "command failed",
            FailureKind::Invalid => "invalid invocation",
            FailureKind::Timeout => "timed out",
            FailureKind::ExhaustedRetries => "retries exhausted",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one target's fully completed (possibly retried) dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The command ran and exited zero
    Success {
        /// Captured command output
        output: String,
    },
    /// The command did not succeed
    Failure {
        /// Failure classification
        kind: FailureKind,
        /// Captured output or error detail
        detail: String,
    },
}

impl ExecutionOutcome {
    /// Build a success outcome.
    pub fn success(output: impl Into<String>) -> Self {
        ExecutionOutcome::Success {
            output: output.into(),
        }
    }

    /// Build a failure outcome.
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        ExecutionOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Whether this outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }

    /// Whether this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Captured output of a successful execution.
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Success { output } => Some(output),
            ExecutionOutcome::Failure { .. } => None,
        }
    }

    /// Failure classification, if this outcome is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExecutionOutcome::Success { .. } => None,
            ExecutionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of reattempts after the first failed attempt
    pub max_retries: u32,
    /// Delay before the first reattempt; doubles for each one after
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry `attempt` (1-indexed): `base_delay * 2^(attempt-1)`.
    ///
    /// Pure exponential backoff, no jitter.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Options for one dispatch call.
///
/// Defaults mirror the process-wide configuration; every field is
/// overridable per call, so there is no global mutable state.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Size of the worker pool for the parallel path
    pub max_workers: usize,
    /// Per-task budget for the parallel path; `None` disables it.
    /// The sequential path ignores this.
    pub timeout: Option<Duration>,
    /// Stop dispatching after the first observed failure
    pub stop_on_failure: bool,
    /// Retry policy applied to every target's command
    pub retry: RetryConfig,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_workers: 5,
            timeout: Some(Duration::from_secs(300)),
            stop_on_failure: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Per-target outcomes of one dispatch, keyed by server id.
///
/// Keys are unique. The sequential path inserts in target-list order; the
/// parallel path inserts in completion order, which callers must not rely
/// on. A set shorter than the target list is valid only when
/// `stop_on_failure` terminated the dispatch early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<(String, ExecutionOutcome)>,
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a target's outcome, replacing any previous one for the id.
    pub fn insert(&mut self, id: impl Into<String>, outcome: ExecutionOutcome) {
        let id = id.into();
        match self.entries.iter_mut().find(|(key, _)| *key == id) {
            Some((_, existing)) => *existing = outcome,
            None => self.entries.push((id, outcome)),
        }
    }

    /// Look up the outcome for a server id.
    pub fn get(&self, id: &str) -> Option<&ExecutionOutcome> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, outcome)| outcome)
    }

    /// Whether an outcome was recorded for a server id.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of recorded outcomes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no outcomes were recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(id, outcome)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExecutionOutcome)> {
        self.entries
            .iter()
            .map(|(id, outcome)| (id.as_str(), outcome))
    }

    /// Server ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Overall success: logical AND across all recorded outcomes.
    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|(_, outcome)| outcome.is_success())
    }

    /// Number of recorded failures.
    pub fn failure_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .count()
    }

    /// Iterate over failing `(id, outcome)` pairs in insertion order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ExecutionOutcome)> {
        self.iter().filter(|(_, outcome)| outcome.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_type_names() {
        assert_eq!(ServerType::Build.name(), "build");
        assert_eq!(ServerType::from_name("compute"), Some(ServerType::Compute));
        assert_eq!(ServerType::from_name("mainframe"), None);
        for kind in ServerType::known() {
            assert_eq!(ServerType::from_name(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn test_retry_config_delays() {
        let config = RetryConfig::new(3, Duration::from_secs(1));

        assert_eq!(config.delay_before(1), Duration::from_secs(1));
        assert_eq!(config.delay_before(2), Duration::from_secs(2));
        assert_eq!(config.delay_before(3), Duration::from_secs(4));
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = ExecutionOutcome::success("ok");
        assert!(ok.is_success());
        assert_eq!(ok.output(), Some("ok"));
        assert_eq!(ok.failure_kind(), None);

        let failed = ExecutionOutcome::failure(FailureKind::Command, "exit 1");
        assert!(failed.is_failure());
        assert_eq!(failed.output(), None);
        assert_eq!(failed.failure_kind(), Some(FailureKind::Command));
    }

    #[test]
    fn test_result_set_preserves_insertion_order() {
        let mut results = ResultSet::new();
        results.insert("b", ExecutionOutcome::success(""));
        results.insert("a", ExecutionOutcome::success(""));
        results.insert("c", ExecutionOutcome::failure(FailureKind::Command, ""));

        let ids: Vec<_> = results.ids().collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(results.len(), 3);
        assert!(!results.all_succeeded());
        assert_eq!(results.failure_count(), 1);
    }

    #[test]
    fn test_result_set_insert_replaces() {
        let mut results = ResultSet::new();
        results.insert("a", ExecutionOutcome::failure(FailureKind::Command, ""));
        results.insert("a", ExecutionOutcome::success("ok"));

        assert_eq!(results.len(), 1);
        assert!(results.all_succeeded());
    }

    #[test]
    fn test_empty_result_set_is_overall_success() {
        let results = ResultSet::new();
        assert!(results.all_succeeded());
        assert_eq!(results.failure_count(), 0);
    }
}
