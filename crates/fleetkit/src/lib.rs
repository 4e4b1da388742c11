//! # fleetkit
//!
//! Concurrent multi-server command execution.
//!
//! This crate provides the engine behind fleet-wide deployment tooling:
//! - Bounded-worker parallel dispatch with per-task timeouts
//! - Ordered sequential dispatch with stop-on-failure truncation
//! - Per-command retry with pure exponential backoff
//! - Partial-failure semantics: per-target outcomes, never lost results
//! - Target selection over an immutable server registry
//!
//! ## Example
//!
//! ```no_run
//! use fleetkit::backend::ssh::SshOptions;
//! use fleetkit::{DispatchOptions, DispatchSummary, Fleet, Selection, select};
//!
//! let fleet = Fleet::over_ssh(SshOptions::default());
//!
//! # let registry = Vec::new();
//! let targets = select(&registry, &Selection::All);
//! let results = fleet
//!     .dispatch(&targets, "uptime", &DispatchOptions::default())
//!     .expect("dispatch misconfigured");
//!
//! let summary = DispatchSummary::of(&results);
//! for (id, outcome) in results.iter() {
//!     println!("{id}: {}", if outcome.is_success() { "ok" } else { "failed" });
//! }
//! println!("{summary}");
//! ```
//!
//! ## Retry Logic
//!
//! Connection-class failures are automatically retried with exponential
//! backoff; ordinary command failures (non-zero exit) are definitive and
//! consume no retry budget. Configure behavior with [`RetryConfig`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod retry;
pub mod select;
pub mod sequential;
pub mod summary;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use select::{Selection, select};
pub use summary::DispatchSummary;
pub use types::{
    DispatchOptions, Execution, ExecutionOutcome, FailureKind, ResultSet, RetryConfig, Server,
    ServerType,
};

use backend::ssh::{SshOptions, SshRunner};
use backend::{Runner, SharedRunner};
use std::sync::Arc;

/// High-level client for fleet operations.
///
/// The client wraps an execution primitive and provides the two dispatch
/// paths plus single-server execution, so callers never deal with worker
/// plumbing directly.
pub struct Fleet {
    runner: SharedRunner,
}

impl Fleet {
    /// Create a fleet client over a custom runner (useful for testing).
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }

    /// Create a fleet client that executes through the system ssh client.
    pub fn over_ssh(options: SshOptions) -> Self {
        Self::new(Arc::new(SshRunner::new(options)))
    }

    /// Run a command on a single server with retry.
    pub fn run_on(
        &self,
        server: &Server,
        command: &str,
        retry: &RetryConfig,
    ) -> ExecutionOutcome {
        retry::execute_with_retry(self.runner.as_ref(), server, command, retry)
    }

    /// Run a command on every target concurrently.
    ///
    /// See [`dispatch::dispatch`] for the full semantics.
    pub fn dispatch(
        &self,
        targets: &[Server],
        command: &str,
        options: &DispatchOptions,
    ) -> Result<ResultSet> {
        dispatch::dispatch(&self.runner, targets, command, options)
    }

    /// Run a command on every target, one at a time, in list order.
    ///
    /// See [`sequential::dispatch_sequential`] for the full semantics.
    pub fn dispatch_sequential(
        &self,
        targets: &[Server],
        command: &str,
        options: &DispatchOptions,
    ) -> Result<ResultSet> {
        sequential::dispatch_sequential(self.runner.as_ref(), targets, command, options)
    }

    /// Access the underlying runner.
    pub fn runner(&self) -> &dyn Runner {
        self.runner.as_ref()
    }
}
