//! Bounded-worker parallel dispatch.
//!
//! One execution task per target is fed through a fixed-size pool of OS
//! threads; at most `max_workers` primitive calls run at once, excess
//! targets queue. Workers feed a single-collector completion channel, so
//! the result set under construction never needs shared-map locking.

use crate::backend::SharedRunner;
use crate::error::{Error, Result};
use crate::retry::execute_with_retry;
use crate::types::{DispatchOptions, ExecutionOutcome, FailureKind, ResultSet, RetryConfig, Server};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

/// Run `command` on every target concurrently.
///
/// Guarantees: each target ends up with exactly one outcome, or — only
/// under `stop_on_failure` — no outcome at all; never a duplicate.
/// Outcomes are collected in completion order; [`ResultSet`] is keyed by
/// id, so the order is not observable.
///
/// `stop_on_failure` cancellation is advisory: queued targets are
/// dropped, but an in-flight remote command cannot be aborted from the
/// client side. The triggering target's own outcome is always recorded
/// before the dispatch returns.
///
/// The only error this call itself produces is a configuration mistake
/// (`max_workers == 0`); individual target failures live in the result
/// set.
pub fn dispatch(
    runner: &SharedRunner,
    targets: &[Server],
    command: &str,
    options: &DispatchOptions,
) -> Result<ResultSet> {
    if options.max_workers == 0 {
        return Err(Error::Options {
            detail: "max_workers must be at least 1".to_string(),
        });
    }

    let mut results = ResultSet::new();
    if targets.is_empty() {
        return Ok(results);
    }

    log::info!(
        "running on {} servers with {} workers: {}",
        targets.len(),
        options.max_workers,
        command
    );

    let (job_tx, job_rx) = mpsc::channel();
    for server in targets {
        let _ = job_tx.send(server.clone());
    }
    drop(job_tx);
    let jobs = Arc::new(Mutex::new(job_rx));

    let (done_tx, done_rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));

    for _ in 0..options.max_workers.min(targets.len()) {
        let worker = Worker {
            jobs: Arc::clone(&jobs),
            done: done_tx.clone(),
            runner: Arc::clone(runner),
            command: command.to_string(),
            retry: options.retry.clone(),
            timeout: options.timeout,
            cancelled: Arc::clone(&cancelled),
        };
        thread::spawn(move || worker.run());
    }
    drop(done_tx);

    for _ in 0..targets.len() {
        // Closes once every worker is gone, e.g. after a panic in the
        // primitive; partial results are still returned.
        let Ok((id, outcome)) = done_rx.recv() else {
            break;
        };
        let failed = outcome.is_failure();
        results.insert(id, outcome);

        if failed && options.stop_on_failure {
            cancelled.store(true, Ordering::SeqCst);
            log::warn!(
                "command failed, stopping remaining tasks ({} of {} outcomes collected)",
                results.len(),
                targets.len()
            );
            break;
        }
    }

    Ok(results)
}

struct Worker {
    jobs: Arc<Mutex<mpsc::Receiver<Server>>>,
    done: mpsc::Sender<(String, ExecutionOutcome)>,
    runner: SharedRunner,
    command: String,
    retry: RetryConfig,
    timeout: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl Worker {
    fn run(self) {
        loop {
            let job = {
                self.jobs
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .recv()
            };
            let Ok(server) = job else {
                break;
            };
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let outcome = match self.timeout {
                Some(limit) => self.execute_with_deadline(&server, limit),
                None => {
                    execute_with_retry(self.runner.as_ref(), &server, &self.command, &self.retry)
                }
            };

            if self.done.send((server.id, outcome)).is_err() {
                // Collector returned early; nobody is listening anymore.
                break;
            }
        }
    }

    /// Run the retried call on a watchdog thread so the task can be
    /// abandoned once it exceeds the per-task budget.
    ///
    /// Abandonment is best-effort: the remote command may keep running.
    /// The abandoned attempt's late result lands in a dropped channel,
    /// so a target can never collect two outcomes.
    fn execute_with_deadline(&self, server: &Server, limit: Duration) -> ExecutionOutcome {
        let (tx, rx) = mpsc::channel();
        let runner = Arc::clone(&self.runner);
        let target = server.clone();
        let command = self.command.clone();
        let retry = self.retry.clone();

        thread::spawn(move || {
            let _ = tx.send(execute_with_retry(
                runner.as_ref(),
                &target,
                &command,
                &retry,
            ));
        });

        match rx.recv_timeout(limit) {
            Ok(outcome) => outcome,
            Err(_) => {
                log::error!(
                    "no result from {} within {}s, abandoning task",
                    server.name,
                    limit.as_secs()
                );
                ExecutionOutcome::failure(
                    FailureKind::Timeout,
                    format!(
                        "no result within {}s; the remote command may still be running",
                        limit.as_secs()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockRunner;
    use crate::types::{Execution, ServerType};
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn fleet() -> Vec<Server> {
        vec![
            Server::new("r1", "router-1", ServerType::Router, "10.0.0.1"),
            Server::new("c1", "compute-1", ServerType::Compute, "10.0.0.11"),
            Server::new("c2", "compute-2", ServerType::Compute, "10.0.0.12"),
        ]
    }

    fn options(max_workers: usize) -> DispatchOptions {
        DispatchOptions {
            max_workers,
            timeout: None,
            stop_on_failure: false,
            retry: RetryConfig::no_retry(),
        }
    }

    fn shared(runner: MockRunner) -> SharedRunner {
        Arc::new(runner)
    }

    #[test]
    fn test_every_target_gets_exactly_one_outcome() {
        let runner = shared(MockRunner::echoing());
        let results = dispatch(&runner, &fleet(), "echo ok", &options(2)).unwrap();

        assert_eq!(results.len(), 3);
        for id in ["r1", "c1", "c2"] {
            assert_eq!(results.get(id), Some(&ExecutionOutcome::success("ok")));
        }
        assert!(results.all_succeeded());
    }

    #[test]
    fn test_empty_target_list_is_a_no_op() {
        let runner = shared(MockRunner::echoing());
        let results = dispatch(&runner, &[], "uptime", &options(4)).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_zero_workers_is_a_configuration_error() {
        let runner = shared(MockRunner::echoing());
        let err = dispatch(&runner, &fleet(), "uptime", &options(0)).unwrap_err();
        assert!(matches!(err, Error::Options { .. }));
    }

    #[test]
    fn test_failures_do_not_abort_other_targets() {
        let runner = shared(MockRunner::new(|server, _, _| {
            Ok(Execution {
                success: server.id != "c1",
                output: String::new(),
            })
        }));
        let results = dispatch(&runner, &fleet(), "uptime", &options(3)).unwrap();

        assert_eq!(results.len(), 3);
        assert!(!results.all_succeeded());
        assert_eq!(results.failure_count(), 1);
        assert!(results.get("c1").unwrap().is_failure());
    }

    #[test]
    fn test_stop_on_failure_records_the_triggering_outcome() {
        let runner = shared(MockRunner::new(|server, _, _| {
            Ok(Execution {
                success: server.id != "r1",
                output: String::new(),
            })
        }));
        let opts = DispatchOptions {
            stop_on_failure: true,
            ..options(1)
        };
        let results = dispatch(&runner, &fleet(), "uptime", &opts).unwrap();

        // With one worker the failing first target is observed first and
        // the queued targets are dropped.
        assert!(results.get("r1").unwrap().is_failure());
        assert_eq!(results.len(), 1);

        let ids: HashSet<_> = results.ids().collect();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn test_timeout_records_timeout_and_abandons() {
        let runner = shared(MockRunner::echoing().with_delay(Duration::from_millis(200)));
        let opts = DispatchOptions {
            timeout: Some(Duration::from_millis(20)),
            ..options(3)
        };
        let results = dispatch(&runner, &fleet(), "sleep 60", &opts).unwrap();

        assert_eq!(results.len(), 3);
        for (_, outcome) in results.iter() {
            assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        }
    }

    #[test]
    fn test_identical_inputs_classify_identically() {
        let behavior = |server: &Server, _: &str, _: u32| {
            Ok(Execution {
                success: server.kind == ServerType::Compute,
                output: String::new(),
            })
        };

        let first = dispatch(&shared(MockRunner::new(behavior)), &fleet(), "x", &options(2)).unwrap();
        let second = dispatch(&shared(MockRunner::new(behavior)), &fleet(), "x", &options(2)).unwrap();

        for server in fleet() {
            assert_eq!(
                first.get(&server.id).unwrap().is_success(),
                second.get(&server.id).unwrap().is_success()
            );
        }
    }

    #[test]
    fn test_worker_pool_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let runner = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            shared(MockRunner::new(move |_, _, _| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(Execution {
                    success: true,
                    output: String::new(),
                })
            }))
        };

        let targets: Vec<_> = (0..6)
            .map(|i| {
                Server::new(
                    format!("c{i}"),
                    format!("compute-{i}"),
                    ServerType::Compute,
                    format!("10.0.0.{i}"),
                )
            })
            .collect();

        let results = dispatch(&runner, &targets, "uptime", &options(2)).unwrap();

        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
