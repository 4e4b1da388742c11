//! Retry logic with exponential backoff for transient failures.

use crate::backend::Runner;
use crate::types::{ExecutionOutcome, FailureKind, RetryConfig, Server};
use std::thread;

/// Run a command on one server, reattempting transient failures.
///
/// The attempt budget is `1 + max_retries`. The delay before retry *k*
/// (1-indexed) is `base_delay * 2^(k-1)`, executed as a blocking sleep of
/// the worker performing the attempt.
///
/// A command that runs and exits non-zero is a definitive
/// [`FailureKind::Command`] outcome and consumes no retry budget; only
/// errors the primitive classifies as retryable (connection failures,
/// timeouts, transport death) are reattempted. Once the budget is spent
/// the result is [`FailureKind::ExhaustedRetries`], distinguishable from
/// any single-attempt failure.
pub fn execute_with_retry(
    runner: &dyn Runner,
    server: &Server,
    command: &str,
    retry: &RetryConfig,
) -> ExecutionOutcome {
    let mut failed_attempts = 0u32;

    loop {
        match runner.run(server, command) {
            Ok(execution) => {
                return if execution.success {
                    ExecutionOutcome::Success {
                        output: execution.output,
                    }
                } else {
                    ExecutionOutcome::failure(FailureKind::Command, execution.output)
                };
            }
            Err(err) if !err.is_retryable() => {
                log::error!("{}: {err}", server.name);
                return ExecutionOutcome::failure(FailureKind::Invalid, err.to_string());
            }
            Err(err) => {
                failed_attempts += 1;
                if failed_attempts > retry.max_retries {
                    log::error!(
                        "giving up on {} after {} attempts: {err}",
                        server.name,
                        failed_attempts
                    );
                    return ExecutionOutcome::failure(
                        FailureKind::ExhaustedRetries,
                        err.to_string(),
                    );
                }

                let delay = retry.delay_before(failed_attempts);
                log::warn!(
                    "attempt {failed_attempts}/{} failed on {}: {err}. Retrying in {:?}...",
                    retry.max_retries + 1,
                    server.name,
                    delay
                );
                thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MockRunner;
    use crate::error::Error;
    use crate::types::{Execution, ServerType};
    use std::time::Duration;

    fn server() -> Server {
        Server::new("c1", "compute-1", ServerType::Compute, "10.0.0.11")
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_millis(1))
    }

    fn connection_refused() -> Error {
        Error::Connection {
            host: "10.0.0.11".to_string(),
            detail: "connection refused".to_string(),
        }
    }

    #[test]
    fn test_success_on_first_attempt() {
        let runner = MockRunner::echoing();
        let outcome = execute_with_retry(&runner, &server(), "echo ok", &fast_retry(3));

        assert_eq!(outcome, ExecutionOutcome::success("ok"));
        assert_eq!(runner.attempts_for("c1"), 1);
    }

    #[test]
    fn test_command_failure_consumes_no_retry_budget() {
        let runner = MockRunner::new(|_, _, _| {
            Ok(Execution {
                success: false,
                output: "exit 1".to_string(),
            })
        });
        let outcome = execute_with_retry(&runner, &server(), "false", &fast_retry(3));

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Command));
        assert_eq!(runner.attempts_for("c1"), 1);
    }

    #[test]
    fn test_non_retryable_error_aborts_immediately() {
        let runner = MockRunner::new(|_, _, _| {
            Err(Error::Invalid {
                detail: "empty command".to_string(),
            })
        });
        let outcome = execute_with_retry(&runner, &server(), "", &fast_retry(3));

        assert_eq!(outcome.failure_kind(), Some(FailureKind::Invalid));
        assert_eq!(runner.attempts_for("c1"), 1);
    }

    #[test]
    fn test_retryable_failure_spends_exact_budget() {
        let runner = MockRunner::new(|_, _, _| Err(connection_refused()));
        let outcome = execute_with_retry(&runner, &server(), "uptime", &fast_retry(3));

        // 1 initial attempt + 3 retries
        assert_eq!(runner.attempts_for("c1"), 4);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ExhaustedRetries));
    }

    #[test]
    fn test_zero_retries_still_classifies_as_exhausted() {
        let runner = MockRunner::new(|_, _, _| Err(connection_refused()));
        let outcome = execute_with_retry(&runner, &server(), "uptime", &fast_retry(0));

        assert_eq!(runner.attempts_for("c1"), 1);
        assert_eq!(outcome.failure_kind(), Some(FailureKind::ExhaustedRetries));
    }

    #[test]
    fn test_eventual_success() {
        let runner = MockRunner::new(|_, _, attempt| {
            if attempt < 3 {
                Err(connection_refused())
            } else {
                Ok(Execution {
                    success: true,
                    output: "up 3 days".to_string(),
                })
            }
        });
        let outcome = execute_with_retry(&runner, &server(), "uptime", &fast_retry(3));

        assert!(outcome.is_success());
        assert_eq!(runner.attempts_for("c1"), 3);
    }
}
