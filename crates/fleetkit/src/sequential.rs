//! Ordered single-threaded dispatch.

use crate::backend::Runner;
use crate::error::Result;
use crate::retry::execute_with_retry;
use crate::types::{DispatchOptions, ResultSet, Server};

/// Run `command` on every target, one at a time, strictly in list order.
///
/// Per-target semantics match the parallel path (including retry), except
/// that the per-task timeout does not apply — there is no pool to hand a
/// stalled task back to, so the call simply blocks.
///
/// With `stop_on_failure` the dispatch stops right after the first
/// failing target, returning outcomes for the attempted prefix of the
/// list; without it every target is attempted regardless of earlier
/// failures.
pub fn dispatch_sequential(
    runner: &dyn Runner,
    targets: &[Server],
    command: &str,
    options: &DispatchOptions,
) -> Result<ResultSet> {
    let mut results = ResultSet::new();

    log::info!("running on {} servers: {}", targets.len(), command);

    for server in targets {
        log::debug!("running on {}", server.name);
        let outcome = execute_with_retry(runner, server, command, &options.retry);
        let failed = outcome.is_failure();
        results.insert(server.id.clone(), outcome);

        if failed {
            log::error!("command failed on {}", server.name);
            if options.stop_on_failure {
                log::warn!("stopping further execution due to failure on {}", server.name);
                break;
            }
        }
    }

    Ok(results)
}
