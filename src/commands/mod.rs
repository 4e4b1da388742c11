// Deployment recipes: each is a linear sequence of calls into fleetkit.
pub mod build;
pub mod download;
pub mod run;
pub mod servers;
pub mod shutdown;
pub mod start;
pub mod update_config;

use crate::Context;
use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::ui;
use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use fleetkit::{
    DispatchOptions, ExecutionOutcome, Fleet, ResultSet, RetryConfig, Selection, Server,
    ServerType,
};
use std::time::Duration;

/// Resolve `--servers`/`--type` flags into a selection.
///
/// Returns `None` when neither flag was given so each operation can apply
/// its own default. `--type all` selects the whole registry; `--servers`
/// wins when both flags are present.
pub(crate) fn resolve_selection(args: &SelectArgs) -> Result<Option<Selection>> {
    let ids = args
        .servers
        .as_deref()
        .map(split_ids)
        .filter(|ids| !ids.is_empty());

    let kind = match args.server_type.as_deref() {
        Some("all") | None => None,
        Some(name) => Some(
            ServerType::from_name(name)
                .ok_or_else(|| anyhow!("unknown server type '{name}'"))?,
        ),
    };

    match (ids, kind) {
        (Some(ids), _) => {
            // An explicit --type (even "all") disables the single-id
            // reinterpretation.
            if args.server_type.is_none() {
                Ok(Some(Selection::from_args(Some(ids), None)))
            } else {
                Ok(Some(Selection::Ids(ids)))
            }
        }
        (None, Some(kind)) => Ok(Some(Selection::Type(kind))),
        (None, None) => {
            if args.server_type.as_deref() == Some("all") {
                Ok(Some(Selection::All))
            } else {
                Ok(None)
            }
        }
    }
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

/// Merge config defaults with per-call overrides from the command line.
pub(crate) fn dispatch_options(
    config: &Config,
    exec: &ExecArgs,
    stop_on_failure: bool,
) -> DispatchOptions {
    let mut options = config.dispatch_options();
    if let Some(workers) = exec.max_workers {
        options.max_workers = workers;
    }
    if let Some(secs) = exec.timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }
    if let Some(retries) = exec.retries {
        options.retry.max_retries = retries;
    }
    if let Some(delay) = exec.retry_delay {
        options.retry.base_delay = Duration::from_secs(delay);
    }
    options.stop_on_failure = stop_on_failure;
    options
}

/// Whether to use the parallel path: flags first, config default second.
pub(crate) fn parallel_mode(config: &Config, exec: &ExecArgs) -> bool {
    if exec.parallel {
        true
    } else if exec.sequential {
        false
    } else {
        config.execution.parallel
    }
}

/// Implicit whole-default selections get confirmed before acting.
pub(crate) fn needs_confirmation(select: &SelectArgs, exec: &ExecArgs) -> bool {
    !exec.yes && select.servers.is_none() && select.server_type.is_none()
}

/// Confirm with user
pub(crate) fn confirm_proceed(prompt: &str) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new().with_prompt(prompt).default(true).interact()?;
    Ok(confirmed)
}

/// Run one recipe step on a single server; a failing step becomes an
/// error carrying the captured output.
pub(crate) fn step(
    fleet: &Fleet,
    server: &Server,
    command: &str,
    retry: &RetryConfig,
    what: &str,
) -> Result<String> {
    log::info!("{} on {}", what, server.name);
    match fleet.run_on(server, command, retry) {
        ExecutionOutcome::Success { output } => Ok(output),
        ExecutionOutcome::Failure { kind, detail } => {
            bail!("failed to {what} ({kind}): {}", detail.trim())
        }
    }
}

/// Print per-server outcomes in target-list order.
pub(crate) fn print_results(ctx: &Context, targets: &[Server], results: &ResultSet) {
    for server in targets {
        match results.get(&server.id) {
            Some(ExecutionOutcome::Success { output }) => {
                println!("  {} {}", "✓".green(), server.name);
                if !ctx.quiet {
                    ui::output_block(output);
                }
            }
            Some(ExecutionOutcome::Failure { kind, detail }) => {
                println!("  {} {} - {}", "✗".red(), server.name, kind);
                ui::output_block(detail);
            }
            None => {
                println!(
                    "  {} {} - {}",
                    "⊘".yellow(),
                    server.name,
                    "skipped (stopped early)".dimmed()
                );
            }
        }
    }
}
