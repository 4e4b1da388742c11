//! Ad-hoc command execution on selected servers.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, progress, ui};
use anyhow::{Result, bail};
use fleetkit::{DispatchSummary, Fleet, Selection, select};

pub fn run(ctx: &Context, config: &Config, args: &RunArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection = commands::resolve_selection(&args.select)?.unwrap_or(Selection::All);
    let targets = select(&servers, &selection);

    if targets.is_empty() {
        ui::warn("No servers matched the selection, nothing to do");
        return Ok(());
    }

    if commands::needs_confirmation(&args.select, &args.exec)
        && !commands::confirm_proceed(&format!("Run on all {} servers?", targets.len()))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    ui::header(&format!("Running on {} servers", targets.len()));
    ui::kv("Command", &args.command);

    let options = commands::dispatch_options(config, &args.exec, false);
    let parallel = commands::parallel_mode(config, &args.exec);
    if ctx.verbose > 0 {
        ui::kv("Mode", if parallel { "parallel" } else { "sequential" });
        ui::kv("Workers", &options.max_workers.to_string());
        ui::kv("Retries", &options.retry.max_retries.to_string());
    }
    println!();

    let fleet = Fleet::over_ssh(config.ssh_options());
    let results = if parallel {
        let pb = progress::spinner(format!("Running on {} servers...", targets.len()));
        let results = fleet.dispatch(&targets, &args.command, &options)?;
        pb.finish_and_clear();
        results
    } else {
        fleet.dispatch_sequential(&targets, &args.command, &options)?
    };

    commands::print_results(ctx, &targets, &results);

    let summary = DispatchSummary::of(&results);
    println!();
    if summary.is_success() {
        ui::success(&format!(
            "Command executed successfully on all {} servers",
            summary.total
        ));
        Ok(())
    } else {
        ui::warn(&format!("Command completed: {summary}"));
        bail!(
            "command failed on {} of {} servers",
            summary.failed,
            summary.total
        )
    }
}
