//! Terminate release processes on selected servers, then verify that
//! none are left.

use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, progress, ui};
use anyhow::{Result, bail};
use fleetkit::{DispatchSummary, Fleet, Selection, select};

pub fn run(ctx: &Context, config: &Config, args: &SelectArgs, exec: &ExecArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection = commands::resolve_selection(args)?.unwrap_or(Selection::All);
    let targets = select(&servers, &selection);

    if targets.is_empty() {
        ui::warn("No servers matched the selection, nothing to do");
        return Ok(());
    }

    if commands::needs_confirmation(args, exec)
        && !commands::confirm_proceed(&format!(
            "Shut down release processes on all {} servers?",
            targets.len()
        ))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    ui::header(&format!(
        "Shutting down release processes on {} servers",
        targets.len()
    ));

    let fleet = Fleet::over_ssh(config.ssh_options());
    let options = commands::dispatch_options(config, exec, false);
    let pattern = &config.release.process_pattern;
    // `|| true` keeps "nothing to kill" from reading as a failure.
    let command = format!("sudo pkill -9 {pattern} || true");

    let results = if commands::parallel_mode(config, exec) {
        let pb = progress::spinner(format!("Shutting down {} servers...", targets.len()));
        let results = fleet.dispatch(&targets, &command, &options)?;
        pb.finish_and_clear();
        results
    } else {
        fleet.dispatch_sequential(&targets, &command, &options)?
    };

    commands::print_results(ctx, &targets, &results);

    ui::info("Verifying shutdown...");
    let check = format!("pgrep -l {pattern} || echo 'no release processes found'");
    let verify = fleet.dispatch_sequential(&targets, &check, &options)?;

    let mut lingering = 0;
    for server in &targets {
        let output = verify.get(&server.id).and_then(|outcome| outcome.output());
        match output {
            Some(output)
                if output.contains(pattern.as_str())
                    && !output.contains("no release processes found") =>
            {
                lingering += 1;
                ui::warn(&format!(
                    "Release processes may still be running on {}",
                    server.name
                ));
            }
            _ => ui::success(&format!("{} is clean", server.name)),
        }
    }

    let summary = DispatchSummary::of(&results);
    println!();
    if !summary.is_success() {
        bail!(
            "shutdown failed on {} of {} servers",
            summary.failed,
            summary.total
        );
    }
    if lingering > 0 {
        ui::warn(&format!(
            "Shutdown completed, {lingering} servers may still have release processes"
        ));
    } else {
        ui::success("Shutdown operation completed");
    }
    Ok(())
}
