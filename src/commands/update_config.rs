//! Push per-type node configuration files to the fleet.

use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, ui};
use anyhow::{Context as AnyhowContext, Result};
use fleetkit::{ExecutionOutcome, Fleet, RetryConfig, Selection, Server, ServerType, select};
use std::fs;
use std::path::Path;

pub fn run(_ctx: &Context, config: &Config, args: &SelectArgs, exec: &ExecArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection = commands::resolve_selection(args)?.unwrap_or(Selection::All);
    let targets = select(&servers, &selection);

    if targets.is_empty() {
        ui::warn("No servers matched the selection, nothing to do");
        return Ok(());
    }

    if commands::needs_confirmation(args, exec)
        && !commands::confirm_proceed(&format!(
            "Update configuration on all {} servers?",
            targets.len()
        ))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    ui::header("Updating node configuration");

    let fleet = Fleet::over_ssh(config.ssh_options());
    let retry = commands::dispatch_options(config, exec, false).retry;

    let mut updated = 0;
    let mut skipped = 0;
    for server in &targets {
        // Build servers carry no node configuration.
        if server.kind == ServerType::Build {
            log::debug!("skipping build server {}", server.name);
            skipped += 1;
            continue;
        }

        let local = config
            .release
            .types_dir
            .join(format!("{}.json", server.kind));
        if !local.exists() {
            ui::warn(&format!(
                "No config for type '{}' ({}), skipping {}",
                server.kind,
                local.display(),
                server.name
            ));
            skipped += 1;
            continue;
        }

        match push_config(&fleet, server, config, &local, &retry) {
            Ok(()) => {
                ui::success(&format!("Updated configuration on {}", server.name));
                updated += 1;
            }
            Err(e) => {
                ui::error(&format!(
                    "Failed to update configuration on {}: {e:#}",
                    server.name
                ));
                skipped += 1;
            }
        }
    }

    println!();
    ui::info(&format!(
        "Configuration update completed: {updated} updated, {skipped} skipped"
    ));
    Ok(())
}

fn push_config(
    fleet: &Fleet,
    server: &Server,
    config: &Config,
    local: &Path,
    retry: &RetryConfig,
) -> Result<()> {
    let workdir = &config.release.workdir;
    let remote = format!("{workdir}/{}", config.release.remote_config);
    let backups = format!("{workdir}/config/backups");

    // A missing backup is logged but never blocks the update.
    if fleet
        .run_on(server, &format!("mkdir -p {backups}"), retry)
        .is_failure()
    {
        log::warn!("could not create {} on {}", backups, server.name);
    }

    let timestamp = match fleet.run_on(server, "date +%s", retry) {
        ExecutionOutcome::Success { output } => output.trim().to_string(),
        ExecutionOutcome::Failure { .. } => "unknown".to_string(),
    };
    let backup = format!("{backups}/node-{timestamp}.json");
    if fleet
        .run_on(
            server,
            &format!("cp {remote} {backup} 2>/dev/null || true"),
            retry,
        )
        .is_success()
    {
        log::info!("created backup {} on {}", backup, server.name);
    }

    let content = fs::read_to_string(local)
        .with_context(|| format!("Could not read {}", local.display()))?;
    let escaped = content.replace('\'', "'\\''");
    commands::step(
        fleet,
        server,
        &format!("echo '{escaped}' > {remote}"),
        retry,
        "write the node configuration",
    )?;
    Ok(())
}
