//! Distribute a packaged release from a build server to the fleet.
//!
//! A throwaway HTTP server is started on every build server, the other
//! servers pull the tarball from the first one, and the file servers are
//! stopped again no matter how the downloads went.

use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, ui};
use anyhow::{Result, bail};
use fleetkit::{DispatchSummary, Fleet, ResultSet, Selection, ServerType, select};
use std::thread;
use std::time::Duration;

pub fn run(ctx: &Context, config: &Config, args: &SelectArgs, exec: &ExecArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection = commands::resolve_selection(args)?.unwrap_or(Selection::All);
    let selected = select(&servers, &selection);

    let builders: Vec<_> = selected
        .iter()
        .filter(|server| server.kind == ServerType::Build)
        .cloned()
        .collect();
    let targets: Vec<_> = selected
        .iter()
        .filter(|server| server.kind != ServerType::Build)
        .cloned()
        .collect();

    if builders.is_empty() {
        bail!("no build servers in the selection, cannot download a release");
    }
    if targets.is_empty() {
        bail!("no target servers in the selection, nothing to download to");
    }

    if commands::needs_confirmation(args, exec)
        && !commands::confirm_proceed(&format!(
            "Download the release to {} servers?",
            targets.len()
        ))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    let fleet = Fleet::over_ssh(config.ssh_options());
    let options = commands::dispatch_options(config, exec, false);
    let port = config.release.http_port;
    let workdir = &config.release.workdir;

    for build in &builders {
        ui::info(&format!("Starting release file server on {}", build.name));
        let started = fleet.run_on(
            build,
            &format!("cd {workdir} && nohup python3 -m http.server {port} > /dev/null 2>&1 &"),
            &options.retry,
        );
        if started.is_failure() {
            log::warn!("could not start the file server on {}", build.name);
        }
        thread::sleep(Duration::from_secs(1));
    }

    let results: Result<ResultSet> = (|| {
        let url = format!("http://{}:{port}/release.tar.gz", builders[0].address);
        ui::info(&format!("Downloading {url}"));
        Ok(fleet.dispatch_sequential(
            &targets,
            &format!("cd {workdir} && sudo ./run download_release --url {url}"),
            &options,
        )?)
    })();

    // Always stop the file servers, even when a download failed.
    for build in &builders {
        let _ = fleet.run_on(
            build,
            &format!("pkill -f 'python3 -m http.server {port}'"),
            &options.retry,
        );
    }

    let results = results?;
    commands::print_results(ctx, &targets, &results);

    let summary = DispatchSummary::of(&results);
    println!();
    if summary.is_success() {
        ui::success(&format!("Release downloaded to {} servers", summary.total));
        Ok(())
    } else {
        bail!(
            "download failed on {} of {} servers",
            summary.failed,
            summary.total
        )
    }
}
