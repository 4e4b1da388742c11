//! Build and package a release on the build servers.
//!
//! Each build server is processed independently: a failed build on one
//! does not stop the others, and the content Dockerfile is restored even
//! when a step fails.

use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, ui};
use anyhow::{Result, bail};
use fleetkit::{Fleet, RetryConfig, Selection, Server, ServerType, select};
use rand::Rng;
use rand::distributions::Alphanumeric;

pub fn run(_ctx: &Context, config: &Config, args: &SelectArgs, exec: &ExecArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection =
        commands::resolve_selection(args)?.unwrap_or(Selection::Type(ServerType::Build));
    let selected = select(&servers, &selection);

    let builders: Vec<_> = selected
        .iter()
        .filter(|server| server.kind == ServerType::Build)
        .cloned()
        .collect();
    if builders.len() < selected.len() {
        ui::warn("Ignoring non-build servers in the selection");
    }
    if builders.is_empty() {
        ui::warn("No build servers selected, nothing to do");
        return Ok(());
    }

    if commands::needs_confirmation(args, exec)
        && !commands::confirm_proceed(&format!(
            "Build a release on {} build servers?",
            builders.len()
        ))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    let fleet = Fleet::over_ssh(config.ssh_options());
    let retry = commands::dispatch_options(config, exec, false).retry;

    let mut failures = 0;
    for server in &builders {
        ui::section(&format!("Building on {}", server.name));
        match build_on(&fleet, server, config, &retry) {
            Ok(()) => ui::success(&format!("Build completed on {}", server.name)),
            Err(e) => {
                failures += 1;
                ui::error(&format!("Build failed on {}: {e:#}", server.name));
            }
        }
    }

    if failures > 0 {
        bail!("build failed on {} of {} servers", failures, builders.len());
    }
    Ok(())
}

fn build_on(fleet: &Fleet, server: &Server, config: &Config, retry: &RetryConfig) -> Result<()> {
    let workdir = &config.release.workdir;
    let dockerfile = format!("{workdir}/resources/content.Dockerfile");

    commands::step(
        fleet,
        server,
        &format!("cp {dockerfile} {dockerfile}.bak"),
        retry,
        "back up the content Dockerfile",
    )?;

    let result: Result<()> = (|| {
        // A fresh stamp forces the content layer to rebuild.
        let stamp = build_stamp();
        commands::step(
            fleet,
            server,
            &format!(
                "sed -i '/RUN mkdir -p \\/build \\/release/a RUN echo \"{stamp}\"' {dockerfile}"
            ),
            retry,
            "inject the build stamp",
        )?;
        commands::step(
            fleet,
            server,
            &format!("cd {workdir} && ./run build_guest"),
            retry,
            "build the guest image",
        )?;
        commands::step(
            fleet,
            server,
            &format!(
                "cd {workdir} && sudo rm -rf inputs.json release release.tar.gz && sudo ./run package_release"
            ),
            retry,
            "package the release",
        )?;
        Ok(())
    })();

    // Restore the Dockerfile no matter how the steps went.
    let restore = fleet.run_on(server, &format!("mv {dockerfile}.bak {dockerfile}"), retry);
    if restore.is_failure() {
        log::warn!("could not restore {} on {}", dockerfile, server.name);
    }

    result
}

/// Random 64-character alphanumeric build identifier.
fn build_stamp() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_stamp_shape() {
        let stamp = build_stamp();
        assert_eq!(stamp.len(), 64);
        assert!(stamp.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(stamp, build_stamp());
    }
}
