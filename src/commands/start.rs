//! Start the release across the fleet: routers first, then compute
//! nodes peered against the first router.

use crate::cli::{ExecArgs, SelectArgs};
use crate::config::Config;
use crate::registry;
use crate::{Context, commands, progress, ui};
use anyhow::{Result, bail};
use fleetkit::{Fleet, RetryConfig, Selection, Server, ServerType, select};
use std::thread;
use std::time::Duration;

pub fn run(_ctx: &Context, config: &Config, args: &SelectArgs, exec: &ExecArgs) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;
    let selection = commands::resolve_selection(args)?.unwrap_or(Selection::All);
    let selected = select(&servers, &selection);

    let builders: Vec<_> = of_kind(&selected, ServerType::Build);
    let routers: Vec<_> = of_kind(&selected, ServerType::Router);
    let computes: Vec<_> = of_kind(&selected, ServerType::Compute);

    if routers.is_empty() {
        bail!("no router servers in the selection, cannot start a release");
    }

    if commands::needs_confirmation(args, exec)
        && !commands::confirm_proceed(&format!(
            "Start the release on {} routers and {} compute nodes?",
            routers.len(),
            computes.len()
        ))?
    {
        ui::warn("Aborted");
        return Ok(());
    }

    ui::header(&format!(
        "Starting release with {} routers and {} compute nodes",
        routers.len(),
        computes.len()
    ));

    let fleet = Fleet::over_ssh(config.ssh_options());
    let retry = commands::dispatch_options(config, exec, false).retry;
    let port = config.release.http_port;
    let workdir = &config.release.workdir;

    // Release images are fetched on boot, so the file servers come up first.
    for build in &builders {
        ui::info(&format!("Starting release file server on {}", build.name));
        let started = fleet.run_on(
            build,
            &format!("cd {workdir} && nohup python3 -m http.server {port} > /dev/null 2>&1 &"),
            &retry,
        );
        if started.is_failure() {
            log::warn!("could not start the file server on {}", build.name);
        }
        thread::sleep(Duration::from_secs(1));
    }

    for router in &routers {
        ui::section(&format!("Starting router {}", router.name));
        stop_stale(&fleet, router, config, &retry)?;
        start_node(&fleet, router, &routers[0], config, &retry)?;
        wait_for_router(config, &router.address)?;
        ui::success(&format!("Router {} is available", router.name));
    }

    for compute in &computes {
        ui::section(&format!("Starting compute node {}", compute.name));
        let result: Result<()> = stop_stale(&fleet, compute, config, &retry)
            .and_then(|()| start_node(&fleet, compute, &routers[0], config, &retry));
        match result {
            Ok(()) => ui::success(&format!("Started release on {}", compute.name)),
            // Compute failures are reported but do not stop the rollout.
            Err(e) => ui::error(&format!("Failed to start {}: {e:#}", compute.name)),
        }
    }

    Ok(())
}

fn of_kind(servers: &[Server], kind: ServerType) -> Vec<Server> {
    servers
        .iter()
        .filter(|server| server.kind == kind)
        .cloned()
        .collect()
}

fn stop_stale(
    fleet: &Fleet,
    server: &Server,
    config: &Config,
    retry: &RetryConfig,
) -> Result<()> {
    commands::step(
        fleet,
        server,
        &format!("sudo pkill -9 {} || true", config.release.process_pattern),
        retry,
        "stop stale release processes",
    )?;
    thread::sleep(Duration::from_secs(5));
    Ok(())
}

/// Routers peer against themselves, everything else against the first
/// router.
fn start_node(
    fleet: &Fleet,
    server: &Server,
    first_router: &Server,
    config: &Config,
    retry: &RetryConfig,
) -> Result<()> {
    let release = &config.release;
    let peer = if server.kind == ServerType::Router {
        server
    } else {
        first_router
    };
    let command = format!(
        "cd {} && ./run start_release --data-disk {} --self {}:{} --peer {}:{}",
        release.workdir,
        release.data_disk,
        server.address,
        release.router_port,
        peer.address,
        release.router_port,
    );
    commands::step(fleet, server, &command, retry, "start the release")?;
    Ok(())
}

/// Poll the router readiness endpoint until it answers with a body.
fn wait_for_router(config: &Config, address: &str) -> Result<()> {
    let release = &config.release;
    let url = format!(
        "http://{address}:{}{}",
        release.router_port, release.router_endpoint
    );
    log::info!("waiting for router at {url}");

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(2)))
        .build()
        .into();

    let pb = progress::spinner(format!("Waiting for {url}"));
    for _ in 0..release.router_retries {
        if let Ok(mut response) = agent.get(url.as_str()).call() {
            if response.status() == 200
                && response
                    .body_mut()
                    .read_to_string()
                    .map(|body| !body.is_empty())
                    .unwrap_or(false)
            {
                pb.finish_and_clear();
                return Ok(());
            }
        }
        thread::sleep(Duration::from_secs(release.router_retry_delay));
    }
    pb.finish_and_clear();

    bail!(
        "timed out waiting for router at {url} after {} attempts",
        release.router_retries
    )
}
