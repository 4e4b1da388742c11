//! List the server registry.

use crate::config::Config;
use crate::registry;
use crate::{Context, ui};
use anyhow::{Result, anyhow};
use colored::Colorize;
use fleetkit::{Selection, ServerType, select};

pub fn run(_ctx: &Context, config: &Config, server_type: Option<&str>) -> Result<()> {
    let servers = registry::load_servers(&config.registry.file)?;

    let filtered = match server_type {
        None | Some("all") => servers,
        Some(name) => {
            let kind = ServerType::from_name(name)
                .ok_or_else(|| anyhow!("unknown server type '{name}'"))?;
            select(&servers, &Selection::Type(kind))
        }
    };

    if filtered.is_empty() {
        ui::warn("No servers found");
        return Ok(());
    }

    ui::header(&format!("{} servers", filtered.len()));

    let id_width = filtered.iter().map(|s| s.id.len()).max().unwrap_or(0);
    let name_width = filtered.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for server in &filtered {
        println!(
            "  {}  {}  {}  {}",
            format!("{:<id_width$}", server.id).bold(),
            format!("{:<7}", server.kind.name()).cyan(),
            format!("{:<name_width$}", server.name),
            server.address.dimmed(),
        );
    }

    Ok(())
}
