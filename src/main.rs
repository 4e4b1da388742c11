mod cli;
mod commands;
mod config;
mod progress;
mod registry;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let config = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run(args) => commands::run::run(&ctx, &config, &args),
        Command::Build { select, exec } => commands::build::run(&ctx, &config, &select, &exec),
        Command::Download { select, exec } => {
            commands::download::run(&ctx, &config, &select, &exec)
        }
        Command::Start { select, exec } => commands::start::run(&ctx, &config, &select, &exec),
        Command::Shutdown { select, exec } => {
            commands::shutdown::run(&ctx, &config, &select, &exec)
        }
        Command::UpdateConfig { select, exec } => {
            commands::update_config::run(&ctx, &config, &select, &exec)
        }
        Command::Servers { server_type } => {
            commands::servers::run(&ctx, &config, server_type.as_deref())
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "armada", &mut io::stdout());
            Ok(())
        }
    }
}
