use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "armada")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Fleet deployment CLI - drive releases across your servers", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a command on selected servers
    Run(RunArgs),

    /// Build and package a release on the build servers
    Build {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Download the packaged release from a build server to the rest of the fleet
    Download {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Start the release on router and compute servers
    Start {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Terminate release processes on selected servers
    Shutdown {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Push per-type configuration files to selected servers
    UpdateConfig {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        exec: ExecArgs,
    },

    /// List the server registry
    Servers {
        /// Only show servers of this type
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        server_type: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Command to run on the selected servers
    pub command: String,

    #[command(flatten)]
    pub select: SelectArgs,

    #[command(flatten)]
    pub exec: ExecArgs,
}

/// Which servers an operation applies to.
#[derive(Args)]
pub struct SelectArgs {
    /// Comma-separated list of server ids
    #[arg(short, long, value_name = "IDS")]
    pub servers: Option<String>,

    /// Server type to select (build, router, compute, dev, all)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub server_type: Option<String>,
}

/// Execution knobs shared by every operation; defaults come from config.
#[derive(Args)]
pub struct ExecArgs {
    /// Execute in parallel
    #[arg(long, conflicts_with = "sequential")]
    pub parallel: bool,

    /// Execute one server at a time
    #[arg(long)]
    pub sequential: bool,

    /// Maximum number of parallel workers
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Per-server timeout in seconds (parallel mode only)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of retries for transient failures
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Initial delay between retries in seconds
    #[arg(long, value_name = "SECONDS")]
    pub retry_delay: Option<u64>,

    /// Skip confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,
}
