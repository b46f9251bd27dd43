//! dropship CLI
//!
//! Pushes a project directory to a server over SSH, makes sure Docker and
//! Compose are installed there, and starts the project's compose stack.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dropship::commands;
use dropship::output::print_error;
use dropship::resolver::TargetArgs;
use ds_core::DeployFailure;

#[derive(Parser)]
#[command(name = "dropship")]
#[command(author, version, about = "Deploy a docker compose project to a server over SSH")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the project and start it on the target host
    Deploy {
        /// Project directory containing the compose file
        #[arg(default_value = ".")]
        project: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// SSH port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect or remove the saved deployment target
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// Show the saved target (passwords are never printed)
    Show {
        #[arg(default_value = ".")]
        project: PathBuf,
    },
    /// Delete the saved target
    Forget {
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        #[arg(default_value = ".")]
        project: PathBuf,
    },
    /// Show the configuration file path
    Path {
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        // Deploy failures are reported with their hint before returning
        if e.downcast_ref::<DeployFailure>().is_none() {
            print_error(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_ref();

    match cli.command {
        Commands::Deploy {
            project,
            target,
            port,
        } => commands::deploy_command(config, &project, target, port).await,
        Commands::Target { action } => match action {
            TargetAction::Show { project } => commands::target_show(config, &project),
            TargetAction::Forget { project } => commands::target_forget(config, &project),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { project } => commands::config_show(config, &project),
            ConfigAction::Path { project } => commands::config_path(config, &project),
        },
    }
}
