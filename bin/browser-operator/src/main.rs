mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "browser-operator")]
#[command(about = "Drive a browser through computer-use actions and replay the session as a script", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a list of tool calls against a fresh browser session
    Run {
        /// JSON file containing `[{"tool": "...", "params": {...}}, ...]`
        steps: PathBuf,

        /// Navigate here before the first step
        #[arg(short, long)]
        url: Option<String>,

        /// Save the synthesized replay script under this name
        #[arg(short, long)]
        save: Option<String>,
    },

    /// List the tools exposed to the agent loop
    Tools,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { steps, url, save } => {
            commands::run_cmd::run(&steps, url, save).await?;
        }
        Commands::Tools => {
            commands::tools_cmd::list().await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::config_cmd::show().await?,
            ConfigCommands::Init { force } => commands::config_cmd::init(force).await?,
        },
    }

    Ok(())
}
