pub mod bootstrap;
pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "delicia",
    about = "La Delicia virtual waiter",
    long_about = "Chat with Bruno, the virtual waiter of La Delicia, manage the menu index, and inspect configuration readiness.",
    after_help = "Examples:\n  delicia\n  delicia index --rebuild\n  delicia doctor --json\n  delicia config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a delicia.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start an interactive session with the virtual waiter (default)")]
    Chat,
    #[command(about = "Build the knowledge index, or load it if it already exists")]
    Index {
        #[arg(long, help = "Delete any existing index and build it again")]
        rebuild: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Gemini key readiness, Notion credentials, and the index")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => commands::chat::run(config_path),
        Command::Index { rebuild } => commands::index::run(config_path, rebuild),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(config_path) }
        }
        Command::Doctor { json } => commands::doctor::run(config_path, json),
    };

    if !result.output.is_empty() {
        println!("{}", result.output);
    }
    ExitCode::from(result.exit_code)
}
