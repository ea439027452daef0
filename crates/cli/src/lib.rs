pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::chat::ChatOptions;

#[derive(Debug, Parser)]
#[command(
    name = "intake",
    about = "Property intake assistant",
    long_about = "Chat with the property intake assistant, inspect configuration, check readiness, and manage the session store.",
    after_help = "Examples:\n  intake chat\n  intake chat --session session_1a2b3c4d\n  intake doctor --json\n  intake config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Start or resume an interactive conversation")]
    Chat {
        #[arg(long, help = "Resume an existing session by id")]
        session: Option<String>,
        #[arg(long, help = "Keep the session in memory only")]
        ephemeral: bool,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model readiness, and session store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Chat { session, ephemeral } => {
            commands::chat::run(ChatOptions { session, ephemeral })
        }
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
