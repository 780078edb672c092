pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "autoreply",
    about = "Autoreply operator CLI",
    long_about = "Inspect configuration, check readiness, lint the rules file, and preview replies offline.",
    after_help = "Examples:\n  autoreply doctor --json\n  autoreply rules --path responses.json\n  autoreply reply \"hi there\" --name Ana --time 14:05"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness, and the rules resource")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Load the rules file and report rule count and warnings")]
    Rules {
        #[arg(long, help = "Rules file to load instead of the configured one")]
        path: Option<PathBuf>,
    },
    #[command(about = "Resolve a message against the rules without contacting Telegram")]
    Reply {
        #[arg(help = "Message text as a user would send it")]
        message: String,
        #[arg(long, help = "Display name substituted for {name}")]
        name: Option<String>,
        #[arg(long, help = "Time substituted for {time} (defaults to the local HH:MM)")]
        time: Option<String>,
        #[arg(long, help = "Rules file to load instead of the configured one")]
        path: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Rules { path } => commands::rules::run(path),
        Command::Reply { message, name, time, path } => {
            commands::reply::run(commands::reply::ReplyArgs { message, name, time, path })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
