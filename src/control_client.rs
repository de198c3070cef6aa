// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::Result;
use clap::Parser;
use dispatch_log::control::DEFAULT_CONTROL_SOCKET_PATH;
use dispatch_log::{Level, ManagementCommand, SourceUpdate};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: CliCommand,

    /// Path to the control socket
    #[arg(long, default_value = DEFAULT_CONTROL_SOCKET_PATH)]
    socket_path: PathBuf,
}

#[derive(Parser, Debug)]
pub enum CliCommand {
    /// Change a log source's settings
    Update {
        /// Module name (DEFAULT sets the fallbacks)
        module: String,
        /// stdout, stderr, syslog or a file path
        #[arg(long)]
        output: Option<String>,
        /// Enable spec, e.g. "info+" or "trace,error+"; "default" inherits
        #[arg(long)]
        enable: Option<String>,
        #[arg(long)]
        timestamp: Option<bool>,
        /// Show the file:line of each call site
        #[arg(long)]
        source: Option<bool>,
    },
    /// Reset a log source to inherit from DEFAULT
    Reset { module: String },
    /// Show a log source's own settings
    Get { module: String },
    /// Show recent log entries, oldest first
    Recent {
        /// Number of entries (0 for all)
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// Show per-level event counts for one source, or all of them
    Stats { module: Option<String> },
    /// List valid level names
    Levels,
    /// Emit a line through a log source
    Log {
        module: String,
        #[arg(long, value_parser = parse_level, default_value = "info")]
        level: Level,
        text: String,
    },
    /// Check that the daemon is responding
    Ping,
}

fn parse_level(s: &str) -> Result<Level, String> {
    Level::from_name(s).map_err(|e| e.to_string())
}

pub fn build_command(cli_command: CliCommand) -> ManagementCommand {
    match cli_command {
        CliCommand::Update {
            module,
            output,
            enable,
            timestamp,
            source,
        } => ManagementCommand::UpdateSource(SourceUpdate {
            module,
            output,
            enable,
            timestamp,
            source_display: source,
        }),
        CliCommand::Reset { module } => ManagementCommand::ResetSource { module },
        CliCommand::Get { module } => ManagementCommand::GetSource { module },
        CliCommand::Recent { limit } => ManagementCommand::RecentEntries { limit },
        CliCommand::Stats { module: Some(module) } => ManagementCommand::SourceStats { module },
        CliCommand::Stats { module: None } => ManagementCommand::ListSourceStats,
        CliCommand::Levels => ManagementCommand::LevelNames,
        CliCommand::Log {
            module,
            level,
            text,
        } => ManagementCommand::Log {
            module,
            level,
            text,
        },
        CliCommand::Ping => ManagementCommand::Ping,
    }
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> Result<()> {
    use dispatch_log::control::send_command;
    use dispatch_log::Response;

    let args = Args::parse();
    let command = build_command(args.command);

    let response = send_command(&args.socket_path, &command).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Response::Error(_) = response {
        std::process::exit(1);
    }
    Ok(())
}
