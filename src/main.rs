// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{Context, Result};
use clap::Parser;
use dispatch_log::control::{self, DEFAULT_CONTROL_SOCKET_PATH};
use dispatch_log::logging::LoggingContext;
use dispatch_log::{log_error, log_info, log_notice, Config};
use std::path::PathBuf;
use std::sync::Arc;

/// Source the daemon reports its own lifecycle through
const SOURCE_LOGD: &str = "LOGD";

#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON5 startup configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the control socket
    #[arg(long, default_value = DEFAULT_CONTROL_SOCKET_PATH)]
    control_socket_path: PathBuf,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let config = Config::load_from_file(path)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_ref())?;
    let context = Arc::new(LoggingContext::with_settings(config.settings()));
    config.apply(&context)?;

    let logger = context.logger(SOURCE_LOGD);
    let listener = control::bind(&args.control_socket_path)?;
    log_info!(
        logger,
        "Control socket listening on {:?}",
        &args.control_socket_path
    );

    let served = control::serve(Arc::clone(&context), listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error!(logger, "Failed to wait for Ctrl-C: {}", e);
        }
    })
    .await;
    if let Err(e) = &served {
        log_error!(logger, "Control server failed: {:#}", e);
    }
    log_notice!(logger, "Shutting down");

    if let Err(e) = std::fs::remove_file(&args.control_socket_path) {
        log_error!(
            logger,
            "Failed to remove control socket {:?}: {}",
            &args.control_socket_path,
            e
        );
    }
    drop(logger);

    let context = Arc::try_unwrap(context)
        .map_err(|_| anyhow::anyhow!("Logging context still in use at shutdown"))?;
    let summary = context.shutdown();
    if summary.orphaned_sinks > 0 {
        eprintln!(
            "[logd] {} sink(s) were still open at shutdown",
            summary.orphaned_sinks
        );
    }

    served
}
