// SPDX-License-Identifier: Apache-2.0 OR MIT
// Unix control socket: one JSON command in, one JSON response out

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::logging::LoggingContext;
use crate::management::handle_management_command;
use crate::{ManagementCommand, Response};

pub const DEFAULT_CONTROL_SOCKET_PATH: &str = "/tmp/dispatch_log_control.sock";

/// Source the control server logs through
pub const SOURCE_CONTROL: &str = "CONTROL";

/// Bind the control socket, replacing a stale socket file
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {:?}", path))?;
    }
    let std_listener = std::os::unix::net::UnixListener::bind(path)
        .with_context(|| format!("Failed to bind control socket {:?}", path))?;
    std_listener.set_nonblocking(true)?;
    Ok(UnixListener::from_std(std_listener)?)
}

/// Accept clients until `shutdown` resolves
///
/// Clients are handled inline, one at a time; every command is a short
/// registry operation.
pub async fn serve<F>(context: Arc<LoggingContext>, listener: UnixListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let logger = context.logger(SOURCE_CONTROL);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log_debug!(logger, "Control server stopping");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((client_stream, _)) => {
                    if let Err(e) = handle_client(client_stream, &context).await {
                        log_error!(logger, "Error handling client: {:#}", e);
                    }
                }
                Err(e) => {
                    log_error!(logger, "Failed to accept control connection: {}", e);
                }
            },
        }
    }

    Ok(())
}

/// Read one command to EOF, run it and write back the response
pub async fn handle_client(mut client_stream: UnixStream, context: &LoggingContext) -> Result<()> {
    let mut buffer = Vec::new();
    client_stream.read_to_end(&mut buffer).await?;

    let response = match serde_json::from_slice::<ManagementCommand>(&buffer) {
        Ok(command) => handle_management_command(context, command),
        Err(e) => Response::Error(format!("Invalid command: {}", e)),
    };

    let response_bytes = serde_json::to_vec(&response)?;
    client_stream.write_all(&response_bytes).await?;
    client_stream.shutdown().await?;
    Ok(())
}

/// Send one command to a control socket and wait for the response
pub async fn send_command(socket_path: &Path, command: &ManagementCommand) -> Result<Response> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to {:?}", socket_path))?;
    let command_bytes = serde_json::to_vec(command)?;
    stream.write_all(&command_bytes).await?;
    // Half-close so the server sees EOF
    stream.shutdown().await?;

    let mut response_bytes = Vec::new();
    stream.read_to_end(&mut response_bytes).await?;

    let response: Response =
        serde_json::from_slice(&response_bytes).context("Malformed response from server")?;
    Ok(response)
}
