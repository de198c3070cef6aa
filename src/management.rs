// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Management command handling.
//!
//! The handler is pure with respect to transport: it takes a decoded command,
//! acts on the logging context and returns the response to send back. The
//! control socket and the in-process callers share it.

use crate::logging::{level_names, LoggingContext};
use crate::{ManagementCommand, Response};

/// Handle one management command against `context`
pub fn handle_management_command(context: &LoggingContext, command: ManagementCommand) -> Response {
    match command {
        ManagementCommand::UpdateSource(update) => match context.apply_update(&update) {
            Ok(handle) => Response::Success(format!("Log source '{}' updated", handle.module())),
            Err(e) => Response::Error(e.to_string()),
        },

        ManagementCommand::ResetSource { module } => {
            let handle = context.reset_source(&module);
            Response::Success(format!("Log source '{}' reset", handle.module()))
        }

        ManagementCommand::GetSource { module } => {
            Response::Source(context.source_settings(&module))
        }

        ManagementCommand::RecentEntries { limit } => {
            // Non-positive limits mean "everything"
            let limit = usize::try_from(limit).unwrap_or(0);
            Response::Entries(context.recent(limit))
        }

        ManagementCommand::SourceStats { module } => Response::Stats(context.source_stats(&module)),

        ManagementCommand::ListSourceStats => Response::AllStats(context.all_source_stats()),

        ManagementCommand::LevelNames => {
            Response::LevelNames(level_names().into_iter().map(str::to_string).collect())
        }

        ManagementCommand::Log {
            module,
            level,
            text,
        } => {
            let source = context.source(&module);
            context.emit(&source, level, None, None, format_args!("{}", text));
            Response::Success(format!("Logged to '{}' at {}", source.module(), level))
        }

        ManagementCommand::Ping => Response::Success("pong".to_string()),
    }
}
