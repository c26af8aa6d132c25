use std::path::Path;

use portable_exec::{ContainerClient, tool};

/// Archive tool every run needs besides the container tool.
const ARCHIVE_TOOL: &str = "tar";

/// Make sure the container tool and `tar` can be found.
///
/// Every missing executable is reported, not just the first; the client is
/// only returned when nothing is missing.
pub fn check_tools(container_tool: Option<&Path>) -> Option<ContainerClient> {
    let container = match ContainerClient::locate(container_tool) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!("{e}");
            None
        }
    };

    let archive_found = tool::locate(ARCHIVE_TOOL).is_some();
    if !archive_found {
        tracing::error!("Required executable '{ARCHIVE_TOOL}' not found");
    }

    let client = container.filter(|_| archive_found)?;
    tracing::debug!(container_tool = client.program(), "found required tools");
    Some(client)
}
