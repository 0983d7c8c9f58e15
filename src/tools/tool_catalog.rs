// =============================================================================
// TOOL CATALOG
// =============================================================================
//
// Every leaf operation the server exposes, grouped by the Google service it
// talks to. `register_all` is the only entry point the composition root uses.

#[path = "comment_tools.rs"]
pub mod comment_tools;
#[path = "document_tools.rs"]
pub mod document_tools;
#[path = "drive_tools.rs"]
pub mod drive_tools;
#[path = "script_tools.rs"]
pub mod script_tools;
#[path = "spreadsheet_tools.rs"]
pub mod spreadsheet_tools;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::tools::{RegistryError, ToolRegistry};

pub fn register_all(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    document_tools::register(registry)?;
    spreadsheet_tools::register(registry)?;
    drive_tools::register(registry)?;
    comment_tools::register(registry)?;
    script_tools::register(registry)?;
    Ok(())
}

/// Timestamps as shown to the agent. Missing values read as "Unknown".
pub(crate) fn display_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "Unknown".to_string())
}
