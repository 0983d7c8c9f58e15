use std::fmt;

use thiserror::Error;

/// Every way a tool invocation can fail.
///
/// Each variant carries plain strings only. Remote and transport structures
/// are flattened into messages before they reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// No tool with this name is registered. This is an integration error,
    /// not something the remote side did.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The arguments failed the tool's schema. No remote call was made.
    #[error("Invalid arguments for {tool}: {field} {reason}")]
    InvalidInput {
        tool: String,
        field: String,
        reason: String,
    },

    /// The Google session could not be established.
    #[error("{0}")]
    Initialization(String),

    /// The tool ran and failed.
    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    /// Collapse into the single shape returned to the agent.
    pub fn normalized(&self) -> NormalizedError {
        NormalizedError {
            message: self.to_string(),
        }
    }

    /// True for failures caused by how the server was wired up rather than
    /// by the request or the remote services.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ToolError::UnknownTool(_))
    }
}

/// The only error shape that crosses the dispatch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError {
    pub message: String,
}

impl fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_names_the_field() {
        let err = ToolError::InvalidInput {
            tool: "getScriptProjects".into(),
            field: "pageSize".into(),
            reason: "must be at most 50".into(),
        };
        assert_eq!(
            err.normalized().message,
            "Invalid arguments for getScriptProjects: pageSize must be at most 50"
        );
        assert!(!err.is_configuration());
    }

    #[test]
    fn unknown_tools_are_configuration_errors() {
        let err = ToolError::UnknownTool("doesNotExist".into());
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Unknown tool: doesNotExist");
    }
}
