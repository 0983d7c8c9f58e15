use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RemoteError;

/// File types the Apps Script API reports for project files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptFileType {
    ServerJs,
    Json,
    Html,
}

impl ScriptFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptFileType::ServerJs => "SERVER_JS",
            ScriptFileType::Json => "JSON",
            ScriptFileType::Html => "HTML",
        }
    }

    /// Language tag used when rendering the source in a fenced block.
    pub fn fence_language(&self) -> &'static str {
        match self {
            ScriptFileType::ServerJs => "javascript",
            ScriptFileType::Json => "json",
            ScriptFileType::Html => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub name: String,
    pub file_type: ScriptFileType,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptProject {
    pub script_id: String,
    pub title: String,
    pub parent_id: Option<String>,
}

#[async_trait]
pub trait ScriptService: Send + Sync {
    /// Create a project bound to the given document or spreadsheet.
    async fn create_project(&self, title: &str, parent_id: &str)
        -> Result<ScriptProject, RemoteError>;

    /// Replace the project's entire file set.
    async fn update_content(
        &self,
        script_id: &str,
        files: Vec<ScriptFile>,
    ) -> Result<Vec<ScriptFile>, RemoteError>;

    async fn get_content(&self, script_id: &str) -> Result<Vec<ScriptFile>, RemoteError>;
}
