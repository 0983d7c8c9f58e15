// =============================================================================
// APPS SCRIPT TOOLS
// =============================================================================
//
// Create container-bound script projects, replace their files, read them
// back, and list standalone projects through Drive.

use anyhow::Context;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::display_time;
use crate::core::tools::{RegistryError, RenderText, Tool, ToolContext, ToolRegistry};
use crate::core::workspace::{DriveFile, FileQuery, ScriptFile, ScriptFileType, GOOGLE_SCRIPT_MIME};

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(CreateBoundScript)?;
    registry.register(UpdateScriptContent)?;
    registry.register(GetScriptContent)?;
    registry.register(GetScriptProjects)?;
    Ok(())
}

// =============================================================================
// createBoundScript
// =============================================================================

pub struct CreateBoundScript;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoundScriptInput {
    /// Title for the new Apps Script project.
    #[schemars(length(min = 1))]
    pub title: String,
    /// The ID of the Google Spreadsheet or Document to bind the script to.
    #[schemars(length(min = 1))]
    pub parent_id: String,
}

pub struct CreatedScript {
    pub script_id: String,
    pub title: String,
    pub parent_id: String,
}

impl RenderText for CreatedScript {
    fn render(&self) -> String {
        format!(
            "Apps Script project created successfully!\n\n\
             **Script ID:** {}\n**Title:** {}\n**Bound to:** {}\n\n\
             Use this Script ID with updateScriptContent to add your code.",
            self.script_id, self.title, self.parent_id
        )
    }
}

#[async_trait]
impl Tool for CreateBoundScript {
    type Input = CreateBoundScriptInput;
    type Output = CreatedScript;

    fn name(&self) -> &'static str {
        "createBoundScript"
    }

    fn description(&self) -> &'static str {
        "Creates a new Apps Script project bound to a Google Spreadsheet or Document. \
         Returns the script ID for subsequent operations."
    }

    async fn execute(
        &self,
        input: &CreateBoundScriptInput,
        ctx: &ToolContext,
    ) -> anyhow::Result<CreatedScript> {
        ctx.log.info(&format!(
            "Creating bound Apps Script project \"{}\" for parent: {}",
            input.title, input.parent_id
        ));

        let project = ctx
            .services
            .scripts
            .create_project(&input.title, &input.parent_id)
            .await
            .with_context(|| {
                format!(
                    "Failed to create Apps Script project \"{}\" for parent {}",
                    input.title, input.parent_id
                )
            })?;

        Ok(CreatedScript {
            script_id: project.script_id,
            title: input.title.clone(),
            parent_id: input.parent_id.clone(),
        })
    }
}

// =============================================================================
// updateScriptContent
// =============================================================================

pub struct UpdateScriptContent;

/// The file types that can be written. HTML exists in the API but is not
/// accepted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WritableFileType {
    ServerJs,
    Json,
}

impl From<WritableFileType> for ScriptFileType {
    fn from(file_type: WritableFileType) -> Self {
        match file_type {
            WritableFileType::ServerJs => ScriptFileType::ServerJs,
            WritableFileType::Json => ScriptFileType::Json,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScriptFileInput {
    /// File name without extension (e.g., "Code" for Code.gs, "appsscript" for the manifest).
    #[schemars(length(min = 1))]
    pub name: String,
    /// File type: SERVER_JS for .gs files, JSON for the appsscript.json manifest.
    #[serde(rename = "type")]
    pub file_type: WritableFileType,
    /// The source code content of the file.
    pub source: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScriptContentInput {
    /// The ID of the Apps Script project to update.
    #[schemars(length(min = 1))]
    pub script_id: String,
    /// Array of files to include in the script project.
    #[schemars(length(min = 1))]
    pub files: Vec<ScriptFileInput>,
}

pub struct UpdatedScript {
    pub script_id: String,
    pub files: Vec<(String, ScriptFileType)>,
}

impl RenderText for UpdatedScript {
    fn render(&self) -> String {
        let file_list: Vec<String> = self
            .files
            .iter()
            .map(|(name, file_type)| format!("- {} ({})", name, file_type.as_str()))
            .collect();

        format!(
            "Apps Script project updated successfully!\n\n\
             **Script ID:** {}\n**Files updated:**\n{}\n\n\
             To run the script, open the spreadsheet and use the custom menu (if you added onOpen), \
             or go to Extensions > Apps Script.",
            self.script_id,
            file_list.join("\n")
        )
    }
}

#[async_trait]
impl Tool for UpdateScriptContent {
    type Input = UpdateScriptContentInput;
    type Output = UpdatedScript;

    fn name(&self) -> &'static str {
        "updateScriptContent"
    }

    fn description(&self) -> &'static str {
        "Updates the content of an Apps Script project. You can add multiple script files \
         (Code.gs, etc.) and the manifest (appsscript.json). Replaces all existing files."
    }

    async fn execute(
        &self,
        input: &UpdateScriptContentInput,
        ctx: &ToolContext,
    ) -> anyhow::Result<UpdatedScript> {
        ctx.log.info(&format!("Updating Apps Script project: {}", input.script_id));

        let files: Vec<ScriptFile> = input
            .files
            .iter()
            .map(|f| ScriptFile {
                name: f.name.clone(),
                file_type: f.file_type.into(),
                source: f.source.clone(),
            })
            .collect();

        ctx.services
            .scripts
            .update_content(&input.script_id, files)
            .await
            .with_context(|| {
                format!("Failed to update Apps Script content for {}", input.script_id)
            })?;

        Ok(UpdatedScript {
            script_id: input.script_id.clone(),
            files: input
                .files
                .iter()
                .map(|f| (f.name.clone(), f.file_type.into()))
                .collect(),
        })
    }
}

// =============================================================================
// getScriptContent
// =============================================================================

pub struct GetScriptContent;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptIdInput {
    /// The ID of the Apps Script project to retrieve.
    #[schemars(length(min = 1))]
    pub script_id: String,
}

pub struct ScriptContent {
    pub script_id: String,
    pub files: Vec<ScriptFile>,
}

impl RenderText for ScriptContent {
    fn render(&self) -> String {
        let mut result = format!(
            "**Apps Script Project Content**\n**Script ID:** {}\n\n",
            self.script_id
        );
        if self.files.is_empty() {
            result.push_str("(The project has no files.)\n");
        }
        for file in &self.files {
            result.push_str(&format!(
                "### {} ({})\n```{}\n{}\n```\n\n",
                file.name,
                file.file_type.as_str(),
                file.file_type.fence_language(),
                file.source
            ));
        }
        result
    }
}

#[async_trait]
impl Tool for GetScriptContent {
    type Input = ScriptIdInput;
    type Output = ScriptContent;

    fn name(&self) -> &'static str {
        "getScriptContent"
    }

    fn description(&self) -> &'static str {
        "Retrieves the content of an Apps Script project including all files."
    }

    async fn execute(&self, input: &ScriptIdInput, ctx: &ToolContext) -> anyhow::Result<ScriptContent> {
        ctx.log.info(&format!(
            "Getting content of Apps Script project: {}",
            input.script_id
        ));

        let files = ctx
            .services
            .scripts
            .get_content(&input.script_id)
            .await
            .with_context(|| format!("Failed to get Apps Script content for {}", input.script_id))?;

        Ok(ScriptContent {
            script_id: input.script_id.clone(),
            files,
        })
    }
}

// =============================================================================
// getScriptProjects
// =============================================================================

pub struct GetScriptProjects;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptProjectsInput {
    /// Maximum number of projects to return (1-50).
    #[serde(default = "default_page_size")]
    #[schemars(range(min = 1, max = 50))]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    10
}

pub struct ScriptProjects(pub Vec<DriveFile>);

impl RenderText for ScriptProjects {
    fn render(&self) -> String {
        if self.0.is_empty() {
            return "No standalone Apps Script projects found.".to_string();
        }

        let mut result = format!("**Apps Script Projects ({} found)**\n\n", self.0.len());
        for file in &self.0 {
            result.push_str(&format!(
                "- **{}**\n  - ID: {}\n  - Modified: {}\n\n",
                file.name,
                file.id,
                display_time(file.modified_time)
            ));
        }
        result
    }
}

#[async_trait]
impl Tool for GetScriptProjects {
    type Input = GetScriptProjectsInput;
    type Output = ScriptProjects;

    fn name(&self) -> &'static str {
        "getScriptProjects"
    }

    fn description(&self) -> &'static str {
        "Lists Apps Script projects. Note: This only works for standalone scripts. \
         For bound scripts, use the parent document/spreadsheet ID."
    }

    async fn execute(
        &self,
        input: &GetScriptProjectsInput,
        ctx: &ToolContext,
    ) -> anyhow::Result<ScriptProjects> {
        ctx.log.info(&format!(
            "Listing Apps Script projects (pageSize: {})",
            input.page_size
        ));

        let query = FileQuery {
            q: format!("mimeType='{}'", GOOGLE_SCRIPT_MIME),
            page_size: input.page_size,
            order_by: Some("modifiedTime desc".to_string()),
        };
        let files = ctx
            .services
            .files
            .list_files(&query)
            .await
            .context("Failed to list Apps Script projects")?;

        Ok(ScriptProjects(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::Harness;
    use crate::core::tools::ToolError;
    use crate::core::workspace::RemoteError;
    use serde_json::json;

    fn harness() -> Harness {
        Harness::new(register)
    }

    #[tokio::test]
    async fn create_bound_script_reports_the_new_id() {
        let h = harness();
        *h.workspace.scripts.script_id.lock().unwrap() = "abc123".to_string();

        let text = h
            .call(
                "createBoundScript",
                json!({ "title": "Automation Script", "parentId": "spreadsheet-123" }),
            )
            .await
            .unwrap();

        assert!(text.contains("abc123"));
        assert!(text.contains("Automation Script"));
        assert!(text.contains("spreadsheet-123"));
        assert_eq!(h.workspace.scripts.calls.count_of("projects.create"), 1);
        assert_eq!(
            h.workspace.scripts.created.lock().unwrap().as_slice(),
            &[("Automation Script".to_string(), "spreadsheet-123".to_string())]
        );
    }

    #[tokio::test]
    async fn create_bound_script_wraps_remote_failures() {
        let h = harness();
        h.workspace
            .scripts
            .calls
            .fail("projects.create", RemoteError::api(429, "Quota exceeded"));

        let err = h
            .call(
                "createBoundScript",
                json!({ "title": "Automation Script", "parentId": "spreadsheet-123" }),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Execution(_)));
        let message = err.normalized().message;
        assert!(message.contains("Quota exceeded"));
        assert!(message.starts_with("Failed to create Apps Script project \"Automation Script\""));
        assert_eq!(h.workspace.scripts.calls.count(), 1);
        assert!(h.log.has("error", "Quota exceeded"));
    }

    #[tokio::test]
    async fn create_bound_script_rejects_missing_or_empty_fields_without_calling() {
        let h = harness();
        for args in [
            json!({ "parentId": "doc-123" }),
            json!({ "title": "My Script" }),
            json!({ "title": "", "parentId": "doc-123" }),
        ] {
            let err = h.call("createBoundScript", args).await.unwrap_err();
            assert!(matches!(err, ToolError::InvalidInput { .. }));
        }
        assert_eq!(h.workspace.total_calls(), 0);
        assert_eq!(h.provider.attempts(), 0);
    }

    #[tokio::test]
    async fn update_script_content_lists_every_file() {
        let h = harness();
        let text = h
            .call(
                "updateScriptContent",
                json!({
                    "scriptId": "script-123",
                    "files": [
                        { "name": "Code", "type": "SERVER_JS", "source": "function a() {}" },
                        { "name": "appsscript", "type": "JSON", "source": "{}" }
                    ]
                }),
            )
            .await
            .unwrap();

        assert!(text.contains("**Script ID:** script-123"));
        assert!(text.contains("- Code (SERVER_JS)\n- appsscript (JSON)"));
        assert_eq!(h.workspace.scripts.calls.count_of("projects.updateContent"), 1);

        let stored = h.workspace.scripts.files.lock().unwrap().clone();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].file_type, ScriptFileType::Json);
    }

    #[tokio::test]
    async fn update_script_content_rejects_unknown_file_types() {
        let h = harness();
        let err = h
            .call(
                "updateScriptContent",
                json!({
                    "scriptId": "script-123",
                    "files": [{ "name": "Code", "type": "INVALID_TYPE", "source": "" }]
                }),
            )
            .await
            .unwrap_err();

        match err {
            ToolError::InvalidInput { field, .. } => assert_eq!(field, "files[0].type"),
            other => panic!("expected invalid input, got {other:?}"),
        }

        // HTML exists in the API but cannot be written through this tool.
        let err = h
            .call(
                "updateScriptContent",
                json!({
                    "scriptId": "script-123",
                    "files": [{ "name": "page", "type": "HTML", "source": "<p/>" }]
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
        assert_eq!(h.workspace.total_calls(), 0);
    }

    #[tokio::test]
    async fn get_script_content_fences_each_file() {
        let h = harness();
        let text = h
            .call("getScriptContent", json!({ "scriptId": "mock-script-id-123" }))
            .await
            .unwrap();

        assert!(text.starts_with("**Apps Script Project Content**\n**Script ID:** mock-script-id-123"));
        assert!(text.contains("### Code (SERVER_JS)\n```javascript\nfunction myFunction()"));
        assert!(text.contains("### appsscript (JSON)\n```json\n"));
    }

    #[tokio::test]
    async fn get_script_projects_lists_matches_newest_first() {
        let h = harness();
        let text = h.call("getScriptProjects", json!({})).await.unwrap();

        assert!(text.starts_with("**Apps Script Projects (2 found)**"));
        assert!(text.contains("- **My Script**\n  - ID: script-1\n  - Modified: 2024-01-02T00:00:00Z"));

        let query = h.workspace.files.last_query().unwrap();
        assert_eq!(query.q, "mimeType='application/vnd.google-apps.script'");
        assert_eq!(query.page_size, 10);
        assert_eq!(query.order_by.as_deref(), Some("modifiedTime desc"));
    }

    #[tokio::test]
    async fn get_script_projects_without_results_is_not_an_error() {
        let h = harness();
        h.workspace.files.set_files(Vec::new());

        let text = h.call("getScriptProjects", json!({ "pageSize": 5 })).await.unwrap();
        assert_eq!(text, "No standalone Apps Script projects found.");
    }

    #[tokio::test]
    async fn get_script_projects_page_size_bounds() {
        let h = harness();
        for bad in [json!(0), json!(51), json!(10.5)] {
            let err = h
                .call("getScriptProjects", json!({ "pageSize": bad }))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidInput { ref field, .. } if field == "pageSize"));
        }
        assert_eq!(h.workspace.total_calls(), 0);

        for ok in [1, 10, 50] {
            h.call("getScriptProjects", json!({ "pageSize": ok })).await.unwrap();
            assert_eq!(h.workspace.files.last_query().unwrap().page_size, ok);
        }

        // A whole number written as a float is still an integer.
        h.call("getScriptProjects", json!({ "pageSize": 10.0 })).await.unwrap();
        assert_eq!(h.workspace.files.last_query().unwrap().page_size, 10);
    }

    #[test]
    fn registers_exactly_four_tools() {
        let h = harness();
        assert_eq!(h.registry.len(), 4);
        for name in [
            "createBoundScript",
            "updateScriptContent",
            "getScriptContent",
            "getScriptProjects",
        ] {
            assert!(h.registry.contains(name));
        }
    }
}
