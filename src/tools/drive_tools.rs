// =============================================================================
// GOOGLE DRIVE TOOLS
// =============================================================================
//
// Listing, searching and organizing files. Every user-supplied value that
// ends up inside a Drive query goes through `escape_query_literal`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::display_time;
use crate::core::tools::{RegistryError, RenderText, Tool, ToolContext, ToolRegistry};
use crate::core::workspace::{
    escape_query_literal, DriveFile, FileQuery, FileUpdate, NewFile, GOOGLE_DOC_MIME,
    GOOGLE_FOLDER_MIME, GOOGLE_SHEET_MIME,
};

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ListGoogleDocs)?;
    registry.register(SearchGoogleDocs)?;
    registry.register(GetRecentGoogleDocs)?;
    registry.register(GetDocumentInfo)?;
    registry.register(ListGoogleSheets)?;
    registry.register(CreateFolder)?;
    registry.register(ListFolderContents)?;
    registry.register(MoveFile)?;
    registry.register(CopyFile)?;
    registry.register(RenameFile)?;
    registry.register(DeleteFile)?;
    registry.register(CreateDocument)?;
    registry.register(CreateFromTemplate)?;
    registry.register(GetFolderInfo)?;
    Ok(())
}

const NEWEST_FIRST: &str = "modifiedTime desc";

fn mime_clause(mime_type: &str) -> String {
    format!("mimeType='{}' and trashed=false", mime_type)
}

fn kind_label(file: &DriveFile) -> &'static str {
    match file.mime_type.as_deref() {
        Some(GOOGLE_FOLDER_MIME) => "Folder",
        Some(GOOGLE_DOC_MIME) => "Document",
        Some(GOOGLE_SHEET_MIME) => "Spreadsheet",
        _ => "File",
    }
}

fn link_line(file: &DriveFile) -> String {
    file.web_view_link
        .as_deref()
        .map(|link| format!("\n   Link: {}", link))
        .unwrap_or_default()
}

/// A rendered list of files under a heading.
pub struct FileListing {
    heading: String,
    empty: String,
    files: Vec<DriveFile>,
}

impl RenderText for FileListing {
    fn render(&self) -> String {
        if self.files.is_empty() {
            return self.empty.clone();
        }

        let mut out = format!("{} ({} found):\n\n", self.heading, self.files.len());
        for (i, file) in self.files.iter().enumerate() {
            out.push_str(&format!(
                "{}. **{}**\n   ID: {}\n   Modified: {}{}\n\n",
                i + 1,
                file.name,
                file.id,
                display_time(file.modified_time),
                link_line(file)
            ));
        }
        out
    }
}

async fn list(ctx: &ToolContext, query: FileQuery, what: &str) -> anyhow::Result<Vec<DriveFile>> {
    ctx.log.debug(&format!("Drive query: {}", query.q));
    ctx.services
        .files
        .list_files(&query)
        .await
        .with_context(|| format!("Failed to list {}", what))
}

// =============================================================================
// listGoogleDocs / listGoogleSheets
// =============================================================================

pub struct ListGoogleDocs;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListDocsInput {
    /// Maximum number of results to return (1-100).
    #[serde(default = "default_list_size")]
    #[schemars(range(min = 1, max = 100))]
    pub max_results: u32,
    /// Only documents whose name or content contains this text.
    pub query: Option<String>,
}

fn default_list_size() -> u32 {
    20
}

#[async_trait]
impl Tool for ListGoogleDocs {
    type Input = ListDocsInput;
    type Output = FileListing;

    fn name(&self) -> &'static str {
        "listGoogleDocs"
    }

    fn description(&self) -> &'static str {
        "Lists Google Documents in your Drive, newest first, optionally filtered by a search term."
    }

    async fn execute(&self, input: &ListDocsInput, ctx: &ToolContext) -> anyhow::Result<FileListing> {
        let mut q = mime_clause(GOOGLE_DOC_MIME);
        if let Some(term) = input.query.as_deref().filter(|t| !t.trim().is_empty()) {
            let term = escape_query_literal(term);
            q.push_str(&format!(
                " and (name contains '{}' or fullText contains '{}')",
                term, term
            ));
        }

        let files = list(
            ctx,
            FileQuery {
                q,
                page_size: input.max_results,
                order_by: Some(NEWEST_FIRST.to_string()),
            },
            "Google Docs",
        )
        .await?;

        Ok(FileListing {
            heading: "Google Docs".to_string(),
            empty: "No Google Docs found.".to_string(),
            files,
        })
    }
}

pub struct ListGoogleSheets;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaxResultsInput {
    /// Maximum number of results to return (1-100).
    #[serde(default = "default_list_size")]
    #[schemars(range(min = 1, max = 100))]
    pub max_results: u32,
}

#[async_trait]
impl Tool for ListGoogleSheets {
    type Input = MaxResultsInput;
    type Output = FileListing;

    fn name(&self) -> &'static str {
        "listGoogleSheets"
    }

    fn description(&self) -> &'static str {
        "Lists Google Spreadsheets in your Drive, newest first."
    }

    async fn execute(&self, input: &MaxResultsInput, ctx: &ToolContext) -> anyhow::Result<FileListing> {
        let files = list(
            ctx,
            FileQuery {
                q: mime_clause(GOOGLE_SHEET_MIME),
                page_size: input.max_results,
                order_by: Some(NEWEST_FIRST.to_string()),
            },
            "Google Sheets",
        )
        .await?;

        Ok(FileListing {
            heading: "Google Sheets".to_string(),
            empty: "No Google Sheets found.".to_string(),
            files,
        })
    }
}

// =============================================================================
// searchGoogleDocs
// =============================================================================

pub struct SearchGoogleDocs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchIn {
    Name,
    Content,
    #[default]
    Both,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchInput {
    /// Text to search for.
    #[schemars(length(min = 1))]
    pub search_query: String,
    /// Where to look: name, content or both.
    #[serde(default)]
    pub search_in: SearchIn,
    /// Maximum number of results to return (1-50).
    #[serde(default = "default_search_size")]
    #[schemars(range(min = 1, max = 50))]
    pub max_results: u32,
}

fn default_search_size() -> u32 {
    10
}

fn search_clause(term: &str, search_in: SearchIn) -> String {
    let term = escape_query_literal(term);
    match search_in {
        SearchIn::Name => format!("name contains '{}'", term),
        SearchIn::Content => format!("fullText contains '{}'", term),
        SearchIn::Both => format!("(name contains '{}' or fullText contains '{}')", term, term),
    }
}

#[async_trait]
impl Tool for SearchGoogleDocs {
    type Input = SearchInput;
    type Output = FileListing;

    fn name(&self) -> &'static str {
        "searchGoogleDocs"
    }

    fn description(&self) -> &'static str {
        "Searches Google Documents by name, content, or both."
    }

    async fn execute(&self, input: &SearchInput, ctx: &ToolContext) -> anyhow::Result<FileListing> {
        ctx.log.info(&format!("Searching Google Docs for \"{}\"", input.search_query));

        let q = format!(
            "{} and {}",
            mime_clause(GOOGLE_DOC_MIME),
            search_clause(&input.search_query, input.search_in)
        );
        let files = list(
            ctx,
            FileQuery {
                q,
                page_size: input.max_results,
                order_by: Some(NEWEST_FIRST.to_string()),
            },
            "search results",
        )
        .await?;

        Ok(FileListing {
            heading: format!("Search results for \"{}\"", input.search_query),
            empty: format!("No Google Docs found matching \"{}\".", input.search_query),
            files,
        })
    }
}

// =============================================================================
// getRecentGoogleDocs
// =============================================================================

pub struct GetRecentGoogleDocs;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentInput {
    /// Maximum number of results to return (1-50).
    #[serde(default = "default_search_size")]
    #[schemars(range(min = 1, max = 50))]
    pub max_results: u32,
    /// How many days back to look (1-365).
    #[serde(default = "default_days_back")]
    #[schemars(range(min = 1, max = 365))]
    pub days_back: u32,
}

fn default_days_back() -> u32 {
    30
}

#[async_trait]
impl Tool for GetRecentGoogleDocs {
    type Input = RecentInput;
    type Output = FileListing;

    fn name(&self) -> &'static str {
        "getRecentGoogleDocs"
    }

    fn description(&self) -> &'static str {
        "Lists Google Documents modified within the last N days, newest first."
    }

    async fn execute(&self, input: &RecentInput, ctx: &ToolContext) -> anyhow::Result<FileListing> {
        let cutoff = Utc::now() - Duration::days(i64::from(input.days_back));
        let q = format!(
            "{} and modifiedTime > '{}'",
            mime_clause(GOOGLE_DOC_MIME),
            cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let files = list(
            ctx,
            FileQuery {
                q,
                page_size: input.max_results,
                order_by: Some(NEWEST_FIRST.to_string()),
            },
            "recent Google Docs",
        )
        .await?;

        Ok(FileListing {
            heading: format!("Google Docs modified in the last {} days", input.days_back),
            empty: format!(
                "No Google Docs modified in the last {} days.",
                input.days_back
            ),
            files,
        })
    }
}

// =============================================================================
// getDocumentInfo
// =============================================================================

pub struct GetDocumentInfo;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIdInput {
    /// The ID of the document.
    #[schemars(length(min = 1))]
    pub document_id: String,
}

pub struct FileDetails(DriveFile);

impl RenderText for FileDetails {
    fn render(&self) -> String {
        let file = &self.0;
        let owners = if file.owners.is_empty() {
            "Unknown".to_string()
        } else {
            file.owners.join(", ")
        };
        format!(
            "**{}**\n\n- ID: {}\n- Type: {}\n- Created: {}\n- Modified: {}\n- Owners: {}\n- Link: {}",
            file.name,
            file.id,
            file.mime_type.as_deref().unwrap_or("Unknown"),
            display_time(file.created_time),
            display_time(file.modified_time),
            owners,
            file.web_view_link.as_deref().unwrap_or("Unavailable")
        )
    }
}

#[async_trait]
impl Tool for GetDocumentInfo {
    type Input = DocumentIdInput;
    type Output = FileDetails;

    fn name(&self) -> &'static str {
        "getDocumentInfo"
    }

    fn description(&self) -> &'static str {
        "Gets Drive metadata for a document: owners, timestamps and sharing link."
    }

    async fn execute(&self, input: &DocumentIdInput, ctx: &ToolContext) -> anyhow::Result<FileDetails> {
        let file = ctx
            .services
            .files
            .get_file(&input.document_id)
            .await
            .with_context(|| format!("Failed to get info for document {}", input.document_id))?;
        Ok(FileDetails(file))
    }
}

// =============================================================================
// createFolder / createDocument
// =============================================================================

pub struct Created {
    kind: &'static str,
    file: DriveFile,
}

impl RenderText for Created {
    fn render(&self) -> String {
        let location = match self.file.parents.first() {
            Some(parent) => format!(" in folder {}", parent),
            None => String::new(),
        };
        format!(
            "Successfully created {} \"{}\"{}.\n\n**ID:** {}{}",
            self.kind,
            self.file.name,
            location,
            self.file.id,
            self.file
                .web_view_link
                .as_deref()
                .map(|link| format!("\n**Link:** {}", link))
                .unwrap_or_default()
        )
    }
}

async fn create(ctx: &ToolContext, file: NewFile, kind: &'static str) -> anyhow::Result<Created> {
    ctx.log.info(&format!("Creating {} \"{}\"", kind, file.name));
    let created = ctx
        .services
        .files
        .create_file(&file)
        .await
        .with_context(|| format!("Failed to create {} \"{}\"", kind, file.name))?;
    Ok(Created {
        kind,
        file: created,
    })
}

pub struct CreateFolder;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderInput {
    /// Name of the new folder.
    #[schemars(length(min = 1))]
    pub name: String,
    /// ID of the folder to place the new file in. Defaults to My Drive root.
    #[schemars(length(min = 1))]
    pub parent_folder_id: Option<String>,
}

#[async_trait]
impl Tool for CreateFolder {
    type Input = CreateFolderInput;
    type Output = Created;

    fn name(&self) -> &'static str {
        "createFolder"
    }

    fn description(&self) -> &'static str {
        "Creates a folder in Google Drive."
    }

    async fn execute(&self, input: &CreateFolderInput, ctx: &ToolContext) -> anyhow::Result<Created> {
        let file = NewFile {
            name: input.name.clone(),
            mime_type: GOOGLE_FOLDER_MIME.to_string(),
            parents: input.parent_folder_id.iter().cloned().collect(),
        };
        create(ctx, file, "folder").await
    }
}

pub struct CreateDocument;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentInput {
    /// Title of the new document.
    #[schemars(length(min = 1))]
    pub title: String,
    /// ID of the folder to place the new file in. Defaults to My Drive root.
    #[schemars(length(min = 1))]
    pub parent_folder_id: Option<String>,
}

#[async_trait]
impl Tool for CreateDocument {
    type Input = CreateDocumentInput;
    type Output = Created;

    fn name(&self) -> &'static str {
        "createDocument"
    }

    fn description(&self) -> &'static str {
        "Creates a new, empty Google Document."
    }

    async fn execute(&self, input: &CreateDocumentInput, ctx: &ToolContext) -> anyhow::Result<Created> {
        let file = NewFile {
            name: input.title.clone(),
            mime_type: GOOGLE_DOC_MIME.to_string(),
            parents: input.parent_folder_id.iter().cloned().collect(),
        };
        create(ctx, file, "document").await
    }
}

pub struct CreateFromTemplate;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFromTemplateInput {
    /// The ID of the template file to copy.
    #[schemars(length(min = 1))]
    pub template_id: String,
    /// Title of the new document.
    #[schemars(length(min = 1))]
    pub new_title: String,
    /// ID of the folder to place the new file in. Defaults to My Drive root.
    #[schemars(length(min = 1))]
    pub parent_folder_id: Option<String>,
}

#[async_trait]
impl Tool for CreateFromTemplate {
    type Input = CreateFromTemplateInput;
    type Output = Created;

    fn name(&self) -> &'static str {
        "createFromTemplate"
    }

    fn description(&self) -> &'static str {
        "Creates a new document by copying an existing template document."
    }

    async fn execute(&self, input: &CreateFromTemplateInput, ctx: &ToolContext) -> anyhow::Result<Created> {
        ctx.log.info(&format!(
            "Creating \"{}\" from template {}",
            input.new_title, input.template_id
        ));
        let parents: Vec<String> = input.parent_folder_id.iter().cloned().collect();
        let file = ctx
            .services
            .files
            .copy_file(&input.template_id, Some(&input.new_title), &parents)
            .await
            .with_context(|| format!("Failed to create document from template {}", input.template_id))?;

        Ok(Created {
            kind: "document from template",
            file,
        })
    }
}

// =============================================================================
// listFolderContents
// =============================================================================

pub struct ListFolderContents;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolderContentsInput {
    /// The ID of the folder.
    #[schemars(length(min = 1))]
    pub folder_id: String,
    /// Maximum number of results to return (1-100).
    #[serde(default = "default_folder_size")]
    #[schemars(range(min = 1, max = 100))]
    pub max_results: u32,
}

fn default_folder_size() -> u32 {
    50
}

pub struct FolderContents {
    folder_id: String,
    files: Vec<DriveFile>,
}

impl RenderText for FolderContents {
    fn render(&self) -> String {
        if self.files.is_empty() {
            return format!("Folder {} is empty.", self.folder_id);
        }

        let mut out = format!(
            "**Contents of folder {} ({} items)**\n\n",
            self.folder_id,
            self.files.len()
        );
        for file in &self.files {
            out.push_str(&format!(
                "- [{}] **{}** (ID: {})\n",
                kind_label(file),
                file.name,
                file.id
            ));
        }
        out
    }
}

#[async_trait]
impl Tool for ListFolderContents {
    type Input = FolderContentsInput;
    type Output = FolderContents;

    fn name(&self) -> &'static str {
        "listFolderContents"
    }

    fn description(&self) -> &'static str {
        "Lists the files and subfolders directly inside a Drive folder. Use \"root\" for My Drive."
    }

    async fn execute(
        &self,
        input: &FolderContentsInput,
        ctx: &ToolContext,
    ) -> anyhow::Result<FolderContents> {
        let q = format!(
            "'{}' in parents and trashed=false",
            escape_query_literal(&input.folder_id)
        );
        let files = ctx
            .services
            .files
            .list_files(&FileQuery {
                q,
                page_size: input.max_results,
                order_by: Some("folder,name".to_string()),
            })
            .await
            .with_context(|| format!("Failed to list contents of folder {}", input.folder_id))?;

        Ok(FolderContents {
            folder_id: input.folder_id.clone(),
            files,
        })
    }
}

// =============================================================================
// getFolderInfo
// =============================================================================

pub struct GetFolderInfo;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FolderIdInput {
    /// The ID of the folder.
    #[schemars(length(min = 1))]
    pub folder_id: String,
}

#[async_trait]
impl Tool for GetFolderInfo {
    type Input = FolderIdInput;
    type Output = FileDetails;

    fn name(&self) -> &'static str {
        "getFolderInfo"
    }

    fn description(&self) -> &'static str {
        "Gets Drive metadata for a folder: owners, timestamps and sharing link."
    }

    async fn execute(&self, input: &FolderIdInput, ctx: &ToolContext) -> anyhow::Result<FileDetails> {
        let file = ctx
            .services
            .files
            .get_file(&input.folder_id)
            .await
            .with_context(|| format!("Failed to get info for folder {}", input.folder_id))?;
        if !file.is_folder() {
            anyhow::bail!("{} (\"{}\") is not a folder", input.folder_id, file.name);
        }
        Ok(FileDetails(file))
    }
}

// =============================================================================
// moveFile / copyFile / renameFile
// =============================================================================

pub struct MoveFile;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MoveInput {
    /// The ID of the file or folder to move.
    #[schemars(length(min = 1))]
    pub file_id: String,
    /// The ID of the destination folder.
    #[schemars(length(min = 1))]
    pub new_parent_id: String,
}

#[async_trait]
impl Tool for MoveFile {
    type Input = MoveInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "moveFile"
    }

    fn description(&self) -> &'static str {
        "Moves a file or folder into another Drive folder, removing it from its current folders."
    }

    async fn execute(&self, input: &MoveInput, ctx: &ToolContext) -> anyhow::Result<String> {
        let files = &ctx.services.files;
        let current = files
            .get_file(&input.file_id)
            .await
            .with_context(|| format!("Failed to look up file {}", input.file_id))?;

        let update = FileUpdate {
            add_parents: vec![input.new_parent_id.clone()],
            remove_parents: current
                .parents
                .iter()
                .filter(|p| **p != input.new_parent_id)
                .cloned()
                .collect(),
            ..Default::default()
        };
        let moved = files
            .update_file(&input.file_id, &update)
            .await
            .with_context(|| {
                format!(
                    "Failed to move file {} to folder {}",
                    input.file_id, input.new_parent_id
                )
            })?;

        Ok(format!(
            "Successfully moved \"{}\" to folder {}.",
            moved.name, input.new_parent_id
        ))
    }
}

pub struct CopyFile;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CopyInput {
    /// The ID of the file to copy.
    #[schemars(length(min = 1))]
    pub file_id: String,
    /// Name for the copy. Defaults to "Copy of <original>".
    #[schemars(length(min = 1))]
    pub new_name: Option<String>,
    /// ID of the folder to place the new file in. Defaults to My Drive root.
    #[schemars(length(min = 1))]
    pub parent_folder_id: Option<String>,
}

#[async_trait]
impl Tool for CopyFile {
    type Input = CopyInput;
    type Output = Created;

    fn name(&self) -> &'static str {
        "copyFile"
    }

    fn description(&self) -> &'static str {
        "Copies a file, optionally giving the copy a new name or folder."
    }

    async fn execute(&self, input: &CopyInput, ctx: &ToolContext) -> anyhow::Result<Created> {
        let parents: Vec<String> = input.parent_folder_id.iter().cloned().collect();
        let copy = ctx
            .services
            .files
            .copy_file(&input.file_id, input.new_name.as_deref(), &parents)
            .await
            .with_context(|| format!("Failed to copy file {}", input.file_id))?;

        Ok(Created {
            kind: "copy",
            file: copy,
        })
    }
}

pub struct RenameFile;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameInput {
    /// The ID of the file or folder to rename.
    #[schemars(length(min = 1))]
    pub file_id: String,
    /// The new name.
    #[schemars(length(min = 1))]
    pub new_name: String,
}

#[async_trait]
impl Tool for RenameFile {
    type Input = RenameInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "renameFile"
    }

    fn description(&self) -> &'static str {
        "Renames a file or folder in Google Drive."
    }

    async fn execute(&self, input: &RenameInput, ctx: &ToolContext) -> anyhow::Result<String> {
        let update = FileUpdate {
            name: Some(input.new_name.clone()),
            ..Default::default()
        };
        ctx.services
            .files
            .update_file(&input.file_id, &update)
            .await
            .with_context(|| format!("Failed to rename file {}", input.file_id))?;

        Ok(format!(
            "Successfully renamed file {} to \"{}\".",
            input.file_id, input.new_name
        ))
    }
}

// =============================================================================
// deleteFile
// =============================================================================

pub struct DeleteFile;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteInput {
    /// The ID of the file or folder to delete.
    #[schemars(length(min = 1))]
    pub file_id: String,
    /// Delete permanently instead of moving to trash.
    #[serde(default)]
    pub skip_trash: bool,
}

#[async_trait]
impl Tool for DeleteFile {
    type Input = DeleteInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "deleteFile"
    }

    fn description(&self) -> &'static str {
        "Moves a file or folder to the trash, or deletes it permanently with skipTrash."
    }

    async fn execute(&self, input: &DeleteInput, ctx: &ToolContext) -> anyhow::Result<String> {
        let files = &ctx.services.files;
        if input.skip_trash {
            ctx.log.warn(&format!("Permanently deleting file {}", input.file_id));
            files
                .delete_file(&input.file_id)
                .await
                .with_context(|| format!("Failed to delete file {}", input.file_id))?;
            return Ok(format!("Permanently deleted file {}.", input.file_id));
        }

        let update = FileUpdate {
            trashed: Some(true),
            ..Default::default()
        };
        files
            .update_file(&input.file_id, &update)
            .await
            .with_context(|| format!("Failed to move file {} to trash", input.file_id))?;
        Ok(format!("Moved file {} to trash.", input.file_id))
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
    async fn list_docs_filters_by_mime_type_and_escapes_terms() {
        let h = harness();
        h.call("listGoogleDocs", json!({ "query": "Bob's notes" }))
            .await
            .unwrap();

        let query = h.workspace.files.last_query().unwrap();
        assert_eq!(
            query.q,
            "mimeType='application/vnd.google-apps.document' and trashed=false \
             and (name contains 'Bob\\'s notes' or fullText contains 'Bob\\'s notes')"
        );
        assert_eq!(query.page_size, 20);
        assert_eq!(query.order_by.as_deref(), Some("modifiedTime desc"));
    }

    #[tokio::test]
    async fn listings_number_each_file() {
        let h = harness();
        let text = h.call("listGoogleSheets", json!({ "maxResults": 5 })).await.unwrap();

        assert!(text.starts_with("Google Sheets (2 found):"));
        assert!(text.contains("1. **My Script**\n   ID: script-1\n   Modified: 2024-01-02T00:00:00Z"));
        assert_eq!(h.workspace.files.last_query().unwrap().page_size, 5);

        h.workspace.files.set_files(Vec::new());
        let empty = h.call("listGoogleSheets", json!({})).await.unwrap();
        assert_eq!(empty, "No Google Sheets found.");
    }

    #[tokio::test]
    async fn search_scope_selects_the_query_clause() {
        let h = harness();
        h.call(
            "searchGoogleDocs",
            json!({ "searchQuery": "plan", "searchIn": "name" }),
        )
        .await
        .unwrap();
        let query = h.workspace.files.last_query().unwrap();
        assert!(query.q.ends_with("and name contains 'plan'"));
        assert_eq!(query.page_size, 10);

        let err = h
            .call(
                "searchGoogleDocs",
                json!({ "searchQuery": "plan", "searchIn": "title" }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { ref field, .. } if field == "searchIn"));
    }

    #[tokio::test]
    async fn recent_docs_bound_modified_time() {
        let h = harness();
        h.call("getRecentGoogleDocs", json!({ "daysBack": 7 }))
            .await
            .unwrap();
        let query = h.workspace.files.last_query().unwrap();
        assert!(query.q.contains("and modifiedTime > '"));

        let err = h
            .call("getRecentGoogleDocs", json!({ "daysBack": 366 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn document_info_lists_metadata() {
        let h = harness();
        let text = h
            .call("getDocumentInfo", json!({ "documentId": "script-1" }))
            .await
            .unwrap();
        assert!(text.starts_with("**My Script**"));
        assert!(text.contains("- Owners: Unknown"));
        assert!(text.contains("- Created: 2024-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn folders_and_documents_are_created_with_the_right_mime_type() {
        let h = harness();
        let folder = h
            .call("createFolder", json!({ "name": "Reports", "parentFolderId": "parent-1" }))
            .await
            .unwrap();
        assert!(folder.contains("Successfully created folder \"Reports\" in folder parent-1."));
        assert!(folder.contains("**ID:** new-file-id"));

        h.call("createDocument", json!({ "title": "Minutes" }))
            .await
            .unwrap();

        let created = h.workspace.files.created.lock().unwrap().clone();
        assert_eq!(created[0].mime_type, GOOGLE_FOLDER_MIME);
        assert_eq!(created[0].parents, vec!["parent-1"]);
        assert_eq!(created[1].mime_type, GOOGLE_DOC_MIME);
        assert!(created[1].parents.is_empty());
    }

    #[tokio::test]
    async fn folder_contents_are_labelled_by_kind() {
        let h = harness();
        h.workspace.files.set_files(vec![
            DriveFile {
                id: "f1".into(),
                name: "Archive".into(),
                mime_type: Some(GOOGLE_FOLDER_MIME.into()),
                ..Default::default()
            },
            DriveFile {
                id: "d1".into(),
                name: "Plan".into(),
                mime_type: Some(GOOGLE_DOC_MIME.into()),
                ..Default::default()
            },
        ]);

        let text = h
            .call("listFolderContents", json!({ "folderId": "root" }))
            .await
            .unwrap();
        assert!(text.contains("- [Folder] **Archive** (ID: f1)\n- [Document] **Plan** (ID: d1)"));

        let query = h.workspace.files.last_query().unwrap();
        assert_eq!(query.q, "'root' in parents and trashed=false");
        assert_eq!(query.page_size, 50);
    }

    #[tokio::test]
    async fn move_reads_parents_then_swaps_them() {
        let h = harness();
        let text = h
            .call("moveFile", json!({ "fileId": "script-1", "newParentId": "folder-9" }))
            .await
            .unwrap();

        assert_eq!(text, "Successfully moved \"My Script\" to folder folder-9.");
        assert_eq!(h.workspace.files.calls.recorded(), vec!["files.get", "files.update"]);
        let (id, update) = h.workspace.files.updates.lock().unwrap()[0].clone();
        assert_eq!(id, "script-1");
        assert_eq!(update.add_parents, vec!["folder-9"]);
        assert_eq!(update.remove_parents, vec!["root"]);
    }

    #[tokio::test]
    async fn move_does_not_update_when_lookup_fails() {
        let h = harness();
        h.workspace
            .files
            .calls
            .fail("files.get", RemoteError::api(404, "File not found: x."));

        let err = h
            .call("moveFile", json!({ "fileId": "x", "newParentId": "folder-9" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to look up file x: File not found: x.");
        assert_eq!(h.workspace.files.calls.count_of("files.update"), 0);
    }

    #[tokio::test]
    async fn copy_uses_the_default_name_when_none_is_given() {
        let h = harness();
        let text = h
            .call("copyFile", json!({ "fileId": "script-2" }))
            .await
            .unwrap();
        assert!(text.contains("Successfully created copy \"Copy of Another Script\""));
        assert_eq!(
            h.workspace.files.copies.lock().unwrap()[0],
            ("script-2".to_string(), None, Vec::new())
        );
    }

    #[tokio::test]
    async fn templates_are_copied_under_the_new_title() {
        let h = harness();
        let text = h
            .call(
                "createFromTemplate",
                json!({ "templateId": "tpl-1", "newTitle": "Q3 Report", "parentFolderId": "f1" }),
            )
            .await
            .unwrap();

        assert!(text.starts_with(
            "Successfully created document from template \"Q3 Report\" in folder f1."
        ));
        assert_eq!(h.workspace.files.calls.recorded(), vec!["files.copy"]);
        assert_eq!(
            h.workspace.files.copies.lock().unwrap()[0],
            (
                "tpl-1".to_string(),
                Some("Q3 Report".to_string()),
                vec!["f1".to_string()]
            )
        );

        let err = h
            .call("createFromTemplate", json!({ "templateId": "tpl-1" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("newTitle is required"));
        assert_eq!(h.workspace.files.calls.count(), 1);
    }

    #[tokio::test]
    async fn folder_info_reads_folder_metadata() {
        let h = harness();
        h.workspace.files.set_files(vec![DriveFile {
            id: "f1".into(),
            name: "Archive".into(),
            mime_type: Some(GOOGLE_FOLDER_MIME.into()),
            owners: vec!["Ada".into()],
            ..Default::default()
        }]);

        let text = h
            .call("getFolderInfo", json!({ "folderId": "f1" }))
            .await
            .unwrap();
        assert!(text.starts_with("**Archive**\n\n- ID: f1\n- Type: application/vnd.google-apps.folder"));
        assert!(text.contains("- Owners: Ada"));
        assert_eq!(h.workspace.files.calls.count_of("files.get"), 1);
    }

    #[tokio::test]
    async fn folder_info_rejects_plain_files() {
        let h = harness();
        let err = h
            .call("getFolderInfo", json!({ "folderId": "doc-7" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "doc-7 (\"File doc-7\") is not a folder");
        assert_eq!(h.workspace.files.calls.count(), 1);
    }

    #[tokio::test]
    async fn rename_sends_only_the_name() {
        let h = harness();
        h.call("renameFile", json!({ "fileId": "script-1", "newName": "Renamed" }))
            .await
            .unwrap();
        let (_, update) = h.workspace.files.updates.lock().unwrap()[0].clone();
        assert_eq!(
            update,
            FileUpdate {
                name: Some("Renamed".into()),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn delete_trashes_unless_told_otherwise() {
        let h = harness();
        let trashed = h.call("deleteFile", json!({ "fileId": "a" })).await.unwrap();
        assert_eq!(trashed, "Moved file a to trash.");
        assert_eq!(
            h.workspace.files.updates.lock().unwrap()[0].1.trashed,
            Some(true)
        );

        let gone = h
            .call("deleteFile", json!({ "fileId": "b", "skipTrash": true }))
            .await
            .unwrap();
        assert_eq!(gone, "Permanently deleted file b.");
        assert_eq!(h.workspace.files.deleted.lock().unwrap().as_slice(), &["b".to_string()]);
        assert!(h.log.has("warning", "Permanently deleting file b"));
    }
}
