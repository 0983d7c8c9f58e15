// Port for Google Drive: file listing, metadata changes and comments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RemoteError;

pub const GOOGLE_DOC_MIME: &str = "application/vnd.google-apps.document";
pub const GOOGLE_SHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
pub const GOOGLE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const GOOGLE_SCRIPT_MIME: &str = "application/vnd.google-apps.script";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
    pub web_view_link: Option<String>,
    pub parents: Vec<String>,
    pub owners: Vec<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(GOOGLE_FOLDER_MIME)
    }
}

/// A `files.list` request. `q` uses Drive's query language verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct FileQuery {
    pub q: String,
    pub page_size: u32,
    pub order_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
}

/// Metadata patch for `files.update`. Empty fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileUpdate {
    pub name: Option<String>,
    pub add_parents: Vec<String>,
    pub remove_parents: Vec<String>,
    pub trashed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: String,
    pub author: Option<String>,
    pub content: String,
    pub quoted_text: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub reply_count: usize,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub id: String,
    pub author: Option<String>,
    pub content: String,
    pub created_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FileStorageService: Send + Sync {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<DriveFile>, RemoteError>;

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, RemoteError>;

    async fn create_file(&self, file: &NewFile) -> Result<DriveFile, RemoteError>;

    async fn copy_file(
        &self,
        file_id: &str,
        name: Option<&str>,
        parents: &[String],
    ) -> Result<DriveFile, RemoteError>;

    async fn update_file(&self, file_id: &str, update: &FileUpdate)
        -> Result<DriveFile, RemoteError>;

    /// Permanent delete, bypassing the trash.
    async fn delete_file(&self, file_id: &str) -> Result<(), RemoteError>;

    async fn list_comments(&self, file_id: &str) -> Result<Vec<Comment>, RemoteError>;

    async fn create_comment(&self, file_id: &str, content: &str) -> Result<Comment, RemoteError>;

    async fn get_comment(&self, file_id: &str, comment_id: &str) -> Result<Comment, RemoteError>;

    async fn reply_to_comment(
        &self,
        file_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Reply, RemoteError>;

    /// Resolves through a reply carrying the `resolve` action; `resolved` is read-only on comments.
    async fn resolve_comment(
        &self,
        file_id: &str,
        comment_id: &str,
        message: Option<&str>,
    ) -> Result<Reply, RemoteError>;

    async fn delete_comment(&self, file_id: &str, comment_id: &str) -> Result<(), RemoteError>;
}

/// Escape a user-provided value for use inside a single-quoted Drive query literal.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
