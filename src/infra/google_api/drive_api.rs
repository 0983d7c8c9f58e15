use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::api_client::GoogleApiClient;
use crate::core::session::CredentialSession;
use crate::core::workspace::{
    Comment, DriveFile, FileQuery, FileStorageService, FileUpdate, NewFile, RemoteError, Reply,
};

const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3/files";

const FILE_FIELDS: &str =
    "id,name,mimeType,createdTime,modifiedTime,webViewLink,parents,owners(displayName,emailAddress)";
const COMMENT_FIELDS: &str = "id,content,quotedFileContent(value),author(displayName),createdTime,\
resolved,replies(id,content,author(displayName),createdTime)";
const REPLY_FIELDS: &str = "id,content,author(displayName),createdTime";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFile {
    id: String,
    #[serde(default)]
    name: String,
    mime_type: Option<String>,
    created_time: Option<String>,
    modified_time: Option<String>,
    web_view_link: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    owners: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    display_name: Option<String>,
    email_address: Option<String>,
}

impl ApiUser {
    fn label(self) -> Option<String> {
        self.display_name.or(self.email_address)
    }
}

#[derive(Debug, Deserialize)]
struct ApiFileList {
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiComment {
    id: String,
    #[serde(default)]
    content: String,
    quoted_file_content: Option<ApiQuoted>,
    author: Option<ApiUser>,
    created_time: Option<String>,
    #[serde(default)]
    resolved: bool,
    #[serde(default)]
    replies: Vec<ApiReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReply {
    id: String,
    #[serde(default)]
    content: String,
    author: Option<ApiUser>,
    created_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiQuoted {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCommentList {
    #[serde(default)]
    comments: Vec<ApiComment>,
}

fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<ApiFile> for DriveFile {
    fn from(api: ApiFile) -> Self {
        DriveFile {
            id: api.id,
            name: api.name,
            mime_type: api.mime_type,
            created_time: parse_datetime(api.created_time),
            modified_time: parse_datetime(api.modified_time),
            web_view_link: api.web_view_link,
            parents: api.parents,
            owners: api.owners.into_iter().filter_map(ApiUser::label).collect(),
        }
    }
}

impl From<ApiComment> for Comment {
    fn from(api: ApiComment) -> Self {
        Comment {
            id: api.id,
            author: api.author.and_then(ApiUser::label),
            content: api.content,
            quoted_text: api.quoted_file_content.and_then(|q| q.value),
            created_time: parse_datetime(api.created_time),
            resolved: api.resolved,
            reply_count: api.replies.len(),
            replies: api.replies.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ApiReply> for Reply {
    fn from(api: ApiReply) -> Self {
        Reply {
            id: api.id,
            author: api.author.and_then(ApiUser::label),
            content: api.content,
            created_time: parse_datetime(api.created_time),
        }
    }
}

/// Request body for a reply. A resolve reply may omit its text.
fn reply_body(content: Option<&str>, action: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(content) = content {
        body.insert("content".to_string(), json!(content));
    }
    if let Some(action) = action {
        body.insert("action".to_string(), json!(action));
    }
    Value::Object(body)
}

/// Request body for `files.update`. Only set fields are sent.
fn update_body(update: &FileUpdate) -> Value {
    let mut body = Map::new();
    if let Some(name) = &update.name {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(trashed) = update.trashed {
        body.insert("trashed".to_string(), json!(trashed));
    }
    Value::Object(body)
}

pub struct GoogleDriveApi {
    api: GoogleApiClient,
}

impl GoogleDriveApi {
    pub fn new(http: Client, session: Arc<dyn CredentialSession>) -> Self {
        Self {
            api: GoogleApiClient::new(http, session),
        }
    }
}

#[async_trait]
impl FileStorageService for GoogleDriveApi {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<DriveFile>, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[])?;
        let page_size = query.page_size.to_string();
        let fields = format!("files({})", FILE_FIELDS);
        let mut params = vec![
            ("q", query.q.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", fields.as_str()),
        ];
        if let Some(order_by) = &query.order_by {
            params.push(("orderBy", order_by.as_str()));
        }

        let request = self.api.request(Method::GET, url).await?.query(&params);
        let list: ApiFileList = self.api.send(request).await?;
        Ok(list.files.into_iter().map(Into::into).collect())
    }

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id])?;
        let request = self
            .api
            .request(Method::GET, url)
            .await?
            .query(&[("fields", FILE_FIELDS)]);
        let file: ApiFile = self.api.send(request).await?;
        Ok(file.into())
    }

    async fn create_file(&self, file: &NewFile) -> Result<DriveFile, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[])?;
        let mut body = json!({ "name": file.name, "mimeType": file.mime_type });
        if !file.parents.is_empty() {
            body["parents"] = json!(file.parents);
        }

        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .query(&[("fields", FILE_FIELDS)])
            .json(&body);
        let created: ApiFile = self.api.send(request).await?;
        Ok(created.into())
    }

    async fn copy_file(
        &self,
        file_id: &str,
        name: Option<&str>,
        parents: &[String],
    ) -> Result<DriveFile, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "copy"])?;
        let mut body = Map::new();
        if let Some(name) = name {
            body.insert("name".to_string(), json!(name));
        }
        if !parents.is_empty() {
            body.insert("parents".to_string(), json!(parents));
        }

        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .query(&[("fields", FILE_FIELDS)])
            .json(&Value::Object(body));
        let copied: ApiFile = self.api.send(request).await?;
        Ok(copied.into())
    }

    async fn update_file(
        &self,
        file_id: &str,
        update: &FileUpdate,
    ) -> Result<DriveFile, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id])?;
        let add_parents = update.add_parents.join(",");
        let remove_parents = update.remove_parents.join(",");
        let mut params = vec![("fields", FILE_FIELDS)];
        if !add_parents.is_empty() {
            params.push(("addParents", add_parents.as_str()));
        }
        if !remove_parents.is_empty() {
            params.push(("removeParents", remove_parents.as_str()));
        }

        let request = self
            .api
            .request(Method::PATCH, url)
            .await?
            .query(&params)
            .json(&update_body(update));
        let updated: ApiFile = self.api.send(request).await?;
        Ok(updated.into())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id])?;
        let request = self.api.request(Method::DELETE, url).await?;
        self.api.send_empty(request).await
    }

    async fn list_comments(&self, file_id: &str) -> Result<Vec<Comment>, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments"])?;
        let fields = format!("comments({})", COMMENT_FIELDS);
        let request = self
            .api
            .request(Method::GET, url)
            .await?
            .query(&[("fields", fields.as_str()), ("pageSize", "100")]);
        let list: ApiCommentList = self.api.send(request).await?;
        Ok(list.comments.into_iter().map(Into::into).collect())
    }

    async fn create_comment(&self, file_id: &str, content: &str) -> Result<Comment, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments"])?;
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .query(&[("fields", COMMENT_FIELDS)])
            .json(&json!({ "content": content }));
        let created: ApiComment = self.api.send(request).await?;
        Ok(created.into())
    }

    async fn get_comment(&self, file_id: &str, comment_id: &str) -> Result<Comment, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments", comment_id])?;
        let request = self
            .api
            .request(Method::GET, url)
            .await?
            .query(&[("fields", COMMENT_FIELDS)]);
        let comment: ApiComment = self.api.send(request).await?;
        Ok(comment.into())
    }

    async fn reply_to_comment(
        &self,
        file_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Reply, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments", comment_id, "replies"])?;
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .query(&[("fields", REPLY_FIELDS)])
            .json(&reply_body(Some(content), None));
        let reply: ApiReply = self.api.send(request).await?;
        Ok(reply.into())
    }

    async fn resolve_comment(
        &self,
        file_id: &str,
        comment_id: &str,
        message: Option<&str>,
    ) -> Result<Reply, RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments", comment_id, "replies"])?;
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .query(&[("fields", REPLY_FIELDS)])
            .json(&reply_body(message, Some("resolve")));
        let reply: ApiReply = self.api.send(request).await?;
        Ok(reply.into())
    }

    async fn delete_comment(&self, file_id: &str, comment_id: &str) -> Result<(), RemoteError> {
        let url = GoogleApiClient::url(DRIVE_BASE, &[file_id, "comments", comment_id])?;
        let request = self.api.request(Method::DELETE, url).await?;
        self.api.send_empty(request).await
    }
}
