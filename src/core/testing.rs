// In-memory stand-ins for every port, shared by the unit tests across the
// crate. Each mock service owns a `CallLog` that records method names so tests
// can assert exactly which remote calls were made, and can be told to fail a
// given method with a canned `RemoteError`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::session::{
    AuthError, CredentialProvider, CredentialSession, ServiceClientSet, ServiceFactory,
    SessionManager,
};
use crate::core::tools::{LogLevel, LogSink, RegistryError, ToolError, ToolRegistry};
use crate::core::workspace::*;

// =============================================================================
// CREDENTIALS
// =============================================================================

pub struct StaticSession {
    principal: String,
}

impl StaticSession {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }
}

#[async_trait]
impl CredentialSession for StaticSession {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok("test-token".to_string())
    }

    fn principal(&self) -> String {
        self.principal.clone()
    }
}

/// Counts `acquire` calls. Can fail the first N attempts and can be slowed
/// down to widen race windows.
pub struct CountingProvider {
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(times: usize) -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(times),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingProvider {
    async fn acquire(&self) -> Result<Arc<dyn CredentialSession>, AuthError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AuthError::TokenExchange("invalid_grant".to_string()));
        }

        Ok(Arc::new(StaticSession::new(format!("user-{}", attempt))))
    }
}

// =============================================================================
// CALL LOG
// =============================================================================

#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, RemoteError>>,
}

impl CallLog {
    /// Record a call and return the canned failure for it, if any.
    pub fn hit(&self, method: &str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(method.to_string());
        match self.failures.lock().unwrap().get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn fail(&self, method: &str, err: RemoteError) {
        self.failures.lock().unwrap().insert(method.to_string(), err);
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count_of(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

// =============================================================================
// APPS SCRIPT
// =============================================================================

pub struct MockScriptService {
    pub calls: CallLog,
    pub script_id: Mutex<String>,
    pub files: Mutex<Vec<ScriptFile>>,
    pub created: Mutex<Vec<(String, String)>>,
}

impl Default for MockScriptService {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            script_id: Mutex::new("mock-script-id-123".to_string()),
            files: Mutex::new(vec![
                ScriptFile {
                    name: "Code".to_string(),
                    file_type: ScriptFileType::ServerJs,
                    source: "function myFunction() {\n  Logger.log('Hello');\n}".to_string(),
                },
                ScriptFile {
                    name: "appsscript".to_string(),
                    file_type: ScriptFileType::Json,
                    source: "{\"timeZone\":\"America/New_York\"}".to_string(),
                },
            ]),
            created: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScriptService for MockScriptService {
    async fn create_project(
        &self,
        title: &str,
        parent_id: &str,
    ) -> Result<ScriptProject, RemoteError> {
        self.calls.hit("projects.create")?;
        self.created
            .lock()
            .unwrap()
            .push((title.to_string(), parent_id.to_string()));
        Ok(ScriptProject {
            script_id: self.script_id.lock().unwrap().clone(),
            title: title.to_string(),
            parent_id: Some(parent_id.to_string()),
        })
    }

    async fn update_content(
        &self,
        _script_id: &str,
        files: Vec<ScriptFile>,
    ) -> Result<Vec<ScriptFile>, RemoteError> {
        self.calls.hit("projects.updateContent")?;
        *self.files.lock().unwrap() = files.clone();
        Ok(files)
    }

    async fn get_content(&self, _script_id: &str) -> Result<Vec<ScriptFile>, RemoteError> {
        self.calls.hit("projects.getContent")?;
        Ok(self.files.lock().unwrap().clone())
    }
}

// =============================================================================
// DRIVE
// =============================================================================

pub struct MockFileStorageService {
    pub calls: CallLog,
    pub files: Mutex<Vec<DriveFile>>,
    pub comments: Mutex<Vec<Comment>>,
    /// (comment id, reply text, action)
    pub replies: Mutex<Vec<(String, Option<String>, Option<String>)>>,
    pub queries: Mutex<Vec<FileQuery>>,
    pub created: Mutex<Vec<NewFile>>,
    pub copies: Mutex<Vec<(String, Option<String>, Vec<String>)>>,
    pub updates: Mutex<Vec<(String, FileUpdate)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl Default for MockFileStorageService {
    fn default() -> Self {
        let script = |id: &str, name: &str| DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: Some(GOOGLE_SCRIPT_MIME.to_string()),
            created_time: "2024-01-01T00:00:00Z".parse().ok(),
            modified_time: "2024-01-02T00:00:00Z".parse().ok(),
            parents: vec!["root".to_string()],
            ..Default::default()
        };
        Self {
            calls: CallLog::default(),
            files: Mutex::new(vec![
                script("script-1", "My Script"),
                script("script-2", "Another Script"),
            ]),
            comments: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

impl MockFileStorageService {
    pub fn set_files(&self, files: Vec<DriveFile>) {
        *self.files.lock().unwrap() = files;
    }

    pub fn last_query(&self) -> Option<FileQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    fn find(&self, file_id: &str) -> DriveFile {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .unwrap_or_else(|| DriveFile {
                id: file_id.to_string(),
                name: format!("File {}", file_id),
                mime_type: Some(GOOGLE_DOC_MIME.to_string()),
                parents: vec!["root".to_string()],
                ..Default::default()
            })
    }
}

#[async_trait]
impl FileStorageService for MockFileStorageService {
    async fn list_files(&self, query: &FileQuery) -> Result<Vec<DriveFile>, RemoteError> {
        self.calls.hit("files.list")?;
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.files.lock().unwrap().clone())
    }

    async fn get_file(&self, file_id: &str) -> Result<DriveFile, RemoteError> {
        self.calls.hit("files.get")?;
        Ok(self.find(file_id))
    }

    async fn create_file(&self, file: &NewFile) -> Result<DriveFile, RemoteError> {
        self.calls.hit("files.create")?;
        self.created.lock().unwrap().push(file.clone());
        Ok(DriveFile {
            id: "new-file-id".to_string(),
            name: file.name.clone(),
            mime_type: Some(file.mime_type.clone()),
            parents: file.parents.clone(),
            web_view_link: Some("https://drive.google.com/new-file-id".to_string()),
            ..Default::default()
        })
    }

    async fn copy_file(
        &self,
        file_id: &str,
        name: Option<&str>,
        parents: &[String],
    ) -> Result<DriveFile, RemoteError> {
        self.calls.hit("files.copy")?;
        self.copies.lock().unwrap().push((
            file_id.to_string(),
            name.map(str::to_string),
            parents.to_vec(),
        ));
        let original = self.find(file_id);
        Ok(DriveFile {
            id: "copy-id".to_string(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("Copy of {}", original.name)),
            mime_type: original.mime_type,
            parents: parents.to_vec(),
            ..Default::default()
        })
    }

    async fn update_file(
        &self,
        file_id: &str,
        update: &FileUpdate,
    ) -> Result<DriveFile, RemoteError> {
        self.calls.hit("files.update")?;
        self.updates
            .lock()
            .unwrap()
            .push((file_id.to_string(), update.clone()));
        let mut file = self.find(file_id);
        if let Some(name) = &update.name {
            file.name = name.clone();
        }
        if !update.add_parents.is_empty() {
            file.parents = update.add_parents.clone();
        }
        Ok(file)
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), RemoteError> {
        self.calls.hit("files.delete")?;
        self.deleted.lock().unwrap().push(file_id.to_string());
        Ok(())
    }

    async fn list_comments(&self, _file_id: &str) -> Result<Vec<Comment>, RemoteError> {
        self.calls.hit("comments.list")?;
        Ok(self.comments.lock().unwrap().clone())
    }

    async fn create_comment(&self, _file_id: &str, content: &str) -> Result<Comment, RemoteError> {
        self.calls.hit("comments.create")?;
        Ok(Comment {
            id: "comment-1".to_string(),
            author: Some("Test User".to_string()),
            content: content.to_string(),
            ..Default::default()
        })
    }

    async fn get_comment(&self, _file_id: &str, comment_id: &str) -> Result<Comment, RemoteError> {
        self.calls.hit("comments.get")?;
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == comment_id)
            .cloned()
            .unwrap_or_else(|| Comment {
                id: comment_id.to_string(),
                author: Some("Test User".to_string()),
                content: "Looks good".to_string(),
                ..Default::default()
            }))
    }

    async fn reply_to_comment(
        &self,
        _file_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Reply, RemoteError> {
        self.calls.hit("replies.create")?;
        self.replies
            .lock()
            .unwrap()
            .push((comment_id.to_string(), Some(content.to_string()), None));
        Ok(Reply {
            id: "reply-1".to_string(),
            author: Some("Test User".to_string()),
            content: content.to_string(),
            ..Default::default()
        })
    }

    async fn resolve_comment(
        &self,
        _file_id: &str,
        comment_id: &str,
        message: Option<&str>,
    ) -> Result<Reply, RemoteError> {
        self.calls.hit("comments.resolve")?;
        self.replies.lock().unwrap().push((
            comment_id.to_string(),
            message.map(str::to_string),
            Some("resolve".to_string()),
        ));
        Ok(Reply {
            id: "reply-2".to_string(),
            author: Some("Test User".to_string()),
            content: message.unwrap_or_default().to_string(),
            ..Default::default()
        })
    }

    async fn delete_comment(&self, _file_id: &str, comment_id: &str) -> Result<(), RemoteError> {
        self.calls.hit("comments.delete")?;
        self.deleted.lock().unwrap().push(comment_id.to_string());
        Ok(())
    }
}

// =============================================================================
// DOCS
// =============================================================================

pub struct MockDocumentService {
    pub calls: CallLog,
    pub document: Mutex<GoogleDocument>,
    pub edits: Mutex<Vec<(String, Vec<DocumentEdit>)>>,
}

impl Default for MockDocumentService {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            document: Mutex::new(GoogleDocument {
                document_id: "doc-1".to_string(),
                title: "Test Document".to_string(),
                tabs: vec![DocumentTab {
                    tab_id: "t.0".to_string(),
                    title: "Tab 1".to_string(),
                    depth: 0,
                    text: "Hello world\n".to_string(),
                }],
                end_index: 13,
            }),
            edits: Mutex::new(Vec::new()),
        }
    }
}

impl MockDocumentService {
    pub fn edits(&self) -> Vec<(String, Vec<DocumentEdit>)> {
        self.edits.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentService for MockDocumentService {
    async fn get_document(&self, document_id: &str) -> Result<GoogleDocument, RemoteError> {
        self.calls.hit("documents.get")?;
        let mut document = self.document.lock().unwrap().clone();
        document.document_id = document_id.to_string();
        Ok(document)
    }

    async fn batch_update(
        &self,
        document_id: &str,
        edits: Vec<DocumentEdit>,
    ) -> Result<(), RemoteError> {
        self.calls.hit("documents.batchUpdate")?;
        self.edits
            .lock()
            .unwrap()
            .push((document_id.to_string(), edits));
        Ok(())
    }
}

// =============================================================================
// SHEETS
// =============================================================================

pub struct MockSpreadsheetService {
    pub calls: CallLog,
    pub values: Mutex<Vec<Vec<CellValue>>>,
    pub writes: Mutex<Vec<(String, Vec<Vec<CellValue>>, ValueInputOption)>>,
}

impl Default for MockSpreadsheetService {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            values: Mutex::new(vec![
                vec![Value::from("Name"), Value::from("Score")],
                vec![Value::from("Ada"), Value::from(42)],
            ]),
            writes: Mutex::new(Vec::new()),
        }
    }
}

impl MockSpreadsheetService {
    pub fn writes(&self) -> Vec<(String, Vec<Vec<CellValue>>, ValueInputOption)> {
        self.writes.lock().unwrap().clone()
    }

    fn summarize(range: &str, values: &[Vec<CellValue>]) -> UpdateSummary {
        UpdateSummary {
            updated_range: range.to_string(),
            updated_rows: values.len() as u64,
            updated_columns: values.iter().map(Vec::len).max().unwrap_or(0) as u64,
            updated_cells: values.iter().map(Vec::len).sum::<usize>() as u64,
        }
    }

    fn sheet(sheet_id: i64, title: &str) -> SheetInfo {
        SheetInfo {
            sheet_id,
            title: title.to_string(),
            row_count: 1000,
            column_count: 26,
        }
    }
}

#[async_trait]
impl SpreadsheetService for MockSpreadsheetService {
    async fn get_values(&self, _id: &str, range: &str) -> Result<ValueRange, RemoteError> {
        self.calls.hit("values.get")?;
        Ok(ValueRange {
            range: range.to_string(),
            values: self.values.lock().unwrap().clone(),
        })
    }

    async fn update_values(
        &self,
        _id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError> {
        self.calls.hit("values.update")?;
        let summary = Self::summarize(range, &values);
        self.writes
            .lock()
            .unwrap()
            .push((range.to_string(), values, option));
        Ok(summary)
    }

    async fn append_values(
        &self,
        _id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError> {
        self.calls.hit("values.append")?;
        let summary = Self::summarize(range, &values);
        self.writes
            .lock()
            .unwrap()
            .push((range.to_string(), values, option));
        Ok(summary)
    }

    async fn clear_values(&self, _id: &str, range: &str) -> Result<String, RemoteError> {
        self.calls.hit("values.clear")?;
        Ok(range.to_string())
    }

    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, RemoteError> {
        self.calls.hit("spreadsheets.get")?;
        Ok(SpreadsheetInfo {
            spreadsheet_id: spreadsheet_id.to_string(),
            title: "Test Spreadsheet".to_string(),
            url: Some(format!(
                "https://docs.google.com/spreadsheets/d/{}",
                spreadsheet_id
            )),
            sheets: vec![Self::sheet(0, "Sheet1"), Self::sheet(7, "Data")],
        })
    }

    async fn add_sheet(&self, _id: &str, title: &str) -> Result<SheetInfo, RemoteError> {
        self.calls.hit("spreadsheets.batchUpdate")?;
        Ok(Self::sheet(42, title))
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetInfo, RemoteError> {
        self.calls.hit("spreadsheets.create")?;
        Ok(SpreadsheetInfo {
            spreadsheet_id: "new-spreadsheet-id".to_string(),
            title: title.to_string(),
            url: Some("https://docs.google.com/spreadsheets/d/new-spreadsheet-id".to_string()),
            sheets: vec![Self::sheet(0, "Sheet1")],
        })
    }
}

// =============================================================================
// WORKSPACE
// =============================================================================

/// All four mock services, handed out as a `ServiceFactory`. Every derivation
/// returns the same underlying mock so call logs see calls from any session.
#[derive(Default)]
pub struct MockWorkspace {
    pub documents: Arc<MockDocumentService>,
    pub spreadsheets: Arc<MockSpreadsheetService>,
    pub files: Arc<MockFileStorageService>,
    pub scripts: Arc<MockScriptService>,
    derivations: AtomicUsize,
}

impl MockWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client set bound to a throwaway session, bypassing the manager.
    pub fn client_set(&self) -> ServiceClientSet {
        ServiceClientSet {
            session: Arc::new(StaticSession::new("direct")),
            documents: self.documents.clone(),
            spreadsheets: self.spreadsheets.clone(),
            files: self.files.clone(),
            scripts: self.scripts.clone(),
        }
    }

    /// Remote calls made across all four services.
    pub fn total_calls(&self) -> usize {
        self.documents.calls.count()
            + self.spreadsheets.calls.count()
            + self.files.calls.count()
            + self.scripts.calls.count()
    }

    pub fn derivations(&self) -> usize {
        self.derivations.load(Ordering::SeqCst)
    }

    fn derived(&self) {
        self.derivations.fetch_add(1, Ordering::SeqCst);
    }
}

impl ServiceFactory for MockWorkspace {
    fn documents(&self, _: Arc<dyn CredentialSession>) -> Arc<dyn DocumentService> {
        self.derived();
        self.documents.clone()
    }

    fn spreadsheets(&self, _: Arc<dyn CredentialSession>) -> Arc<dyn SpreadsheetService> {
        self.derived();
        self.spreadsheets.clone()
    }

    fn files(&self, _: Arc<dyn CredentialSession>) -> Arc<dyn FileStorageService> {
        self.derived();
        self.files.clone()
    }

    fn scripts(&self, _: Arc<dyn CredentialSession>) -> Arc<dyn ScriptService> {
        self.derived();
        self.scripts.clone()
    }
}

// =============================================================================
// LOGGING AND DISPATCH
// =============================================================================

#[derive(Default)]
pub struct RecordingLogSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogSink {
    /// True if a message at `level` (as displayed, e.g. "error") contains `needle`.
    pub fn has(&self, level: &str, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| l.to_string() == level && m.contains(needle))
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

/// A registry wired to a fresh `MockWorkspace` through a real `SessionManager`.
pub struct Harness {
    pub workspace: Arc<MockWorkspace>,
    pub provider: Arc<CountingProvider>,
    pub registry: ToolRegistry,
    pub log: Arc<RecordingLogSink>,
}

impl Harness {
    pub fn new(register: fn(&mut ToolRegistry) -> Result<(), RegistryError>) -> Self {
        let workspace = Arc::new(MockWorkspace::new());
        let provider = Arc::new(CountingProvider::new());
        let sessions = Arc::new(SessionManager::new(provider.clone(), workspace.clone()));
        let mut registry = ToolRegistry::new(sessions);
        register(&mut registry).unwrap();
        Self {
            workspace,
            provider,
            registry,
            log: Arc::new(RecordingLogSink::default()),
        }
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.registry
            .dispatch(name, arguments, self.log.clone())
            .await
    }
}
