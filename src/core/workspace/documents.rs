// Port for the Google Docs service.
// Tools only see these types; the Docs REST structures stay in infra.

use async_trait::async_trait;

use super::RemoteError;

/// A document as the tools see it: one entry per tab with its text already
/// flattened, plus the insertion point at the end of the first tab's body.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleDocument {
    pub document_id: String,
    pub title: String,
    pub tabs: Vec<DocumentTab>,
    /// Index of the trailing newline of the body; text appended before it
    /// lands at the end of the document.
    pub end_index: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTab {
    pub tab_id: String,
    pub title: String,
    /// 0 for top-level tabs, 1 for their children, and so on.
    pub depth: usize,
    pub text: String,
}

impl GoogleDocument {
    pub fn total_chars(&self) -> usize {
        self.tabs.iter().map(|t| t.text.chars().count()).sum()
    }
}

/// One structural edit, applied through `documents.batchUpdate`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEdit {
    InsertText { index: i64, text: String },
    DeleteRange { start_index: i64, end_index: i64 },
    InsertPageBreak { index: i64 },
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Fetch a document with the content of every tab.
    async fn get_document(&self, document_id: &str) -> Result<GoogleDocument, RemoteError>;

    /// Apply edits in order. The remote side applies them atomically.
    async fn batch_update(
        &self,
        document_id: &str,
        edits: Vec<DocumentEdit>,
    ) -> Result<(), RemoteError>;
}
