// =============================================================================
// GOOGLE DOCS TOOLS
// =============================================================================

use anyhow::Context;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::tools::{
    RegistryError, RenderText, SchemaViolation, Tool, ToolContext, ToolRegistry,
};
use crate::core::workspace::{DocumentEdit, DocumentTab, GoogleDocument};

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ReadGoogleDoc)?;
    registry.register(ListDocumentTabs)?;
    registry.register(AppendToGoogleDoc)?;
    registry.register(InsertText)?;
    registry.register(DeleteRange)?;
    registry.register(InsertPageBreak)?;
    Ok(())
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIdInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
}

/// Plain confirmation of an edit.
pub struct EditDone(String);

impl RenderText for EditDone {
    fn render(&self) -> String {
        self.0.clone()
    }
}

// =============================================================================
// readGoogleDoc
// =============================================================================

pub struct ReadGoogleDoc;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadGoogleDocInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// Only read this tab. Use listDocumentTabs to find tab IDs.
    #[schemars(length(min = 1))]
    pub tab_id: Option<String>,
}

pub struct DocumentText {
    document: GoogleDocument,
    tab_id: Option<String>,
}

impl DocumentText {
    fn selected_tabs(&self) -> Vec<&DocumentTab> {
        match &self.tab_id {
            Some(id) => self.document.tabs.iter().filter(|t| &t.tab_id == id).collect(),
            None => self.document.tabs.iter().collect(),
        }
    }
}

impl RenderText for DocumentText {
    fn render(&self) -> String {
        let mut out = format!(
            "**{}**\n**Document ID:** {}\n\n",
            self.document.title, self.document.document_id
        );

        let tabs = self.selected_tabs();
        if tabs.iter().all(|t| t.text.trim().is_empty()) {
            out.push_str("(The document is empty.)");
            return out;
        }

        // A single tab reads as the document body; several get their own headings.
        if tabs.len() == 1 {
            out.push_str(&tabs[0].text);
        } else {
            for tab in tabs {
                out.push_str(&format!("--- Tab: {} ---\n{}\n", tab.title, tab.text));
            }
        }
        out
    }
}

#[async_trait]
impl Tool for ReadGoogleDoc {
    type Input = ReadGoogleDocInput;
    type Output = DocumentText;

    fn name(&self) -> &'static str {
        "readGoogleDoc"
    }

    fn description(&self) -> &'static str {
        "Reads the text content of a Google Document, including every tab. \
         Headings are marked with # and tables are rendered as rows of | cells |."
    }

    async fn execute(&self, input: &ReadGoogleDocInput, ctx: &ToolContext) -> anyhow::Result<DocumentText> {
        ctx.log.info(&format!("Reading Google Doc: {}", input.document_id));

        let document = ctx
            .services
            .documents
            .get_document(&input.document_id)
            .await
            .with_context(|| format!("Failed to read document {}", input.document_id))?;

        if let Some(tab_id) = &input.tab_id {
            if !document.tabs.iter().any(|t| &t.tab_id == tab_id) {
                anyhow::bail!(
                    "Tab {} was not found in document {}",
                    tab_id,
                    input.document_id
                );
            }
        }

        Ok(DocumentText {
            document,
            tab_id: input.tab_id.clone(),
        })
    }
}

// =============================================================================
// listDocumentTabs
// =============================================================================

pub struct ListDocumentTabs;

pub struct TabList(GoogleDocument);

impl RenderText for TabList {
    fn render(&self) -> String {
        let mut out = format!(
            "**Tabs in \"{}\" ({} total)**\n\n",
            self.0.title,
            self.0.tabs.len()
        );
        for tab in &self.0.tabs {
            out.push_str(&format!(
                "{}- **{}** (ID: {}, {} characters)\n",
                "  ".repeat(tab.depth),
                tab.title,
                tab.tab_id,
                tab.text.chars().count()
            ));
        }
        out
    }
}

#[async_trait]
impl Tool for ListDocumentTabs {
    type Input = DocumentIdInput;
    type Output = TabList;

    fn name(&self) -> &'static str {
        "listDocumentTabs"
    }

    fn description(&self) -> &'static str {
        "Lists the tabs of a Google Document with their IDs and nesting."
    }

    async fn execute(&self, input: &DocumentIdInput, ctx: &ToolContext) -> anyhow::Result<TabList> {
        ctx.log.info(&format!("Listing tabs of document: {}", input.document_id));

        let document = ctx
            .services
            .documents
            .get_document(&input.document_id)
            .await
            .with_context(|| format!("Failed to list tabs of document {}", input.document_id))?;
        Ok(TabList(document))
    }
}

// =============================================================================
// appendToGoogleDoc
// =============================================================================

pub struct AppendToGoogleDoc;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The text to append.
    #[schemars(length(min = 1))]
    pub text: String,
}

#[async_trait]
impl Tool for AppendToGoogleDoc {
    type Input = AppendInput;
    type Output = EditDone;

    fn name(&self) -> &'static str {
        "appendToGoogleDoc"
    }

    fn description(&self) -> &'static str {
        "Appends text to the end of a Google Document."
    }

    async fn execute(&self, input: &AppendInput, ctx: &ToolContext) -> anyhow::Result<EditDone> {
        ctx.log.info(&format!("Appending to Google Doc: {}", input.document_id));

        let documents = &ctx.services.documents;
        let document = documents
            .get_document(&input.document_id)
            .await
            .with_context(|| format!("Failed to read document {}", input.document_id))?;

        // Body indexes start at 1; an empty body still has its newline there.
        let index = document.end_index.max(1);
        documents
            .batch_update(
                &input.document_id,
                vec![DocumentEdit::InsertText {
                    index,
                    text: input.text.clone(),
                }],
            )
            .await
            .with_context(|| format!("Failed to append text to document {}", input.document_id))?;

        Ok(EditDone(format!(
            "Successfully appended {} characters to document {} at index {}.",
            input.text.chars().count(),
            input.document_id,
            index
        )))
    }
}

// =============================================================================
// insertText
// =============================================================================

pub struct InsertText;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertTextInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The text to insert.
    #[schemars(length(min = 1))]
    pub text: String,
    /// The index (1-based) where the text is inserted.
    #[schemars(range(min = 1))]
    pub index: i64,
}

#[async_trait]
impl Tool for InsertText {
    type Input = InsertTextInput;
    type Output = EditDone;

    fn name(&self) -> &'static str {
        "insertText"
    }

    fn description(&self) -> &'static str {
        "Inserts text at a specific index in a Google Document. Index 1 is the start of the body."
    }

    async fn execute(&self, input: &InsertTextInput, ctx: &ToolContext) -> anyhow::Result<EditDone> {
        ctx.log.info(&format!(
            "Inserting text into {} at index {}",
            input.document_id, input.index
        ));

        ctx.services
            .documents
            .batch_update(
                &input.document_id,
                vec![DocumentEdit::InsertText {
                    index: input.index,
                    text: input.text.clone(),
                }],
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to insert text into document {} at index {}",
                    input.document_id, input.index
                )
            })?;

        Ok(EditDone(format!(
            "Successfully inserted {} characters at index {}.",
            input.text.chars().count(),
            input.index
        )))
    }
}

// =============================================================================
// deleteRange
// =============================================================================

pub struct DeleteRange;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRangeInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The first index to delete (inclusive).
    #[schemars(range(min = 1))]
    pub start_index: i64,
    /// The index where deletion stops (exclusive).
    #[schemars(range(min = 1))]
    pub end_index: i64,
}

#[async_trait]
impl Tool for DeleteRange {
    type Input = DeleteRangeInput;
    type Output = EditDone;

    fn name(&self) -> &'static str {
        "deleteRange"
    }

    fn description(&self) -> &'static str {
        "Deletes content between two indexes in a Google Document. The end index is exclusive."
    }

    fn check(&self, input: &DeleteRangeInput) -> Result<(), SchemaViolation> {
        if input.end_index <= input.start_index {
            return Err(SchemaViolation::new(
                "endIndex",
                format!("must be greater than startIndex ({})", input.start_index),
            ));
        }
        Ok(())
    }

    async fn execute(&self, input: &DeleteRangeInput, ctx: &ToolContext) -> anyhow::Result<EditDone> {
        ctx.log.info(&format!(
            "Deleting range {}..{} in {}",
            input.start_index, input.end_index, input.document_id
        ));

        ctx.services
            .documents
            .batch_update(
                &input.document_id,
                vec![DocumentEdit::DeleteRange {
                    start_index: input.start_index,
                    end_index: input.end_index,
                }],
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to delete range {}-{} in document {}",
                    input.start_index, input.end_index, input.document_id
                )
            })?;

        Ok(EditDone(format!(
            "Successfully deleted content from index {} to {}.",
            input.start_index, input.end_index
        )))
    }
}

// =============================================================================
// insertPageBreak
// =============================================================================

pub struct InsertPageBreak;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageBreakInput {
    /// The ID of the Google Document (from its URL).
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The index (1-based) where the page break is inserted.
    #[schemars(range(min = 1))]
    pub index: i64,
}

#[async_trait]
impl Tool for InsertPageBreak {
    type Input = PageBreakInput;
    type Output = EditDone;

    fn name(&self) -> &'static str {
        "insertPageBreak"
    }

    fn description(&self) -> &'static str {
        "Inserts a page break at a specific index in a Google Document."
    }

    async fn execute(&self, input: &PageBreakInput, ctx: &ToolContext) -> anyhow::Result<EditDone> {
        ctx.services
            .documents
            .batch_update(
                &input.document_id,
                vec![DocumentEdit::InsertPageBreak { index: input.index }],
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to insert page break into document {}",
                    input.document_id
                )
            })?;

        Ok(EditDone(format!(
            "Successfully inserted a page break at index {}.",
            input.index
        )))
    }
}
