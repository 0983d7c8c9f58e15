// =============================================================================
// GOOGLE DOCS API
// =============================================================================
//
// Fetches documents with every tab's content (`includeTabsContent=true`) and
// flattens each tab into plain text. Headings become markdown-style markers
// and tables become pipe-separated rows.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::api_client::GoogleApiClient;
use crate::core::session::CredentialSession;
use crate::core::workspace::{
    DocumentEdit, DocumentService, DocumentTab as Tab, GoogleDocument, RemoteError,
};

const DOCS_BASE: &str = "https://docs.googleapis.com/v1/documents";

// =============================================================================
// RESPONSE STRUCTURES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTab {
    tab_properties: TabProperties,
    document_tab: Option<ApiDocumentTab>,
    #[serde(default)]
    child_tabs: Vec<ApiTab>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabProperties {
    tab_id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDocumentTab {
    body: Option<Body>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuralElement {
    end_index: Option<i64>,
    paragraph: Option<Paragraph>,
    table: Option<Table>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paragraph {
    #[serde(default)]
    elements: Vec<ParagraphElement>,
    paragraph_style: Option<ParagraphStyle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphStyle {
    named_style_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphElement {
    text_run: Option<TextRun>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextRun {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    #[serde(default)]
    table_rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRow {
    #[serde(default)]
    table_cells: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableCell {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    document_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tabs: Vec<ApiTab>,
    /// Only present for documents fetched without tab content.
    body: Option<Body>,
}

// =============================================================================
// CONVERSION
// =============================================================================

impl Document {
    fn into_domain(self) -> GoogleDocument {
        let mut tabs = Vec::new();
        flatten_tabs(&self.tabs, 0, &mut tabs);

        let first_body = self
            .tabs
            .first()
            .and_then(|t| t.document_tab.as_ref())
            .and_then(|d| d.body.as_ref())
            .or(self.body.as_ref());

        if tabs.is_empty() {
            if let Some(body) = &self.body {
                tabs.push(Tab {
                    tab_id: String::new(),
                    title: self.title.clone(),
                    depth: 0,
                    text: body_text(body),
                });
            }
        }

        GoogleDocument {
            end_index: first_body.map(insertion_point).unwrap_or(1),
            document_id: self.document_id,
            title: self.title,
            tabs,
        }
    }
}

fn flatten_tabs(tabs: &[ApiTab], depth: usize, out: &mut Vec<Tab>) {
    for tab in tabs {
        let text = tab
            .document_tab
            .as_ref()
            .and_then(|d| d.body.as_ref())
            .map(body_text)
            .unwrap_or_default();

        out.push(Tab {
            tab_id: tab.tab_properties.tab_id.clone(),
            title: tab.tab_properties.title.clone(),
            depth,
            text,
        });

        flatten_tabs(&tab.child_tabs, depth + 1, out);
    }
}

/// The index just before the body's final newline, where appended text goes.
fn insertion_point(body: &Body) -> i64 {
    body.content
        .last()
        .and_then(|e| e.end_index)
        .map(|end| (end - 1).max(1))
        .unwrap_or(1)
}

fn body_text(body: &Body) -> String {
    let mut output = String::new();
    for element in &body.content {
        extract_element_text(element, &mut output);
    }
    output
}

fn extract_element_text(element: &StructuralElement, output: &mut String) {
    if let Some(paragraph) = &element.paragraph {
        let marker = paragraph
            .paragraph_style
            .as_ref()
            .and_then(|s| s.named_style_type.as_deref())
            .and_then(|style| match style {
                "TITLE" | "HEADING_1" => Some("# "),
                "HEADING_2" => Some("## "),
                "HEADING_3" => Some("### "),
                _ => None,
            });
        if let Some(marker) = marker {
            output.push_str(marker);
        }

        for run in paragraph.elements.iter().filter_map(|e| e.text_run.as_ref()) {
            if let Some(content) = &run.content {
                output.push_str(content);
            }
        }
    }

    if let Some(table) = &element.table {
        output.push('\n');
        for row in &table.table_rows {
            let cells: Vec<String> = row
                .table_cells
                .iter()
                .map(|cell| {
                    let mut cell_text = String::new();
                    for cell_element in &cell.content {
                        extract_element_text(cell_element, &mut cell_text);
                    }
                    cell_text.trim().to_string()
                })
                .collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output.push('\n');
    }
}

fn edit_request(edit: &DocumentEdit) -> Value {
    match edit {
        DocumentEdit::InsertText { index, text } => json!({
            "insertText": { "location": { "index": index }, "text": text }
        }),
        DocumentEdit::DeleteRange {
            start_index,
            end_index,
        } => json!({
            "deleteContentRange": {
                "range": { "startIndex": start_index, "endIndex": end_index }
            }
        }),
        DocumentEdit::InsertPageBreak { index } => json!({
            "insertPageBreak": { "location": { "index": index } }
        }),
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoogleDocsApi {
    api: GoogleApiClient,
}

impl GoogleDocsApi {
    pub fn new(http: Client, session: Arc<dyn CredentialSession>) -> Self {
        Self {
            api: GoogleApiClient::new(http, session),
        }
    }
}

#[async_trait]
impl DocumentService for GoogleDocsApi {
    async fn get_document(&self, document_id: &str) -> Result<GoogleDocument, RemoteError> {
        let url = GoogleApiClient::url(DOCS_BASE, &[document_id])?;
        let request = self
            .api
            .request(Method::GET, url)
            .await?
            .query(&[("includeTabsContent", "true")]);

        tracing::debug!(document_id, "Fetching Google Doc");
        let document: Document = self.api.send(request).await?;
        Ok(document.into_domain())
    }

    async fn batch_update(
        &self,
        document_id: &str,
        edits: Vec<DocumentEdit>,
    ) -> Result<(), RemoteError> {
        let url = GoogleApiClient::url(DOCS_BASE, &[format!("{}:batchUpdate", document_id).as_str()])?;
        let requests: Vec<Value> = edits.iter().map(edit_request).collect();
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&json!({ "requests": requests }));
        self.api.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str, style: &str, end: i64) -> Value {
        json!({
            "endIndex": end,
            "paragraph": {
                "elements": [{ "textRun": { "content": text } }],
                "paragraphStyle": { "namedStyleType": style }
            }
        })
    }

    #[test]
    fn tabs_are_flattened_with_headings_and_tables() {
        let raw = json!({
            "documentId": "doc-1",
            "title": "Plan",
            "tabs": [{
                "tabProperties": { "tabId": "t.0", "title": "Overview" },
                "documentTab": { "body": { "content": [
                    { "endIndex": 1, "sectionBreak": {} },
                    paragraph("Goals\n", "HEADING_1", 7),
                    paragraph("Ship it\n", "NORMAL_TEXT", 15),
                    { "endIndex": 40, "table": { "tableRows": [
                        { "tableCells": [
                            { "content": [paragraph("a\n", "NORMAL_TEXT", 20)] },
                            { "content": [paragraph("b\n", "NORMAL_TEXT", 23)] }
                        ]}
                    ]}}
                ]}},
                "childTabs": [{
                    "tabProperties": { "tabId": "t.1", "title": "Notes" },
                    "documentTab": { "body": { "content": [paragraph("child\n", "NORMAL_TEXT", 7)] } }
                }]
            }]
        });

        let document: Document = serde_json::from_value(raw).unwrap();
        let doc = document.into_domain();

        assert_eq!(doc.title, "Plan");
        assert_eq!(doc.tabs.len(), 2);
        assert_eq!(doc.tabs[0].text, "# Goals\nShip it\n\n| a | b |\n\n");
        assert_eq!(doc.tabs[1].tab_id, "t.1");
        assert_eq!(doc.tabs[1].depth, 1);
        assert_eq!(doc.end_index, 39);
    }

    #[test]
    fn legacy_documents_without_tabs_use_the_body() {
        let raw = json!({
            "documentId": "doc-2",
            "title": "Old",
            "body": { "content": [paragraph("Hello\n", "NORMAL_TEXT", 7)] }
        });
        let doc = serde_json::from_value::<Document>(raw).unwrap().into_domain();
        assert_eq!(doc.tabs.len(), 1);
        assert_eq!(doc.tabs[0].text, "Hello\n");
        assert_eq!(doc.end_index, 6);
    }

    #[test]
    fn edits_map_to_batch_update_requests() {
        let delete = edit_request(&DocumentEdit::DeleteRange {
            start_index: 5,
            end_index: 9,
        });
        assert_eq!(delete["deleteContentRange"]["range"]["endIndex"], 9);

        let insert = edit_request(&DocumentEdit::InsertText {
            index: 1,
            text: "Hi".into(),
        });
        assert_eq!(insert["insertText"]["location"]["index"], 1);
        assert_eq!(insert["insertText"]["text"], "Hi");
    }
}
