use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RemoteError;

/// Cells travel as raw JSON scalars so numbers and booleans keep their type.
pub type CellValue = Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub range: String,
    pub values: Vec<Vec<CellValue>>,
}

/// How Sheets should interpret written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    Raw,
    #[default]
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    pub updated_range: String,
    pub updated_rows: u64,
    pub updated_columns: u64,
    pub updated_cells: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: u64,
    pub column_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub url: Option<String>,
    pub sheets: Vec<SheetInfo>,
}

#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    async fn get_values(&self, spreadsheet_id: &str, range: &str)
        -> Result<ValueRange, RemoteError>;

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError>;

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError>;

    /// Returns the range that was actually cleared.
    async fn clear_values(&self, spreadsheet_id: &str, range: &str)
        -> Result<String, RemoteError>;

    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, RemoteError>;

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str)
        -> Result<SheetInfo, RemoteError>;

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetInfo, RemoteError>;
}
