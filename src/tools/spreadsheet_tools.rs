// =============================================================================
// GOOGLE SHEETS TOOLS
// =============================================================================
//
// Ranges are passed through in A1 notation (e.g. "Sheet1!A1:C10"); Sheets
// validates them and its message is surfaced when one is malformed.

use anyhow::Context;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::tools::{RegistryError, RenderText, Scalar, Tool, ToolContext, ToolRegistry};
use crate::core::workspace::{
    CellValue, SheetInfo, SpreadsheetInfo, UpdateSummary, ValueInputOption, ValueRange,
};

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ReadSpreadsheet)?;
    registry.register(WriteSpreadsheet)?;
    registry.register(AppendSpreadsheetRows)?;
    registry.register(ClearSpreadsheetRange)?;
    registry.register(GetSpreadsheetInfo)?;
    registry.register(AddSpreadsheetSheet)?;
    registry.register(CreateSpreadsheet)?;
    Ok(())
}

fn cell_text(cell: &CellValue) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn spreadsheet_url(info: &SpreadsheetInfo) -> String {
    info.url.clone().unwrap_or_else(|| {
        format!(
            "https://docs.google.com/spreadsheets/d/{}",
            info.spreadsheet_id
        )
    })
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RangeInput {
    /// The ID of the Google Spreadsheet (from its URL).
    #[schemars(length(min = 1))]
    pub spreadsheet_id: String,
    /// A1 notation range, e.g. "Sheet1!A1:C10".
    #[schemars(length(min = 1))]
    pub range: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WriteValuesInput {
    /// The ID of the Google Spreadsheet (from its URL).
    #[schemars(length(min = 1))]
    pub spreadsheet_id: String,
    /// A1 notation range, e.g. "Sheet1!A1:C10".
    #[schemars(length(min = 1))]
    pub range: String,
    /// Rows of cell values, starting at the top-left of the range. Each cell is
    /// a string, number, boolean or null.
    #[schemars(length(min = 1), with = "Vec<Vec<Scalar>>")]
    pub values: Vec<Vec<CellValue>>,
    /// RAW stores values as typed; USER_ENTERED parses them as if typed into the UI.
    #[serde(default)]
    pub value_input_option: ValueInputOption,
}

pub struct WriteResult {
    verb: &'static str,
    summary: UpdateSummary,
}

impl RenderText for WriteResult {
    fn render(&self) -> String {
        format!(
            "Successfully {} {} cells in range {} ({} rows, {} columns).",
            self.verb,
            self.summary.updated_cells,
            self.summary.updated_range,
            self.summary.updated_rows,
            self.summary.updated_columns
        )
    }
}

// =============================================================================
// readSpreadsheet
// =============================================================================

pub struct ReadSpreadsheet;

impl RenderText for ValueRange {
    fn render(&self) -> String {
        if self.values.is_empty() {
            return format!("Range {} is empty.", self.range);
        }

        let mut out = format!("**Range:** {}\n\n", self.range);
        for (i, row) in self.values.iter().enumerate() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            out.push_str(&format!("Row {}: {}\n", i + 1, cells.join(" | ")));
        }
        out
    }
}

#[async_trait]
impl Tool for ReadSpreadsheet {
    type Input = RangeInput;
    type Output = ValueRange;

    fn name(&self) -> &'static str {
        "readSpreadsheet"
    }

    fn description(&self) -> &'static str {
        "Reads cell values from a range of a Google Spreadsheet."
    }

    async fn execute(&self, input: &RangeInput, ctx: &ToolContext) -> anyhow::Result<ValueRange> {
        ctx.log.info(&format!(
            "Reading range {} of spreadsheet {}",
            input.range, input.spreadsheet_id
        ));

        ctx.services
            .spreadsheets
            .get_values(&input.spreadsheet_id, &input.range)
            .await
            .with_context(|| {
                format!(
                    "Failed to read range {} of spreadsheet {}",
                    input.range, input.spreadsheet_id
                )
            })
    }
}

// =============================================================================
// writeSpreadsheet / appendSpreadsheetRows
// =============================================================================

pub struct WriteSpreadsheet;

#[async_trait]
impl Tool for WriteSpreadsheet {
    type Input = WriteValuesInput;
    type Output = WriteResult;

    fn name(&self) -> &'static str {
        "writeSpreadsheet"
    }

    fn description(&self) -> &'static str {
        "Writes values to a range of a Google Spreadsheet, overwriting what is there."
    }

    async fn execute(&self, input: &WriteValuesInput, ctx: &ToolContext) -> anyhow::Result<WriteResult> {
        ctx.log.info(&format!(
            "Writing {} rows to {} of spreadsheet {}",
            input.values.len(),
            input.range,
            input.spreadsheet_id
        ));

        let summary = ctx
            .services
            .spreadsheets
            .update_values(
                &input.spreadsheet_id,
                &input.range,
                input.values.clone(),
                input.value_input_option,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to write range {} of spreadsheet {}",
                    input.range, input.spreadsheet_id
                )
            })?;

        Ok(WriteResult {
            verb: "updated",
            summary,
        })
    }
}

pub struct AppendSpreadsheetRows;

#[async_trait]
impl Tool for AppendSpreadsheetRows {
    type Input = WriteValuesInput;
    type Output = WriteResult;

    fn name(&self) -> &'static str {
        "appendSpreadsheetRows"
    }

    fn description(&self) -> &'static str {
        "Appends rows after the last row of data in a range of a Google Spreadsheet."
    }

    async fn execute(&self, input: &WriteValuesInput, ctx: &ToolContext) -> anyhow::Result<WriteResult> {
        ctx.log.info(&format!(
            "Appending {} rows to {} of spreadsheet {}",
            input.values.len(),
            input.range,
            input.spreadsheet_id
        ));

        let summary = ctx
            .services
            .spreadsheets
            .append_values(
                &input.spreadsheet_id,
                &input.range,
                input.values.clone(),
                input.value_input_option,
            )
            .await
            .with_context(|| {
                format!(
                    "Failed to append rows to {} of spreadsheet {}",
                    input.range, input.spreadsheet_id
                )
            })?;

        Ok(WriteResult {
            verb: "appended",
            summary,
        })
    }
}

// =============================================================================
// clearSpreadsheetRange
// =============================================================================

pub struct ClearSpreadsheetRange;

#[async_trait]
impl Tool for ClearSpreadsheetRange {
    type Input = RangeInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "clearSpreadsheetRange"
    }

    fn description(&self) -> &'static str {
        "Clears all values from a range of a Google Spreadsheet. Formatting is kept."
    }

    async fn execute(&self, input: &RangeInput, ctx: &ToolContext) -> anyhow::Result<String> {
        let cleared = ctx
            .services
            .spreadsheets
            .clear_values(&input.spreadsheet_id, &input.range)
            .await
            .with_context(|| {
                format!(
                    "Failed to clear range {} of spreadsheet {}",
                    input.range, input.spreadsheet_id
                )
            })?;

        Ok(format!("Successfully cleared range {}.", cleared))
    }
}

// =============================================================================
// getSpreadsheetInfo
// =============================================================================

pub struct GetSpreadsheetInfo;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetIdInput {
    /// The ID of the Google Spreadsheet (from its URL).
    #[schemars(length(min = 1))]
    pub spreadsheet_id: String,
}

impl RenderText for SpreadsheetInfo {
    fn render(&self) -> String {
        let mut out = format!(
            "**Spreadsheet:** {}\n**ID:** {}\n**URL:** {}\n\n**Sheets ({}):**\n",
            self.title,
            self.spreadsheet_id,
            spreadsheet_url(self),
            self.sheets.len()
        );
        for sheet in &self.sheets {
            out.push_str(&format!(
                "- {} (ID: {}, {} rows x {} columns)\n",
                sheet.title, sheet.sheet_id, sheet.row_count, sheet.column_count
            ));
        }
        out
    }
}

#[async_trait]
impl Tool for GetSpreadsheetInfo {
    type Input = SpreadsheetIdInput;
    type Output = SpreadsheetInfo;

    fn name(&self) -> &'static str {
        "getSpreadsheetInfo"
    }

    fn description(&self) -> &'static str {
        "Gets the title, URL and sheet list of a Google Spreadsheet."
    }

    async fn execute(
        &self,
        input: &SpreadsheetIdInput,
        ctx: &ToolContext,
    ) -> anyhow::Result<SpreadsheetInfo> {
        ctx.services
            .spreadsheets
            .get_spreadsheet(&input.spreadsheet_id)
            .await
            .with_context(|| format!("Failed to get spreadsheet {}", input.spreadsheet_id))
    }
}

// =============================================================================
// addSpreadsheetSheet
// =============================================================================

pub struct AddSpreadsheetSheet;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetInput {
    /// The ID of the Google Spreadsheet (from its URL).
    #[schemars(length(min = 1))]
    pub spreadsheet_id: String,
    /// Title of the new sheet.
    #[schemars(length(min = 1))]
    pub sheet_title: String,
}

pub struct AddedSheet {
    spreadsheet_id: String,
    sheet: SheetInfo,
}

impl RenderText for AddedSheet {
    fn render(&self) -> String {
        format!(
            "Successfully added sheet \"{}\" (ID: {}) to spreadsheet {}.",
            self.sheet.title, self.sheet.sheet_id, self.spreadsheet_id
        )
    }
}

#[async_trait]
impl Tool for AddSpreadsheetSheet {
    type Input = AddSheetInput;
    type Output = AddedSheet;

    fn name(&self) -> &'static str {
        "addSpreadsheetSheet"
    }

    fn description(&self) -> &'static str {
        "Adds a new sheet (tab) to an existing Google Spreadsheet."
    }

    async fn execute(&self, input: &AddSheetInput, ctx: &ToolContext) -> anyhow::Result<AddedSheet> {
        let sheet = ctx
            .services
            .spreadsheets
            .add_sheet(&input.spreadsheet_id, &input.sheet_title)
            .await
            .with_context(|| {
                format!(
                    "Failed to add sheet \"{}\" to spreadsheet {}",
                    input.sheet_title, input.spreadsheet_id
                )
            })?;

        Ok(AddedSheet {
            spreadsheet_id: input.spreadsheet_id.clone(),
            sheet,
        })
    }
}

// =============================================================================
// createSpreadsheet
// =============================================================================

pub struct CreateSpreadsheet;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TitleInput {
    /// Title of the new spreadsheet.
    #[schemars(length(min = 1))]
    pub title: String,
}

pub struct CreatedSpreadsheet(SpreadsheetInfo);

impl RenderText for CreatedSpreadsheet {
    fn render(&self) -> String {
        format!(
            "Successfully created spreadsheet \"{}\".\n\n**ID:** {}\n**URL:** {}",
            self.0.title,
            self.0.spreadsheet_id,
            spreadsheet_url(&self.0)
        )
    }
}

#[async_trait]
impl Tool for CreateSpreadsheet {
    type Input = TitleInput;
    type Output = CreatedSpreadsheet;

    fn name(&self) -> &'static str {
        "createSpreadsheet"
    }

    fn description(&self) -> &'static str {
        "Creates a new, empty Google Spreadsheet."
    }

    async fn execute(&self, input: &TitleInput, ctx: &ToolContext) -> anyhow::Result<CreatedSpreadsheet> {
        ctx.log.info(&format!("Creating spreadsheet \"{}\"", input.title));

        let info = ctx
            .services
            .spreadsheets
            .create_spreadsheet(&input.title)
            .await
            .with_context(|| format!("Failed to create spreadsheet \"{}\"", input.title))?;
        Ok(CreatedSpreadsheet(info))
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
    async fn read_renders_each_row() {
        let h = harness();
        let text = h
            .call(
                "readSpreadsheet",
                json!({ "spreadsheetId": "s-1", "range": "Sheet1!A1:B2" }),
            )
            .await
            .unwrap();

        assert_eq!(
            text,
            "**Range:** Sheet1!A1:B2\n\nRow 1: Name | Score\nRow 2: Ada | 42\n"
        );
    }

    #[tokio::test]
    async fn empty_ranges_say_so() {
        let h = harness();
        h.workspace.spreadsheets.values.lock().unwrap().clear();
        let text = h
            .call("readSpreadsheet", json!({ "spreadsheetId": "s-1", "range": "A1:A5" }))
            .await
            .unwrap();
        assert_eq!(text, "Range A1:A5 is empty.");
    }

    #[tokio::test]
    async fn writes_default_to_user_entered_and_keep_cell_types() {
        let h = harness();
        let text = h
            .call(
                "writeSpreadsheet",
                json!({
                    "spreadsheetId": "s-1",
                    "range": "Sheet1!A1",
                    "values": [["Total", 3.5, true, null]]
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            text,
            "Successfully updated 4 cells in range Sheet1!A1 (1 rows, 4 columns)."
        );
        let (range, values, option) = h.workspace.spreadsheets.writes().remove(0);
        assert_eq!(range, "Sheet1!A1");
        assert_eq!(values[0][1], json!(3.5));
        assert_eq!(option, ValueInputOption::UserEntered);
    }

    #[tokio::test]
    async fn append_honours_raw_input() {
        let h = harness();
        h.call(
            "appendSpreadsheetRows",
            json!({
                "spreadsheetId": "s-1",
                "range": "Sheet1",
                "values": [["=1+1"]],
                "valueInputOption": "RAW"
            }),
        )
        .await
        .unwrap();

        assert_eq!(h.workspace.spreadsheets.calls.recorded(), vec!["values.append"]);
        assert_eq!(h.workspace.spreadsheets.writes()[0].2, ValueInputOption::Raw);
    }

    #[tokio::test]
    async fn write_input_is_validated_before_any_call() {
        let h = harness();
        let cases = [
            (json!({ "spreadsheetId": "s-1", "range": "A1", "values": [] }), "values"),
            (json!({ "spreadsheetId": "s-1", "range": "A1", "values": [[{ "a": 1 }]] }), "values[0][0]"),
            (
                json!({ "spreadsheetId": "s-1", "range": "A1", "values": [["x"]], "valueInputOption": "FORMULA" }),
                "valueInputOption",
            ),
        ];
        for (args, expected) in cases {
            let err = h.call("writeSpreadsheet", args).await.unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidInput { ref field, .. } if field == expected),
                "{err:?}"
            );
        }
        assert_eq!(h.workspace.total_calls(), 0);
    }

    #[tokio::test]
    async fn remote_range_errors_are_surfaced() {
        let h = harness();
        h.workspace.spreadsheets.calls.fail(
            "values.clear",
            RemoteError::api(400, "Unable to parse range: Nope!A1"),
        );

        let err = h
            .call(
                "clearSpreadsheetRange",
                json!({ "spreadsheetId": "s-1", "range": "Nope!A1" }),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to clear range Nope!A1 of spreadsheet s-1: Unable to parse range: Nope!A1"
        );
    }

    #[tokio::test]
    async fn info_lists_every_sheet() {
        let h = harness();
        let text = h
            .call("getSpreadsheetInfo", json!({ "spreadsheetId": "s-1" }))
            .await
            .unwrap();

        assert!(text.contains("**Spreadsheet:** Test Spreadsheet"));
        assert!(text.contains("**URL:** https://docs.google.com/spreadsheets/d/s-1"));
        assert!(text.contains("- Data (ID: 7, 1000 rows x 26 columns)"));
    }

    #[tokio::test]
    async fn add_sheet_and_create_report_new_ids() {
        let h = harness();
        let added = h
            .call(
                "addSpreadsheetSheet",
                json!({ "spreadsheetId": "s-1", "sheetTitle": "Q3" }),
            )
            .await
            .unwrap();
        assert_eq!(added, "Successfully added sheet \"Q3\" (ID: 42) to spreadsheet s-1.");

        let created = h
            .call("createSpreadsheet", json!({ "title": "Budget" }))
            .await
            .unwrap();
        assert!(created.contains("\"Budget\""));
        assert!(created.contains("**ID:** new-spreadsheet-id"));
    }
}
