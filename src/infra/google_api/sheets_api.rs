use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;

use super::api_client::GoogleApiClient;
use crate::core::session::CredentialSession;
use crate::core::workspace::{
    CellValue, RemoteError, SheetInfo, SpreadsheetInfo, SpreadsheetService, UpdateSummary,
    ValueInputOption, ValueRange,
};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ApiValueRange {
    #[serde(default)]
    range: String,
    #[serde(default)]
    values: Vec<Vec<CellValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUpdateValues {
    #[serde(default)]
    updated_range: String,
    #[serde(default)]
    updated_rows: u64,
    #[serde(default)]
    updated_columns: u64,
    #[serde(default)]
    updated_cells: u64,
}

impl From<ApiUpdateValues> for UpdateSummary {
    fn from(api: ApiUpdateValues) -> Self {
        UpdateSummary {
            updated_range: api.updated_range,
            updated_rows: api.updated_rows,
            updated_columns: api.updated_columns,
            updated_cells: api.updated_cells,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiAppendValues {
    #[serde(default)]
    updates: ApiUpdateValues,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiClearValues {
    #[serde(default)]
    cleared_range: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSpreadsheet {
    spreadsheet_id: String,
    properties: ApiSpreadsheetProperties,
    spreadsheet_url: Option<String>,
    #[serde(default)]
    sheets: Vec<ApiSheet>,
}

#[derive(Debug, Deserialize)]
struct ApiSpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiSheet {
    properties: ApiSheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSheetProperties {
    #[serde(default)]
    sheet_id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    grid_properties: ApiGridProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGridProperties {
    #[serde(default)]
    row_count: u64,
    #[serde(default)]
    column_count: u64,
}

impl From<ApiSheetProperties> for SheetInfo {
    fn from(api: ApiSheetProperties) -> Self {
        SheetInfo {
            sheet_id: api.sheet_id,
            title: api.title,
            row_count: api.grid_properties.row_count,
            column_count: api.grid_properties.column_count,
        }
    }
}

impl From<ApiSpreadsheet> for SpreadsheetInfo {
    fn from(api: ApiSpreadsheet) -> Self {
        SpreadsheetInfo {
            spreadsheet_id: api.spreadsheet_id,
            title: api.properties.title,
            url: api.spreadsheet_url,
            sheets: api.sheets.into_iter().map(|s| s.properties.into()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiBatchUpdateResponse {
    #[serde(default)]
    replies: Vec<ApiReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiReply {
    add_sheet: Option<ApiSheet>,
}

pub struct GoogleSheetsApi {
    api: GoogleApiClient,
}

impl GoogleSheetsApi {
    pub fn new(http: Client, session: Arc<dyn CredentialSession>) -> Self {
        Self {
            api: GoogleApiClient::new(http, session),
        }
    }

    async fn write(
        &self,
        method: Method,
        url: reqwest::Url,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<reqwest::RequestBuilder, RemoteError> {
        Ok(self
            .api
            .request(method, url)
            .await?
            .query(&[("valueInputOption", option.as_str())])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": values })))
    }
}

#[async_trait]
impl SpreadsheetService for GoogleSheetsApi {
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ValueRange, RemoteError> {
        let url = GoogleApiClient::url(SHEETS_BASE, &[spreadsheet_id, "values", range])?;
        let request = self.api.request(Method::GET, url).await?;
        let api: ApiValueRange = self.api.send(request).await?;
        Ok(ValueRange {
            range: api.range,
            values: api.values,
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError> {
        let url = GoogleApiClient::url(SHEETS_BASE, &[spreadsheet_id, "values", range])?;
        let request = self.write(Method::PUT, url, range, values, option).await?;
        let api: ApiUpdateValues = self.api.send(request).await?;
        Ok(api.into())
    }

    async fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
        option: ValueInputOption,
    ) -> Result<UpdateSummary, RemoteError> {
        let segment = format!("{}:append", range);
        let url = GoogleApiClient::url(SHEETS_BASE, &[spreadsheet_id, "values", segment.as_str()])?;
        let request = self
            .write(Method::POST, url, range, values, option)
            .await?
            .query(&[("insertDataOption", "INSERT_ROWS")]);
        let api: ApiAppendValues = self.api.send(request).await?;
        Ok(api.updates.into())
    }

    async fn clear_values(&self, spreadsheet_id: &str, range: &str) -> Result<String, RemoteError> {
        let segment = format!("{}:clear", range);
        let url = GoogleApiClient::url(SHEETS_BASE, &[spreadsheet_id, "values", segment.as_str()])?;
        let request = self.api.request(Method::POST, url).await?.json(&json!({}));
        let api: ApiClearValues = self.api.send(request).await?;
        Ok(if api.cleared_range.is_empty() {
            range.to_string()
        } else {
            api.cleared_range
        })
    }

    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<SpreadsheetInfo, RemoteError> {
        let url = GoogleApiClient::url(SHEETS_BASE, &[spreadsheet_id])?;
        let request = self.api.request(Method::GET, url).await?.query(&[(
            "fields",
            "spreadsheetId,spreadsheetUrl,properties.title,sheets.properties",
        )]);
        let api: ApiSpreadsheet = self.api.send(request).await?;
        Ok(api.into())
    }

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<SheetInfo, RemoteError> {
        let segment = format!("{}:batchUpdate", spreadsheet_id);
        let url = GoogleApiClient::url(SHEETS_BASE, &[segment.as_str()])?;
        let request = self.api.request(Method::POST, url).await?.json(&json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        }));
        let api: ApiBatchUpdateResponse = self.api.send(request).await?;

        api.replies
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .map(|sheet| sheet.properties.into())
            .ok_or_else(|| RemoteError::Decode("batchUpdate returned no addSheet reply".to_string()))
    }

    async fn create_spreadsheet(&self, title: &str) -> Result<SpreadsheetInfo, RemoteError> {
        let url = GoogleApiClient::url(SHEETS_BASE, &[])?;
        let request = self
            .api
            .request(Method::POST, url)
            .await?
            .json(&json!({ "properties": { "title": title } }));
        let api: ApiSpreadsheet = self.api.send(request).await?;
        Ok(api.into())
    }
}
