use std::sync::Arc;

use reqwest::Client;

use super::docs_api::GoogleDocsApi;
use super::drive_api::GoogleDriveApi;
use super::script_api::GoogleScriptApi;
use super::sheets_api::GoogleSheetsApi;
use crate::core::session::{CredentialSession, ServiceFactory};
use crate::core::workspace::{DocumentService, FileStorageService, ScriptService, SpreadsheetService};

/// Binds the REST adapters to a session. All of them share one connection pool.
pub struct GoogleServiceFactory {
    http: Client,
}

impl GoogleServiceFactory {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for GoogleServiceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceFactory for GoogleServiceFactory {
    fn documents(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn DocumentService> {
        Arc::new(GoogleDocsApi::new(self.http.clone(), session))
    }

    fn spreadsheets(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn SpreadsheetService> {
        Arc::new(GoogleSheetsApi::new(self.http.clone(), session))
    }

    fn files(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn FileStorageService> {
        Arc::new(GoogleDriveApi::new(self.http.clone(), session))
    }

    fn scripts(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn ScriptService> {
        Arc::new(GoogleScriptApi::new(self.http.clone(), session))
    }
}
