// Ports for the four remote Google services.
// The core defines what each service must do; infra/google_api implements
// them over REST, and tests substitute the mocks in core/testing.rs.

pub mod documents;
pub mod files;
pub mod remote_error;
pub mod scripts;
pub mod spreadsheets;

pub use documents::{DocumentEdit, DocumentService, DocumentTab, GoogleDocument};
pub use files::{
    escape_query_literal, Comment, DriveFile, FileQuery, FileStorageService, FileUpdate, NewFile,
    Reply, GOOGLE_DOC_MIME, GOOGLE_FOLDER_MIME, GOOGLE_SCRIPT_MIME, GOOGLE_SHEET_MIME,
};
pub use remote_error::RemoteError;
pub use scripts::{ScriptFile, ScriptFileType, ScriptProject, ScriptService};
pub use spreadsheets::{
    CellValue, SheetInfo, SpreadsheetInfo, SpreadsheetService, UpdateSummary, ValueInputOption,
    ValueRange,
};
