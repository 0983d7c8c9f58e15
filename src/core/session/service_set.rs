use std::fmt;
use std::sync::Arc;

use super::credentials::CredentialSession;
use crate::core::workspace::{DocumentService, FileStorageService, ScriptService, SpreadsheetService};

/// The four remote services a session can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Documents,
    Spreadsheets,
    Files,
    Scripts,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Documents,
        ServiceKind::Spreadsheets,
        ServiceKind::Files,
        ServiceKind::Scripts,
    ];
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceKind::Documents => "Docs",
            ServiceKind::Spreadsheets => "Sheets",
            ServiceKind::Files => "Drive",
            ServiceKind::Scripts => "Apps Script",
        };
        f.write_str(name)
    }
}

/// A fully populated set of service handles, all bound to `session`.
#[derive(Clone)]
pub struct ServiceClientSet {
    pub session: Arc<dyn CredentialSession>,
    pub documents: Arc<dyn DocumentService>,
    pub spreadsheets: Arc<dyn SpreadsheetService>,
    pub files: Arc<dyn FileStorageService>,
    pub scripts: Arc<dyn ScriptService>,
}

impl ServiceClientSet {
    pub fn handle(&self, kind: ServiceKind) -> ServiceHandle {
        match kind {
            ServiceKind::Documents => ServiceHandle::Documents(Arc::clone(&self.documents)),
            ServiceKind::Spreadsheets => ServiceHandle::Spreadsheets(Arc::clone(&self.spreadsheets)),
            ServiceKind::Files => ServiceHandle::Files(Arc::clone(&self.files)),
            ServiceKind::Scripts => ServiceHandle::Scripts(Arc::clone(&self.scripts)),
        }
    }
}

/// One handle picked out of a set by `ServiceKind`.
#[derive(Clone)]
pub enum ServiceHandle {
    Documents(Arc<dyn DocumentService>),
    Spreadsheets(Arc<dyn SpreadsheetService>),
    Files(Arc<dyn FileStorageService>),
    Scripts(Arc<dyn ScriptService>),
}

impl ServiceHandle {
    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceHandle::Documents(_) => ServiceKind::Documents,
            ServiceHandle::Spreadsheets(_) => ServiceKind::Spreadsheets,
            ServiceHandle::Files(_) => ServiceKind::Files,
            ServiceHandle::Scripts(_) => ServiceKind::Scripts,
        }
    }
}

/// Builds service handles bound to a session. Deriving a handle is cheap and
/// cannot fail; only acquiring the session can.
pub trait ServiceFactory: Send + Sync {
    fn documents(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn DocumentService>;
    fn spreadsheets(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn SpreadsheetService>;
    fn files(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn FileStorageService>;
    fn scripts(&self, session: Arc<dyn CredentialSession>) -> Arc<dyn ScriptService>;
}
