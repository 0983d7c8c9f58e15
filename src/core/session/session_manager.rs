// The session manager owns the process-wide Google session and the service
// handles derived from it. It is created once in main.rs and shared by
// reference, so tests can build a fresh one per test.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::credentials::{AuthError, CredentialProvider, CredentialSession};
use super::service_set::{ServiceClientSet, ServiceFactory, ServiceHandle, ServiceKind};
use crate::core::workspace::{DocumentService, FileStorageService, ScriptService, SpreadsheetService};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The credential provider could not produce a session. State has been
    /// cleared so the next call starts a fresh attempt.
    #[error("Google client initialization failed: {0}")]
    Initialization(#[source] AuthError),

    #[error("Google {0} client is not initialized. Authentication might have failed.")]
    ClientNotInitialized(ServiceKind),
}

/// What the manager currently holds. Only ever mutated under the write lock.
#[derive(Default)]
struct SessionState {
    session: Option<Arc<dyn CredentialSession>>,
    documents: Option<Arc<dyn DocumentService>>,
    spreadsheets: Option<Arc<dyn SpreadsheetService>>,
    files: Option<Arc<dyn FileStorageService>>,
    scripts: Option<Arc<dyn ScriptService>>,
}

impl SessionState {
    fn clear(&mut self) {
        *self = SessionState::default();
    }

    /// The full set, or `None` while anything is missing.
    fn populated(&self) -> Option<ServiceClientSet> {
        Some(ServiceClientSet {
            session: Arc::clone(self.session.as_ref()?),
            documents: Arc::clone(self.documents.as_ref()?),
            spreadsheets: Arc::clone(self.spreadsheets.as_ref()?),
            files: Arc::clone(self.files.as_ref()?),
            scripts: Arc::clone(self.scripts.as_ref()?),
        })
    }

    /// Like `populated`, but names the first missing handle.
    fn assemble(&self) -> Result<ServiceClientSet, SessionError> {
        let missing = |kind| SessionError::ClientNotInitialized(kind);
        let session = self
            .session
            .as_ref()
            .ok_or(SessionError::Initialization(AuthError::MissingCredentials(
                "no active session".to_string(),
            )))?;

        Ok(ServiceClientSet {
            session: Arc::clone(session),
            documents: Arc::clone(
                self.documents
                    .as_ref()
                    .ok_or_else(|| missing(ServiceKind::Documents))?,
            ),
            spreadsheets: Arc::clone(
                self.spreadsheets
                    .as_ref()
                    .ok_or_else(|| missing(ServiceKind::Spreadsheets))?,
            ),
            files: Arc::clone(self.files.as_ref().ok_or_else(|| missing(ServiceKind::Files))?),
            scripts: Arc::clone(
                self.scripts
                    .as_ref()
                    .ok_or_else(|| missing(ServiceKind::Scripts))?,
            ),
        })
    }
}

/// Lazy, shared, single-flight owner of the Google session.
///
/// The first caller that finds no session takes the `acquiring` lock and runs
/// the credential provider. Concurrent first callers queue on that lock and
/// pick up the result instead of starting their own acquisition. `state` is
/// only locked for reads and stores, never across `acquire`, so
/// `current_session` and `reset` stay responsive during a slow consent flow.
pub struct SessionManager {
    provider: Arc<dyn CredentialProvider>,
    factory: Arc<dyn ServiceFactory>,
    state: RwLock<SessionState>,
    acquiring: Mutex<()>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn CredentialProvider>, factory: Arc<dyn ServiceFactory>) -> Self {
        Self {
            provider,
            factory,
            state: RwLock::new(SessionState::default()),
            acquiring: Mutex::new(()),
        }
    }

    /// The current session, if any. Never triggers acquisition.
    pub async fn current_session(&self) -> Option<Arc<dyn CredentialSession>> {
        self.state.read().await.session.clone()
    }

    /// Ensure a session exists and return the full set of handles.
    pub async fn client_set(&self) -> Result<ServiceClientSet, SessionError> {
        // Fast path: every handle is already there.
        if let Some(set) = self.state.read().await.populated() {
            return Ok(set);
        }

        let _acquiring = self.acquiring.lock().await;

        {
            let mut state = self.state.write().await;

            // Someone else may have finished initializing while we waited.
            if let Some(set) = state.populated() {
                return Ok(set);
            }
            if let Some(session) = state.session.clone() {
                self.repair_missing(&mut state, &session);
                return state.assemble();
            }
        }

        tracing::info!("Authorizing Google API client...");
        let acquired = self.provider.acquire().await;

        let mut state = self.state.write().await;
        match acquired {
            Ok(session) => {
                self.derive_all(&mut state, Arc::clone(&session));
                tracing::info!(
                    principal = %session.principal(),
                    "Google API client authorized (Docs, Sheets, Drive, Apps Script)"
                );
                state.assemble()
            }
            Err(err) => {
                state.clear();
                tracing::error!(error = %err, "Failed to initialize Google API client");
                Err(SessionError::Initialization(err))
            }
        }
    }

    /// The handle for one service, initializing first if needed.
    pub async fn service(&self, kind: ServiceKind) -> Result<ServiceHandle, SessionError> {
        Ok(self.client_set().await?.handle(kind))
    }

    pub async fn documents(&self) -> Result<Arc<dyn DocumentService>, SessionError> {
        Ok(self.client_set().await?.documents)
    }

    pub async fn spreadsheets(&self) -> Result<Arc<dyn SpreadsheetService>, SessionError> {
        Ok(self.client_set().await?.spreadsheets)
    }

    pub async fn files(&self) -> Result<Arc<dyn FileStorageService>, SessionError> {
        Ok(self.client_set().await?.files)
    }

    pub async fn scripts(&self) -> Result<Arc<dyn ScriptService>, SessionError> {
        Ok(self.client_set().await?.scripts)
    }

    /// Drop the session and every handle. The next call re-acquires.
    pub async fn reset(&self) {
        self.state.write().await.clear();
        tracing::info!("Google API session reset");
    }

    fn derive_all(&self, state: &mut SessionState, session: Arc<dyn CredentialSession>) {
        *state = SessionState {
            documents: Some(self.factory.documents(Arc::clone(&session))),
            spreadsheets: Some(self.factory.spreadsheets(Arc::clone(&session))),
            files: Some(self.factory.files(Arc::clone(&session))),
            scripts: Some(self.factory.scripts(Arc::clone(&session))),
            session: Some(session),
        };
    }

    /// Re-derive handles that went missing without touching the session.
    fn repair_missing(&self, state: &mut SessionState, session: &Arc<dyn CredentialSession>) {
        if state.documents.is_none() {
            tracing::warn!("Re-deriving missing Docs client");
            state.documents = Some(self.factory.documents(Arc::clone(session)));
        }
        if state.spreadsheets.is_none() {
            tracing::warn!("Re-deriving missing Sheets client");
            state.spreadsheets = Some(self.factory.spreadsheets(Arc::clone(session)));
        }
        if state.files.is_none() {
            tracing::warn!("Re-deriving missing Drive client");
            state.files = Some(self.factory.files(Arc::clone(session)));
        }
        if state.scripts.is_none() {
            tracing::warn!("Re-deriving missing Apps Script client");
            state.scripts = Some(self.factory.scripts(Arc::clone(session)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{CountingProvider, MockWorkspace};
    use std::time::Duration;

    fn manager(provider: &Arc<CountingProvider>, workspace: &Arc<MockWorkspace>) -> SessionManager {
        SessionManager::new(provider.clone(), workspace.clone())
    }

    #[tokio::test]
    async fn current_session_never_forces_acquisition() {
        let provider = Arc::new(CountingProvider::new());
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        assert!(sessions.current_session().await.is_none());
        assert_eq!(provider.attempts(), 0);
    }

    #[tokio::test]
    async fn repeated_access_reuses_the_same_session() {
        let provider = Arc::new(CountingProvider::new());
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        let first = sessions.client_set().await.unwrap();
        let second = sessions.client_set().await.unwrap();
        let scripts = sessions.scripts().await.unwrap();

        assert_eq!(provider.attempts(), 1);
        assert!(Arc::ptr_eq(&first.session, &second.session));
        assert!(Arc::ptr_eq(&first.scripts, &scripts));
        assert_eq!(workspace.derivations(), 4);

        let current = sessions.current_session().await.unwrap();
        assert!(Arc::ptr_eq(&current, &first.session));
    }

    #[tokio::test]
    async fn failed_acquisition_clears_state_and_allows_retry() {
        let provider = Arc::new(CountingProvider::failing(1));
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        let err = sessions.documents().await.err().unwrap();
        assert!(matches!(err, SessionError::Initialization(_)));
        assert!(err.to_string().contains("initialization failed"));
        assert!(sessions.current_session().await.is_none());

        let set = sessions.client_set().await.unwrap();
        assert_eq!(provider.attempts(), 2);
        assert_eq!(set.session.principal(), "user-2");
        assert!(sessions.current_session().await.is_some());
    }

    #[tokio::test]
    async fn concurrent_first_use_acquires_once() {
        let provider = Arc::new(CountingProvider::new().with_delay(Duration::from_millis(20)));
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        let (a, b, c) = tokio::join!(
            sessions.documents(),
            sessions.files(),
            sessions.client_set()
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(provider.attempts(), 1);
    }

    #[tokio::test]
    async fn missing_handles_are_rederived_from_the_existing_session() {
        let provider = Arc::new(CountingProvider::new());
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        let before = sessions.client_set().await.unwrap();
        sessions.state.write().await.spreadsheets = None;

        let after = sessions.client_set().await.unwrap();
        assert_eq!(provider.attempts(), 1);
        assert_eq!(workspace.derivations(), 5);
        assert!(Arc::ptr_eq(&before.session, &after.session));
    }

    #[tokio::test]
    async fn service_returns_the_requested_kind() {
        let provider = Arc::new(CountingProvider::new());
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        for kind in ServiceKind::ALL {
            assert_eq!(sessions.service(kind).await.unwrap().kind(), kind);
        }
        assert_eq!(provider.attempts(), 1);
    }

    #[tokio::test]
    async fn reset_forces_a_new_session() {
        let provider = Arc::new(CountingProvider::new());
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = manager(&provider, &workspace);

        let first = sessions.client_set().await.unwrap();
        sessions.reset().await;
        assert!(sessions.current_session().await.is_none());

        let second = sessions.client_set().await.unwrap();
        assert_eq!(provider.attempts(), 2);
        assert!(!Arc::ptr_eq(&first.session, &second.session));
    }

    #[tokio::test]
    async fn slow_acquisition_does_not_block_readers() {
        let provider = Arc::new(CountingProvider::new().with_delay(Duration::from_millis(500)));
        let workspace = Arc::new(MockWorkspace::new());
        let sessions = Arc::new(manager(&provider, &workspace));

        let pending = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            async move { sessions.client_set().await.map(|set| set.session.principal()) }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let current = tokio::time::timeout(Duration::from_millis(100), sessions.current_session())
            .await
            .expect("current_session waited on the acquisition");
        assert!(current.is_none());
        tokio::time::timeout(Duration::from_millis(100), sessions.reset())
            .await
            .expect("reset waited on the acquisition");

        assert_eq!(pending.await.unwrap().unwrap(), "user-1");
        assert_eq!(provider.attempts(), 1);
        assert!(sessions.current_session().await.is_some());
    }

    #[test]
    fn client_not_initialized_names_the_service() {
        let err = SessionError::ClientNotInitialized(ServiceKind::Scripts);
        assert_eq!(
            err.to_string(),
            "Google Apps Script client is not initialized. Authentication might have failed."
        );
    }
}
