use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::session::CredentialProvider;

use super::installed_app::InstalledAppProvider;
use super::service_account::ServiceAccountProvider;

const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_TOKEN_PATH: &str = "token.json";
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;

/// Where a service account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    File(PathBuf),
    Json(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// `GOOGLE_SERVICE_ACCOUNT_KEY` / `GOOGLE_SERVICE_ACCOUNT_JSON` is set.
    ServiceAccount {
        key: KeySource,
        subject: Option<String>,
    },
    /// Interactive OAuth for a desktop client, with a cached refresh token.
    InstalledApp {
        credentials_path: PathBuf,
        token_path: PathBuf,
    },
}

/// Authentication settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub timeout: Duration,
}

impl AuthConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let key = var("GOOGLE_SERVICE_ACCOUNT_KEY")
            .map(|path| KeySource::File(PathBuf::from(path)))
            .or_else(|| var("GOOGLE_SERVICE_ACCOUNT_JSON").map(KeySource::Json));

        let mode = match key {
            Some(key) => AuthMode::ServiceAccount {
                key,
                subject: var("GOOGLE_IMPERSONATE_USER"),
            },
            None => AuthMode::InstalledApp {
                credentials_path: PathBuf::from(
                    var("GOOGLE_CREDENTIALS_PATH")
                        .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string()),
                ),
                token_path: PathBuf::from(
                    var("GOOGLE_TOKEN_PATH").unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
                ),
            },
        };

        let timeout_secs = var("GOOGLE_AUTH_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_AUTH_TIMEOUT_SECS);

        Self {
            mode,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// One-line summary for the startup log. Never includes key material.
    pub fn describe(&self) -> String {
        match &self.mode {
            AuthMode::ServiceAccount { key, subject } => {
                let source = match key {
                    KeySource::File(path) => path.display().to_string(),
                    KeySource::Json(_) => "inline JSON".to_string(),
                };
                match subject {
                    Some(subject) => format!("service account ({}) impersonating {}", source, subject),
                    None => format!("service account ({})", source),
                }
            }
            AuthMode::InstalledApp {
                credentials_path,
                token_path,
            } => format!(
                "OAuth client {} with token cache {}",
                credentials_path.display(),
                token_path.display()
            ),
        }
    }

    pub fn into_provider(self) -> Arc<dyn CredentialProvider> {
        match self.mode {
            AuthMode::ServiceAccount { key, subject } => {
                Arc::new(ServiceAccountProvider::new(key, subject))
            }
            AuthMode::InstalledApp {
                credentials_path,
                token_path,
            } => Arc::new(InstalledAppProvider::new(
                credentials_path,
                token_path,
                self.timeout,
            )),
        }
    }
}
