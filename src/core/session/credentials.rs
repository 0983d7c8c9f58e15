use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while obtaining or renewing credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// The interactive consent step timed out, was denied, or was tampered with.
    #[error("Authorization was not completed: {0}")]
    AuthorizationIncomplete(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

/// An authenticated capability that can authorize outbound API calls.
///
/// Implementations cache and renew their own access tokens; callers just ask
/// for a token before every request.
#[async_trait]
pub trait CredentialSession: Send + Sync {
    /// A bearer token that is valid for at least the next minute.
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Who the session acts as. Only used for logs and introspection.
    fn principal(&self) -> String;
}

/// Produces credentialed sessions. May block on interactive consent the
/// first time it runs; later runs reuse persisted credential material.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn CredentialSession>, AuthError>;
}
