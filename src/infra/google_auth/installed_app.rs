// =============================================================================
// OAUTH FOR INSTALLED APPLICATIONS
// =============================================================================
//
// Used when no service account is configured. The user downloads an OAuth
// client ("Desktop app") from Google Cloud Console as `credentials.json`.
//
// First run:
//   1. Bind a loopback listener on 127.0.0.1 with an ephemeral port.
//   2. Print the consent URL (PKCE + state, offline access) to stderr.
//   3. Wait for Google to redirect the browser back to the listener.
//   4. Exchange the code for tokens and store the refresh token in `token.json`.
//
// Later runs build a session straight from `token.json` and only fall back
// to the browser if the stored refresh token stops working.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use rand::Rng;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::service_account::describe_token_error;
use super::token_cache::TokenCache;
use crate::core::session::{AuthError, CredentialProvider, CredentialSession};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

// =============================================================================
// CLIENT SECRETS AND TOKEN FILE
// =============================================================================

/// The OAuth client from `credentials.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Google wraps the client under `installed` or `web` depending on its type.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<OAuthClient>,
    web: Option<OAuthClient>,
}

impl OAuthClient {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| {
            AuthError::InvalidCredentials(format!("credentials file is not valid JSON: {}", e))
        })?;

        file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidCredentials(
                "credentials file must contain an \"installed\" or \"web\" client".to_string(),
            )
        })
    }

    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            AuthError::MissingCredentials(format!(
                "could not read OAuth client file {} ({}). Download it from Google Cloud Console \
                 (APIs & Services > Credentials > OAuth client ID > Desktop app).",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }
}

/// What `token.json` holds: enough to mint new access tokens without a browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type", default = "authorized_user_type")]
    pub kind: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub refresh_token: String,
}

fn authorized_user_type() -> String {
    "authorized_user".to_string()
}

/// JSON file holding the refresh token between runs.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `None` when nothing has been stored yet.
    pub async fn load(&self) -> Result<Option<AuthorizedUser>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let user = serde_json::from_str(&text).map_err(|e| {
            AuthError::Storage(format!("{} is not a valid token file: {}", self.path.display(), e))
        })?;
        Ok(Some(user))
    }

    pub async fn save(&self, user: &AuthorizedUser) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AuthError::Storage(e.to_string()))?;
            }
        }

        let text =
            serde_json::to_string_pretty(user).map_err(|e| AuthError::Storage(e.to_string()))?;
        fs::write(&self.path, text)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

// =============================================================================
// TOKEN ENDPOINT
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    refresh_token: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

async fn request_token(
    http: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenGrant, AuthError> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(describe_token_error(status, &text)));
    }

    response
        .json()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("unreadable token response: {}", e)))
}

// =============================================================================
// SESSION
// =============================================================================

/// A user session that renews access tokens from a stored refresh token.
pub struct RefreshingSession {
    client: OAuthClient,
    refresh_token: String,
    http: Client,
    cache: TokenCache,
}

impl RefreshingSession {
    pub fn new(client: OAuthClient, refresh_token: String, http: Client) -> Self {
        Self {
            client,
            refresh_token,
            http,
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl CredentialSession for RefreshingSession {
    async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cache.valid_token().await {
            return Ok(token);
        }

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
            ("client_id", self.client.client_id.as_str()),
        ];
        if let Some(secret) = &self.client.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let grant = request_token(&self.http, &self.client.token_uri, &form).await?;
        self.cache.store(&grant.access_token, grant.expires_in).await;
        tracing::debug!(expires_in = grant.expires_in, "Refreshed OAuth access token");
        Ok(grant.access_token)
    }

    fn principal(&self) -> String {
        format!("OAuth user of client {}", self.client.client_id)
    }
}

// =============================================================================
// LOOPBACK CONSENT FLOW
// =============================================================================

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        Self::from_verifier(random_string(64))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        Self {
            challenge: URL_SAFE_NO_PAD.encode(digest),
            verifier,
        }
    }
}

fn random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

pub fn consent_url(
    client: &OAuthClient,
    redirect_uri: &str,
    state: &str,
    pkce: &Pkce,
) -> Result<Url, AuthError> {
    let scope = super::scope_string();
    Url::parse_with_params(
        &client.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::InvalidCredentials(format!("invalid auth_uri: {}", e)))
}

/// Query parameters Google appends to the redirect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Read the OAuth parameters from a request target.
///
/// Returns `None` for requests that are not the OAuth redirect (a browser
/// asking for `/favicon.ico`, for instance).
pub fn parse_callback(uri: &Uri) -> Option<CallbackParams> {
    let params: CallbackParams = serde_urlencoded::from_str(uri.query().unwrap_or("")).ok()?;
    if params.code.is_none() && params.error.is_none() {
        return None;
    }
    Some(params)
}

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication complete</h1>\
<p>You can close this window and return to your terminal.</p></body></html>";

fn page(status: StatusCode, body: &str) -> Response<String> {
    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}

async fn handle_callback(
    req: Request<Incoming>,
    tx: mpsc::Sender<CallbackParams>,
) -> Result<Response<String>, Infallible> {
    if req.method() != Method::GET {
        return Ok(page(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }

    match parse_callback(req.uri()) {
        Some(params) => {
            let _ = tx.send(params).await;
            Ok(page(StatusCode::OK, SUCCESS_PAGE))
        }
        None => Ok(page(StatusCode::NOT_FOUND, "Not found")),
    }
}

/// Accept connections until the listener fails. Each connection is served
/// without keep-alive, so it closes after its response.
async fn accept_connections(listener: &TcpListener, tx: mpsc::Sender<CallbackParams>) -> AuthError {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                return AuthError::AuthorizationIncomplete(format!("loopback listener failed: {}", e))
            }
        };

        let io = TokioIo::new(stream);
        let tx = tx.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| handle_callback(req, tx.clone()));
            if let Err(e) = http1::Builder::new()
                .keep_alive(false)
                .serve_connection(io, service)
                .await
            {
                tracing::debug!(error = %e, "Loopback connection failed");
            }
        });
    }
}

/// Serve the loopback listener until the OAuth redirect arrives.
pub async fn wait_for_redirect(listener: &TcpListener) -> Result<CallbackParams, AuthError> {
    let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);

    tokio::select! {
        params = rx.recv() => params.ok_or_else(|| {
            AuthError::AuthorizationIncomplete("loopback listener stopped".to_string())
        }),
        err = accept_connections(listener, tx) => Err(err),
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

pub struct InstalledAppProvider {
    credentials_path: PathBuf,
    store: TokenStore,
    timeout: Duration,
    http: Client,
}

impl InstalledAppProvider {
    pub fn new(credentials_path: PathBuf, token_path: PathBuf, timeout: Duration) -> Self {
        Self {
            credentials_path,
            store: TokenStore::new(token_path),
            timeout,
            http: Client::new(),
        }
    }

    /// Session from `token.json`, if it exists and still works.
    async fn stored_session(&self, client: &OAuthClient) -> Option<RefreshingSession> {
        let user = match self.store.load().await {
            Ok(Some(user)) => user,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable token file");
                return None;
            }
        };

        let session = RefreshingSession::new(client.clone(), user.refresh_token, self.http.clone());
        match session.access_token().await {
            Ok(_) => Some(session),
            Err(err) => {
                tracing::warn!(error = %err, "Stored refresh token was rejected, re-authorizing");
                None
            }
        }
    }

    async fn authorize_interactively(&self, client: &OAuthClient) -> Result<TokenGrant, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.map_err(|e| {
            AuthError::AuthorizationIncomplete(format!("could not start loopback listener: {}", e))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::AuthorizationIncomplete(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let pkce = Pkce::generate();
        let state = random_string(32);
        let url = consent_url(client, &redirect_uri, &state, &pkce)?;

        // stdout carries the protocol, so the URL goes to the terminal via stderr.
        eprintln!("\nAuthorize this server by visiting this URL:\n\n{}\n", url);
        tracing::info!(port, "Waiting for OAuth redirect");

        let callback = tokio::time::timeout(self.timeout, wait_for_redirect(&listener))
            .await
            .map_err(|_| {
                AuthError::AuthorizationIncomplete(format!(
                    "no response from the browser within {} seconds",
                    self.timeout.as_secs()
                ))
            })??;

        if let Some(error) = callback.error {
            return Err(AuthError::AuthorizationIncomplete(format!(
                "consent was denied ({})",
                error
            )));
        }
        if callback.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::AuthorizationIncomplete(
                "state mismatch in OAuth redirect".to_string(),
            ));
        }
        let code = callback.code.ok_or_else(|| {
            AuthError::AuthorizationIncomplete("redirect carried no authorization code".to_string())
        })?;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
        ];
        if let Some(secret) = &client.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        request_token(&self.http, &client.token_uri, &form).await
    }
}

#[async_trait]
impl CredentialProvider for InstalledAppProvider {
    async fn acquire(&self) -> Result<Arc<dyn CredentialSession>, AuthError> {
        let client = OAuthClient::from_file(&self.credentials_path).await?;

        if let Some(session) = self.stored_session(&client).await {
            tracing::info!("Using stored OAuth token");
            return Ok(Arc::new(session));
        }

        let grant = self.authorize_interactively(&client).await?;
        let refresh_token = grant.refresh_token.clone().ok_or_else(|| {
            AuthError::AuthorizationIncomplete(
                "Google did not return a refresh token. Remove the app's access from your \
                 Google account and authorize again."
                    .to_string(),
            )
        })?;

        self.store
            .save(&AuthorizedUser {
                kind: authorized_user_type(),
                client_id: client.client_id.clone(),
                client_secret: client.client_secret.clone(),
                refresh_token: refresh_token.clone(),
            })
            .await?;
        tracing::info!("OAuth token stored");

        let session = RefreshingSession::new(client, refresh_token, self.http.clone());
        session.cache.store(&grant.access_token, grant.expires_in).await;
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    const INSTALLED: &str = r#"{
        "installed": {
            "client_id": "123.apps.googleusercontent.com",
            "client_secret": "shh",
            "redirect_uris": ["http://localhost"]
        }
    }"#;

    #[test]
    fn client_secrets_accept_installed_and_web_clients() {
        let installed = OAuthClient::from_json(INSTALLED).unwrap();
        assert_eq!(installed.client_id, "123.apps.googleusercontent.com");
        assert_eq!(installed.token_uri, DEFAULT_TOKEN_URI);

        let web = OAuthClient::from_json(r#"{ "web": { "client_id": "web-id" } }"#).unwrap();
        assert_eq!(web.client_id, "web-id");
        assert_eq!(web.client_secret, None);

        let err = OAuthClient::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[test]
    fn pkce_challenge_matches_the_rfc_example() {
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
        assert_eq!(Pkce::generate().verifier.len(), 64);
    }

    #[test]
    fn consent_url_requests_offline_access_with_pkce() {
        let client = OAuthClient::from_json(INSTALLED).unwrap();
        let pkce = Pkce::from_verifier("verifier".to_string());
        let url = consent_url(&client, "http://127.0.0.1:4242", "st4te", &pkce).unwrap();

        let params: std::collections::HashMap<String, String> =
            url.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["state"], "st4te");
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:4242");
        assert!(params["scope"].contains("script.projects"));
    }

    fn uri(target: &str) -> Uri {
        target.parse().unwrap()
    }

    #[test]
    fn callback_parsing_ignores_unrelated_requests() {
        let params = parse_callback(&uri("/?state=abc&code=4%2F0xyz&scope=a")).unwrap();
        assert_eq!(params.code.as_deref(), Some("4/0xyz"));
        assert_eq!(params.state.as_deref(), Some("abc"));

        let denied = parse_callback(&uri("/?error=access_denied&state=abc")).unwrap();
        assert_eq!(denied.error.as_deref(), Some("access_denied"));

        assert_eq!(parse_callback(&uri("/favicon.ico")), None);
        assert_eq!(parse_callback(&uri("/")), None);
    }

    async fn send(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn loopback_listener_waits_for_the_real_redirect() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let browser = tokio::spawn(async move {
            let favicon = send(
                addr,
                "GET /favicon.ico HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
            )
            .await;
            assert!(favicon.starts_with("HTTP/1.1 404"));

            let post = send(
                addr,
                "POST /?code=abc HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            )
            .await;
            assert!(post.starts_with("HTTP/1.1 405"));

            send(
                addr,
                "GET /?code=abc&state=xyz HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
            )
            .await
        });

        let params = wait_for_redirect(&listener).await.unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));

        let reply = browser.await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 200"));
        assert!(reply.contains("text/html"));
        assert!(reply.contains("Authentication complete"));
    }

    #[tokio::test]
    async fn token_store_round_trips_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let user = AuthorizedUser {
            kind: authorized_user_type(),
            client_id: "id".into(),
            client_secret: Some("secret".into()),
            refresh_token: "1//refresh".into(),
        };
        store.save(&user).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(user));

        let saved = std::fs::read_to_string(dir.path().join("nested").join("token.json")).unwrap();
        assert!(saved.contains("\"type\": \"authorized_user\""));
    }

    #[tokio::test]
    async fn missing_client_file_is_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let provider = InstalledAppProvider::new(
            dir.path().join("credentials.json"),
            dir.path().join("token.json"),
            Duration::from_secs(1),
        );
        let err = provider.acquire().await.err().unwrap();
        assert!(matches!(err, AuthError::MissingCredentials(_)));
    }
}
