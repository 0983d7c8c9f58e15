use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::session::CredentialSession;
use crate::core::workspace::RemoteError;

/// Thin authenticated wrapper shared by every Google REST adapter.
///
/// Each request asks the session for a bearer token first, so token renewal
/// stays entirely inside the credential layer. Error bodies are parsed here
/// and nowhere else.
#[derive(Clone)]
pub struct GoogleApiClient {
    http: Client,
    session: Arc<dyn CredentialSession>,
}

impl GoogleApiClient {
    pub fn new(http: Client, session: Arc<dyn CredentialSession>) -> Self {
        Self { http, session }
    }

    /// Parse a base URL and append path segments, percent-encoding each one.
    pub fn url(base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = Url::parse(base).map_err(|e| RemoteError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| RemoteError::Transport(format!("{} cannot be a base URL", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let token = self
            .session
            .access_token()
            .await
            .map_err(|e| RemoteError::Unauthorized(e.to_string()))?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send and decode a JSON response body.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = Self::checked(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// Send a request whose success response carries no body we need.
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        Self::checked(request).await.map(|_| ())
    }

    async fn checked(request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = parse_error(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), error = %err, "Google API request failed");
        Err(err)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<u16>,
    message: Option<String>,
    status: Option<String>,
}

/// Turn a non-success response into a `RemoteError::Api`.
///
/// Google APIs answer with `{"error": {"code", "message", "status"}}`. Anything
/// else (an HTML error page from a proxy, an empty body) keeps the HTTP status
/// and a short excerpt.
pub fn parse_error(http_status: u16, body: &str) -> RemoteError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => RemoteError::Api {
            code: envelope.error.code.unwrap_or(http_status),
            message: envelope
                .error
                .message
                .unwrap_or_else(|| format!("Request failed with status {}", http_status)),
            status: envelope.error.status,
        },
        Err(_) => {
            let excerpt: String = body.trim().chars().take(200).collect();
            let message = if excerpt.is_empty() {
                format!("Request failed with status {}", http_status)
            } else {
                format!("Request failed with status {}: {}", http_status, excerpt)
            };
            RemoteError::api(http_status, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_error_envelopes_keep_code_status_and_message() {
        let err = parse_error(
            429,
            r#"{"error":{"code":429,"message":"Quota exceeded for quota metric","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert_eq!(
            err,
            RemoteError::Api {
                code: 429,
                status: Some("RESOURCE_EXHAUSTED".into()),
                message: "Quota exceeded for quota metric".into(),
            }
        );
        assert_eq!(err.to_string(), "Quota exceeded for quota metric");
    }

    #[test]
    fn non_json_bodies_fall_back_to_the_http_status() {
        let err = parse_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("<html>Bad Gateway</html>"));

        assert_eq!(
            parse_error(404, "").to_string(),
            "Request failed with status 404"
        );
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let url = GoogleApiClient::url(
            "https://sheets.googleapis.com/v4/spreadsheets",
            &["abc", "values", "Sheet 1!A1:B2"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Sheet%201!A1:B2"
        );
    }
}
