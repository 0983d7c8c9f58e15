use thiserror::Error;

/// Failure reported by one of the remote Google services.
///
/// This is the only error shape the service ports expose. The infra layer
/// parses Google's JSON error envelope into `Api` so raw response bodies
/// never travel further than the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The API answered with an error status.
    #[error("{message}")]
    Api {
        code: u16,
        status: Option<String>,
        message: String,
    },

    /// No usable response arrived (DNS, TLS, connection reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response arrived but did not have the expected shape.
    #[error("Unexpected response from Google API: {0}")]
    Decode(String),

    /// The session could not produce an access token for this call.
    #[error("Authorization failed: {0}")]
    Unauthorized(String),
}

impl RemoteError {
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        RemoteError::Api {
            code,
            status: None,
            message: message.into(),
        }
    }

    /// HTTP status for `Api` errors, `None` for everything else.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_display_only_the_remote_message() {
        let err = RemoteError::api(429, "Quota exceeded");
        assert_eq!(err.to_string(), "Quota exceeded");
        assert_eq!(err.status_code(), Some(429));
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err = RemoteError::Transport("connection reset".into());
        assert_eq!(err.status_code(), None);
        assert!(err.to_string().contains("connection reset"));
    }
}
