use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// Tokens closer than this to expiry are treated as already expired.
const REFRESH_MARGIN_SECS: i64 = 60;

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Holds the current access token for one session.
#[derive(Default)]
pub struct TokenCache {
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// The cached token if it is still good for at least another minute.
    pub async fn valid_token(&self) -> Option<String> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|t| t.expires_at > Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS))
            .map(|t| t.token.clone())
    }

    pub async fn store(&self, token: &str, expires_in_secs: i64) {
        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: token.to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        });
    }

    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_tokens_are_returned() {
        let cache = TokenCache::default();
        assert_eq!(cache.valid_token().await, None);

        cache.store("ya29.fresh", 3600).await;
        assert_eq!(cache.valid_token().await.as_deref(), Some("ya29.fresh"));
    }

    #[tokio::test]
    async fn tokens_inside_the_refresh_margin_are_stale() {
        let cache = TokenCache::default();
        cache.store("ya29.stale", 30).await;
        assert_eq!(cache.valid_token().await, None);

        cache.store("ya29.new", 3600).await;
        cache.clear().await;
        assert_eq!(cache.valid_token().await, None);
    }
}
