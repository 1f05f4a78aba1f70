use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::credential::AccessToken;
use crate::error::CredentialError;

/// Tokens are refreshed this long before they expire.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Per-scope access token cache shared by every client using a credential.
pub struct TokenCache {
    tokens: RwLock<HashMap<String, AccessToken>>,
    /// One refresh guard per scope; held across `fetch`, never the token map lock
    refreshing: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    refresh_margin: Duration,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_MARGIN)
    }
}

impl TokenCache {
    pub fn new(refresh_margin: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            refreshing: Mutex::new(HashMap::new()),
            refresh_margin,
        }
    }

    /// Return the cached token for `scope`, or call `fetch` and cache its result.
    ///
    /// Concurrent callers that miss the same scope wait on that scope's guard,
    /// and only the first one fetches. Reads of other scopes are not blocked
    /// while a fetch is in flight.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        scope: &str,
        fetch: F,
    ) -> Result<AccessToken, CredentialError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AccessToken, CredentialError>>,
    {
        if let Some(token) = self.cached(scope).await {
            return Ok(token);
        }

        let guard = self.refresh_guard(scope).await;
        let _refreshing = guard.lock().await;

        // Another task may have refreshed while we waited for the guard
        if let Some(token) = self.cached(scope).await {
            return Ok(token);
        }

        let token = fetch().await?;
        tracing::debug!(scope = %scope, "Cached new access token");
        self.tokens
            .write()
            .await
            .insert(scope.to_string(), token.clone());
        Ok(token)
    }

    /// True when no token has been cached yet
    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }

    async fn cached(&self, scope: &str) -> Option<AccessToken> {
        self.tokens
            .read()
            .await
            .get(scope)
            .filter(|t| !t.expires_within(self.refresh_margin))
            .cloned()
    }

    async fn refresh_guard(&self, scope: &str) -> Arc<Mutex<()>> {
        let mut refreshing = self.refreshing.lock().await;
        Arc::clone(refreshing.entry(scope.to_string()).or_default())
    }
}
