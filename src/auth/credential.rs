use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::error::CredentialError;

/// Bearer token issued by Entra ID for a single scope.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_on: SystemTime,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[redacted]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: SystemTime) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Raw token value, for the Authorization header only. Never log it.
    pub fn secret(&self) -> &str {
        &self.token
    }

    pub fn expires_on(&self) -> SystemTime {
        self.expires_on
    }

    /// True if the token expires before `now + margin`.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_on <= SystemTime::now() + margin
    }
}

/// A source of access tokens.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used in logs and chain diagnostics.
    fn name(&self) -> &'static str;

    /// Acquire a token for `scope` (e.g. `https://management.azure.com/.default`).
    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError>;
}

#[async_trait]
impl<T: TokenCredential + ?Sized> TokenCredential for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        (**self).get_token(scope).await
    }
}
