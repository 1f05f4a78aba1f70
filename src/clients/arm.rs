//! Azure Resource Manager client.
//!
//! Only the subscription listing is implemented. Pages are fetched lazily
//! and follow `nextLink` until the server stops returning one.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

use super::paging::Pager;
use crate::auth::helpers::format_scope;
use crate::auth::TokenCredential;
use crate::error::UpstreamError;

/// API version for subscription operations.
pub const API_VERSION_SUBSCRIPTIONS: &str = "2022-12-01";

/// Longest slice of an unrecognized error body kept in the error message.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Wire types
// =============================================================================

/// Subscription lifecycle state as reported by ARM.
///
/// Unrecognized values are kept verbatim so new states display as sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum SubscriptionState {
    Enabled,
    Warned,
    PastDue,
    Disabled,
    Deleted,
    Other(String),
}

impl From<String> for SubscriptionState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Enabled" => Self::Enabled,
            "Warned" => Self::Warned,
            "PastDue" => Self::PastDue,
            "Disabled" => Self::Disabled,
            "Deleted" => Self::Deleted,
            _ => Self::Other(value),
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("Enabled"),
            Self::Warned => f.write_str("Warned"),
            Self::PastDue => f.write_str("PastDue"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Deleted => f.write_str("Deleted"),
            Self::Other(value) => f.write_str(value),
        }
    }
}

/// Subscription object from `GET /subscriptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub state: Option<SubscriptionState>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// One page of an ARM list response
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    value: Option<Vec<T>>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Anything that can open a fresh subscription enumeration
pub trait SubscriptionLister: Send + Sync {
    /// Start a new enumeration from the first page
    fn list_subscriptions(&self) -> Box<dyn Pager<Item = SubscriptionData> + '_>;
}

/// Azure Resource Manager client sharing the process-wide credential.
pub struct ArmClient {
    endpoint: Url,
    credential: Arc<dyn TokenCredential>,
    http: reqwest::Client,
}

impl ArmClient {
    pub fn new(endpoint: Url, credential: Arc<dyn TokenCredential>, http: reqwest::Client) -> Self {
        Self {
            endpoint,
            credential,
            http,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Token scope for this ARM endpoint, e.g. `https://management.azure.com/.default`
    pub fn scope(&self) -> String {
        format_scope(self.endpoint.as_str())
    }

    /// Lazily enumerate subscriptions visible to the credential
    pub fn subscription_pages(&self) -> SubscriptionPages<'_> {
        SubscriptionPages {
            client: self,
            cursor: Cursor::Start,
        }
    }

    fn subscriptions_url(&self) -> Result<Url, UpstreamError> {
        let url = format!(
            "{}/subscriptions?api-version={}",
            self.endpoint.as_str().trim_end_matches('/'),
            API_VERSION_SUBSCRIPTIONS
        );
        Url::parse(&url).map_err(|e| UpstreamError::Malformed {
            url,
            message: e.to_string(),
        })
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>, UpstreamError> {
        let token = self.credential.get_token(&self.scope()).await?;

        tracing::debug!(url = %url, "Fetching resource manager page");

        let network_error = |source| UpstreamError::Network {
            url: url.to_string(),
            source,
        };

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(token.secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            let (code, message) = parse_error_body(&body).unwrap_or_else(|| {
                (
                    status.canonical_reason().unwrap_or("Unknown").to_string(),
                    truncate(&body, MAX_ERROR_BODY),
                )
            });
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                code = %code,
                "Resource manager request failed"
            );
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                code,
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl SubscriptionLister for ArmClient {
    fn list_subscriptions(&self) -> Box<dyn Pager<Item = SubscriptionData> + '_> {
        Box::new(self.subscription_pages())
    }
}

fn parse_error_body(body: &str) -> Option<(String, String)> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    Some((
        envelope.error.code.unwrap_or_else(|| "Unknown".to_string()),
        envelope.error.message.unwrap_or_default(),
    ))
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

// =============================================================================
// Pager
// =============================================================================

enum Cursor {
    Start,
    Next(Url),
    Done,
}

/// Lazy sequence of subscription pages
pub struct SubscriptionPages<'a> {
    client: &'a ArmClient,
    cursor: Cursor,
}

#[async_trait]
impl<'a> Pager for SubscriptionPages<'a> {
    type Item = SubscriptionData;

    async fn next_page(&mut self) -> Result<Option<Vec<SubscriptionData>>, UpstreamError> {
        // Leave the cursor exhausted unless this page yields a next link
        let url = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return Ok(None),
            Cursor::Start => self.client.subscriptions_url()?,
            Cursor::Next(url) => url,
        };

        let page: Page<SubscriptionData> = self.client.get_page(&url).await?;

        if let Some(link) = page.next_link.filter(|l| !l.trim().is_empty()) {
            let next = Url::parse(&link).map_err(|e| UpstreamError::Malformed {
                url: url.to_string(),
                message: format!("invalid nextLink {}: {}", link, e),
            })?;
            // The bearer token must never leave the configured ARM endpoint
            if next.origin() != self.client.endpoint.origin() {
                tracing::warn!(next_link = %next, "Refusing nextLink outside the ARM endpoint");
                return Err(UpstreamError::Malformed {
                    url: url.to_string(),
                    message: format!("nextLink {} is outside {}", next, self.client.endpoint),
                });
            }
            self.cursor = Cursor::Next(next);
        }

        let items = page.value.unwrap_or_default();
        tracing::debug!(count = items.len(), "Received subscription page");
        Ok(Some(items))
    }
}
