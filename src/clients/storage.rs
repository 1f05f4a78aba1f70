//! Data-plane clients registered at startup alongside ARM.
//!
//! These hold the endpoint and shared credential and know how to authorize
//! a request. The app itself issues no data-plane calls.

use std::sync::Arc;
use url::Url;

use crate::auth::helpers::format_scope;
use crate::auth::TokenCredential;
use crate::error::CredentialError;

/// Entra ID scope for Azure Storage, independent of the account
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// First DNS label of an account endpoint (`https://acct.blob.core.windows.net` → `acct`)
fn account_name(endpoint: &Url) -> Option<&str> {
    endpoint
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
}

/// Blob service client
pub struct BlobServiceClient {
    endpoint: Url,
    credential: Arc<dyn TokenCredential>,
}

impl BlobServiceClient {
    pub fn new(endpoint: Url, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            endpoint,
            credential,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn scope(&self) -> &'static str {
        STORAGE_SCOPE
    }

    pub fn account_name(&self) -> Option<&str> {
        account_name(&self.endpoint)
    }

    /// `Authorization` header value for a blob request
    pub async fn authorization_header(&self) -> Result<String, CredentialError> {
        let token = self.credential.get_token(STORAGE_SCOPE).await?;
        Ok(format!("Bearer {}", token.secret()))
    }
}

/// Cosmos DB NoSQL account client
pub struct CosmosClient {
    endpoint: Url,
    credential: Arc<dyn TokenCredential>,
}

impl CosmosClient {
    pub fn new(endpoint: Url, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            endpoint,
            credential,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Scope is the account origin, e.g. `https://acct.documents.azure.com/.default`
    pub fn scope(&self) -> String {
        format_scope(&self.endpoint.origin().ascii_serialization())
    }

    pub fn account_name(&self) -> Option<&str> {
        account_name(&self.endpoint)
    }

    /// `Authorization` header value for a Cosmos request.
    ///
    /// Cosmos expects the AAD token wrapped as `type=aad&ver=1.0&sig=<token>`,
    /// URL-encoded as a whole.
    pub async fn authorization_header(&self) -> Result<String, CredentialError> {
        let token = self.credential.get_token(&self.scope()).await?;
        let raw = format!("type=aad&ver=1.0&sig={}", token.secret());
        Ok(urlencoding::encode(&raw).into_owned())
    }
}
