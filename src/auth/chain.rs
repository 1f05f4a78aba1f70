use async_trait::async_trait;
use std::sync::OnceLock;

use super::cache::TokenCache;
use super::credential::{AccessToken, TokenCredential};
use super::helpers::{build_probe_client, create_http_client};
use super::sources::{
    AzureCliCredential, EnvironmentCredential, ManagedIdentityCredential,
    ManagedIdentityEndpoint, WorkloadIdentityCredential,
};
use crate::config::IdentityConfig;
use crate::error::CredentialError;

/// IMDS probe timeouts, in milliseconds
const IMDS_CONNECT_TIMEOUT_MS: u64 = 1_000;
const IMDS_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Ordered fallback chain of credential sources.
///
/// Sources are tried in order until one issues a token. That source is then
/// used for every later request. Sources that are `Unavailable` are skipped;
/// a source that fails authentication ends the attempt. Tokens are cached per
/// scope and shared by every client holding this credential.
pub struct DefaultAzureCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    selected: OnceLock<usize>,
    cache: TokenCache,
}

impl DefaultAzureCredential {
    pub const NAME: &'static str = "DefaultAzureCredential";

    /// Build the standard chain: environment, workload identity, managed
    /// identity, Azure CLI.
    pub fn from_config(
        identity: &IdentityConfig,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let http = create_http_client(connect_timeout_secs, request_timeout_secs)?;
        let authority_host = identity.authority_host.as_str().trim_end_matches('/').to_string();

        let managed_identity_endpoint =
            match (&identity.identity_endpoint, &identity.identity_header) {
                (Some(endpoint), Some(header)) => ManagedIdentityEndpoint::AppService {
                    endpoint: endpoint.clone(),
                    header: header.clone(),
                },
                _ => ManagedIdentityEndpoint::Imds {
                    endpoint: identity.imds_endpoint.clone(),
                },
            };

        let sources: Vec<Box<dyn TokenCredential>> = vec![
            Box::new(EnvironmentCredential::new(
                identity.tenant_id.clone(),
                identity.client_id.clone(),
                identity.client_secret.clone(),
                authority_host.clone(),
                http.clone(),
            )),
            Box::new(WorkloadIdentityCredential::new(
                identity.tenant_id.clone(),
                identity.client_id.clone(),
                identity.federated_token_file.clone(),
                authority_host,
                http,
            )),
            Box::new(ManagedIdentityCredential::new(
                identity.managed_identity_client_id.clone(),
                managed_identity_endpoint,
                build_probe_client(IMDS_CONNECT_TIMEOUT_MS, IMDS_REQUEST_TIMEOUT_MS)?,
            )),
            Box::new(AzureCliCredential::new(identity.tenant_id.clone())),
        ];

        tracing::info!(
            managed_identity_client_id = ?identity.managed_identity_client_id,
            sources = ?sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "Credential chain configured"
        );

        Ok(Self::from_sources(sources))
    }

    /// Build a chain from explicit sources, tried in the given order
    pub fn from_sources(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            selected: OnceLock::new(),
            cache: TokenCache::default(),
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Name of the source that issued the first token, if any has yet
    pub fn selected_source(&self) -> Option<&'static str> {
        self.selected
            .get()
            .and_then(|&index| self.sources.get(index))
            .map(|s| s.name())
    }

    async fn resolve(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        if let Some(source) = self.selected.get().and_then(|&i| self.sources.get(i)) {
            return source.get_token(scope).await;
        }

        let mut attempts = Vec::with_capacity(self.sources.len());

        for (index, source) in self.sources.iter().enumerate() {
            match source.get_token(scope).await {
                Ok(token) => {
                    if self.selected.set(index).is_ok() {
                        tracing::info!(source = source.name(), "Credential chain resolved");
                    }
                    return Ok(token);
                }
                Err(error) if error.is_unavailable() => {
                    tracing::debug!(source = source.name(), error = %error, "Credential source unavailable");
                    attempts.push(error.to_string());
                }
                Err(error) => {
                    tracing::warn!(source = source.name(), error = %error, "Credential source failed");
                    return Err(error);
                }
            }
        }

        Err(CredentialError::ChainExhausted(attempts.join("; ")))
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        self.cache.get_or_refresh(scope, || self.resolve(scope)).await
    }
}
