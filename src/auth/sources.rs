//! Individual credential sources tried by [`DefaultAzureCredential`]
//!
//! Each source reports `Unavailable` when it is not configured for the
//! current host, so the chain can move on, and `AuthenticationFailed` when
//! it is configured but Entra ID rejected it.
//!
//! [`DefaultAzureCredential`]: super::chain::DefaultAzureCredential

use async_trait::async_trait;
use oauth2::{
    basic::{BasicClient, BasicErrorResponse},
    AuthType, ClientId, ClientSecret, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::time::Duration;

use super::credential::{AccessToken, TokenCredential};
use super::helpers::{
    expires_after, fallback_expiry, parse_expires_on, resource_from_scope, token_endpoint,
};
use crate::error::CredentialError;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// API version for the IMDS token endpoint
const IMDS_API_VERSION: &str = "2018-02-01";

/// API version for the App Service identity endpoint
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// How long the `az` process may run before the source gives up
const CLI_TIMEOUT: Duration = Duration::from_secs(20);

// =============================================================================
// Client credentials grant (shared by environment and workload identity)
// =============================================================================

/// Exchange a client secret or a client assertion for an access token
async fn request_client_credentials(
    http: &reqwest::Client,
    source_name: &'static str,
    token_url: String,
    client_id: &str,
    client_secret: Option<&str>,
    client_assertion: Option<String>,
    scope: &str,
) -> Result<AccessToken, CredentialError> {
    let token_url = TokenUrl::new(token_url)
        .map_err(|e| CredentialError::failed(source_name, format!("invalid token URL: {}", e)))?;

    // Entra ID expects client credentials in the request body
    let mut client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(token_url);
    if let Some(secret) = client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.to_string()));
    }

    let mut request = client
        .exchange_client_credentials()
        .add_scope(Scope::new(scope.to_string()));
    if let Some(assertion) = client_assertion {
        request = request
            .add_extra_param("client_assertion_type", CLIENT_ASSERTION_TYPE)
            .add_extra_param("client_assertion", assertion);
    }

    let response = request
        .request_async(http)
        .await
        .map_err(|e| map_token_error(source_name, e))?;

    let expires_on = response
        .expires_in()
        .map(expires_after)
        .unwrap_or_else(fallback_expiry);

    tracing::debug!(source = source_name, scope = %scope, "Token issued by Entra ID");

    Ok(AccessToken::new(
        response.access_token().secret().to_string(),
        expires_on,
    ))
}

fn map_token_error<RE>(
    source_name: &'static str,
    error: RequestTokenError<RE, BasicErrorResponse>,
) -> CredentialError
where
    RE: std::error::Error + 'static,
{
    match error {
        RequestTokenError::ServerResponse(response) => CredentialError::failed(
            source_name,
            format!(
                "{}: {}",
                response.error(),
                response
                    .error_description()
                    .map(String::as_str)
                    .unwrap_or("no description")
            ),
        ),
        RequestTokenError::Request(e) => {
            CredentialError::failed(source_name, format!("token request failed: {}", e))
        }
        RequestTokenError::Parse(e, _) => {
            CredentialError::failed(source_name, format!("invalid token response: {}", e))
        }
        RequestTokenError::Other(message) => CredentialError::failed(source_name, message),
    }
}

// =============================================================================
// Environment (service principal with client secret)
// =============================================================================

/// Service principal configured through AZURE_TENANT_ID, AZURE_CLIENT_ID and
/// AZURE_CLIENT_SECRET.
pub struct EnvironmentCredential {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    authority_host: String,
    http: reqwest::Client,
}

impl EnvironmentCredential {
    pub const NAME: &'static str = "EnvironmentCredential";

    pub fn new(
        tenant_id: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        authority_host: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            tenant_id,
            client_id,
            client_secret,
            authority_host,
            http,
        }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let (Some(tenant_id), Some(client_id), Some(client_secret)) =
            (&self.tenant_id, &self.client_id, &self.client_secret)
        else {
            return Err(CredentialError::unavailable(
                Self::NAME,
                "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET are not all set",
            ));
        };

        request_client_credentials(
            &self.http,
            Self::NAME,
            token_endpoint(&self.authority_host, tenant_id),
            client_id,
            Some(client_secret),
            None,
            scope,
        )
        .await
    }
}

// =============================================================================
// Workload identity (federated token file)
// =============================================================================

/// Kubernetes workload identity: a projected service account token is
/// exchanged as a client assertion.
pub struct WorkloadIdentityCredential {
    tenant_id: Option<String>,
    client_id: Option<String>,
    token_file: Option<String>,
    authority_host: String,
    http: reqwest::Client,
}

impl WorkloadIdentityCredential {
    pub const NAME: &'static str = "WorkloadIdentityCredential";

    pub fn new(
        tenant_id: Option<String>,
        client_id: Option<String>,
        token_file: Option<String>,
        authority_host: String,
        http: reqwest::Client,
    ) -> Self {
        Self {
            tenant_id,
            client_id,
            token_file,
            authority_host,
            http,
        }
    }
}

#[async_trait]
impl TokenCredential for WorkloadIdentityCredential {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let (Some(tenant_id), Some(client_id), Some(token_file)) =
            (&self.tenant_id, &self.client_id, &self.token_file)
        else {
            return Err(CredentialError::unavailable(
                Self::NAME,
                "AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_FEDERATED_TOKEN_FILE are not all set",
            ));
        };

        // The file is rotated by the kubelet, so it is read on every request
        let assertion = tokio::fs::read_to_string(token_file).await.map_err(|e| {
            CredentialError::failed(
                Self::NAME,
                format!("failed to read federated token file {}: {}", token_file, e),
            )
        })?;

        request_client_credentials(
            &self.http,
            Self::NAME,
            token_endpoint(&self.authority_host, tenant_id),
            client_id,
            None,
            Some(assertion.trim().to_string()),
            scope,
        )
        .await
    }
}

// =============================================================================
// Managed identity
// =============================================================================

/// Where the managed identity token comes from
#[derive(Clone)]
pub enum ManagedIdentityEndpoint {
    /// App Service / Functions: IDENTITY_ENDPOINT + IDENTITY_HEADER
    AppService { endpoint: String, header: String },
    /// Virtual machines and AKS: instance metadata service
    Imds { endpoint: String },
}

impl std::fmt::Debug for ManagedIdentityEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppService { endpoint, .. } => f
                .debug_struct("AppService")
                .field("endpoint", endpoint)
                .field("header", &"[redacted]")
                .finish(),
            Self::Imds { endpoint } => f.debug_struct("Imds").field("endpoint", endpoint).finish(),
        }
    }
}

/// Response from IMDS and the App Service identity endpoint
#[derive(Debug, Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: serde_json::Value,
}

/// System- or user-assigned managed identity.
///
/// With a client id, the user-assigned identity with that id is requested.
pub struct ManagedIdentityCredential {
    client_id: Option<String>,
    endpoint: ManagedIdentityEndpoint,
    http: reqwest::Client,
}

impl ManagedIdentityCredential {
    pub const NAME: &'static str = "ManagedIdentityCredential";

    pub fn new(
        client_id: Option<String>,
        endpoint: ManagedIdentityEndpoint,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            endpoint,
            http,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn build_request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        match &self.endpoint {
            ManagedIdentityEndpoint::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .query(&query)
            }
            ManagedIdentityEndpoint::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .query(&query)
            }
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = resource_from_scope(scope);

        let response = self.build_request(resource).send().await.map_err(|e| {
            tracing::debug!(error = %e, "Managed identity endpoint unreachable");
            CredentialError::unavailable(Self::NAME, "no managed identity endpoint responded")
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // IMDS answers 400 when no identity (or not the requested one) is assigned
            if status.as_u16() == 400 {
                return Err(CredentialError::unavailable(
                    Self::NAME,
                    format!("no matching identity assigned: {}", body.trim()),
                ));
            }
            return Err(CredentialError::failed(
                Self::NAME,
                format!("HTTP {}: {}", status, body.trim()),
            ));
        }

        let token: ManagedIdentityTokenResponse = response.json().await.map_err(|e| {
            CredentialError::failed(Self::NAME, format!("invalid token response: {}", e))
        })?;

        let expires_on = parse_expires_on(&token.expires_on).unwrap_or_else(fallback_expiry);

        tracing::debug!(
            client_id = ?self.client_id,
            resource = %resource,
            "Token issued by managed identity endpoint"
        );

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}

// =============================================================================
// Azure CLI
// =============================================================================

/// Response from `az account get-access-token`
#[derive(Debug, Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Present in Azure CLI 2.54 and later
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

/// Developer sign-in through `az login`
pub struct AzureCliCredential {
    program: String,
    tenant_id: Option<String>,
    timeout: Duration,
}

impl AzureCliCredential {
    pub const NAME: &'static str = "AzureCliCredential";

    pub fn new(tenant_id: Option<String>) -> Self {
        Self::with_program("az", tenant_id)
    }

    /// Use a different executable in place of `az`
    pub fn with_program(program: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self {
            program: program.into(),
            tenant_id,
            timeout: CLI_TIMEOUT,
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = resource_from_scope(scope);

        let mut command = tokio::process::Command::new(&self.program);
        command.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            resource,
        ]);
        if let Some(tenant_id) = &self.tenant_id {
            command.args(["--tenant", tenant_id.as_str()]);
        }
        command.kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Err(CredentialError::unavailable(
                    Self::NAME,
                    "Azure CLI did not respond in time",
                ))
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::unavailable(
                    Self::NAME,
                    "Azure CLI is not installed",
                ))
            }
            Ok(Err(e)) => {
                return Err(CredentialError::unavailable(
                    Self::NAME,
                    format!("failed to run Azure CLI: {}", e),
                ))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("az login") || stderr.contains("az account set") {
                return Err(CredentialError::unavailable(
                    Self::NAME,
                    "not signed in, run 'az login'",
                ));
            }
            return Err(CredentialError::failed(Self::NAME, stderr.trim().to_string()));
        }

        let token: CliTokenResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            CredentialError::failed(Self::NAME, format!("invalid Azure CLI output: {}", e))
        })?;

        let expires_on = token
            .expires_on
            .as_ref()
            .and_then(parse_expires_on)
            .unwrap_or_else(fallback_expiry);

        Ok(AccessToken::new(token.access_token, expires_on))
    }
}
