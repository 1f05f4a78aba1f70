use std::env;
use url::Url;

/// Default Entra ID authority for the public cloud
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default Azure Resource Manager endpoint for the public cloud
pub const DEFAULT_RESOURCE_MANAGER_URL: &str = "https://management.azure.com";

/// Azure Instance Metadata Service token endpoint
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Inputs for the credential chain
#[derive(Clone)]
pub struct IdentityConfig {
    /// User-assigned managed identity to pin (AZURE_CLIENT_ID)
    pub managed_identity_client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub federated_token_file: Option<String>,
    pub authority_host: Url,
    /// App Service managed identity endpoint and secret header
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<String>,
    pub imds_endpoint: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("managed_identity_client_id", &self.managed_identity_client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[redacted]"))
            .field("federated_token_file", &self.federated_token_file)
            .field("authority_host", &self.authority_host.as_str())
            .field("identity_endpoint", &self.identity_endpoint)
            .field("identity_header", &self.identity_header.as_ref().map(|_| "[redacted]"))
            .field("imds_endpoint", &self.imds_endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Environment configuration
    pub environment: Environment,

    // Server configuration
    pub server_host: String,
    pub server_port: u16,

    // HTTP client timeout configuration (in seconds)
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,

    // Service endpoints
    pub resource_manager_url: Url,
    pub storage_url: Url,
    pub cosmos_endpoint: Url,

    pub identity: IdentityConfig,
}

impl Config {
    /// Load configuration from environment variables using std::env::var
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|s| !s.trim().is_empty());

        // Parse environment type
        let environment = match var("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // Required variables
        let storage_url = var("STORAGE_URL")
            .ok_or_else(|| anyhow::anyhow!("STORAGE_URL environment variable is required"))?;
        let storage_url = parse_endpoint("STORAGE_URL", &storage_url)?;

        let cosmos_endpoint = var("AZURE_COSMOS_DB_NOSQL_ENDPOINT").ok_or_else(|| {
            anyhow::anyhow!("AZURE_COSMOS_DB_NOSQL_ENDPOINT environment variable is required")
        })?;
        let cosmos_endpoint = parse_endpoint("AZURE_COSMOS_DB_NOSQL_ENDPOINT", &cosmos_endpoint)?;

        // Optional variables with defaults
        let server_host = var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let server_port = var("SERVER_PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(3000);

        let http_connect_timeout_secs = var("HTTP_CONNECT_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10);

        let http_request_timeout_secs = var("HTTP_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let resource_manager_url = parse_endpoint(
            "AZURE_RESOURCE_MANAGER_URL",
            &var("AZURE_RESOURCE_MANAGER_URL")
                .unwrap_or_else(|| DEFAULT_RESOURCE_MANAGER_URL.to_string()),
        )?;

        let authority_host = parse_endpoint(
            "AZURE_AUTHORITY_HOST",
            &var("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
        )?;

        // AZURE_CLIENT_ID both pins the managed identity and names the
        // service principal for the environment/workload identity sources
        let client_id = var("AZURE_CLIENT_ID");

        let identity = IdentityConfig {
            managed_identity_client_id: client_id.clone(),
            tenant_id: var("AZURE_TENANT_ID"),
            client_id,
            client_secret: var("AZURE_CLIENT_SECRET"),
            federated_token_file: var("AZURE_FEDERATED_TOKEN_FILE"),
            authority_host,
            identity_endpoint: var("IDENTITY_ENDPOINT"),
            identity_header: var("IDENTITY_HEADER"),
            imds_endpoint: var("AZURE_IMDS_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_string()),
        };

        Ok(Config {
            environment,
            server_host,
            server_port,
            http_connect_timeout_secs,
            http_request_timeout_secs,
            resource_manager_url,
            storage_url,
            cosmos_endpoint,
            identity,
        })
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get bind address for server
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Parse an endpoint URL, requiring an absolute http(s) URL with a host
fn parse_endpoint(name: &str, value: &str) -> anyhow::Result<Url> {
    let url = Url::parse(value.trim())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", name, value, e))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        anyhow::bail!("{} must be an absolute http(s) URL, got {}", name, value);
    }

    Ok(url)
}
