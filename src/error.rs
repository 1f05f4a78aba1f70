//! Error types shared by the identity adapter and the Azure clients.

use thiserror::Error;

/// Failure to obtain an access token from a credential source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    /// The source is not configured or not applicable in this environment.
    /// A credential chain moves on to the next source.
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },

    /// The source is configured but the identity service rejected it.
    /// A credential chain stops here.
    #[error("{source_name} authentication failed: {message}")]
    AuthenticationFailed {
        source_name: &'static str,
        message: String,
    },

    /// Every source in the chain was unavailable.
    #[error("no credential in the chain could provide a token: {0}")]
    ChainExhausted(String),
}

impl CredentialError {
    pub fn unavailable(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name,
            message: message.into(),
        }
    }

    pub fn failed(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            source_name,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Failure of a call to a remote Azure API.
///
/// Covers authentication, authorization, transport and response-shape
/// failures. Callers never get partial results alongside this error.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("could not acquire access token: {0}")]
    Credential(#[from] CredentialError),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {code}: {message}")]
    Status {
        url: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl UpstreamError {
    /// True when the identity service or the API refused the caller.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Credential(_) => true,
            Self::Status { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_distinguished_from_failure() {
        assert!(CredentialError::unavailable("AzureCliCredential", "az not found").is_unavailable());
        assert!(!CredentialError::failed("EnvironmentCredential", "bad secret").is_unavailable());
    }

    #[test]
    fn test_status_error_display_includes_code() {
        let err = UpstreamError::Status {
            url: "https://management.azure.com/subscriptions".to_string(),
            status: 403,
            code: "AuthorizationFailed".to_string(),
            message: "no access".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("AuthorizationFailed"));
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_credential_error_converts_into_upstream() {
        let err: UpstreamError = CredentialError::ChainExhausted("nothing worked".into()).into();
        assert!(err.is_auth_failure());
        assert!(err.to_string().contains("nothing worked"));
    }
}
