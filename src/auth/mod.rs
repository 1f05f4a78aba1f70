//! Identity provider adapter
//!
//! Obtains Entra ID access tokens for the Azure clients.
//!
//! ## Structure
//!
//! - `credential`: the `TokenCredential` trait and `AccessToken`
//! - `sources`: environment, workload identity, managed identity and Azure CLI sources
//! - `chain`: `DefaultAzureCredential`, the ordered fallback chain used by the app
//! - `cache`: per-scope token cache
//! - `claims`: decodes who a token was issued to, for display
//! - `helpers`: HTTP client builders, scope and expiry helpers
//!
//! ## Lifecycle
//!
//! `main` builds one `DefaultAzureCredential` and shares it (`Arc`) with every
//! client. The chain settles on the first source that issues a token and
//! keeps using it for the life of the process.

pub mod cache;
pub mod chain;
pub mod claims;
pub mod credential;
pub mod helpers;
pub mod sources;

pub use chain::DefaultAzureCredential;
pub use claims::{identity_from_token, TokenIdentity};
pub use credential::{AccessToken, TokenCredential};
pub use sources::{
    AzureCliCredential, EnvironmentCredential, ManagedIdentityCredential,
    ManagedIdentityEndpoint, WorkloadIdentityCredential,
};
