//! Azure service clients
//!
//! All clients share the single credential built in `main`.

pub mod arm;
pub mod paging;
pub mod storage;

use std::sync::Arc;

use crate::auth::TokenCredential;
use crate::config::Config;

pub use arm::{ArmClient, SubscriptionData, SubscriptionLister, SubscriptionState};
pub use paging::Pager;
pub use storage::{BlobServiceClient, CosmosClient};

/// The service clients registered at startup
pub struct AzureClients {
    pub arm: ArmClient,
    pub blob: BlobServiceClient,
    pub cosmos: CosmosClient,
}

impl AzureClients {
    /// Register the Blob, Cosmos and ARM clients over one shared credential
    pub fn register(
        config: &Config,
        credential: Arc<dyn TokenCredential>,
        http: reqwest::Client,
    ) -> Self {
        let blob = BlobServiceClient::new(config.storage_url.clone(), Arc::clone(&credential));
        let cosmos = CosmosClient::new(config.cosmos_endpoint.clone(), Arc::clone(&credential));
        let arm = ArmClient::new(config.resource_manager_url.clone(), credential, http);

        tracing::info!(
            blob = %blob.endpoint(),
            cosmos = %cosmos.endpoint(),
            arm = %arm.endpoint(),
            "Azure clients registered"
        );

        Self { arm, blob, cosmos }
    }
}
