use anyhow::{Context, Result};
use hello_azd::{
    auth::{helpers::create_http_client, identity_from_token, DefaultAzureCredential, TokenCredential},
    clients::AzureClients,
    config::Config,
    web, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting hello-azd");

    // Load configuration from environment
    let config = Config::load()?;
    tracing::info!(
        environment = ?config.environment,
        resource_manager = %config.resource_manager_url,
        "Configuration loaded"
    );

    // One credential for every client
    let credential = Arc::new(
        DefaultAzureCredential::from_config(
            &config.identity,
            config.http_connect_timeout_secs,
            config.http_request_timeout_secs,
        )
        .context("Failed to build credential chain")?,
    );

    let http = create_http_client(config.http_connect_timeout_secs, config.http_request_timeout_secs)
        .context("Failed to build HTTP client")?;
    let clients = AzureClients::register(&config, credential.clone(), http);

    // Resolve the chain early so /readyz passes as soon as possible. Not fatal:
    // the first request retries the chain.
    match credential.get_token(&clients.arm.scope()).await {
        Ok(token) => match identity_from_token(token.secret()) {
            Ok(identity) => tracing::info!(
                source = ?credential.selected_source(),
                principal = %identity.principal,
                tenant_id = ?identity.tenant_id,
                "Signed in to Azure"
            ),
            Err(e) => tracing::info!(
                source = ?credential.selected_source(),
                error = %e,
                "Signed in to Azure; token claims not readable"
            ),
        },
        Err(e) => tracing::warn!(error = %e, "No Azure credential available at startup"),
    }

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        credential,
        clients: Arc::new(clients),
    });

    let app = web::create_router(state);

    // Bind and serve
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("hello-azd listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
