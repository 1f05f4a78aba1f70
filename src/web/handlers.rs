use super::errors::{upstream_message, ApiError};
use super::templates::{ClientSummary, ErrorTemplate, HomeTemplate, SubscriptionsTemplate};
use crate::{
    auth::{identity_from_token, TokenCredential},
    services::{SubscriptionRecord, SubscriptionService},
    AppState,
};
use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

/// Shown on the `/error` page and for unexpected failures
const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing your request.";

fn render<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Liveness probe - always returns OK if the process is running
pub async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe
///
/// Returns 200 once the credential chain has settled on a source that issued
/// a token, 503 before that.
pub async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.credential.selected_source() {
        Some(source) => (StatusCode::OK, format!("ready: {}", source)),
        None => {
            tracing::warn!("Readiness check failed: no credential source resolved");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "not ready: no credential source resolved".to_string(),
            )
        }
    }
}

pub async fn home_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let production = state.config.is_production();

    let (identity, identity_error) = match state
        .credential
        .get_token(&state.clients.arm.scope())
        .await
    {
        Ok(token) => match identity_from_token(token.secret()) {
            Ok(identity) => (Some(identity), None),
            Err(e) => {
                tracing::debug!(error = %e, "Access token claims not readable");
                (None, Some("Signed in, but the token does not describe the caller.".to_string()))
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "No access token for home page");
            let message = if production {
                "Not signed in to Azure.".to_string()
            } else {
                e.to_string()
            };
            (None, Some(message))
        }
    };

    let clients = &state.clients;
    let summaries = vec![
        ClientSummary {
            name: "Blob Storage",
            endpoint: clients.blob.endpoint().to_string(),
            account: clients.blob.account_name().unwrap_or_default().to_string(),
        },
        ClientSummary {
            name: "Cosmos DB",
            endpoint: clients.cosmos.endpoint().to_string(),
            account: clients.cosmos.account_name().unwrap_or_default().to_string(),
        },
        ClientSummary {
            name: "Resource Manager",
            endpoint: clients.arm.endpoint().to_string(),
            account: String::new(),
        },
    ];

    render(
        StatusCode::OK,
        HomeTemplate {
            identity,
            identity_error,
            credential_source: state.credential.selected_source(),
            clients: summaries,
        },
    )
}

pub async fn subscriptions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let service = SubscriptionService::new(&state.clients.arm);

    match service.get_subscriptions().await {
        Ok(subscriptions) => {
            tracing::debug!(count = subscriptions.len(), "Rendering subscriptions");
            render(StatusCode::OK, SubscriptionsTemplate { subscriptions })
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list subscriptions");
            render(
                StatusCode::BAD_GATEWAY,
                ErrorTemplate {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    message: upstream_message(&e, state.config.is_production()),
                },
            )
        }
    }
}

pub async fn api_subscriptions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SubscriptionRecord>>, ApiError> {
    let service = SubscriptionService::new(&state.clients.arm);

    let subscriptions = service.get_subscriptions().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list subscriptions");
        ApiError::upstream(&e, state.config.is_production())
    })?;

    Ok(Json(subscriptions))
}

pub async fn error_handler() -> impl IntoResponse {
    render(
        StatusCode::OK,
        ErrorTemplate {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            message: GENERIC_ERROR_MESSAGE.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::helpers::create_http_client;
    use crate::auth::DefaultAzureCredential;
    use crate::clients::AzureClients;
    use crate::config::Config;
    use crate::test_support::{spawn_server, StaticCredential};
    use crate::web::create_router;
    use axum::{body::Body, http::Request, routing::get, Router};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_for(arm_url: &str, environment: &str, credential: StaticCredential) -> Arc<AppState> {
        let arm_url = arm_url.to_string();
        let environment = environment.to_string();
        let config = Config::from_lookup(move |name: &str| match name {
            "ENVIRONMENT" => Some(environment.clone()),
            "STORAGE_URL" => Some("https://acct.blob.core.windows.net/".to_string()),
            "AZURE_COSMOS_DB_NOSQL_ENDPOINT" => Some("https://acct.documents.azure.com/".to_string()),
            "AZURE_RESOURCE_MANAGER_URL" => Some(arm_url.clone()),
            _ => None,
        })
        .unwrap();

        let sources: Vec<Box<dyn TokenCredential>> = vec![Box::new(credential)];
        let credential = Arc::new(DefaultAzureCredential::from_sources(sources));
        let clients = AzureClients::register(
            &config,
            credential.clone(),
            create_http_client(2, 5).unwrap(),
        );

        Arc::new(AppState {
            config: Arc::new(config),
            credential,
            clients: Arc::new(clients),
        })
    }

    async fn fake_arm(body: Value, status: StatusCode) -> String {
        let app = Router::new().route(
            "/subscriptions",
            get(move || async move { (status, Json(body)) }),
        );
        let (addr, _handle) = spawn_server(app).await;
        format!("http://{}", addr)
    }

    async fn get_path(state: Arc<AppState>, path: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn one_subscription() -> Value {
        json!({
            "value": [
                {"subscriptionId": "sub-1", "displayName": "Prod", "state": "Enabled", "tenantId": "tenant-a"},
                {"subscriptionId": "sub-2", "displayName": "Test", "state": null, "tenantId": null}
            ]
        })
    }

    fn forbidden() -> Value {
        json!({"error": {"code": "AuthorizationFailed", "message": "no access"}})
    }

    #[tokio::test]
    async fn test_healthz_always_ok() {
        let state = state_for("http://127.0.0.1:9", "development", StaticCredential::token("Test", "t"));
        let (status, _) = get_path(state, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readyz_reflects_credential_resolution() {
        let arm = fake_arm(one_subscription(), StatusCode::OK).await;
        let state = state_for(&arm, "development", StaticCredential::token("Test", "t"));

        let (status, _) = get_path(state.clone(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = get_path(state.clone(), "/api/subscriptions").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = get_path(state, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Test"));
    }

    #[tokio::test]
    async fn test_api_returns_mapped_records() {
        let arm = fake_arm(one_subscription(), StatusCode::OK).await;
        let state = state_for(&arm, "development", StaticCredential::token("Test", "t"));

        let (status, body) = get_path(state, "/api/subscriptions").await;
        assert_eq!(status, StatusCode::OK);

        let records: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            records,
            json!([
                {"subscriptionId": "sub-1", "displayName": "Prod", "state": "Enabled", "tenantId": "tenant-a"},
                {"subscriptionId": "sub-2", "displayName": "Test", "state": "Unknown", "tenantId": "Unknown"}
            ])
        );
    }

    #[tokio::test]
    async fn test_api_upstream_failure_is_bad_gateway() {
        let arm = fake_arm(forbidden(), StatusCode::FORBIDDEN).await;
        let state = state_for(&arm, "development", StaticCredential::token("Test", "t"));

        let (status, body) = get_path(state, "/api/subscriptions").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let error: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["code"], "UPSTREAM_ERROR");
        assert!(error["message"].as_str().unwrap().contains("AuthorizationFailed"));
    }

    #[tokio::test]
    async fn test_page_renders_table() {
        let arm = fake_arm(one_subscription(), StatusCode::OK).await;
        let state = state_for(&arm, "development", StaticCredential::token("Test", "t"));

        let (status, body) = get_path(state, "/subscriptions").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("sub-1"));
        assert!(body.contains("Prod"));
        assert!(body.contains("Unknown"));
    }

    #[tokio::test]
    async fn test_page_hides_details_in_production() {
        let arm = fake_arm(forbidden(), StatusCode::FORBIDDEN).await;
        let state = state_for(&arm, "production", StaticCredential::token("Test", "t"));

        let (status, body) = get_path(state, "/subscriptions").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body.contains("AuthorizationFailed"));
    }

    #[tokio::test]
    async fn test_home_without_credential_still_renders() {
        let state = state_for(
            "http://127.0.0.1:9",
            "development",
            StaticCredential::unavailable("Test"),
        );

        let (status, body) = get_path(state, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Blob Storage"));
        assert!(body.contains("acct"));
    }

    #[tokio::test]
    async fn test_error_page_is_generic() {
        let state = state_for("http://127.0.0.1:9", "production", StaticCredential::token("Test", "t"));
        let (status, body) = get_path(state, "/error").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(GENERIC_ERROR_MESSAGE));
    }
}
