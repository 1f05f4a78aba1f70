//! Shared fixtures for unit tests

use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::auth::{AccessToken, TokenCredential};
use crate::error::CredentialError;

enum Outcome {
    Token(String),
    Unavailable,
    Failing,
}

/// Credential source with a fixed outcome that counts its calls
pub struct StaticCredential {
    name: &'static str,
    outcome: Outcome,
    pub calls: AtomicUsize,
}

impl StaticCredential {
    pub fn token(name: &'static str, token: &str) -> Self {
        Self::new(name, Outcome::Token(token.to_string()))
    }

    pub fn unavailable(name: &'static str) -> Self {
        Self::new(name, Outcome::Unavailable)
    }

    pub fn failing(name: &'static str) -> Self {
        Self::new(name, Outcome::Failing)
    }

    fn new(name: &'static str, outcome: Outcome) -> Self {
        Self {
            name,
            outcome,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticCredential {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_token(&self, _scope: &str) -> Result<AccessToken, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Token(token) => Ok(AccessToken::new(
                token.clone(),
                SystemTime::now() + Duration::from_secs(3600),
            )),
            Outcome::Unavailable => Err(CredentialError::unavailable(self.name, "not configured")),
            Outcome::Failing => Err(CredentialError::failed(self.name, "rejected")),
        }
    }
}

/// Serve `app` on an OS-assigned local port
pub async fn spawn_server(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, handle)
}
