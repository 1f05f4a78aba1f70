//! hello-azd library
//!
//! Authenticates to Azure with a credential chain and lists the
//! subscriptions the resulting identity can access.

#![deny(dead_code)]

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod services;
pub mod web;

#[cfg(test)]
mod test_support;

use auth::DefaultAzureCredential;
use clients::AzureClients;
use config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Shared credential; also answers readiness
    pub credential: Arc<DefaultAzureCredential>,
    pub clients: Arc<AzureClients>,
}
