use crate::auth::TokenIdentity;
use crate::services::SubscriptionRecord;
use askama::Template;

/// Endpoint of a registered client, for the home page
pub struct ClientSummary {
    pub name: &'static str,
    pub endpoint: String,
    pub account: String,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub identity: Option<TokenIdentity>,
    pub identity_error: Option<String>,
    pub credential_source: Option<&'static str>,
    pub clients: Vec<ClientSummary>,
}

#[derive(Template)]
#[template(path = "subscriptions.html")]
pub struct SubscriptionsTemplate {
    pub subscriptions: Vec<SubscriptionRecord>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub status: u16,
    pub message: String,
}
