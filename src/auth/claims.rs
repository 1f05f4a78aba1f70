use anyhow::{Context, Result};
use jsonwebtoken::dangerous::insecure_decode;
use serde::{Deserialize, Serialize};

/// Subset of Entra ID access token claims describing the caller
#[derive(Debug, Clone, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    oid: Option<String>,
    #[serde(default)]
    upn: Option<String>,
    #[serde(default)]
    unique_name: Option<String>,
    #[serde(default)]
    appid: Option<String>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    idtyp: Option<String>,
}

/// Who the shared credential authenticates as
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenIdentity {
    pub tenant_id: Option<String>,
    pub object_id: Option<String>,
    /// User principal name for users, application id for apps and managed identities
    pub principal: String,
    pub is_application: bool,
}

/// Decode the identity claims of an access token.
///
/// The signature is NOT verified: the token was just issued to us by Entra ID
/// and is only inspected for display. Never use this to authorize a caller.
pub fn identity_from_token(token: &str) -> Result<TokenIdentity> {
    let claims = insecure_decode::<AccessTokenClaims>(token)
        .context("Invalid access token")?
        .claims;

    let is_application = claims.idtyp.as_deref() == Some("app")
        || (claims.upn.is_none() && claims.unique_name.is_none());

    let principal = claims
        .upn
        .or(claims.unique_name)
        .or(claims.appid)
        .or(claims.azp)
        .unwrap_or_else(|| "unknown".to_string());

    Ok(TokenIdentity {
        tenant_id: claims.tid,
        object_id: claims.oid,
        principal,
        is_application,
    })
}
