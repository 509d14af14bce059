//! OAuth token model
//!
//! Expiry instants are computed once, when a token response is turned into an
//! [`OAuthToken`], and persisted as absolute timestamps. Re-loading a stored
//! token never shifts them.

use crate::error::{ClientFailureReason, Result, SdkError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const BEARER: &str = "Bearer";

/// Token endpoint response, shared by the code and refresh grants.
#[derive(Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<i64>,
    /// Space-delimited scope list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

fn default_token_type() -> String {
    BEARER.to_string()
}

impl TokenResponse {
    pub fn scopes(&self) -> Option<Vec<String>> {
        self.scope.as_deref().map(split_scopes)
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}

/// Credential set issued by the authorization server.
///
/// Equality compares the access token only: two values carrying the same
/// access token are the same token.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Scopes granted at code exchange. Never updated by a refresh.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl OAuthToken {
    /// Build a token from a code-exchange response received at `now`.
    ///
    /// The code grant must return a refresh token and its lifetime; a response
    /// without them is a casting failure.
    pub fn issued(response: TokenResponse, now: DateTime<Utc>) -> Result<Self> {
        let scopes = response.scopes();
        let (Some(refresh_token), Some(refresh_expires_in)) =
            (response.refresh_token, response.refresh_token_expires_in)
        else {
            return Err(SdkError::client_with_message(
                ClientFailureReason::CastingFailed,
                "token response is missing refresh_token.",
            ));
        };

        Ok(Self {
            access_token: response.access_token,
            access_expires_at: now + Duration::seconds(response.expires_in),
            refresh_token,
            refresh_expires_at: now + Duration::seconds(refresh_expires_in),
            token_type: response.token_type,
            scopes,
            id_token: response.id_token,
        })
    }

    /// Build the successor of `self` from a refresh response received at `now`.
    ///
    /// A response that omits `refresh_token` or `refresh_token_expires_in`
    /// inherits the values of `self`. Scopes always carry over from `self`.
    pub fn refreshed(&self, response: TokenResponse, now: DateTime<Utc>) -> Self {
        let scopes = self.scopes.clone();

        let (refresh_token, refresh_expires_at) = match response.refresh_token {
            Some(token) => (
                token,
                response
                    .refresh_token_expires_in
                    .map(|secs| now + Duration::seconds(secs))
                    .unwrap_or(self.refresh_expires_at),
            ),
            None => (self.refresh_token.clone(), self.refresh_expires_at),
        };

        Self {
            access_token: response.access_token,
            access_expires_at: now + Duration::seconds(response.expires_in),
            refresh_token,
            refresh_expires_at,
            token_type: response.token_type,
            scopes,
            id_token: response.id_token,
        }
    }

    pub fn is_access_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.access_expires_at
    }

    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

impl PartialEq for OAuthToken {
    fn eq(&self, other: &Self) -> bool {
        self.access_token == other.access_token
    }
}

impl Eq for OAuthToken {}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
