//! Token Exchange Client
//!
//! Form-encoded calls against the authorization server (code and refresh
//! grants, agt issuance) and the API host's token validity check. Successful
//! code and refresh exchanges are commit points: the new token is written to
//! the [`TokenManager`] before it is returned.

use crate::error::{
    ApiFailureReason, AuthErrorInfo, ClientFailureReason, ErrorInfo, Result, SdkError,
};
use crate::token::{OAuthToken, TokenResponse};
use crate::token_store::TokenManager;
use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use core_runtime::config::SdkConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const AGT_PATH: &str = "/api/agt";
pub const AUTHORIZE_PATH: &str = "/oauth/authorize";
pub const CHECK_ACCESS_TOKEN_PATH: &str = "/v1/user/check_access_token";
pub const LOGOUT_PATH: &str = "/v1/user/logout";
pub const UNLINK_PATH: &str = "/v1/user/unlink";

/// Which host produced a response, deciding the error body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    /// API host, errors carry [`ErrorInfo`]
    KApi,
    /// Authorization server, errors carry [`AuthErrorInfo`]
    KAuth,
}

/// Map a non-2xx response to the error family of its host.
///
/// Bodies that match neither shape degrade to an `Unknown` reason carrying
/// the raw body.
pub fn classify_failure(response: &HttpResponse, api_type: ApiType) -> SdkError {
    let raw = response.text().unwrap_or_default();

    match api_type {
        ApiType::KApi => match response.json::<ErrorInfo>() {
            Ok(info) => SdkError::api(info),
            Err(_) => SdkError::api(ErrorInfo {
                code: ApiFailureReason::Unknown,
                msg: raw,
                required_scopes: None,
                allowed_scopes: None,
                api_type: None,
            }),
        },
        ApiType::KAuth => match response.json::<AuthErrorInfo>() {
            Ok(info) => SdkError::auth(info),
            Err(_) => SdkError::auth_unknown(raw),
        },
    }
}

/// Decode a 2xx body into `T`, or classify the failure.
pub fn decode_response<T: DeserializeOwned>(response: &HttpResponse, api_type: ApiType) -> Result<T> {
    if !response.is_success() {
        return Err(classify_failure(response, api_type));
    }

    response.json().map_err(|e| {
        warn!(status = response.status, error = %e, "Response body did not match the expected model");
        SdkError::client_with_message(ClientFailureReason::CastingFailed, e.to_string())
    })
}

#[derive(Serialize)]
struct CodeGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    code_verifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ios_bundle_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_type: Option<&'a str>,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    refresh_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ios_bundle_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_type: Option<&'a str>,
}

#[derive(Serialize)]
struct AgtParams<'a> {
    client_id: &'a str,
    access_token: &'a str,
}

#[derive(Deserialize)]
struct AgtResponse {
    agt: String,
}

pub struct AuthApi {
    config: Arc<SdkConfig>,
    tokens: Arc<dyn TokenManager>,
}

impl AuthApi {
    pub fn new(config: Arc<SdkConfig>, tokens: Arc<dyn TokenManager>) -> Self {
        Self { config, tokens }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<dyn TokenManager> {
        &self.tokens
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.config.http_client.execute(request).await?)
    }

    /// Exchange an authorization code for a token and store it.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken> {
        let grant = CodeGrant {
            grant_type: "authorization_code",
            client_id: &self.config.app_key,
            redirect_uri,
            code,
            code_verifier: verifier,
            ios_bundle_id: self.config.bundle_id.as_deref(),
            approval_type: self.config.approval_type.as_deref(),
        };

        debug!(verifier_len = verifier.len(), "Exchanging authorization code for token");

        let request = HttpRequest::new(HttpMethod::Post, self.config.hosts.kauth_url(TOKEN_PATH))
            .form(&grant)?;
        let response = self.send(request).await?;
        let body: TokenResponse = decode_response(&response, ApiType::KAuth)?;

        let token = OAuthToken::issued(body, self.config.clock.now())?;
        self.tokens.set(token.clone()).await?;

        info!(
            access_expires_at = %token.access_expires_at,
            scopes = ?token.scopes,
            "Authorization code exchanged"
        );
        Ok(token)
    }

    /// Refresh `old` (or the stored token) and store the result.
    ///
    /// Fails with `TokenNotFound` before any network call when there is
    /// nothing to refresh. An `invalid_grant` rejection clears the store.
    ///
    /// The result is only committed while the store still holds `old`. If a
    /// new login replaced it meanwhile, that token is returned unchanged.
    #[instrument(skip(self, old))]
    pub async fn refresh(&self, old: Option<OAuthToken>) -> Result<OAuthToken> {
        let old = match old {
            Some(token) => token,
            None => self
                .tokens
                .get()
                .await
                .ok_or_else(|| SdkError::client(ClientFailureReason::TokenNotFound))?,
        };
        if !old.has_refresh_token() {
            return Err(SdkError::client(ClientFailureReason::TokenNotFound));
        }

        let grant = RefreshGrant {
            grant_type: "refresh_token",
            client_id: &self.config.app_key,
            refresh_token: &old.refresh_token,
            ios_bundle_id: self.config.bundle_id.as_deref(),
            approval_type: self.config.approval_type.as_deref(),
        };

        debug!("Refreshing access token");

        let request = HttpRequest::new(HttpMethod::Post, self.config.hosts.kauth_url(TOKEN_PATH))
            .form(&grant)?;
        let response = self.send(request).await?;

        let body: TokenResponse = match decode_response(&response, ApiType::KAuth) {
            Ok(body) => body,
            Err(e) => {
                if e.is_invalid_token_error() {
                    warn!("Refresh token rejected, clearing stored token");
                    if let Err(clear_err) = self.tokens.clear().await {
                        warn!(error = %clear_err, "Failed to clear rejected token");
                    }
                }
                return Err(e);
            }
        };

        // A login or logout during the round trip wins over this refresh.
        match self.tokens.get().await {
            Some(current) if current != old => {
                info!("Stored token replaced during refresh, discarding refresh result");
                return Ok(current);
            }
            None => {
                info!("Stored token cleared during refresh, discarding refresh result");
                return Err(SdkError::client(ClientFailureReason::TokenNotFound));
            }
            Some(_) => {}
        }

        let token = old.refreshed(body, self.config.clock.now());
        self.tokens.set(token.clone()).await?;

        info!(
            access_expires_at = %token.access_expires_at,
            refresh_rotated = token.refresh_token != old.refresh_token,
            "Access token refreshed"
        );
        Ok(token)
    }

    /// Issue a short-lived grant token (agt) bound to the current access token.
    #[instrument(skip(self))]
    pub async fn agt(&self) -> Result<String> {
        let token = self
            .tokens
            .get()
            .await
            .ok_or_else(|| SdkError::client(ClientFailureReason::TokenNotFound))?;

        let params = AgtParams {
            client_id: &self.config.app_key,
            access_token: &token.access_token,
        };
        let request = HttpRequest::new(HttpMethod::Post, self.config.hosts.kauth_url(AGT_PATH))
            .form(&params)?;
        let response = self.send(request).await?;
        let body: AgtResponse = decode_response(&response, ApiType::KAuth)?;

        debug!("Agt issued");
        Ok(body.agt)
    }

    /// Ask the API host whether the stored access token is still accepted.
    #[instrument(skip(self))]
    pub async fn check_access_token(&self) -> Result<()> {
        let token = self
            .tokens
            .get()
            .await
            .ok_or_else(|| SdkError::client(ClientFailureReason::TokenNotFound))?;

        let request = HttpRequest::new(
            HttpMethod::Get,
            self.config.hosts.kapi_url(CHECK_ACCESS_TOKEN_PATH),
        )
        .bearer_token(&token.access_token);
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(classify_failure(&response, ApiType::KApi));
        }
        debug!("Access token is valid");
        Ok(())
    }
}
