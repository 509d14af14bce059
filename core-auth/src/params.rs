//! Authorization request parameters
//!
//! One typed parameter struct per transport. Optional values that are `None`
//! are skipped by the encoders, so absent options never reach the wire.
//!
//! The companion app receives a flat query plus two JSON-encoded values:
//! `headers` (the SDK identification header) and `params` (everything the app
//! forwards to the authorization server). The browser session receives a flat
//! query against `https://{kauth}/oauth/authorize`.

use crate::api::AUTHORIZE_PATH;
use crate::error::{ClientFailureReason, Result, SdkError};
use crate::pkce::CHALLENGE_METHOD;
use core_runtime::config::SdkConfig;
use serde::Serialize;
use url::Url;

pub const RESPONSE_TYPE: &str = "code";
pub const TALK_AUTHORIZE_PATH: &str = "authorize";
pub const UNIVERSAL_LINK_PATH: &str = "/scheme";

/// Login screen behaviour requested from the authorization server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// Re-authenticate even when a session exists
    Login,
    /// Sign up for a new account before logging in
    Create,
    UnifyDaum,
    /// Offer the account picker
    SelectAccount,
}

impl Prompt {
    pub fn as_str(self) -> &'static str {
        match self {
            Prompt::Login => "login",
            Prompt::Create => "create",
            Prompt::UnifyDaum => "unify_daum",
            Prompt::SelectAccount => "select_account",
        }
    }
}

/// How the authorization URL is handed to the companion app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaunchMethod {
    CustomScheme,
    UniversalLink,
}

impl LaunchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LaunchMethod::CustomScheme => "uri_scheme",
            LaunchMethod::UniversalLink => "universal_link",
        }
    }
}

/// Options for an authorization through the companion app.
#[derive(Debug, Clone, Default)]
pub struct TalkAuthOptions {
    pub launch_method: Option<LaunchMethod>,
    pub prompts: Vec<Prompt>,
    pub state: Option<String>,
    pub channel_public_ids: Vec<String>,
    pub service_terms: Vec<String>,
    pub nonce: Option<String>,
}

/// Options for an authorization through the browser session.
#[derive(Debug, Clone, Default)]
pub struct WebAuthOptions {
    pub prompts: Vec<Prompt>,
    pub state: Option<String>,
    /// Only sent together with an agt (scope re-consent)
    pub scopes: Vec<String>,
    pub channel_public_ids: Vec<String>,
    pub service_terms: Vec<String>,
    pub login_hint: Option<String>,
    pub nonce: Option<String>,
    pub accounts_skip_intro: Option<bool>,
    pub accounts_talk_login_visible: Option<bool>,
}

fn join_non_empty(values: &[String], separator: &str) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(separator))
    }
}

fn join_prompts(prompts: &[Prompt]) -> Option<String> {
    if prompts.is_empty() {
        None
    } else {
        Some(
            prompts
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

fn bad_parameter(e: impl std::fmt::Display) -> SdkError {
    SdkError::client_with_message(
        ClientFailureReason::BadParameter,
        format!("Failed to build authorization URL: {}", e),
    )
}

#[derive(Serialize)]
struct KaHeaders<'a> {
    #[serde(rename = "KA")]
    ka: &'a str,
}

#[derive(Serialize)]
struct TalkExtras<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_type: Option<&'a str>,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

#[derive(Serialize)]
struct TalkQuery<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    response_type: &'static str,
    headers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deep_link_method: Option<String>,
    params: String,
}

/// Query parameters for the companion app, kept so a failed launch can be
/// retried with the same PKCE challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkParameters {
    client_id: String,
    redirect_uri: String,
    headers: String,
    params: String,
    deep_link_method: Option<String>,
}

impl TalkParameters {
    pub fn new(config: &SdkConfig, options: &TalkAuthOptions, code_challenge: &str) -> Result<Self> {
        let headers = serde_json::to_string(&KaHeaders {
            ka: &config.ka_header,
        })
        .map_err(bad_parameter)?;

        let extras = TalkExtras {
            prompt: join_prompts(&options.prompts),
            state: options.state.as_deref(),
            channel_public_id: join_non_empty(&options.channel_public_ids, ","),
            service_terms: join_non_empty(&options.service_terms, ","),
            nonce: options.nonce.as_deref(),
            approval_type: config.approval_type.as_deref(),
            code_challenge,
            code_challenge_method: CHALLENGE_METHOD,
        };
        let params = serde_json::to_string(&extras).map_err(bad_parameter)?;

        Ok(Self {
            client_id: config.app_key.clone(),
            redirect_uri: config.redirect_uri.clone(),
            headers,
            params,
            deep_link_method: options.launch_method.map(|m| m.as_str().to_string()),
        })
    }

    pub fn deep_link_method(&self) -> Option<&str> {
        self.deep_link_method.as_deref()
    }

    /// Copy of these parameters with `fallback` appended to the deep-link
    /// marker (`universal_link,uri_scheme`).
    pub fn with_fallback(&self, fallback: LaunchMethod) -> Self {
        let deep_link_method = match &self.deep_link_method {
            Some(current) => format!("{},{}", current, fallback.as_str()),
            None => fallback.as_str().to_string(),
        };
        Self {
            deep_link_method: Some(deep_link_method),
            ..self.clone()
        }
    }

    /// `{talk_auth}://authorize?...`
    pub fn custom_scheme_url(&self, config: &SdkConfig) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}://{}",
            config.hosts.talk_auth, TALK_AUTHORIZE_PATH
        ))
        .map_err(bad_parameter)?;

        let query = serde_urlencoded::to_string(TalkQuery {
            client_id: &self.client_id,
            redirect_uri: &self.redirect_uri,
            response_type: RESPONSE_TYPE,
            headers: self.headers.clone(),
            deep_link_method: self.deep_link_method.clone(),
            params: self.params.clone(),
        })
        .map_err(bad_parameter)?;
        url.set_query(Some(&query));
        Ok(url)
    }

    /// URL to open for `launch_method`. A universal link wraps the escaped
    /// custom-scheme URL: `https://{universal_link}/scheme/{escaped}`.
    pub fn launch_url(&self, config: &SdkConfig, launch_method: Option<LaunchMethod>) -> Result<Url> {
        let custom = self.custom_scheme_url(config)?;
        match launch_method {
            Some(LaunchMethod::UniversalLink) => Url::parse(&format!(
                "https://{}{}/{}",
                config.hosts.universal_link,
                UNIVERSAL_LINK_PATH,
                urlencoding::encode(custom.as_str())
            ))
            .map_err(bad_parameter),
            _ => Ok(custom),
        }
    }
}

#[derive(Serialize)]
struct WebQuery<'a> {
    client_id: &'a str,
    redirect_uri: &'a str,
    response_type: &'static str,
    ka: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_terms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    login_hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nonce: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accounts_skip_intro: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accounts_talk_login_visible: Option<bool>,
    code_challenge: &'a str,
    code_challenge_method: &'static str,
}

/// `https://{kauth}/oauth/authorize?...` for the browser session.
///
/// `scope` is only sent when `agt` is present.
pub fn web_authorize_url(
    config: &SdkConfig,
    options: &WebAuthOptions,
    code_challenge: &str,
    agt: Option<&str>,
) -> Result<Url> {
    let query = WebQuery {
        client_id: &config.app_key,
        redirect_uri: &config.redirect_uri,
        response_type: RESPONSE_TYPE,
        ka: &config.ka_header,
        approval_type: config.approval_type.as_deref(),
        agt,
        scope: agt.and_then(|_| join_non_empty(&options.scopes, " ")),
        prompt: join_prompts(&options.prompts),
        state: options.state.as_deref(),
        channel_public_id: join_non_empty(&options.channel_public_ids, ","),
        service_terms: join_non_empty(&options.service_terms, ","),
        login_hint: options.login_hint.as_deref(),
        nonce: options.nonce.as_deref(),
        accounts_skip_intro: options.accounts_skip_intro,
        accounts_talk_login_visible: options.accounts_talk_login_visible,
        code_challenge,
        code_challenge_method: CHALLENGE_METHOD,
    };

    let mut url = Url::parse(&config.hosts.kauth_url(AUTHORIZE_PATH)).map_err(bad_parameter)?;
    let encoded = serde_urlencoded::to_string(&query).map_err(bad_parameter)?;
    url.set_query(Some(&encoded));
    Ok(url)
}
