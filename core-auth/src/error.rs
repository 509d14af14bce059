//! Terminal error union for every auth operation
//!
//! Failures fall in three families: local preconditions ([`SdkError::Client`]),
//! rejections of authenticated API calls ([`SdkError::Api`]) and rejections of
//! token or authorization exchanges ([`SdkError::Auth`]). Transport failures
//! from the HTTP executor are carried unchanged.

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFailureReason {
    Unknown,
    Cancelled,
    TokenNotFound,
    NotSupported,
    BadParameter,
    MustInitAppKey,
    CastingFailed,
    IllegalState,
}

impl ClientFailureReason {
    pub fn default_message(self) -> &'static str {
        match self {
            ClientFailureReason::Unknown => "unknown error.",
            ClientFailureReason::Cancelled => "user cancelled",
            ClientFailureReason::TokenNotFound => "authentication tokens not exist.",
            ClientFailureReason::NotSupported => "target app is not installed.",
            ClientFailureReason::BadParameter => "bad parameters.",
            ClientFailureReason::MustInitAppKey => "app key is not initialized.",
            ClientFailureReason::CastingFailed => "casting failed.",
            ClientFailureReason::IllegalState => "illegal state.",
        }
    }
}

/// Reason codes returned by the API host.
///
/// Serialized as the numeric `code` field. Codes this client does not know
/// decode to [`ApiFailureReason::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ApiFailureReason {
    Unknown,
    Internal,
    BadParameter,
    UnsupportedApi,
    Blocked,
    Permission,
    DeprecatedApi,
    ApiLimitExceed,
    NotSignedUpUser,
    AlreadySignedUpUser,
    NotKakaoAccountUser,
    InvalidUserPropertyKey,
    NoSuchApp,
    InvalidAccessToken,
    InsufficientScope,
    RequiredAgeVerification,
    UnderAgeLimit,
    LowerAgeLimit,
    AlreadyAgeAuthorized,
    AgeCheckLimitExceed,
    AgeResultMismatched,
    CIResultMismatched,
    NotTalkUser,
    UserDeviceUnsupported,
    TalkMessageDisabled,
    TalkSendMessageMonthlyLimitExceed,
    TalkSendMessageDailyLimitExceed,
    ImageUploadSizeExceed,
    ServerTimeout,
    ImageMaxUploadNumberExceed,
    UnderMaintenance,
}

impl ApiFailureReason {
    const CODES: [(ApiFailureReason, i32); 31] = [
        (ApiFailureReason::Unknown, -9999),
        (ApiFailureReason::Internal, -1),
        (ApiFailureReason::BadParameter, -2),
        (ApiFailureReason::UnsupportedApi, -3),
        (ApiFailureReason::Blocked, -4),
        (ApiFailureReason::Permission, -5),
        (ApiFailureReason::DeprecatedApi, -9),
        (ApiFailureReason::ApiLimitExceed, -10),
        (ApiFailureReason::NotSignedUpUser, -101),
        (ApiFailureReason::AlreadySignedUpUser, -102),
        (ApiFailureReason::NotKakaoAccountUser, -103),
        (ApiFailureReason::InvalidUserPropertyKey, -201),
        (ApiFailureReason::NoSuchApp, -301),
        (ApiFailureReason::InvalidAccessToken, -401),
        (ApiFailureReason::InsufficientScope, -402),
        (ApiFailureReason::RequiredAgeVerification, -405),
        (ApiFailureReason::UnderAgeLimit, -406),
        (ApiFailureReason::LowerAgeLimit, -451),
        (ApiFailureReason::AlreadyAgeAuthorized, -452),
        (ApiFailureReason::AgeCheckLimitExceed, -453),
        (ApiFailureReason::AgeResultMismatched, -480),
        (ApiFailureReason::CIResultMismatched, -481),
        (ApiFailureReason::NotTalkUser, -501),
        (ApiFailureReason::UserDeviceUnsupported, -504),
        (ApiFailureReason::TalkMessageDisabled, -530),
        (ApiFailureReason::TalkSendMessageMonthlyLimitExceed, -531),
        (ApiFailureReason::TalkSendMessageDailyLimitExceed, -532),
        (ApiFailureReason::ImageUploadSizeExceed, -602),
        (ApiFailureReason::ServerTimeout, -603),
        (ApiFailureReason::ImageMaxUploadNumberExceed, -606),
        (ApiFailureReason::UnderMaintenance, -9798),
    ];

    pub fn code(self) -> i32 {
        Self::CODES
            .iter()
            .find(|(reason, _)| *reason == self)
            .map(|(_, code)| *code)
            .unwrap_or(-9999)
    }

    pub fn from_code(code: i32) -> Self {
        Self::CODES
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(reason, _)| *reason)
            .unwrap_or(ApiFailureReason::Unknown)
    }
}

impl From<i32> for ApiFailureReason {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl From<ApiFailureReason> for i32 {
    fn from(reason: ApiFailureReason) -> Self {
        reason.code()
    }
}

/// Error body returned by the API host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ApiFailureReason,
    #[serde(default)]
    pub msg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
}

/// `error` values returned by the authorization server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthFailureReason {
    InvalidRequest,
    InvalidClient,
    InvalidScope,
    InvalidGrant,
    Misconfigured,
    Unauthorized,
    AccessDenied,
    ServerError,
    AutoLogin,
    Unknown,
}

impl AuthFailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthFailureReason::InvalidRequest => "invalid_request",
            AuthFailureReason::InvalidClient => "invalid_client",
            AuthFailureReason::InvalidScope => "invalid_scope",
            AuthFailureReason::InvalidGrant => "invalid_grant",
            AuthFailureReason::Misconfigured => "misconfigured",
            AuthFailureReason::Unauthorized => "unauthorized",
            AuthFailureReason::AccessDenied => "access_denied",
            AuthFailureReason::ServerError => "server_error",
            AuthFailureReason::AutoLogin => "auto_login",
            AuthFailureReason::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "invalid_request" => AuthFailureReason::InvalidRequest,
            "invalid_client" => AuthFailureReason::InvalidClient,
            "invalid_scope" => AuthFailureReason::InvalidScope,
            "invalid_grant" => AuthFailureReason::InvalidGrant,
            "misconfigured" => AuthFailureReason::Misconfigured,
            "unauthorized" => AuthFailureReason::Unauthorized,
            "access_denied" => AuthFailureReason::AccessDenied,
            "server_error" => AuthFailureReason::ServerError,
            "auto_login" => AuthFailureReason::AutoLogin,
            _ => AuthFailureReason::Unknown,
        }
    }
}

impl From<String> for AuthFailureReason {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AuthFailureReason> for String {
    fn from(reason: AuthFailureReason) -> Self {
        reason.as_str().to_string()
    }
}

/// Error body returned by the authorization server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorInfo {
    pub error: AuthFailureReason,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Error, Debug, Clone)]
pub enum SdkError {
    #[error("{message}")]
    Client {
        reason: ClientFailureReason,
        message: String,
    },

    #[error("API request failed ({reason:?}): {}", api_message(.info))]
    Api {
        reason: ApiFailureReason,
        info: Option<ErrorInfo>,
    },

    #[error("Authorization failed ({}): {}", .reason.as_str(), auth_message(.info))]
    Auth {
        reason: AuthFailureReason,
        info: Option<AuthErrorInfo>,
    },

    #[error("Transport error: {0}")]
    Transport(Arc<BridgeError>),
}

fn api_message(info: &Option<ErrorInfo>) -> &str {
    info.as_ref().map(|i| i.msg.as_str()).unwrap_or("no error info")
}

fn auth_message(info: &Option<AuthErrorInfo>) -> &str {
    info.as_ref()
        .and_then(|i| i.error_description.as_deref())
        .unwrap_or("no error description")
}

impl SdkError {
    pub fn client(reason: ClientFailureReason) -> Self {
        SdkError::Client {
            reason,
            message: reason.default_message().to_string(),
        }
    }

    pub fn client_with_message(reason: ClientFailureReason, message: impl Into<String>) -> Self {
        SdkError::Client {
            reason,
            message: message.into(),
        }
    }

    pub fn api(info: ErrorInfo) -> Self {
        SdkError::Api {
            reason: info.code,
            info: Some(info),
        }
    }

    pub fn auth(info: AuthErrorInfo) -> Self {
        SdkError::Auth {
            reason: info.error,
            info: Some(info),
        }
    }

    /// Authorization failure of unknown shape carrying a descriptive message.
    pub fn auth_unknown(message: impl Into<String>) -> Self {
        Self::auth(AuthErrorInfo {
            error: AuthFailureReason::Unknown,
            error_description: Some(message.into()),
        })
    }

    pub fn is_client_failed(&self) -> bool {
        matches!(self, SdkError::Client { .. })
    }

    pub fn is_api_failed(&self) -> bool {
        matches!(self, SdkError::Api { .. })
    }

    pub fn is_auth_failed(&self) -> bool {
        matches!(self, SdkError::Auth { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SdkError::Client {
                reason: ClientFailureReason::Cancelled,
                ..
            }
        )
    }

    pub fn client_reason(&self) -> Option<ClientFailureReason> {
        match self {
            SdkError::Client { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn api_reason(&self) -> Option<ApiFailureReason> {
        match self {
            SdkError::Api { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn auth_reason(&self) -> Option<AuthFailureReason> {
        match self {
            SdkError::Auth { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The stored token can no longer be used: API -401 or `invalid_grant`.
    pub fn is_invalid_token_error(&self) -> bool {
        matches!(
            self,
            SdkError::Api {
                reason: ApiFailureReason::InvalidAccessToken,
                ..
            } | SdkError::Auth {
                reason: AuthFailureReason::InvalidGrant,
                ..
            }
        )
    }

    /// Scopes the server asked for on an insufficient-scope rejection.
    pub fn required_scopes(&self) -> Option<&[String]> {
        match self {
            SdkError::Api {
                reason: ApiFailureReason::InsufficientScope,
                info: Some(info),
            } => info
                .required_scopes
                .as_deref()
                .filter(|scopes| !scopes.is_empty()),
            _ => None,
        }
    }
}

impl From<BridgeError> for SdkError {
    fn from(e: BridgeError) -> Self {
        SdkError::Transport(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
