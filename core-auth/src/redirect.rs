//! Authorization redirect parsing
//!
//! The companion app and the browser session both finish by navigating to the
//! app's redirect URI. Its query carries either `code` or `error`.

use crate::error::{AuthErrorInfo, AuthFailureReason, ClientFailureReason, Result, SdkError};
use url::Url;

/// `error` value the companion app sends when the user backs out.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Successful authorization: the code to exchange and the echoed `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: Option<String>,
}

/// Extract the authorization outcome from a redirect URL.
///
/// - `code` present: success
/// - `error=cancelled`: [`ClientFailureReason::Cancelled`]
/// - any other `error`: an authorization error with `error_description`
/// - neither: an `unknown` authorization error
pub fn parse_redirect(url: &Url) -> Result<AuthorizationCode> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(code) = code {
        return Ok(AuthorizationCode { code, state });
    }

    match error.as_deref() {
        Some(CANCELLED_ERROR) => Err(SdkError::client_with_message(
            ClientFailureReason::Cancelled,
            "The KakaoTalk authentication has been canceled by user.",
        )),
        Some(error) => Err(SdkError::auth(AuthErrorInfo {
            error: AuthFailureReason::parse(error),
            error_description,
        })),
        None => Err(SdkError::auth_unknown("Invalid authorization redirect URI.")),
    }
}

/// Whether `url` is addressed to `redirect_uri`.
pub fn is_valid_redirect_uri(url: &str, redirect_uri: &str) -> bool {
    !redirect_uri.is_empty() && url.starts_with(redirect_uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<AuthorizationCode> {
        parse_redirect(&Url::parse(raw).unwrap())
    }

    #[test]
    fn test_code_with_state() {
        let result = parse("kakaoappkey://oauth?code=C0DE&state=xyz").unwrap();
        assert_eq!(result.code, "C0DE");
        assert_eq!(result.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_cancelled_is_distinct_error_kind() {
        let err = parse("kakaoappkey://oauth?error=cancelled&error_description=bye").unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_auth_failed());
    }

    #[test]
    fn test_other_error_carries_description() {
        let err = parse("kakaoappkey://oauth?error=access_denied&error_description=User%20denied")
            .unwrap_err();

        match err {
            SdkError::Auth { reason, info } => {
                assert_eq!(reason, AuthFailureReason::AccessDenied);
                assert_eq!(info.unwrap().error_description.as_deref(), Some("User denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unrecognised_error_is_unknown_reason() {
        let err = parse("kakaoappkey://oauth?error=brand_new").unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthFailureReason::Unknown));
    }

    #[test]
    fn test_neither_code_nor_error_is_synthesized() {
        let err = parse("kakaoappkey://oauth?state=only").unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthFailureReason::Unknown));
        assert!(err.to_string().contains("Invalid authorization redirect URI."));
    }

    #[test]
    fn test_redirect_uri_prefix_check() {
        assert!(is_valid_redirect_uri(
            "kakaoappkey://oauth?code=1",
            "kakaoappkey://oauth"
        ));
        assert!(!is_valid_redirect_uri(
            "otherapp://oauth?code=1",
            "kakaoappkey://oauth"
        ));
        assert!(!is_valid_redirect_uri("kakaoappkey://oauth", ""));
    }
}
