//! Authorization Flow Coordinator
//!
//! Drives one authorization attempt from URL composition to a stored token,
//! through either the companion app or a browser session:
//!
//! ```text
//! Idle -> AwaitingExternalRedirect -> Exchanging -> Resolved | Failed
//! ```
//!
//! Every attempt generates its own PKCE pair. The verifier stays inside the
//! attempt's future and is only used for that attempt's code exchange.
//!
//! ## Companion app hand-off
//!
//! The app answers with a redirect to the registered scheme, which the host
//! forwards to [`AuthController::handle_open_url`]. Only one hand-off can be
//! pending: starting a second one replaces the first, whose caller then
//! resolves with `IllegalState`.

use crate::api::AuthApi;
use crate::error::{ClientFailureReason, Result, SdkError};
use crate::params::{web_authorize_url, LaunchMethod, TalkAuthOptions, TalkParameters, WebAuthOptions};
use crate::pkce::PkcePair;
use crate::redirect::{is_valid_redirect_uri, parse_redirect, AuthorizationCode};
use crate::retrier::ConsentFlow;
use crate::token::OAuthToken;
use async_trait::async_trait;
use bridge_traits::AuthSessionError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Progress of the most recent authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    AwaitingExternalRedirect,
    Exchanging,
    Resolved,
    Failed,
}

struct PendingTalk {
    attempt: u64,
    completion: oneshot::Sender<Result<AuthorizationCode>>,
}

pub struct AuthController {
    api: Arc<AuthApi>,
    pending: Mutex<Option<PendingTalk>>,
    state: Mutex<AuthState>,
    attempts: AtomicU64,
}

impl AuthController {
    pub fn new(api: Arc<AuthApi>) -> Self {
        Self {
            api,
            pending: Mutex::new(None),
            state: Mutex::new(AuthState::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AuthState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn fail(&self, error: SdkError) -> SdkError {
        self.set_state(AuthState::Failed);
        if error.is_cancelled() {
            info!("Authorization cancelled by user");
        } else {
            warn!(error = %error, "Authorization failed");
        }
        error
    }

    /// Install the completion slot for a hand-off, replacing any pending one.
    fn install_pending(&self, completion: oneshot::Sender<Result<AuthorizationCode>>) -> u64 {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(PendingTalk {
            attempt,
            completion,
        }) {
            warn!(
                superseded = previous.attempt,
                attempt, "Pending KakaoTalk authorization replaced by a new attempt"
            );
        }
        attempt
    }

    fn abandon_pending(&self, attempt: u64) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.as_ref().is_some_and(|p| p.attempt == attempt) {
            *pending = None;
        }
    }

    /// Authorize through the companion app.
    ///
    /// A universal-link launch the OS refuses is retried once through the
    /// custom scheme before failing with `NotSupported`.
    #[instrument(skip(self, options), fields(launch_method = ?options.launch_method))]
    pub async fn authorize_with_talk(&self, options: TalkAuthOptions) -> Result<OAuthToken> {
        let config = self.api.config();
        let opener = config.url_opener.clone().ok_or_else(|| {
            self.fail(SdkError::client_with_message(
                ClientFailureReason::NotSupported,
                "No UrlOpener configured for KakaoTalk authorization.",
            ))
        })?;

        let pkce = PkcePair::generate();
        let params = TalkParameters::new(config, &options, pkce.challenge())
            .map_err(|e| self.fail(e))?;
        let url = params
            .launch_url(config, options.launch_method)
            .map_err(|e| self.fail(e))?;

        let (completion, outcome) = oneshot::channel();
        let attempt = self.install_pending(completion);
        self.set_state(AuthState::AwaitingExternalRedirect);

        if opener.open(&url).await {
            info!(attempt, "KakaoTalk launched");
        } else if options.launch_method == Some(LaunchMethod::UniversalLink) {
            warn!(attempt, "Universal link launch failed, retrying with custom scheme");
            let retry_url = params
                .with_fallback(LaunchMethod::CustomScheme)
                .launch_url(config, Some(LaunchMethod::CustomScheme))
                .map_err(|e| {
                    self.abandon_pending(attempt);
                    self.fail(e)
                })?;
            if !opener.open(&retry_url).await {
                self.abandon_pending(attempt);
                return Err(self.fail(SdkError::client_with_message(
                    ClientFailureReason::NotSupported,
                    "(CustomScheme retry) KakaoTalk launch failed.",
                )));
            }
            info!(attempt, "KakaoTalk launched through custom scheme");
        } else {
            error!(attempt, "KakaoTalk launch failed");
            self.abandon_pending(attempt);
            return Err(self.fail(SdkError::client(ClientFailureReason::NotSupported)));
        }

        let code = match outcome.await {
            Ok(result) => result.map_err(|e| self.fail(e))?,
            Err(_) => {
                return Err(SdkError::client_with_message(
                    ClientFailureReason::IllegalState,
                    "KakaoTalk authorization was superseded by a newer attempt.",
                ))
            }
        };

        self.exchange(code, pkce).await
    }

    /// Authorize through a persistent browser session.
    #[instrument(skip(self, options))]
    pub async fn authorize_with_web(&self, options: WebAuthOptions) -> Result<OAuthToken> {
        self.web_flow(options, None).await
    }

    /// Browser session, ephemeral when `agt` is present.
    async fn web_flow(&self, options: WebAuthOptions, agt: Option<String>) -> Result<OAuthToken> {
        let config = self.api.config();
        let session = config.auth_session.clone().ok_or_else(|| {
            self.fail(SdkError::client_with_message(
                ClientFailureReason::NotSupported,
                "No AuthSession configured for web authorization.",
            ))
        })?;

        let pkce = PkcePair::generate();
        let url = web_authorize_url(config, &options, pkce.challenge(), agt.as_deref())
            .map_err(|e| self.fail(e))?;
        let ephemeral = agt.is_some();

        self.set_state(AuthState::AwaitingExternalRedirect);
        debug!(ephemeral, "Presenting authentication session");

        let callback = session
            .present(&url, &config.custom_scheme, ephemeral)
            .await
            .map_err(|e| self.fail(session_error(e)))?;

        let code = parse_redirect(&callback).map_err(|e| self.fail(e))?;
        self.exchange(code, pkce).await
    }

    async fn exchange(&self, code: AuthorizationCode, pkce: PkcePair) -> Result<OAuthToken> {
        self.set_state(AuthState::Exchanging);
        let redirect_uri = self.api.config().redirect_uri.clone();

        match self
            .api
            .exchange_code(&code.code, pkce.verifier(), &redirect_uri)
            .await
        {
            Ok(token) => {
                self.set_state(AuthState::Resolved);
                Ok(token)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Deliver an inbound redirect to the pending companion-app attempt.
    ///
    /// Returns `true` when the URL was addressed to this app and consumed by
    /// a pending attempt. Other URLs leave the slot untouched.
    pub fn handle_open_url(&self, url: &str) -> bool {
        let config = self.api.config();
        if !is_valid_redirect_uri(url, &config.redirect_uri) {
            debug!("Ignoring URL not addressed to the redirect URI");
            return false;
        }

        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(pending) = pending else {
            warn!("Redirect received with no pending KakaoTalk authorization");
            return false;
        };

        let outcome = Url::parse(url)
            .map_err(|_| SdkError::auth_unknown("Invalid authorization redirect URI."))
            .and_then(|url| parse_redirect(&url));

        if pending.completion.send(outcome).is_err() {
            warn!(attempt = pending.attempt, "Pending authorization caller is gone");
            return false;
        }
        debug!(attempt = pending.attempt, "Redirect delivered");
        true
    }
}

fn session_error(error: AuthSessionError) -> SdkError {
    match error {
        AuthSessionError::Cancelled => SdkError::client_with_message(
            ClientFailureReason::Cancelled,
            "The authentication session has been canceled by user.",
        ),
        AuthSessionError::Failed(reason) => {
            warn!(reason = %reason, "Authentication session failed");
            SdkError::client_with_message(
                ClientFailureReason::Unknown,
                "An error occurred on executing authentication session.",
            )
        }
    }
}

#[async_trait]
impl ConsentFlow for AuthController {
    /// Issue an agt for the current token and run an ephemeral browser
    /// session asking for `scopes`.
    async fn request_scopes(&self, scopes: Vec<String>) -> Result<OAuthToken> {
        info!(?scopes, "Requesting additional consent");
        let agt = self.api.agt().await?;
        let options = WebAuthOptions {
            scopes,
            ..Default::default()
        };
        self.web_flow(options, Some(agt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkce::challenge;
    use crate::token_store::{SecureTokenStore, TokenManager};
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{AuthSession, HttpClient, HttpRequest, HttpResponse, SecureStore, UrlOpener};
    use core_runtime::config::SdkConfig;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct MockSecureStore {
        storage: AsyncMutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.storage.lock().await.insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockHttpClient {
        responses: AsyncMutex<VecDeque<HttpResponse>>,
        requests: AsyncMutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        async fn push(&self, status: u16, body: serde_json::Value) {
            self.responses
                .lock()
                .await
                .push_back(HttpResponse::new(status, body.to_string()));
        }

        async fn form(&self, index: usize) -> HashMap<String, String> {
            let requests = self.requests.lock().await;
            let body = requests[index].body.clone().unwrap_or_default();
            serde_urlencoded::from_bytes(&body).unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.requests.lock().await.push(request);
            Ok(self
                .responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(500, "no response queued")))
        }
    }

    /// Accepts or refuses URLs in order and records them.
    #[derive(Default)]
    struct MockUrlOpener {
        results: AsyncMutex<VecDeque<bool>>,
        opened: AsyncMutex<Vec<Url>>,
    }

    impl MockUrlOpener {
        fn with_results(results: &[bool]) -> Self {
            Self {
                results: AsyncMutex::new(results.iter().copied().collect()),
                opened: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UrlOpener for MockUrlOpener {
        async fn open(&self, url: &Url) -> bool {
            self.opened.lock().await.push(url.clone());
            self.results.lock().await.pop_front().unwrap_or(true)
        }
    }

    struct MockAuthSession {
        outcome: std::result::Result<String, AuthSessionError>,
        presented: AsyncMutex<Vec<(Url, String, bool)>>,
    }

    impl MockAuthSession {
        fn returning(outcome: std::result::Result<&str, AuthSessionError>) -> Self {
            Self {
                outcome: outcome.map(str::to_string),
                presented: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AuthSession for MockAuthSession {
        async fn present(
            &self,
            url: &Url,
            callback_scheme: &str,
            ephemeral: bool,
        ) -> std::result::Result<Url, AuthSessionError> {
            self.presented
                .lock()
                .await
                .push((url.clone(), callback_scheme.to_string(), ephemeral));
            self.outcome
                .clone()
                .map(|raw| Url::parse(&raw).unwrap())
        }
    }

    struct Fixture {
        controller: Arc<AuthController>,
        http: Arc<MockHttpClient>,
        opener: Arc<MockUrlOpener>,
        session: Arc<MockAuthSession>,
        tokens: Arc<SecureTokenStore>,
    }

    fn fixture(opener: MockUrlOpener, session: MockAuthSession) -> Fixture {
        let http = Arc::new(MockHttpClient::default());
        let opener = Arc::new(opener);
        let session = Arc::new(session);
        let config = SdkConfig::builder()
            .app_key("appkey")
            .http_client(http.clone())
            .secure_store(Arc::new(MockSecureStore::default()))
            .url_opener(opener.clone())
            .auth_session(session.clone())
            .build()
            .unwrap();
        let tokens = Arc::new(SecureTokenStore::new(config.secure_store.clone()));
        let api = Arc::new(AuthApi::new(Arc::new(config), tokens.clone()));
        Fixture {
            controller: Arc::new(AuthController::new(api)),
            http,
            opener,
            session,
            tokens,
        }
    }

    fn token_body(access: &str) -> serde_json::Value {
        serde_json::json!({
            "access_token": access,
            "expires_in": 43199,
            "token_type": "bearer",
            "refresh_token": "R1",
            "refresh_token_expires_in": 5183999
        })
    }

    async fn wait_for_launches(opener: &MockUrlOpener, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while opener.opened.lock().await.len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    /// `params` of a talk launch URL, unwrapping a universal link first.
    fn nested_params(url: &Url) -> serde_json::Value {
        let custom = match url.path().strip_prefix("/scheme/") {
            Some(escaped) if url.scheme() == "https" => {
                Url::parse(&urlencoding::decode(escaped).unwrap()).unwrap()
            }
            _ => url.clone(),
        };
        let query: HashMap<String, String> = custom.query_pairs().into_owned().collect();
        serde_json::from_str(&query["params"]).unwrap()
    }

    #[tokio::test]
    async fn test_talk_redirect_exchanges_with_same_attempt_verifier() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );
        f.http.push(200, token_body("A1")).await;

        let controller = f.controller.clone();
        let attempt =
            tokio::spawn(async move { controller.authorize_with_talk(TalkAuthOptions::default()).await });

        wait_for_launches(&f.opener, 1).await;
        assert_eq!(f.controller.state(), AuthState::AwaitingExternalRedirect);
        assert!(f.controller.handle_open_url("kakaoappkey://oauth?code=C0DE"));

        let token = attempt.await.unwrap().unwrap();
        assert_eq!(token.access_token, "A1");
        assert_eq!(f.controller.state(), AuthState::Resolved);
        assert_eq!(f.tokens.get().await.unwrap().access_token, "A1");

        let launched = f.opener.opened.lock().await[0].clone();
        let sent_challenge = nested_params(&launched)["code_challenge"]
            .as_str()
            .unwrap()
            .to_string();
        let form = f.http.form(0).await;
        assert_eq!(form["code"], "C0DE");
        assert_eq!(challenge(&form["code_verifier"]), sent_challenge);
    }

    #[tokio::test]
    async fn test_each_attempt_uses_a_fresh_verifier() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Ok("kakaoappkey://oauth?code=W1")),
        );
        f.http.push(200, token_body("A1")).await;
        f.http.push(200, token_body("A2")).await;

        f.controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap();
        f.controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap();

        let first = f.http.form(0).await;
        let second = f.http.form(1).await;
        assert_ne!(first["code_verifier"], second["code_verifier"]);

        let presented = f.session.presented.lock().await;
        let challenge_of = |url: &Url| {
            url.query_pairs()
                .find(|(k, _)| k == "code_challenge")
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };
        assert_eq!(challenge(&second["code_verifier"]), challenge_of(&presented[1].0));
        assert_ne!(challenge(&first["code_verifier"]), challenge_of(&presented[1].0));
    }

    #[tokio::test]
    async fn test_talk_cancelled_redirect_is_cancelled_error() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );

        let controller = f.controller.clone();
        let attempt =
            tokio::spawn(async move { controller.authorize_with_talk(TalkAuthOptions::default()).await });

        wait_for_launches(&f.opener, 1).await;
        assert!(f.controller.handle_open_url("kakaoappkey://oauth?error=cancelled"));

        let err = attempt.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_auth_failed());
        assert_eq!(f.controller.state(), AuthState::Failed);
        assert!(f.http.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_universal_link_failure_retries_with_custom_scheme() {
        let f = fixture(
            MockUrlOpener::with_results(&[false, false]),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );

        let err = f
            .controller
            .authorize_with_talk(TalkAuthOptions {
                launch_method: Some(LaunchMethod::UniversalLink),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.client_reason(), Some(ClientFailureReason::NotSupported));
        assert!(err.to_string().contains("CustomScheme retry"));

        let opened = f.opener.opened.lock().await;
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[0].scheme(), "https");
        assert_eq!(opened[1].scheme(), "kakaokompassauth");
        let retry_query: HashMap<String, String> = opened[1].query_pairs().into_owned().collect();
        assert_eq!(retry_query["deep_link_method"], "universal_link,uri_scheme");

        drop(opened);
        assert!(!f.controller.handle_open_url("kakaoappkey://oauth?code=LATE"));
    }

    #[tokio::test]
    async fn test_universal_link_retry_success_awaits_redirect() {
        let f = fixture(
            MockUrlOpener::with_results(&[false, true]),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );
        f.http.push(200, token_body("A1")).await;

        let controller = f.controller.clone();
        let attempt = tokio::spawn(async move {
            controller
                .authorize_with_talk(TalkAuthOptions {
                    launch_method: Some(LaunchMethod::UniversalLink),
                    ..Default::default()
                })
                .await
        });

        wait_for_launches(&f.opener, 2).await;
        assert!(f.controller.handle_open_url("kakaoappkey://oauth?code=C"));
        assert_eq!(attempt.await.unwrap().unwrap().access_token, "A1");

        let opened = f.opener.opened.lock().await;
        assert_eq!(opened[0].host_str(), Some("talk-apps.kakao.com"));
        assert_eq!(opened[1].scheme(), "kakaokompassauth");
        let challenge = nested_params(&opened[0])["code_challenge"].clone();
        assert!(challenge.is_string());
        assert_eq!(nested_params(&opened[1])["code_challenge"], challenge);
    }

    #[tokio::test]
    async fn test_custom_scheme_failure_is_not_retried() {
        let f = fixture(
            MockUrlOpener::with_results(&[false]),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );

        let err = f
            .controller
            .authorize_with_talk(TalkAuthOptions {
                launch_method: Some(LaunchMethod::CustomScheme),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.client_reason(), Some(ClientFailureReason::NotSupported));
        assert_eq!(f.opener.opened.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_talk_attempt_supersedes_first() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );
        f.http.push(200, token_body("A2")).await;

        let first = {
            let controller = f.controller.clone();
            tokio::spawn(async move { controller.authorize_with_talk(TalkAuthOptions::default()).await })
        };
        wait_for_launches(&f.opener, 1).await;

        let second = {
            let controller = f.controller.clone();
            tokio::spawn(async move { controller.authorize_with_talk(TalkAuthOptions::default()).await })
        };
        wait_for_launches(&f.opener, 2).await;

        let err = first.await.unwrap().unwrap_err();
        assert_eq!(err.client_reason(), Some(ClientFailureReason::IllegalState));

        assert!(f.controller.handle_open_url("kakaoappkey://oauth?code=C2"));
        assert_eq!(second.await.unwrap().unwrap().access_token, "A2");
    }

    #[tokio::test]
    async fn test_foreign_url_is_ignored() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );

        let controller = f.controller.clone();
        let attempt =
            tokio::spawn(async move { controller.authorize_with_talk(TalkAuthOptions::default()).await });
        wait_for_launches(&f.opener, 1).await;

        assert!(!f.controller.handle_open_url("otherapp://oauth?code=X"));
        assert!(f.controller.handle_open_url("kakaoappkey://oauth?state=only"));

        let err = attempt.await.unwrap().unwrap_err();
        assert!(err.is_auth_failed());
    }

    #[tokio::test]
    async fn test_web_session_cancel_and_failure_mapping() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Cancelled)),
        );
        let err = f
            .controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Err(AuthSessionError::Failed("no window".to_string()))),
        );
        let err = f
            .controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.client_reason(), Some(ClientFailureReason::Unknown));
    }

    #[tokio::test]
    async fn test_web_session_is_persistent_without_agt() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Ok("kakaoappkey://oauth?code=W")),
        );
        f.http.push(200, token_body("A1")).await;

        f.controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap();

        let presented = f.session.presented.lock().await;
        assert_eq!(presented[0].1, "kakaoappkey");
        assert!(!presented[0].2);
    }

    #[tokio::test]
    async fn test_consent_flow_uses_agt_and_ephemeral_session() {
        let f = fixture(
            MockUrlOpener::default(),
            MockAuthSession::returning(Ok("kakaoappkey://oauth?code=SC")),
        );
        f.http.push(200, token_body("A1")).await;
        f.controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap();

        f.http.push(200, serde_json::json!({"agt": "AGT"})).await;
        f.http.push(200, token_body("A2")).await;

        let token = f
            .controller
            .request_scopes(vec!["friends".to_string()])
            .await
            .unwrap();
        assert_eq!(token.access_token, "A2");

        let presented = f.session.presented.lock().await;
        let (url, _, ephemeral) = &presented[1];
        assert!(*ephemeral);
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["agt"], "AGT");
        assert_eq!(query["scope"], "friends");
    }

    #[tokio::test]
    async fn test_missing_capabilities_are_not_supported() {
        let http = Arc::new(MockHttpClient::default());
        let config = SdkConfig::builder()
            .app_key("appkey")
            .http_client(http)
            .secure_store(Arc::new(MockSecureStore::default()))
            .build()
            .unwrap();
        let tokens = Arc::new(SecureTokenStore::new(config.secure_store.clone()));
        let controller = AuthController::new(Arc::new(AuthApi::new(Arc::new(config), tokens)));

        let err = controller
            .authorize_with_talk(TalkAuthOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.client_reason(), Some(ClientFailureReason::NotSupported));

        let err = controller
            .authorize_with_web(WebAuthOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.client_reason(), Some(ClientFailureReason::NotSupported));
    }
}
