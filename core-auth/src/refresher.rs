//! Token validity check on app activation
//!
//! When the host app comes to the foreground and no successful check happened
//! within the configured cool time, the stored access token is checked
//! against the API host. A rejected token is refreshed through the
//! [`RequestRetrier`], so the refresh joins any cycle already in flight.

use crate::api::AuthApi;
use crate::error::Result;
use crate::retrier::RequestRetrier;
use bridge_traits::lifecycle::{LifecycleObserver, LifecycleState};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What an activation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No stored token, or the cool time has not elapsed
    Skipped,
    Valid,
    /// The token was rejected and refreshed
    Refreshed,
}

pub struct TokenRefresher {
    api: Arc<AuthApi>,
    retrier: Arc<RequestRetrier>,
    last_checked: Mutex<Option<DateTime<Utc>>>,
}

impl TokenRefresher {
    pub fn new(api: Arc<AuthApi>, retrier: Arc<RequestRetrier>) -> Self {
        Self {
            api,
            retrier,
            last_checked: Mutex::new(None),
        }
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self
            .last_checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cool_time_elapsed(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_checked() else {
            return true;
        };
        match (now - last).to_std() {
            Ok(elapsed) => elapsed >= self.api.config().token_check_cool_time,
            // clock moved backwards
            Err(_) => true,
        }
    }

    /// Handle one foreground transition.
    #[instrument(skip(self))]
    pub async fn on_became_active(&self) -> Result<CheckOutcome> {
        let now = self.api.config().clock.now();
        if !self.cool_time_elapsed(now) {
            debug!("Token checked recently, skipping");
            return Ok(CheckOutcome::Skipped);
        }
        if self.api.tokens().get().await.is_none() {
            debug!("No token to check");
            return Ok(CheckOutcome::Skipped);
        }

        let outcome = match self.api.check_access_token().await {
            Ok(()) => CheckOutcome::Valid,
            Err(e) if e.is_invalid_token_error() => {
                info!("Stored access token rejected, refreshing");
                self.retrier.refresh_token().await?;
                CheckOutcome::Refreshed
            }
            Err(e) => {
                warn!(error = %e, "Token validity check failed");
                return Err(e);
            }
        };

        *self
            .last_checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.api.config().clock.now());
        Ok(outcome)
    }

    /// Run [`on_became_active`](Self::on_became_active) on every foreground
    /// transition reported by `observer` until its stream closes.
    pub fn spawn(self: Arc<Self>, observer: Arc<dyn LifecycleObserver>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut changes = match observer.subscribe_changes().await {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(error = %e, "Lifecycle notifications unavailable, token checks disabled");
                    return;
                }
            };

            while let Some(state) = changes.next().await {
                if state != LifecycleState::Foreground {
                    continue;
                }
                if let Err(e) = self.on_became_active().await {
                    warn!(error = %e, "Token check on activation failed");
                }
            }
            debug!("Lifecycle stream closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientFailureReason;
    use crate::token::{OAuthToken, TokenResponse};
    use crate::token_store::{SecureTokenStore, TokenManager};
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::lifecycle::LifecycleChangeStream;
    use bridge_traits::{Clock, HttpClient, HttpRequest, HttpResponse, ManualClock, SecureStore};
    use chrono::{Duration, TimeZone};
    use core_runtime::config::SdkConfig;
    use core_runtime::events::EventBus;
    use std::collections::{HashMap, VecDeque};
    use tokio::sync::{mpsc, Mutex as AsyncMutex};

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
        urls: AsyncMutex<Vec<String>>,
    }

    impl MockHttpClient {
        async fn push(&self, status: u16, body: &str) {
            self.responses
                .lock()
                .await
                .push_back(HttpResponse::new(status, body.to_string()));
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.urls.lock().await.push(request.url.clone());
            Ok(self
                .responses
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(500, "no response queued")))
        }
    }

    struct ChannelObserver {
        receiver: AsyncMutex<Option<mpsc::UnboundedReceiver<LifecycleState>>>,
    }

    struct ChannelStream(mpsc::UnboundedReceiver<LifecycleState>);

    #[async_trait]
    impl LifecycleChangeStream for ChannelStream {
        async fn next(&mut self) -> Option<LifecycleState> {
            self.0.recv().await
        }
    }

    #[async_trait]
    impl LifecycleObserver for ChannelObserver {
        async fn get_state(&self) -> BridgeResult<LifecycleState> {
            Ok(LifecycleState::Foreground)
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn LifecycleChangeStream>> {
            let receiver = self.receiver.lock().await.take().ok_or_else(|| {
                bridge_traits::BridgeError::NotAvailable("already subscribed".to_string())
            })?;
            Ok(Box::new(ChannelStream(receiver)))
        }
    }

    struct Fixture {
        refresher: Arc<TokenRefresher>,
        http: Arc<MockHttpClient>,
        tokens: Arc<SecureTokenStore>,
        clock: Arc<ManualClock>,
    }

    async fn fixture(with_token: bool) -> Fixture {
        let http = Arc::new(MockHttpClient::default());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
        ));
        let config = SdkConfig::builder()
            .app_key("appkey")
            .http_client(http.clone())
            .secure_store(Arc::new(MockSecureStore::default()))
            .clock(clock.clone())
            .build()
            .unwrap();
        let tokens = Arc::new(SecureTokenStore::new(config.secure_store.clone()));
        if with_token {
            let response: TokenResponse = serde_json::from_str(
                r#"{"access_token":"A1","expires_in":43199,"token_type":"bearer","refresh_token":"R1","refresh_token_expires_in":5183999}"#,
            )
            .unwrap();
            tokens
                .set(OAuthToken::issued(response, clock.now()).unwrap())
                .await
                .unwrap();
        }

        let api = Arc::new(AuthApi::new(Arc::new(config), tokens.clone()));
        let retrier = Arc::new(RequestRetrier::new(api.clone(), EventBus::new(8)));
        Fixture {
            refresher: Arc::new(TokenRefresher::new(api, retrier)),
            http,
            tokens,
            clock,
        }
    }

    #[tokio::test]
    async fn test_check_respects_cool_time() {
        let f = fixture(true).await;
        f.http.push(200, r#"{"id":1,"expires_in":40000}"#).await;

        assert_eq!(f.refresher.on_became_active().await.unwrap(), CheckOutcome::Valid);
        assert_eq!(f.refresher.last_checked(), Some(f.clock.now()));

        f.clock.advance(Duration::hours(5));
        assert_eq!(f.refresher.on_became_active().await.unwrap(), CheckOutcome::Skipped);
        assert_eq!(f.http.urls.lock().await.len(), 1);

        f.clock.advance(Duration::hours(1));
        f.http.push(200, r#"{"id":1}"#).await;
        assert_eq!(f.refresher.on_became_active().await.unwrap(), CheckOutcome::Valid);
        assert_eq!(f.http.urls.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed() {
        let f = fixture(true).await;
        f.http.push(401, r#"{"code":-401,"msg":"expired"}"#).await;
        f.http
            .push(200, r#"{"access_token":"A2","expires_in":43199,"token_type":"bearer"}"#)
            .await;

        assert_eq!(
            f.refresher.on_became_active().await.unwrap(),
            CheckOutcome::Refreshed
        );
        assert_eq!(f.tokens.get().await.unwrap().access_token, "A2");

        let urls = f.http.urls.lock().await;
        assert!(urls[0].ends_with("/v1/user/check_access_token"));
        assert!(urls[1].ends_with("/oauth/token"));
    }

    #[tokio::test]
    async fn test_failed_check_is_retried_next_activation() {
        let f = fixture(true).await;
        f.http.push(500, r#"{"code":-1,"msg":"internal"}"#).await;

        assert!(f.refresher.on_became_active().await.is_err());
        assert!(f.refresher.last_checked().is_none());

        f.http.push(200, r#"{"id":1}"#).await;
        assert_eq!(f.refresher.on_became_active().await.unwrap(), CheckOutcome::Valid);
    }

    #[tokio::test]
    async fn test_no_token_skips_check() {
        let f = fixture(false).await;

        assert_eq!(f.refresher.on_became_active().await.unwrap(), CheckOutcome::Skipped);
        assert!(f.http.urls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_reported() {
        let f = fixture(true).await;
        f.http.push(401, r#"{"code":-401,"msg":"expired"}"#).await;
        f.http.push(400, r#"{"error":"invalid_grant"}"#).await;

        let err = f.refresher.on_became_active().await.unwrap_err();
        assert!(err.is_invalid_token_error());
        assert!(f.tokens.get().await.is_none());
        assert_ne!(err.client_reason(), Some(ClientFailureReason::TokenNotFound));
    }

    #[tokio::test]
    async fn test_spawned_task_checks_on_foreground_only() {
        let f = fixture(true).await;
        f.http.push(200, r#"{"id":1}"#).await;

        let (sender, receiver) = mpsc::unbounded_channel();
        let observer = Arc::new(ChannelObserver {
            receiver: AsyncMutex::new(Some(receiver)),
        });
        let handle = f.refresher.clone().spawn(observer);

        sender.send(LifecycleState::Background).unwrap();
        sender.send(LifecycleState::Foreground).unwrap();
        drop(sender);
        handle.await.unwrap();

        assert_eq!(f.http.urls.lock().await.len(), 1);
        assert!(f.refresher.last_checked().is_some());
    }
}
