//! Request Retry Coordinator
//!
//! Sends authenticated requests to the API host and recovers two failures
//! locally:
//!
//! - **`InvalidAccessToken` (-401)**: the token is refreshed once and the
//!   request replayed with the new bearer token. Concurrent failures share a
//!   single refresh exchange through the `PendingRefreshQueue`: the first
//!   caller leads the refresh, later callers wait for its outcome and are
//!   resumed in arrival order.
//! - **`InsufficientScope` (-402)** with a required-scope list: the user is
//!   asked for the missing scopes through a [`ConsentFlow`], then the request
//!   is replayed.
//!
//! Every other failure reaches the caller unchanged.
//!
//! ## Locking
//!
//! The queue lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. The leader takes the waiter list and resets the state in one
//! critical section, then resumes waiters outside the lock, so a replay that
//! fails again can open a new refresh cycle.

use crate::api::{classify_failure, decode_response, ApiType, AuthApi, CHECK_ACCESS_TOKEN_PATH};
use crate::error::{ApiFailureReason, ClientFailureReason, Result, SdkError};
use crate::token::OAuthToken;
use async_trait::async_trait;
use bridge_traits::http::{HttpRequest, HttpResponse};
use core_runtime::events::{AuthEvent, EventBus};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Replays allowed for a single call. Each replay may open a new refresh
/// cycle.
pub const MAX_REPLAYS: usize = 3;

/// Interactive re-consent for additional scopes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// Ask the user to grant `scopes` and return the resulting token.
    async fn request_scopes(&self, scopes: Vec<String>) -> Result<OAuthToken>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Refreshing,
}

type Waiter = oneshot::Sender<Result<OAuthToken>>;

/// Refresh single-flight state.
struct PendingRefreshQueue {
    state: QueueState,
    waiters: Vec<Waiter>,
    /// Successful refresh cycles so far
    generation: u64,
}

enum Ticket {
    /// Run the refresh and resolve the waiters
    Leader,
    /// Wait for the running cycle
    Waiter(oneshot::Receiver<Result<OAuthToken>>),
    /// A refresh completed after the failing request was sent
    Refreshed,
}

/// Resets the queue if the leader is dropped mid-refresh. Waiters then see
/// their sender dropped and resolve with `IllegalState`.
struct RefreshCycle<'a> {
    queue: &'a Mutex<PendingRefreshQueue>,
    armed: bool,
}

impl RefreshCycle<'_> {
    fn finish(mut self, succeeded: bool) -> Vec<Waiter> {
        self.armed = false;
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.state = QueueState::Idle;
        if succeeded {
            queue.generation += 1;
        }
        std::mem::take(&mut queue.waiters)
    }
}

impl Drop for RefreshCycle<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Token refresh abandoned, releasing waiters");
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            queue.state = QueueState::Idle;
            queue.waiters.clear();
        }
    }
}

pub struct RequestRetrier {
    api: Arc<AuthApi>,
    events: EventBus,
    consent: Option<Arc<dyn ConsentFlow>>,
    queue: Mutex<PendingRefreshQueue>,
}

impl RequestRetrier {
    pub fn new(api: Arc<AuthApi>, events: EventBus) -> Self {
        Self {
            api,
            events,
            consent: None,
            queue: Mutex::new(PendingRefreshQueue {
                state: QueueState::Idle,
                waiters: Vec::new(),
                generation: 0,
            }),
        }
    }

    /// Enables transparent scope re-consent.
    pub fn with_consent_flow(mut self, consent: Arc<dyn ConsentFlow>) -> Self {
        self.consent = Some(consent);
        self
    }

    fn generation(&self) -> u64 {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    fn join(&self, sent_at: Option<u64>) -> Ticket {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        match queue.state {
            QueueState::Refreshing => {
                let (waiter, outcome) = oneshot::channel();
                queue.waiters.push(waiter);
                debug!(waiters = queue.waiters.len(), "Joined running token refresh");
                Ticket::Waiter(outcome)
            }
            QueueState::Idle if sent_at.is_some_and(|g| g != queue.generation) => Ticket::Refreshed,
            QueueState::Idle => {
                queue.state = QueueState::Refreshing;
                Ticket::Leader
            }
        }
    }

    async fn lead_refresh(&self) -> Result<OAuthToken> {
        let cycle = RefreshCycle {
            queue: &self.queue,
            armed: true,
        };
        self.events.emit_auth(AuthEvent::TokenRefreshing);

        let result = self.api.refresh(None).await;

        let waiters = cycle.finish(result.is_ok());
        info!(
            waiters = waiters.len(),
            succeeded = result.is_ok(),
            "Token refresh finished"
        );
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        match &result {
            Ok(token) => self.events.emit_auth(AuthEvent::TokenRefreshed {
                expires_at: token.access_expires_at,
            }),
            Err(e) => self.events.emit_auth(AuthEvent::AuthError {
                message: e.to_string(),
                recoverable: !e.is_invalid_token_error(),
            }),
        }
        result
    }

    async fn await_refresh(outcome: oneshot::Receiver<Result<OAuthToken>>) -> Result<OAuthToken> {
        outcome.await.unwrap_or_else(|_| {
            Err(SdkError::client_with_message(
                ClientFailureReason::IllegalState,
                "Token refresh was abandoned before completing.",
            ))
        })
    }

    async fn refresh_after_failure(&self, sent_at: u64) -> Result<()> {
        match self.join(Some(sent_at)) {
            Ticket::Leader => self.lead_refresh().await.map(|_| ()),
            Ticket::Waiter(outcome) => Self::await_refresh(outcome).await.map(|_| ()),
            Ticket::Refreshed => {
                debug!("Token already refreshed since the request was sent");
                Ok(())
            }
        }
    }

    /// Refresh the stored token, joining a refresh already in flight.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<OAuthToken> {
        match self.join(None) {
            Ticket::Leader => self.lead_refresh().await,
            Ticket::Waiter(outcome) => Self::await_refresh(outcome).await,
            Ticket::Refreshed => self
                .api
                .tokens()
                .get()
                .await
                .ok_or_else(|| SdkError::client(ClientFailureReason::TokenNotFound)),
        }
    }

    fn is_token_check(request: &HttpRequest) -> bool {
        Url::parse(&request.url)
            .map(|url| url.path() == CHECK_ACCESS_TOKEN_PATH)
            .unwrap_or(false)
    }

    /// Send `request` with the current bearer token.
    ///
    /// Returns the 2xx response. Non-2xx responses become [`SdkError::Api`]
    /// after the recoveries described in the module docs.
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let http = self.api.config().http_client.clone();
        let mut replays = 0;
        let mut consented = false;

        loop {
            let sent_at = self.generation();
            let token = self
                .api
                .tokens()
                .get()
                .await
                .ok_or_else(|| SdkError::client(ClientFailureReason::TokenNotFound))?;

            let response = http
                .execute(request.clone().bearer_token(&token.access_token))
                .await?;
            if response.is_success() {
                return Ok(response);
            }

            let error = classify_failure(&response, ApiType::KApi);
            match error.api_reason() {
                Some(ApiFailureReason::InvalidAccessToken) => {
                    if !token.has_refresh_token() {
                        return Err(SdkError::client(ClientFailureReason::TokenNotFound));
                    }
                    if Self::is_token_check(&request) {
                        return Err(error);
                    }
                    if replays >= MAX_REPLAYS {
                        warn!(replays, "Replay budget exhausted");
                        return Err(error);
                    }
                    debug!(replays, "Access token rejected, refreshing");
                    self.refresh_after_failure(sent_at).await?;
                }
                Some(ApiFailureReason::InsufficientScope) => {
                    let (Some(scopes), Some(consent), false) =
                        (error.required_scopes(), self.consent.as_ref(), consented)
                    else {
                        return Err(error);
                    };
                    consented = true;
                    consent.request_scopes(scopes.to_vec()).await?;
                    info!("Additional scopes granted, replaying request");
                }
                _ => return Err(error),
            }
            replays += 1;
        }
    }

    /// [`execute`](Self::execute) and decode the body as `T`.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.execute(request).await?;
        decode_response(&response, ApiType::KApi)
    }
}
