//! # Authentication Manager
//!
//! Single entry point wiring the auth components together for one app key.
//!
//! ## Overview
//!
//! `AuthManager` owns one instance of each component and hands them out by
//! reference. Construct it once at process start and share it.
//!
//! ```text
//! SdkConfig ──> SecureTokenStore ──> AuthApi ──┬──> AuthController
//!                                              ├──> RequestRetrier (consent: AuthController)
//!                                              └──> TokenRefresher
//! ```
//!
//! Sign-in, refresh and sign-out are published on the [`EventBus`].
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, TalkAuthOptions};
//! use core_runtime::config::SdkConfig;
//! use core_runtime::events::EventBus;
//!
//! # async fn example(config: SdkConfig) -> core_auth::Result<()> {
//! let manager = AuthManager::new(config, EventBus::default());
//!
//! // The host forwards inbound URLs to `manager.handle_open_url(..)`.
//! let token = manager.login_with_talk(TalkAuthOptions::default()).await?;
//! println!("signed in, scopes: {:?}", token.scopes);
//! # Ok(())
//! # }
//! ```

use crate::api::{AuthApi, LOGOUT_PATH, UNLINK_PATH};
use crate::controller::AuthController;
use crate::error::Result;
use crate::params::{TalkAuthOptions, WebAuthOptions};
use crate::redirect::is_valid_redirect_uri;
use crate::refresher::TokenRefresher;
use crate::retrier::RequestRetrier;
use crate::token::OAuthToken;
use crate::token_store::{SecureTokenStore, TokenManager};
use bridge_traits::http::{HttpMethod, HttpRequest};
use core_runtime::config::SdkConfig;
use core_runtime::events::{AuthEvent, EventBus};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

pub struct AuthManager {
    config: Arc<SdkConfig>,
    tokens: Arc<dyn TokenManager>,
    api: Arc<AuthApi>,
    controller: Arc<AuthController>,
    retrier: Arc<RequestRetrier>,
    refresher: Arc<TokenRefresher>,
    event_bus: EventBus,
}

impl AuthManager {
    /// Creates a manager persisting tokens through the config's secure store.
    pub fn new(config: SdkConfig, event_bus: EventBus) -> Self {
        let tokens: Arc<dyn TokenManager> =
            Arc::new(SecureTokenStore::new(config.secure_store.clone()));
        Self::with_token_manager(config, tokens, event_bus)
    }

    /// Creates a manager around a custom [`TokenManager`].
    pub fn with_token_manager(
        config: SdkConfig,
        tokens: Arc<dyn TokenManager>,
        event_bus: EventBus,
    ) -> Self {
        let config = Arc::new(config);
        let api = Arc::new(AuthApi::new(config.clone(), tokens.clone()));
        let controller = Arc::new(AuthController::new(api.clone()));
        let retrier = Arc::new(
            RequestRetrier::new(api.clone(), event_bus.clone()).with_consent_flow(controller.clone()),
        );
        let refresher = Arc::new(TokenRefresher::new(api.clone(), retrier.clone()));

        info!(app_key = %config.app_key, redirect_uri = %config.redirect_uri, "AuthManager initialized");

        Self {
            config,
            tokens,
            api,
            controller,
            retrier,
            refresher,
            event_bus,
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<AuthApi> {
        &self.api
    }

    pub fn controller(&self) -> &Arc<AuthController> {
        &self.controller
    }

    /// Coordinator to send authenticated API calls through.
    pub fn retrier(&self) -> &Arc<RequestRetrier> {
        &self.retrier
    }

    pub fn refresher(&self) -> &Arc<TokenRefresher> {
        &self.refresher
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    fn report(&self, result: &Result<OAuthToken>) {
        match result {
            Ok(token) => self.event_bus.emit_auth(AuthEvent::SignedIn {
                scopes: token.scopes.clone(),
            }),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.event_bus.emit_auth(AuthEvent::AuthError {
                message: e.to_string(),
                recoverable: true,
            }),
        }
    }

    /// Sign in through the companion app.
    #[instrument(skip(self, options))]
    pub async fn login_with_talk(&self, options: TalkAuthOptions) -> Result<OAuthToken> {
        self.event_bus.emit_auth(AuthEvent::SigningIn {
            transport: "talk".to_string(),
        });
        let result = self.controller.authorize_with_talk(options).await;
        self.report(&result);
        result
    }

    /// Sign in through a browser session.
    #[instrument(skip(self, options))]
    pub async fn login_with_web(&self, options: WebAuthOptions) -> Result<OAuthToken> {
        self.event_bus.emit_auth(AuthEvent::SigningIn {
            transport: "web".to_string(),
        });
        let result = self.controller.authorize_with_web(options).await;
        self.report(&result);
        result
    }

    /// Forward an inbound URL. Returns `true` when it completed a pending
    /// companion-app sign-in.
    pub fn handle_open_url(&self, url: &str) -> bool {
        self.controller.handle_open_url(url)
    }

    pub fn is_valid_redirect_uri(&self, url: &str) -> bool {
        is_valid_redirect_uri(url, &self.config.redirect_uri)
    }

    pub async fn has_token(&self) -> bool {
        self.tokens.get().await.is_some()
    }

    pub async fn token(&self) -> Option<OAuthToken> {
        self.tokens.get().await
    }

    /// Refresh now, joining a refresh already in flight.
    pub async fn refresh_token(&self) -> Result<OAuthToken> {
        self.retrier.refresh_token().await
    }

    /// Start checking the token on app activation.
    ///
    /// Returns `None` when the config has no lifecycle observer.
    pub fn start_token_refresher(&self) -> Option<JoinHandle<()>> {
        let observer = self.config.lifecycle_observer.clone()?;
        Some(self.refresher.clone().spawn(observer))
    }

    /// Expire the token on the server and clear it locally.
    ///
    /// The local token is cleared whether or not the server call succeeds.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.hosts.kapi_url(LOGOUT_PATH));
        let result = self.retrier.execute(request).await.map(|_| ());
        if let Err(e) = &result {
            warn!(error = %e, "Logout request failed, clearing local token anyway");
        }

        self.tokens.clear().await?;
        self.event_bus.emit_auth(AuthEvent::SignedOut);
        info!("Signed out");
        result
    }

    /// Disconnect the user from the app. The local token is cleared only
    /// when the server accepts the request.
    #[instrument(skip(self))]
    pub async fn unlink(&self) -> Result<()> {
        let request = HttpRequest::new(HttpMethod::Post, self.config.hosts.kapi_url(UNLINK_PATH));
        self.retrier.execute(request).await?;

        self.tokens.clear().await?;
        self.event_bus.emit_auth(AuthEvent::SignedOut);
        info!("Unlinked");
        Ok(())
    }
}
