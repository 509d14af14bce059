//! # SDK Configuration Module
//!
//! Provides configuration management for the authentication core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an `SdkConfig`
//! holding the app identity, the service hosts and every host capability the
//! auth flows depend on. Validation is fail-fast: a config that builds is a
//! config the auth core can run with.
//!
//! ## Required Dependencies
//!
//! - `app_key` - the native app key issued by the developer console
//! - `HttpClient` - token exchanges and authenticated calls (desktop default: reqwest)
//! - `SecureStore` - token persistence (desktop default: OS keyring)
//!
//! ## Optional Dependencies
//!
//! - `UrlOpener` - companion app hand-off (talk login)
//! - `AuthSession` - browser authorization UI (web login, scope re-consent)
//! - `LifecycleObserver` - foreground notifications for the token refresher
//! - `Clock` - time source for token expiry (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SdkConfig;
//! use std::sync::Arc;
//!
//! let config = SdkConfig::builder()
//!     .app_key("0123456789abcdef")
//!     .auth_session(Arc::new(MyAuthSession))
//!     .url_opener(Arc::new(MyUrlOpener))
//!     .build()?;
//!
//! assert_eq!(config.redirect_uri, "kakao0123456789abcdef://oauth");
//! # Ok::<(), core_runtime::Error>(())
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AuthSession, Clock, HttpClient, LifecycleObserver, SecureStore, SystemClock, UrlOpener,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Interval between two token validity checks triggered by app activation.
pub const DEFAULT_TOKEN_CHECK_COOL_TIME: Duration = Duration::from_secs(6 * 60 * 60);

/// Service hosts used to build every endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hosts {
    /// API host (user management, token validity check)
    pub kapi: String,
    /// Authorization server host (authorize, token, agt)
    pub kauth: String,
    /// Custom scheme registered by the companion app
    pub talk_auth: String,
    /// Universal link host forwarding to the companion app
    pub universal_link: String,
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            kapi: "kapi.kakao.com".to_string(),
            kauth: "kauth.kakao.com".to_string(),
            talk_auth: "kakaokompassauth".to_string(),
            universal_link: "talk-apps.kakao.com".to_string(),
        }
    }
}

impl Hosts {
    pub fn kapi_url(&self, path: &str) -> String {
        format!("https://{}{}", self.kapi, path)
    }

    pub fn kauth_url(&self, path: &str) -> String {
        format!("https://{}{}", self.kauth, path)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("kapi", &self.kapi),
            ("kauth", &self.kauth),
            ("talk_auth", &self.talk_auth),
            ("universal_link", &self.universal_link),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("Host '{}' cannot be empty", name)));
            }
        }
        Ok(())
    }
}

/// Configuration for the authentication core.
///
/// Use [`SdkConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct SdkConfig {
    pub app_key: String,

    /// Scheme the app registers for inbound redirects (`kakao{app_key}`)
    pub custom_scheme: String,

    /// Redirect URI sent with every authorization request
    pub redirect_uri: String,

    pub hosts: Hosts,

    /// Sent as `approval_type` on authorize and token requests when set
    pub approval_type: Option<String>,

    /// Sent as `ios_bundle_id` on token requests when set
    pub bundle_id: Option<String>,

    /// SDK identification string (`KA` header / `ka` parameter)
    pub ka_header: String,

    pub token_check_cool_time: Duration,

    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub url_opener: Option<Arc<dyn UrlOpener>>,
    pub auth_session: Option<Arc<dyn AuthSession>>,
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SdkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkConfig")
            .field("app_key", &self.app_key)
            .field("custom_scheme", &self.custom_scheme)
            .field("redirect_uri", &self.redirect_uri)
            .field("hosts", &self.hosts)
            .field("approval_type", &self.approval_type)
            .field("bundle_id", &self.bundle_id)
            .field("ka_header", &self.ka_header)
            .field("token_check_cool_time", &self.token_check_cool_time)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field(
                "url_opener",
                &self.url_opener.as_ref().map(|_| "UrlOpener { ... }"),
            )
            .field(
                "auth_session",
                &self.auth_session.as_ref().map(|_| "AuthSession { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .finish()
    }
}

impl SdkConfig {
    /// Creates a new builder for constructing an `SdkConfig`.
    pub fn builder() -> SdkConfigBuilder {
        SdkConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - App key is not empty
    /// - Custom scheme is a valid URL scheme
    /// - Redirect URI parses and uses the custom scheme
    /// - Hosts are not empty
    /// - Token check cool time is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.app_key.trim().is_empty() {
            return Err(Error::Config(
                "App key cannot be empty. Initialize the SDK with the native app key.".to_string(),
            ));
        }

        if !is_valid_scheme(&self.custom_scheme) {
            return Err(Error::Config(format!(
                "Custom scheme '{}' is not a valid URL scheme",
                self.custom_scheme
            )));
        }

        let redirect = Url::parse(&self.redirect_uri)?;
        if redirect.scheme() != self.custom_scheme.to_ascii_lowercase() {
            return Err(Error::Config(format!(
                "Redirect URI '{}' must use the custom scheme '{}'",
                self.redirect_uri, self.custom_scheme
            )));
        }

        self.hosts.validate()?;

        if self.token_check_cool_time.is_zero() {
            return Err(Error::Config(
                "Token check cool time must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

fn default_ka_header() -> String {
    format!(
        "sdk/{} os/rust-{} lang/en",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for token exchange. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack (URLSession/OkHttp)."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for token persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::try_new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Default ReqwestHttpClient could not be created: {}", e),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store(app_key: &str) -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::{KeyringSecureStore, DEFAULT_SERVICE_NAME};

    let store = KeyringSecureStore::with_service_name(format!("{}.{}", DEFAULT_SERVICE_NAME, app_key));
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store(_app_key: &str) -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

/// Builder for constructing [`SdkConfig`] instances.
///
/// Call [`build()`](SdkConfigBuilder::build) once every required value is
/// set. Missing capabilities fall back to desktop defaults when the
/// `desktop-shims` feature is enabled and fail with an actionable message
/// otherwise.
#[derive(Default)]
pub struct SdkConfigBuilder {
    app_key: Option<String>,
    custom_scheme: Option<String>,
    redirect_uri: Option<String>,
    hosts: Option<Hosts>,
    approval_type: Option<String>,
    bundle_id: Option<String>,
    ka_header: Option<String>,
    token_check_cool_time: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    url_opener: Option<Arc<dyn UrlOpener>>,
    auth_session: Option<Arc<dyn AuthSession>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SdkConfigBuilder {
    /// Sets the native app key (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::SdkConfig;
    ///
    /// let builder = SdkConfig::builder().app_key("0123456789abcdef");
    /// ```
    pub fn app_key(mut self, app_key: impl Into<String>) -> Self {
        self.app_key = Some(app_key.into());
        self
    }

    /// Overrides the custom scheme.
    ///
    /// Default: `kakao{app_key}`
    pub fn custom_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.custom_scheme = Some(scheme.into());
        self
    }

    /// Overrides the redirect URI.
    ///
    /// Default: `{custom_scheme}://oauth`
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Points the SDK at different service hosts (sandbox, local mocks).
    pub fn hosts(mut self, hosts: Hosts) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn approval_type(mut self, approval_type: impl Into<String>) -> Self {
        self.approval_type = Some(approval_type.into());
        self
    }

    pub fn bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn ka_header(mut self, ka_header: impl Into<String>) -> Self {
        self.ka_header = Some(ka_header.into());
        self
    }

    /// Sets the minimum interval between activation-triggered token checks.
    ///
    /// Default: 6 hours
    pub fn token_check_cool_time(mut self, cool_time: Duration) -> Self {
        self.token_check_cool_time = Some(cool_time);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the reqwest-based desktop default is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store backing the token store.
    ///
    /// If not provided, the OS keyring is used when the `desktop-shims`
    /// feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the URL opener used to hand off to the companion app.
    ///
    /// Without one, talk login fails with `NotSupported`.
    pub fn url_opener(mut self, opener: Arc<dyn UrlOpener>) -> Self {
        self.url_opener = Some(opener);
        self
    }

    /// Sets the browser authorization session.
    ///
    /// Without one, web login and scope re-consent fail with `NotSupported`.
    pub fn auth_session(mut self, session: Arc<dyn AuthSession>) -> Self {
        self.auth_session = Some(session);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final `SdkConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(SdkConfig)` on success, or an error if:
    /// - The app key is missing
    /// - Required capabilities are missing (HttpClient, SecureStore)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<SdkConfig> {
        let app_key = self.app_key.ok_or_else(|| {
            Error::Config("App key is required. Use .app_key() to set it.".to_string())
        })?;

        let custom_scheme = self
            .custom_scheme
            .unwrap_or_else(|| format!("kakao{}", app_key));
        let redirect_uri = self
            .redirect_uri
            .unwrap_or_else(|| format!("{}://oauth", custom_scheme));

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store(&app_key)?,
        };

        let config = SdkConfig {
            app_key,
            custom_scheme,
            redirect_uri,
            hosts: self.hosts.unwrap_or_default(),
            approval_type: self.approval_type,
            bundle_id: self.bundle_id,
            ka_header: self.ka_header.unwrap_or_else(default_ka_header),
            token_check_cool_time: self
                .token_check_cool_time
                .unwrap_or(DEFAULT_TOKEN_CHECK_COOL_TIME),
            http_client,
            secure_store,
            url_opener: self.url_opener,
            auth_session: self.auth_session,
            lifecycle_observer: self.lifecycle_observer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
