//! External App Hand-off and Browser Authorization UI
//!
//! Two capabilities the authorization flow drives but does not implement:
//! opening a URL in another app (the companion app, via custom scheme or
//! universal link) and presenting a browser-based authorization session that
//! ends in a redirect to the app's callback scheme.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Opens URLs outside the current process.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::browser::UrlOpener;
///
/// async fn launch(opener: &dyn UrlOpener, url: &url::Url) -> bool {
///     opener.open(url).await
/// }
/// ```
#[async_trait]
pub trait UrlOpener: Send + Sync {
    /// Ask the OS to open `url`.
    ///
    /// Returns `true` when another app accepted the URL. The outcome of the
    /// hand-off itself arrives later as an inbound redirect.
    async fn open(&self, url: &Url) -> bool;
}

/// Failure modes of a browser authorization session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthSessionError {
    /// The user dismissed the session.
    #[error("authentication session cancelled by user")]
    Cancelled,

    /// The session could not be started or ended abnormally.
    #[error("authentication session failed: {0}")]
    Failed(String),
}

/// Browser-based authorization UI (ASWebAuthenticationSession, Custom Tabs,
/// a loopback browser flow on desktop).
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Present `url` and wait until the browser navigates to a URL using
    /// `callback_scheme`.
    ///
    /// `ephemeral` asks the browser not to share cookies or website data with
    /// the user's regular browsing session.
    async fn present(
        &self,
        url: &Url,
        callback_scheme: &str,
        ephemeral: bool,
    ) -> std::result::Result<Url, AuthSessionError>;
}
