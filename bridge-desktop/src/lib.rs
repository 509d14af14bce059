//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//! - `LifecycleObserver` as always-foreground
//!
//! Desktop has no companion app to hand off to and no embedded web
//! authentication session, so `UrlOpener` and `AuthSession` are left to the
//! host application.
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::try_new()?);
//! let store = Arc::new(KeyringSecureStore::with_service_name("my-app"));
//! ```

mod http;
mod lifecycle;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopLifecycleObserver;

#[cfg(feature = "secure-store")]
pub use secure_store::{KeyringSecureStore, DEFAULT_SERVICE_NAME};
