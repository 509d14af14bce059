//! Token Storage
//!
//! The current [`OAuthToken`] lives behind the [`TokenManager`] capability.
//! The default implementation, [`SecureTokenStore`], keeps an in-memory copy
//! and persists JSON through the host's [`SecureStore`].
//!
//! ## Security Features
//!
//! - Token values are never logged
//! - Malformed persisted data is deleted and reported as "no token"
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{SecureTokenStore, TokenManager};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>) -> core_auth::Result<()> {
//! let store = SecureTokenStore::new(secure_store);
//!
//! if let Some(token) = store.get().await {
//!     println!("token expires at {}", token.access_expires_at);
//! }
//!
//! store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ClientFailureReason, Result, SdkError};
use crate::token::OAuthToken;
use async_trait::async_trait;
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const TOKEN_STORAGE_KEY: &str = "kakao_sdk_oauth_token";

/// Holder of the current token.
///
/// Implementations serialize access internally: callers never lock, and a
/// `get` racing a `set` returns either the old or the new token.
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Current token. Unreadable or malformed data yields `None`.
    async fn get(&self) -> Option<OAuthToken>;

    async fn set(&self, token: OAuthToken) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

#[derive(Default)]
struct Cached {
    hydrated: bool,
    token: Option<OAuthToken>,
}

/// [`TokenManager`] persisting through a [`SecureStore`].
///
/// The first `get` hydrates the cache from the backend. Writes persist first
/// and swap the cache afterwards, so a failed write leaves the previous token
/// in place.
pub struct SecureTokenStore {
    secure_store: Arc<dyn SecureStore>,
    cache: RwLock<Cached>,
}

impl SecureTokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing SecureTokenStore");
        Self {
            secure_store,
            cache: RwLock::new(Cached::default()),
        }
    }

    async fn load(&self) -> Option<OAuthToken> {
        let data = match self.secure_store.get_secret(TOKEN_STORAGE_KEY).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No token found in storage");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read token from secure storage");
                return None;
            }
        };

        match serde_json::from_slice::<OAuthToken>(&data) {
            Ok(token) => {
                info!(
                    access_expires_at = %token.access_expires_at,
                    refresh_expires_at = %token.refresh_expires_at,
                    "Token loaded from storage"
                );
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "Stored token is malformed, discarding it");
                if let Err(delete_err) = self.secure_store.delete_secret(TOKEN_STORAGE_KEY).await {
                    warn!(error = %delete_err, "Failed to delete malformed token data");
                }
                None
            }
        }
    }
}

#[async_trait]
impl TokenManager for SecureTokenStore {
    async fn get(&self) -> Option<OAuthToken> {
        {
            let cache = self.cache.read().await;
            if cache.hydrated {
                return cache.token.clone();
            }
        }

        let mut cache = self.cache.write().await;
        if !cache.hydrated {
            cache.token = self.load().await;
            cache.hydrated = true;
        }
        cache.token.clone()
    }

    async fn set(&self, token: OAuthToken) -> Result<()> {
        let mut cache = self.cache.write().await;

        let json = serde_json::to_vec(&token).map_err(|e| {
            SdkError::client_with_message(
                ClientFailureReason::CastingFailed,
                format!("Failed to serialize token: {}", e),
            )
        })?;

        self.secure_store
            .set_secret(TOKEN_STORAGE_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist token");
                e
            })?;

        info!(
            access_expires_at = %token.access_expires_at,
            has_scopes = token.scopes.is_some(),
            "Token stored"
        );

        cache.token = Some(token);
        cache.hydrated = true;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut cache = self.cache.write().await;

        self.secure_store
            .delete_secret(TOKEN_STORAGE_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete token");
                e
            })?;

        cache.token = None;
        cache.hydrated = true;
        info!("Token cleared");
        Ok(())
    }
}
