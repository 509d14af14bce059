//! # Authentication Module
//!
//! OAuth 2.0 sign-in for Kakao apps with PKCE, token persistence and
//! transparent token refresh.
//!
//! ## Overview
//!
//! The user authorizes either through the KakaoTalk companion app or through
//! a browser session. Both paths end in an authorization-code exchange whose
//! token is persisted through the host's secure store. API calls sent through
//! the [`RequestRetrier`] are replayed after a refresh when the access token
//! is rejected, and after additional consent when a scope is missing.
//!
//! ## Features
//!
//! - PKCE (`S256`) on every authorization attempt
//! - Companion app hand-off with universal-link to custom-scheme fallback
//! - Browser sessions, ephemeral for scope re-consent
//! - Single-flight token refresh shared by concurrent callers
//! - Token validity check when the app becomes active
//! - Auth state event emission

pub mod api;
pub mod controller;
pub mod error;
pub mod manager;
pub mod params;
pub mod pkce;
pub mod redirect;
pub mod refresher;
pub mod retrier;
pub mod token;
pub mod token_store;

pub use api::AuthApi;
pub use controller::{AuthController, AuthState};
pub use error::{
    ApiFailureReason, AuthErrorInfo, AuthFailureReason, ClientFailureReason, ErrorInfo, Result,
    SdkError,
};
pub use manager::AuthManager;
pub use params::{LaunchMethod, Prompt, TalkAuthOptions, WebAuthOptions};
pub use pkce::PkcePair;
pub use redirect::AuthorizationCode;
pub use refresher::{CheckOutcome, TokenRefresher};
pub use retrier::{ConsentFlow, RequestRetrier};
pub use token::{OAuthToken, TokenResponse};
pub use token_store::{SecureTokenStore, TokenManager};
