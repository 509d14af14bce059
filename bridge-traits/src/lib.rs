//! # Host Bridge Traits
//!
//! Capabilities the authentication core consumes but never implements itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the auth core and platform-specific
//! implementations. Each trait is one external collaborator:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`HttpClient`](http::HttpClient) | HTTP executor for token exchanges and authenticated API calls |
//! | [`SecureStore`](storage::SecureStore) | Durable, app-private key-value store backing the token store |
//! | [`UrlOpener`](browser::UrlOpener) | Hands an authorization URL to the companion app |
//! | [`AuthSession`](browser::AuthSession) | Browser-based authorization UI returning a callback URL |
//! | [`LifecycleObserver`](lifecycle::LifecycleObserver) | App activation notifications |
//! | [`Clock`](time::Clock) | Time source for expiry math |
//! | [`LoggerSink`](time::LoggerSink) | Mirrors structured logs into the host |
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | HTTP, secure store, lifecycle |
//! | iOS      | host app            | all traits injected |
//! | Android  | host app            | all traits injected |
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! The auth core surfaces these unchanged as transport errors.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`: HTTP failures are classified
//! concurrently from many in-flight requests.

pub mod browser;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use browser::{AuthSession, AuthSessionError, UrlOpener};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use storage::SecureStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
