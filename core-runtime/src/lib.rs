//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the authentication core:
//! - Logging and tracing setup
//! - SDK configuration with fail-fast capability validation
//! - Auth event broadcasting
//!
//! ## Overview
//!
//! Nothing in here knows about OAuth. The auth crate takes an [`SdkConfig`]
//! at construction time and reports state changes through the [`EventBus`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{Hosts, SdkConfig, SdkConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, EventSeverity, EventStream};
