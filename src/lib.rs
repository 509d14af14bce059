//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-auth`, `core-runtime`). Host applications can
//! depend on `kauth-workspace` and enable `desktop-shims` to get the reqwest and
//! keyring adapters injected by default.

pub use core_auth as auth;
pub use core_runtime as runtime;
