//! Workspace entry crate.
//!
//! Re-exports the `core-service` façade so host applications can depend on
//! `cloud-music-core` and pick features without wiring each crate by hand.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
