//! # Authentication Module
//!
//! Identity and credential types shared by the provider engine.
//!
//! ## Overview
//!
//! Provider links carry an access token, its expiry and a refresh token. This
//! crate owns the in-memory form of those credentials and the per-link lock
//! that keeps concurrent callers from refreshing the same token twice.
//!
//! ## Features
//!
//! - [`UserId`] and [`ProviderType`] identifiers
//! - [`AccessToken`] / [`RefreshToken`] with redacted `Debug`
//! - [`RefreshedToken`] as returned by provider token endpoints
//! - [`RefreshLocks`] for per-link single-flight refresh

pub mod error;
pub mod refresh;
pub mod types;

pub use error::{AuthError, Result};
pub use refresh::RefreshLocks;
pub use types::{AccessToken, ProviderType, RefreshToken, RefreshedToken, UserId};
