//! # Dropbox Provider
//!
//! Implements `ProviderAdapter` for the Dropbox HTTP API v2.
//!
//! ## Overview
//!
//! This crate provides:
//! - Recursive file listing of the linked account with cursor paging
//! - Temporary download links as playable URLs
//! - Access token renewal through the OAuth 2.0 refresh grant

pub mod connector;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use error::{DropboxError, Result};
