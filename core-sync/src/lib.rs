//! # Sync & Indexing Module
//!
//! Keeps provider links, their file catalogs and their access tokens in step
//! with the external storage providers.
//!
//! ## Overview
//!
//! - Lists remote files through a [`ProviderAdapter`]
//! - Diffs the listing against the stored catalog ([`reconcile`])
//! - Persists link and catalog changes atomically
//! - Resolves playable URLs, refreshing expired access tokens on the way
//!
//! ## Components
//!
//! - **Adapters** (`adapter`): capability trait implemented per provider, plus
//!   the registry the service selects from
//! - **Reconciler** (`reconciler`): pure add/remove diff keyed by provider file id
//! - **Provider Service** (`service`): link lifecycle and access resolution

pub mod adapter;
pub mod error;
pub mod reconciler;
pub mod service;

pub use adapter::{AdapterError, AdapterRegistry, AdapterResult, ProviderAdapter, RemoteFile};
pub use error::{Result, SyncError};
pub use reconciler::{reconcile, Reconciliation};
pub use service::ProviderService;
