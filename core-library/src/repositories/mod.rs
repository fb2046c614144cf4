//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for provider links and their
//! catalog.
//!
//! ## Architecture
//!
//! - Traits define the read/write interface used by the sync service
//! - SQLite implementations hold a `SqlitePool`
//! - Statements are free functions over `&mut SqliteConnection`, so the same
//!   SQL runs on a pooled connection or inside a [`UnitOfWork`](crate::unit_of_work)
//!   transaction

pub mod catalog_entry;
pub mod provider_link;

pub use catalog_entry::{CatalogEntryRepository, SqliteCatalogEntryRepository};
pub use provider_link::{
    LoadOptions, ProviderLinkRepository, SqliteProviderLinkRepository, UpdateScope,
};
