//! # Library Management Module
//!
//! Owns the provider catalog database: provider links, the audio files
//! indexed from them, and the repositories and transactions used to read and
//! change both.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema, migrations and pool setup ([`db`])
//! - Domain models with row mapping ([`models`])
//! - Read repositories for links and entries ([`repositories`])
//! - Atomic link + catalog writes ([`unit_of_work`])

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod unit_of_work;

pub use error::{LibraryError, Result};
pub use models::{AudioType, CatalogEntry, CatalogEntryId, ProviderLink, ProviderLinkId};
pub use repositories::{
    CatalogEntryRepository, LoadOptions, ProviderLinkRepository, SqliteCatalogEntryRepository,
    SqliteProviderLinkRepository, UpdateScope,
};
pub use unit_of_work::{CatalogTransaction, SqliteUnitOfWork, UnitOfWork};
