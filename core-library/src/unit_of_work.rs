//! Transactional writes across links and catalog entries.
//!
//! A [`CatalogTransaction`] wraps one SQLite transaction. Dropping it without
//! calling [`commit`](CatalogTransaction::commit) rolls everything back, which
//! is what happens when the owning future is cancelled or times out.

use crate::error::Result;
use crate::models::{CatalogEntry, CatalogEntryId, ProviderLink, ProviderLinkId};
use crate::repositories::catalog_entry::{delete_entries, insert_entries};
use crate::repositories::provider_link::{fetch_link, insert_link, update_link};
use crate::repositories::{LoadOptions, UpdateScope};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

/// Opens catalog transactions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>>;
}

/// Writes that become visible together on commit.
#[async_trait]
pub trait CatalogTransaction: Send {
    async fn insert_link(&mut self, link: &ProviderLink) -> Result<()>;

    /// Take the write lock on the link row, then load the link with its
    /// catalog. Returns `None` if the link does not exist.
    async fn lock_link(&mut self, id: ProviderLinkId) -> Result<Option<ProviderLink>>;

    async fn update_link(&mut self, link: &ProviderLink, scope: UpdateScope) -> Result<()>;

    async fn insert_entries(&mut self, entries: &[CatalogEntry]) -> Result<()>;

    /// Returns the number of entries actually deleted.
    async fn delete_entries(&mut self, ids: &[CatalogEntryId]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// SQLite-backed unit of work
pub struct SqliteUnitOfWork {
    pool: SqlitePool,
}

impl SqliteUnitOfWork {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteCatalogTransaction { tx }))
    }
}

struct SqliteCatalogTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CatalogTransaction for SqliteCatalogTransaction {
    async fn insert_link(&mut self, link: &ProviderLink) -> Result<()> {
        insert_link(&mut self.tx, link).await
    }

    async fn lock_link(&mut self, id: ProviderLinkId) -> Result<Option<ProviderLink>> {
        // A write as the first statement upgrades the deferred transaction to
        // the database write lock before anything is read.
        let touched = sqlx::query("UPDATE provider_links SET updated_at = updated_at WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await?
            .rows_affected();

        if touched == 0 {
            return Ok(None);
        }

        fetch_link(&mut self.tx, id, LoadOptions::with_catalog()).await
    }

    async fn update_link(&mut self, link: &ProviderLink, scope: UpdateScope) -> Result<()> {
        update_link(&mut self.tx, link, scope).await
    }

    async fn insert_entries(&mut self, entries: &[CatalogEntry]) -> Result<()> {
        insert_entries(&mut self.tx, entries).await
    }

    async fn delete_entries(&mut self, ids: &[CatalogEntryId]) -> Result<u64> {
        delete_entries(&mut self.tx, ids).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        debug!("Committed catalog transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        debug!("Rolled back catalog transaction");
        Ok(())
    }
}
