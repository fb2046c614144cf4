//! Catalog entry repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{CatalogEntry, CatalogEntryId, CatalogEntryRow, ProviderLinkId};
use async_trait::async_trait;
use sqlx::{query_as, SqliteConnection, SqlitePool};

const SELECT_ENTRY: &str = r#"
    SELECT id, provider_link_id, file_id, hash, name, path, audio_type, size
    FROM catalog_entries
"#;

/// Catalog entry repository interface
///
/// Entries are written only through a unit of work; this trait is read-only.
#[async_trait]
pub trait CatalogEntryRepository: Send + Sync {
    async fn find_by_id(&self, id: CatalogEntryId) -> Result<Option<CatalogEntry>>;

    /// All entries of a link, ordered by path
    async fn find_by_link(&self, link_id: ProviderLinkId) -> Result<Vec<CatalogEntry>>;

    async fn count_by_link(&self, link_id: ProviderLinkId) -> Result<i64>;
}

/// SQLite implementation of CatalogEntryRepository
pub struct SqliteCatalogEntryRepository {
    pool: SqlitePool,
}

impl SqliteCatalogEntryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogEntryRepository for SqliteCatalogEntryRepository {
    async fn find_by_id(&self, id: CatalogEntryId) -> Result<Option<CatalogEntry>> {
        let sql = format!("{} WHERE id = ?", SELECT_ENTRY);
        let row = query_as::<_, CatalogEntryRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(CatalogEntry::try_from).transpose()
    }

    async fn find_by_link(&self, link_id: ProviderLinkId) -> Result<Vec<CatalogEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch_entries_by_link(&mut conn, link_id).await
    }

    async fn count_by_link(&self, link_id: ProviderLinkId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries WHERE provider_link_id = ?")
                .bind(link_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

pub(crate) async fn fetch_entries_by_link(
    conn: &mut SqliteConnection,
    link_id: ProviderLinkId,
) -> Result<Vec<CatalogEntry>> {
    let sql = format!("{} WHERE provider_link_id = ? ORDER BY path, file_id", SELECT_ENTRY);
    let rows = query_as::<_, CatalogEntryRow>(&sql)
        .bind(link_id.to_string())
        .fetch_all(&mut *conn)
        .await?;

    rows.into_iter().map(CatalogEntry::try_from).collect()
}

pub(crate) async fn insert_entries(
    conn: &mut SqliteConnection,
    entries: &[CatalogEntry],
) -> Result<()> {
    for entry in entries {
        entry.validate().map_err(|msg| LibraryError::InvalidInput {
            field: "catalog_entry".to_string(),
            message: msg,
        })?;

        sqlx::query(
            r#"
            INSERT INTO catalog_entries (
                id, provider_link_id, file_id, hash, name, path, audio_type, size
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.provider_link_id.to_string())
        .bind(&entry.file_id)
        .bind(&entry.hash)
        .bind(&entry.name)
        .bind(&entry.path)
        .bind(entry.audio_type.as_str())
        .bind(entry.size)
        .execute(&mut *conn)
        .await
        .map_err(|e| LibraryError::from_insert(e, "catalog_entry", &entry.file_id))?;
    }

    Ok(())
}

pub(crate) async fn delete_entries(
    conn: &mut SqliteConnection,
    ids: &[CatalogEntryId],
) -> Result<u64> {
    let mut deleted = 0;
    for id in ids {
        deleted += sqlx::query("DELETE FROM catalog_entries WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    Ok(deleted)
}
