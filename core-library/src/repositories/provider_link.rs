//! Provider link repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{ProviderLink, ProviderLinkId, ProviderLinkRow};
use crate::repositories::catalog_entry::fetch_entries_by_link;
use async_trait::async_trait;
use core_auth::{ProviderType, UserId};
use sqlx::{query_as, SqliteConnection, SqlitePool};
use tracing::debug;

const SELECT_LINK: &str = r#"
    SELECT id, user_id, provider_type, name, added_at, updated_at,
           access_token, expires_at, refresh_token
    FROM provider_links
"#;

/// What to load alongside a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub include_catalog: bool,
}

impl LoadOptions {
    pub fn with_catalog() -> Self {
        Self {
            include_catalog: true,
        }
    }
}

/// Which columns an update writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Name, timestamps and both tokens
    Full,
    /// Access token and its expiry only
    TokenOnly,
}

/// Provider link repository interface
#[async_trait]
pub trait ProviderLinkRepository: Send + Sync {
    /// Find a link by id, optionally with its catalog
    async fn find_by_id(
        &self,
        id: ProviderLinkId,
        options: LoadOptions,
    ) -> Result<Option<ProviderLink>>;

    /// Find the user's link of `provider_type` named `name`
    async fn find_by_type_and_name(
        &self,
        user_id: UserId,
        provider_type: ProviderType,
        name: &str,
    ) -> Result<Option<ProviderLink>>;

    /// All links of a user, without catalogs
    async fn find_all_by_user(&self, user_id: UserId) -> Result<Vec<ProviderLink>>;

    /// Insert a new link (its catalog is not written)
    ///
    /// # Errors
    /// - `Duplicate` if the user already has a link with that type and name
    /// - `InvalidInput` if validation fails
    async fn insert(&self, link: &ProviderLink) -> Result<()>;

    /// Write the columns selected by `scope`
    ///
    /// # Errors
    /// `NotFound` if no row has the link's id
    async fn update(&self, link: &ProviderLink, scope: UpdateScope) -> Result<()>;

    /// Delete a link owned by `user_id`; its catalog cascades.
    ///
    /// # Returns
    /// - `Ok(true)` if a row was deleted
    /// - `Ok(false)` if the link is absent or owned by someone else
    async fn delete_by_id_and_owner(&self, id: ProviderLinkId, user_id: UserId) -> Result<bool>;
}

/// SQLite implementation of ProviderLinkRepository
pub struct SqliteProviderLinkRepository {
    pool: SqlitePool,
}

impl SqliteProviderLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderLinkRepository for SqliteProviderLinkRepository {
    async fn find_by_id(
        &self,
        id: ProviderLinkId,
        options: LoadOptions,
    ) -> Result<Option<ProviderLink>> {
        let mut conn = self.pool.acquire().await?;
        fetch_link(&mut conn, id, options).await
    }

    async fn find_by_type_and_name(
        &self,
        user_id: UserId,
        provider_type: ProviderType,
        name: &str,
    ) -> Result<Option<ProviderLink>> {
        let sql = format!(
            "{} WHERE user_id = ? AND provider_type = ? AND name = ?",
            SELECT_LINK
        );
        let row = query_as::<_, ProviderLinkRow>(&sql)
            .bind(user_id.to_string())
            .bind(provider_type.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProviderLink::try_from).transpose()
    }

    async fn find_all_by_user(&self, user_id: UserId) -> Result<Vec<ProviderLink>> {
        let sql = format!("{} WHERE user_id = ? ORDER BY added_at, name", SELECT_LINK);
        let rows = query_as::<_, ProviderLinkRow>(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(ProviderLink::try_from).collect()
    }

    async fn insert(&self, link: &ProviderLink) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_link(&mut conn, link).await
    }

    async fn update(&self, link: &ProviderLink, scope: UpdateScope) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_link(&mut conn, link, scope).await
    }

    async fn delete_by_id_and_owner(&self, id: ProviderLinkId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM provider_links WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        debug!(link_id = %id, deleted = result.rows_affected(), "Deleted provider link");
        Ok(result.rows_affected() > 0)
    }
}

// Statements shared with the unit of work, which runs them on a transaction.

pub(crate) async fn fetch_link(
    conn: &mut SqliteConnection,
    id: ProviderLinkId,
    options: LoadOptions,
) -> Result<Option<ProviderLink>> {
    let sql = format!("{} WHERE id = ?", SELECT_LINK);
    let row = query_as::<_, ProviderLinkRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut link = ProviderLink::try_from(row)?;
    if options.include_catalog {
        link.catalog = Some(fetch_entries_by_link(&mut *conn, id).await?);
    }

    Ok(Some(link))
}

pub(crate) async fn insert_link(conn: &mut SqliteConnection, link: &ProviderLink) -> Result<()> {
    link.validate().map_err(|msg| LibraryError::InvalidInput {
        field: "provider_link".to_string(),
        message: msg,
    })?;

    sqlx::query(
        r#"
        INSERT INTO provider_links (
            id, user_id, provider_type, name, added_at, updated_at,
            access_token, expires_at, refresh_token
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(link.id.to_string())
    .bind(link.user_id.to_string())
    .bind(link.provider_type.as_str())
    .bind(&link.name)
    .bind(link.added_at.timestamp())
    .bind(link.updated_at.timestamp())
    .bind(link.access_token.as_bytes())
    .bind(link.expires_at.timestamp())
    .bind(link.refresh_token.as_bytes())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        LibraryError::from_insert(
            e,
            "provider_link",
            format!("{}/{}", link.provider_type.as_str(), link.name),
        )
    })?;

    Ok(())
}

pub(crate) async fn update_link(
    conn: &mut SqliteConnection,
    link: &ProviderLink,
    scope: UpdateScope,
) -> Result<()> {
    let result = match scope {
        UpdateScope::Full => {
            link.validate().map_err(|msg| LibraryError::InvalidInput {
                field: "provider_link".to_string(),
                message: msg,
            })?;

            sqlx::query(
                r#"
                UPDATE provider_links SET
                    name = ?, updated_at = ?, access_token = ?,
                    expires_at = ?, refresh_token = ?
                WHERE id = ?
                "#,
            )
            .bind(&link.name)
            .bind(link.updated_at.timestamp())
            .bind(link.access_token.as_bytes())
            .bind(link.expires_at.timestamp())
            .bind(link.refresh_token.as_bytes())
            .bind(link.id.to_string())
            .execute(&mut *conn)
            .await?
        }
        UpdateScope::TokenOnly => {
            sqlx::query(
                "UPDATE provider_links SET access_token = ?, expires_at = ? WHERE id = ?",
            )
            .bind(link.access_token.as_bytes())
            .bind(link.expires_at.timestamp())
            .bind(link.id.to_string())
            .execute(&mut *conn)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(LibraryError::not_found("provider_link", link.id));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::CatalogEntry;
    use crate::repositories::catalog_entry::insert_entries;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use core_auth::{AccessToken, RefreshToken};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
    }

    fn new_link(user_id: UserId, name: &str) -> ProviderLink {
        ProviderLink::new(
            user_id,
            ProviderType::Dropbox,
            name,
            AccessToken::from("access-1"),
            RefreshToken::from("refresh-1"),
            now() + Duration::hours(4),
            now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);
        let link = new_link(UserId::new(), "Main");

        repo.insert(&link).await.unwrap();

        let found = repo
            .find_by_id(link.id, LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, link.clone().without_catalog());
        assert_eq!(found.access_token.as_str().unwrap(), "access-1");
    }

    #[tokio::test]
    async fn test_find_by_id_with_catalog() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool.clone());
        let link = new_link(UserId::new(), "Main");
        repo.insert(&link).await.unwrap();

        let entries = vec![
            CatalogEntry::new(link.id, "f1", "a.mp3", "/a.mp3", None, 10),
            CatalogEntry::new(link.id, "f2", "b.flac", "/b.flac", None, 20),
        ];
        let mut conn = pool.acquire().await.unwrap();
        insert_entries(&mut conn, &entries).await.unwrap();
        drop(conn);

        let found = repo
            .find_by_id(link.id, LoadOptions::with_catalog())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.catalog().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);
        let user = UserId::new();

        repo.insert(&new_link(user, "Main")).await.unwrap();
        let result = repo.insert(&new_link(user, "Main")).await;
        assert!(matches!(result, Err(LibraryError::Duplicate { .. })));

        // Same name for another user is fine.
        repo.insert(&new_link(UserId::new(), "Main")).await.unwrap();
    }

    #[tokio::test]
    async fn test_find_by_type_and_name() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);
        let user = UserId::new();
        let link = new_link(user, "Music");
        repo.insert(&link).await.unwrap();

        let hit = repo
            .find_by_type_and_name(user, ProviderType::Dropbox, "Music")
            .await
            .unwrap();
        assert_eq!(hit.map(|l| l.id), Some(link.id));

        let miss = repo
            .find_by_type_and_name(user, ProviderType::YandexDisk, "Music")
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_find_all_by_user() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);
        let user = UserId::new();

        repo.insert(&new_link(user, "A")).await.unwrap();
        repo.insert(&new_link(user, "B")).await.unwrap();
        repo.insert(&new_link(UserId::new(), "C")).await.unwrap();

        let links = repo.find_all_by_user(user).await.unwrap();
        let names: Vec<_> = links.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(links.iter().all(|l| l.catalog.is_none()));
    }

    #[tokio::test]
    async fn test_token_only_update_leaves_other_columns() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);
        let link = new_link(UserId::new(), "Main");
        repo.insert(&link).await.unwrap();

        let mut changed = link.clone();
        changed.name = "Renamed".to_string();
        changed.access_token = AccessToken::from("access-2");
        changed.expires_at = now() + Duration::hours(8);
        repo.update(&changed, UpdateScope::TokenOnly).await.unwrap();

        let stored = repo
            .find_by_id(link.id, LoadOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Main");
        assert_eq!(stored.access_token.as_str().unwrap(), "access-2");
        assert_eq!(stored.expires_at, now() + Duration::hours(8));
    }

    #[tokio::test]
    async fn test_update_missing_link_is_not_found() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool);

        let result = repo
            .update(&new_link(UserId::new(), "Ghost"), UpdateScope::Full)
            .await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_requires_owner_and_cascades() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteProviderLinkRepository::new(pool.clone());
        let owner = UserId::new();
        let link = new_link(owner, "Main");
        repo.insert(&link).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        insert_entries(
            &mut conn,
            &[CatalogEntry::new(link.id, "f1", "a.mp3", "/a.mp3", None, 1)],
        )
        .await
        .unwrap();
        drop(conn);

        assert!(!repo
            .delete_by_id_and_owner(link.id, UserId::new())
            .await
            .unwrap());
        assert!(repo.delete_by_id_and_owner(link.id, owner).await.unwrap());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
