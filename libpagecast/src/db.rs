//! Database operations for Pagecast
//!
//! A single append-mostly table of [`ScheduledEntry`] rows. Submissions only
//! ever insert; the dispatcher updates status and timestamps of existing
//! rows.

use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite};
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{Credential, EntryStatus, MediaKind, ScheduledEntry};

const ENTRY_COLUMNS: &str = "id, submission_id, platform_content_id, message, scheduled_at, \
     delete_at, target_id, target_credential, media_reference, media_file_name, \
     media_content_type, media_kind, status, created_at, posted_at, deleted_at, error_message";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a single entry
    pub async fn create_entry(&self, entry: &ScheduledEntry) -> Result<()> {
        insert_query(entry)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Insert many entries in one transaction
    ///
    /// Either every entry is stored or, on any failure, none is.
    pub async fn create_entries(&self, entries: &[ScheduledEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        for entry in entries {
            insert_query(entry)
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Get an entry by ID
    pub async fn get_entry(&self, id: &str) -> Result<Option<ScheduledEntry>> {
        let query = format!("SELECT {} FROM scheduled_entries WHERE id = ?", ENTRY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Pending entries whose scheduled time has arrived, oldest first
    pub async fn get_due_entries(&self, now: i64) -> Result<Vec<ScheduledEntry>> {
        let query = format!(
            r#"
            SELECT {} FROM scheduled_entries
            WHERE status = 'pending' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC, created_at ASC, rowid ASC
            "#,
            ENTRY_COLUMNS
        );
        self.fetch_entries(sqlx::query(&query).bind(now)).await
    }

    /// Posted entries past their deletion time that haven't been deleted yet
    pub async fn get_expired_entries(&self, now: i64) -> Result<Vec<ScheduledEntry>> {
        let query = format!(
            r#"
            SELECT {} FROM scheduled_entries
            WHERE status = 'posted'
              AND delete_at IS NOT NULL AND delete_at <= ?
              AND deleted_at IS NULL
              AND platform_content_id IS NOT NULL
            ORDER BY delete_at ASC, rowid ASC
            "#,
            ENTRY_COLUMNS
        );
        self.fetch_entries(sqlx::query(&query).bind(now)).await
    }

    /// Entries created by one submission, in insertion order
    pub async fn get_submission_entries(&self, submission_id: &str) -> Result<Vec<ScheduledEntry>> {
        let query = format!(
            "SELECT {} FROM scheduled_entries WHERE submission_id = ? ORDER BY rowid ASC",
            ENTRY_COLUMNS
        );
        self.fetch_entries(sqlx::query(&query).bind(submission_id)).await
    }

    /// List entries, optionally filtered by status, soonest first
    pub async fn list_entries(
        &self,
        status: Option<EntryStatus>,
        limit: usize,
    ) -> Result<Vec<ScheduledEntry>> {
        let mut query_str = format!("SELECT {} FROM scheduled_entries", ENTRY_COLUMNS);
        if status.is_some() {
            query_str.push_str(" WHERE status = ?");
        }
        query_str.push_str(" ORDER BY scheduled_at ASC, rowid ASC LIMIT ?");

        let mut query = sqlx::query(&query_str);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        query = query.bind(limit as i64);

        self.fetch_entries(query).await
    }

    /// Record a successful publish
    pub async fn mark_posted(&self, id: &str, platform_content_id: &str, posted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_entries
            SET status = 'posted', platform_content_id = ?, posted_at = ?, error_message = NULL
            WHERE id = ?
            "#,
        )
        .bind(platform_content_id)
        .bind(posted_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed publish
    pub async fn mark_failed(&self, id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_entries SET status = 'failed', error_message = ? WHERE id = ?
            "#,
        )
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Record that the platform content of an entry was deleted
    pub async fn mark_deleted(&self, id: &str, deleted_at: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scheduled_entries SET deleted_at = ? WHERE id = ?
            "#,
        )
        .bind(deleted_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Pending entries still referring to a stored media file
    pub async fn count_pending_for_media(&self, media_reference: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS pending FROM scheduled_entries
            WHERE media_reference = ? AND status = 'pending'
            "#,
        )
        .bind(media_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.get("pending"))
    }

    async fn fetch_entries<'q>(
        &self,
        query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Result<Vec<ScheduledEntry>> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn insert_query(entry: &ScheduledEntry) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO scheduled_entries (
            id, submission_id, platform_content_id, message, scheduled_at, delete_at,
            target_id, target_credential, media_reference, media_file_name,
            media_content_type, media_kind, status, created_at, posted_at, deleted_at,
            error_message
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.submission_id)
    .bind(&entry.platform_content_id)
    .bind(&entry.message)
    .bind(entry.scheduled_at)
    .bind(entry.delete_at)
    .bind(&entry.target_id)
    .bind(entry.target_credential.expose())
    .bind(&entry.media_reference)
    .bind(&entry.media_file_name)
    .bind(&entry.media_content_type)
    .bind(entry.media_kind.map(|k| k.as_str()))
    .bind(entry.status.as_str())
    .bind(entry.created_at)
    .bind(entry.posted_at)
    .bind(entry.deleted_at)
    .bind(&entry.error_message)
}

fn row_to_entry(r: &SqliteRow) -> Result<ScheduledEntry> {
    let status: String = r.get("status");
    let media_kind: Option<String> = r.get("media_kind");
    let credential: String = r.get("target_credential");

    Ok(ScheduledEntry {
        id: r.get("id"),
        submission_id: r.get("submission_id"),
        platform_content_id: r.get("platform_content_id"),
        message: r.get("message"),
        scheduled_at: r.get("scheduled_at"),
        delete_at: r.get("delete_at"),
        target_id: r.get("target_id"),
        target_credential: Credential::new(credential),
        media_reference: r.get("media_reference"),
        media_file_name: r.get("media_file_name"),
        media_content_type: r.get("media_content_type"),
        media_kind: media_kind
            .as_deref()
            .map(str::parse::<MediaKind>)
            .transpose()?,
        status: status.parse()?,
        created_at: r.get("created_at"),
        posted_at: r.get("posted_at"),
        deleted_at: r.get("deleted_at"),
        error_message: r.get("error_message"),
    })
}
