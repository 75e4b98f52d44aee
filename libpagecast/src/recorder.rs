//! Lifecycle recorder
//!
//! Collects the entries of one submission and stores them together. Entries
//! are validated as they are staged so a malformed entry never reaches the
//! database, and [`LifecycleRecorder::commit`] writes the whole batch in a
//! single transaction.

use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::types::ScheduledEntry;

pub struct LifecycleRecorder<'a> {
    db: &'a Database,
    staged: Vec<ScheduledEntry>,
}

impl<'a> LifecycleRecorder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            staged: Vec::new(),
        }
    }

    /// Validate and stage an entry, returning its id
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` if the entry breaks a record
    /// invariant. Nothing is staged in that case.
    pub fn create(&mut self, entry: ScheduledEntry) -> Result<String> {
        entry.validate()?;
        let id = entry.id.clone();
        self.staged.push(entry);
        Ok(id)
    }

    /// Number of entries waiting for [`commit`](Self::commit)
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Store every staged entry atomically
    ///
    /// Returns the number of entries written. On error nothing is stored.
    pub async fn commit(self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        self.db.create_entries(&self.staged).await?;
        debug!("Committed {} lifecycle entries", self.staged.len());
        Ok(self.staged.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagecastError;
    use crate::types::{EntryMedia, MediaKind, Target};
    use tempfile::TempDir;

    async fn setup_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_commit_stores_all_entries() {
        let (_dir, db) = setup_db().await;
        let target = Target::new("1001", "token");

        let mut recorder = LifecycleRecorder::new(&db);
        let first = recorder
            .create(ScheduledEntry::pending("sub", &target, Some("hi"), None, 100, Some(200)))
            .unwrap();
        recorder
            .create(ScheduledEntry::pending(
                "sub",
                &target,
                None,
                Some(EntryMedia {
                    reference: "/media/a.mp4",
                    file_name: "a.mp4",
                    content_type: "video/mp4",
                    kind: MediaKind::Reel,
                }),
                100,
                None,
            ))
            .unwrap();
        assert_eq!(recorder.staged_len(), 2);

        assert_eq!(recorder.commit().await.unwrap(), 2);
        assert!(db.get_entry(&first).await.unwrap().is_some());
        assert_eq!(db.get_submission_entries("sub").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_entry_is_rejected_before_storage() {
        let (_dir, db) = setup_db().await;
        let target = Target::new("1001", "token");

        let mut recorder = LifecycleRecorder::new(&db);
        let result = recorder.create(ScheduledEntry::pending("sub", &target, None, None, 100, None));
        assert!(matches!(result, Err(PagecastError::InvalidInput(_))));
        assert_eq!(recorder.staged_len(), 0);

        assert_eq!(recorder.commit().await.unwrap(), 0);
        assert!(db.list_entries(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_with_bad_row_stores_nothing() {
        let (_dir, db) = setup_db().await;
        let target = Target::new("1001", "token");

        let mut recorder = LifecycleRecorder::new(&db);
        recorder
            .create(ScheduledEntry::pending("sub", &target, Some("ok"), None, 100, None))
            .unwrap();
        let duplicate = ScheduledEntry::pending("sub", &target, Some("dup"), None, 100, None);
        recorder.create(duplicate.clone()).unwrap();
        // Same primary key twice makes the insert fail halfway through
        recorder.create(duplicate).unwrap();

        assert!(recorder.commit().await.is_err());
        assert!(db.list_entries(None, 10).await.unwrap().is_empty());
    }
}
