use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{upload_key, UploadRecord, UploadStatus};
use super::tables::*;

impl Database {
    // ========================================================================
    // Upload operations
    // ========================================================================

    /// Store an upload record, keeping the pending index in step with its status
    pub fn put_upload(&self, upload: &UploadRecord) -> Result<(), DatabaseError> {
        debug_assert!(!upload.owner_id.is_empty(), "owner id must not be empty");
        debug_assert!(
            !upload.file_identifier.is_empty(),
            "file identifier must not be empty"
        );

        let key = upload.key();
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(UPLOADS)?;
            let data = rmp_serde::to_vec_named(upload)?;
            table.insert(key.as_str(), data.as_slice())?;

            let mut pending = write_txn.open_table(PENDING_UPLOADS)?;
            if upload.status == UploadStatus::Processing {
                pending.insert(key.as_str(), upload.created_at.timestamp_millis())?;
            } else {
                pending.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Store a new upload unless its identifier is already taken for this owner.
    ///
    /// The existence check and the insert share one write transaction. Returns
    /// `Ok(false)` on a collision, leaving the existing record untouched.
    pub fn insert_upload(&self, upload: &UploadRecord) -> Result<bool, DatabaseError> {
        let key = upload.key();
        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(UPLOADS)?;
            let taken = table.get(key.as_str())?.is_some();
            if !taken {
                let data = rmp_serde::to_vec_named(upload)?;
                table.insert(key.as_str(), data.as_slice())?;

                if upload.status == UploadStatus::Processing {
                    let mut pending = write_txn.open_table(PENDING_UPLOADS)?;
                    pending.insert(key.as_str(), upload.created_at.timestamp_millis())?;
                }
            }
            !taken
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Get an upload by owner and identifier
    pub fn get_upload(
        &self,
        owner_id: &str,
        file_identifier: &str,
    ) -> Result<Option<UploadRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADS)?;

        match table.get(upload_key(owner_id, file_identifier).as_str())? {
            Some(data) => {
                let upload: UploadRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(upload))
            }
            None => Ok(None),
        }
    }

    /// Check whether an identifier is already taken for this owner, in any status
    pub fn upload_exists(&self, owner_id: &str, file_identifier: &str) -> Result<bool, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADS)?;
        Ok(table
            .get(upload_key(owner_id, file_identifier).as_str())?
            .is_some())
    }

    /// Move a PROCESSING upload to a terminal status.
    ///
    /// Read and write happen in one redb write transaction, so concurrent callers
    /// (worker and reaper) are serialized and only the first one wins. Returns
    /// `Ok(false)` when the record is missing or already terminal.
    pub fn finish_upload(
        &self,
        owner_id: &str,
        file_identifier: &str,
        status: UploadStatus,
    ) -> Result<bool, DatabaseError> {
        let key = upload_key(owner_id, file_identifier);
        if !status.is_terminal() {
            return Err(DatabaseError::InvalidTransition {
                key,
                from: UploadStatus::Processing,
                to: status,
            });
        }

        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(UPLOADS)?;
            let result = match table.get(key.as_str())? {
                Some(data) => {
                    let upload: UploadRecord = rmp_serde::from_slice(data.value())?;
                    Some(upload)
                }
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut upload) if upload.status.can_transition_to(status) => {
                upload.status = status;
                upload.finished_at = Some(Utc::now());

                let serialized = rmp_serde::to_vec_named(&upload)?;
                let mut table = write_txn.open_table(UPLOADS)?;
                table.insert(key.as_str(), serialized.as_slice())?;

                let mut pending = write_txn.open_table(PENDING_UPLOADS)?;
                pending.remove(key.as_str())?;
                true
            }
            _ => false,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// PROCESSING uploads created before `cutoff`, oldest first, at most `limit`
    pub fn find_stale_uploads(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UploadRecord>, DatabaseError> {
        let cutoff_ms = cutoff.timestamp_millis();
        let read_txn = self.begin_read()?;
        let pending = read_txn.open_table(PENDING_UPLOADS)?;
        let uploads = read_txn.open_table(UPLOADS)?;

        let mut stale: Vec<(i64, String)> = Vec::new();
        for result in pending.iter()? {
            let (key, created_ms) = result?;
            let created_ms = created_ms.value();
            if created_ms < cutoff_ms {
                stale.push((created_ms, key.value().to_string()));
            }
        }
        stale.sort();

        let mut records = Vec::new();
        for (_, key) in stale.into_iter().take(limit) {
            if let Some(data) = uploads.get(key.as_str())? {
                let upload: UploadRecord = rmp_serde::from_slice(data.value())?;
                if upload.status == UploadStatus::Processing {
                    records.push(upload);
                }
            }
        }

        Ok(records)
    }

    /// All uploads of one owner, newest first
    pub fn list_uploads(
        &self,
        owner_id: &str,
        status: Option<UploadStatus>,
    ) -> Result<Vec<UploadRecord>, DatabaseError> {
        let prefix = format!("{owner_id}/");
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADS)?;

        let mut uploads = Vec::new();
        for result in table.range(prefix.as_str()..)? {
            let (key, value) = result?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let upload: UploadRecord = rmp_serde::from_slice(value.value())?;
            if status.map_or(true, |s| upload.status == s) {
                uploads.push(upload);
            }
        }

        uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(uploads)
    }

    /// Every upload across all owners, in key order
    pub fn all_uploads(&self) -> Result<Vec<UploadRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(UPLOADS)?;

        let mut uploads = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            uploads.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(uploads)
    }
}
