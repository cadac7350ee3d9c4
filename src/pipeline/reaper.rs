use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::storage::models::UploadStatus;
use crate::storage::{Database, DatabaseError};
use crate::temp::TempStore;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    /// Stale PROCESSING records returned by the query
    pub examined: usize,
    /// Records this sweep moved to FAILED
    pub failed: usize,
    /// Temp files deleted
    pub files_removed: usize,
}

/// Marks uploads stuck in PROCESSING as FAILED and deletes their temp files.
///
/// It never interrupts a running worker. Object-store leftovers of a reaped
/// upload stay where they are; the COMPLETED check on reads keeps them hidden.
pub struct Reaper {
    db: Database,
    temp: TempStore,
    threshold_hours: u32,
    batch_size: usize,
    interval: Duration,
}

impl Reaper {
    pub fn new(db: Database, temp: TempStore, config: &ReaperConfig) -> Self {
        Self {
            db,
            temp,
            threshold_hours: config.threshold_hours,
            batch_size: config.batch_size,
            interval: Duration::from_secs(config.interval_seconds),
        }
    }

    /// Sweep on a fixed schedule until the task is aborted.
    pub async fn start(self) {
        let mut ticker = interval(self.interval);
        info!(
            interval_secs = self.interval.as_secs(),
            threshold_hours = self.threshold_hours,
            "Starting abandoned-upload reaper"
        );

        loop {
            ticker.tick().await;

            match self.sweep(self.threshold_hours, self.batch_size).await {
                Ok(stats) if stats.failed > 0 => {
                    info!(
                        failed = stats.failed,
                        files_removed = stats.files_removed,
                        "Reaped abandoned uploads"
                    );
                }
                Ok(_) => debug!("No abandoned uploads found"),
                Err(e) => warn!(error = %e, "Reaper sweep failed"),
            }
        }
    }

    /// One pass over at most `batch_size` PROCESSING uploads older than
    /// `threshold_hours`. Safe to repeat: finished uploads are never selected
    /// and missing temp files are skipped.
    pub async fn sweep(
        &self,
        threshold_hours: u32,
        batch_size: usize,
    ) -> Result<SweepStats, DatabaseError> {
        let cutoff = Utc::now() - chrono::Duration::hours(i64::from(threshold_hours));
        let stale = self.db.find_stale_uploads(cutoff, batch_size)?;

        let mut stats = SweepStats {
            examined: stale.len(),
            ..Default::default()
        };

        for upload in stale {
            let owner = upload.owner_id.as_str();
            let file_id = upload.file_identifier.as_str();
            debug!(owner = %owner, file_id = %file_id, created_at = %upload.created_at, "Reaping abandoned upload");

            let paths = self.temp.paths(owner, file_id, &upload.source_extension);
            stats.files_removed += self.temp.remove_artifacts(&paths).await;

            if self.db.finish_upload(owner, file_id, UploadStatus::Failed)? {
                stats.failed += 1;
            } else {
                debug!(owner = %owner, file_id = %file_id, "Upload finished before it could be reaped");
            }
        }

        Ok(stats)
    }
}
