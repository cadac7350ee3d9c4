use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::media::{ClipWindow, MediaError, Transcoder, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};
use crate::object_store::{thumbnail_key, video_key, ObjectStore, ObjectStoreError};
use crate::storage::models::UploadStatus;
use crate::storage::Database;
use crate::temp::{ArtifactPaths, TempStore};

/// Everything the worker needs to finish one upload.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub owner_id: String,
    pub file_identifier: String,
    pub source_extension: String,
    pub source_mime_type: String,
    pub window: ClipWindow,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Transcode failed: {0}")]
    Transcode(#[source] MediaError),
    #[error("Thumbnail extraction failed: {0}")]
    Thumbnail(#[source] MediaError),
    #[error("Thumbnail upload failed: {0}")]
    ThumbnailUpload(#[source] ObjectStoreError),
    #[error("Video upload failed: {0}")]
    VideoUpload(#[source] ObjectStoreError),
}

#[derive(Debug, Error)]
#[error("Transcode queue is closed")]
pub struct QueueClosed;

/// Submission side of the transcode queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<TranscodeJob>,
}

impl JobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TranscodeJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hand a job to the pool without waiting for it to run.
    pub fn submit(&self, job: TranscodeJob) -> Result<(), QueueClosed> {
        self.tx.send(job).map_err(|_| QueueClosed)
    }
}

/// Runs the transcode pipeline for one upload and records its terminal status.
pub struct TranscodeWorker {
    db: Database,
    object_store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    temp: TempStore,
}

impl TranscodeWorker {
    pub fn new(
        db: Database,
        object_store: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn Transcoder>,
        temp: TempStore,
    ) -> Self {
        Self {
            db,
            object_store,
            transcoder,
            temp,
        }
    }

    /// Process one job to a terminal state.
    ///
    /// Temp files are removed on every exit path. Returns the status this call
    /// recorded, or `None` if the record was already terminal (e.g. reaped).
    pub async fn process(&self, job: TranscodeJob) -> Option<UploadStatus> {
        let owner = job.owner_id.as_str();
        let file_id = job.file_identifier.as_str();
        let paths = self.temp.paths(owner, file_id, &job.source_extension);
        let started = Instant::now();

        match self.db.get_upload(owner, file_id) {
            Ok(Some(upload)) if upload.status == UploadStatus::Processing => {}
            Ok(Some(upload)) => {
                warn!(owner = %owner, file_id = %file_id, status = ?upload.status, "Upload already finished, skipping job");
                self.temp.remove_artifacts(&paths).await;
                return None;
            }
            Ok(None) => {
                warn!(owner = %owner, file_id = %file_id, "Upload record missing, skipping job");
                self.temp.remove_artifacts(&paths).await;
                return None;
            }
            Err(e) => {
                // Carry on; the terminal write below will surface a persistent failure.
                warn!(owner = %owner, file_id = %file_id, error = %e, "Could not read upload record");
            }
        }

        let outcome = self.run_steps(&job, &paths).await;
        let removed = self.temp.remove_artifacts(&paths).await;
        debug!(owner = %owner, file_id = %file_id, removed, "Cleaned up temp files");

        let status = match outcome {
            Ok(()) => UploadStatus::Completed,
            Err(e) => {
                error!(owner = %owner, file_id = %file_id, error = %e, "Transcode pipeline failed");
                UploadStatus::Failed
            }
        };

        match self.db.finish_upload(owner, file_id, status) {
            Ok(true) => {
                info!(
                    owner = %owner,
                    file_id = %file_id,
                    status = ?status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upload finished"
                );
                Some(status)
            }
            Ok(false) => {
                warn!(owner = %owner, file_id = %file_id, "Upload reached a terminal state elsewhere; result discarded");
                None
            }
            Err(e) => {
                error!(owner = %owner, file_id = %file_id, error = %e, "Failed to record upload status");
                None
            }
        }
    }

    /// Transcode, thumbnail, then upload both. The video goes last so that a
    /// COMPLETED status always implies both objects exist.
    async fn run_steps(&self, job: &TranscodeJob, paths: &ArtifactPaths) -> Result<(), WorkerError> {
        let owner = job.owner_id.as_str();
        let file_id = job.file_identifier.as_str();

        debug!(
            owner = %owner,
            file_id = %file_id,
            input = %paths.input.display(),
            source_type = %job.source_mime_type,
            "Transcoding"
        );
        self.transcoder
            .transcode(&paths.input, &paths.output, job.window)
            .await
            .map_err(WorkerError::Transcode)?;

        debug!(owner = %owner, file_id = %file_id, "Extracting thumbnail");
        self.transcoder
            .extract_frame(
                &paths.output,
                &paths.thumbnail,
                0,
                THUMBNAIL_WIDTH,
                THUMBNAIL_HEIGHT,
            )
            .await
            .map_err(WorkerError::Thumbnail)?;

        self.object_store
            .put_file(&thumbnail_key(owner, file_id), &paths.thumbnail, "image/png")
            .await
            .map_err(WorkerError::ThumbnailUpload)?;

        self.object_store
            .put_file(&video_key(owner, file_id), &paths.output, "video/mp4")
            .await
            .map_err(WorkerError::VideoUpload)?;

        Ok(())
    }
}

/// Drain the queue, running at most `concurrency` jobs at a time.
pub fn spawn_pool(
    worker: Arc<TranscodeWorker>,
    mut rx: mpsc::UnboundedReceiver<TranscodeJob>,
    concurrency: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let permits = Arc::new(Semaphore::new(concurrency));
        info!(concurrency, "Transcode worker pool started");

        while let Some(job) = rx.recv().await {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                worker.process(job).await;
                drop(permit);
            });
        }

        info!("Transcode queue closed, worker pool exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_upload, test_harness, TestHarness, FAKE_THUMBNAIL};

    /// Persist a PROCESSING record with staged input, as intake would.
    async fn staged_job(harness: &TestHarness, owner: &str, id: &str, input: &[u8]) -> TranscodeJob {
        let state = &harness.state;
        state.db.put_upload(&sample_upload(owner, id)).unwrap();

        let paths = state.temp.paths(owner, id, "mp4");
        state
            .temp
            .stage_input(&paths, &bytes::Bytes::copy_from_slice(input))
            .await
            .unwrap();

        TranscodeJob {
            owner_id: owner.to_string(),
            file_identifier: id.to_string(),
            source_extension: "mp4".to_string(),
            source_mime_type: "video/mp4".to_string(),
            window: ClipWindow {
                start_seconds: 0.0,
                end_seconds: 3.0,
            },
        }
    }

    fn no_artifacts_left(harness: &TestHarness, owner: &str, id: &str) -> bool {
        let paths = harness.state.temp.paths(owner, id, "mp4");
        paths.all().iter().all(|path| !path.exists())
    }

    #[tokio::test]
    async fn test_success_completes_upload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let job = staged_job(&harness, "alice", "ok1", b"source bytes").await;

        let status = harness.worker.process(job).await;
        assert_eq!(status, Some(UploadStatus::Completed));

        let state = &harness.state;
        let upload = state.db.get_upload("alice", "ok1").unwrap().unwrap();
        assert_eq!(upload.status, UploadStatus::Completed);
        assert!(upload.finished_at.is_some());

        let video = state.object_store.get(&video_key("alice", "ok1")).await.unwrap();
        assert_eq!(video.as_ref(), b"source bytes");
        let thumbnail = state
            .object_store
            .get(&thumbnail_key("alice", "ok1"))
            .await
            .unwrap();
        assert_eq!(thumbnail.as_ref(), FAKE_THUMBNAIL);

        assert!(no_artifacts_left(&harness, "alice", "ok1"));
    }

    #[tokio::test]
    async fn test_transcode_failure_fails_upload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, true);
        let job = staged_job(&harness, "alice", "bad1", b"garbage").await;

        let status = harness.worker.process(job).await;
        assert_eq!(status, Some(UploadStatus::Failed));

        let state = &harness.state;
        let upload = state.db.get_upload("alice", "bad1").unwrap().unwrap();
        assert_eq!(upload.status, UploadStatus::Failed);
        assert!(!state
            .object_store
            .exists(&video_key("alice", "bad1"))
            .await
            .unwrap());
        assert!(no_artifacts_left(&harness, "alice", "bad1"));
    }

    #[tokio::test]
    async fn test_skips_already_finished_upload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let job = staged_job(&harness, "alice", "reaped", b"late").await;

        assert!(harness
            .state
            .db
            .finish_upload("alice", "reaped", UploadStatus::Failed)
            .unwrap());

        assert_eq!(harness.worker.process(job).await, None);

        let upload = harness.state.db.get_upload("alice", "reaped").unwrap().unwrap();
        assert_eq!(upload.status, UploadStatus::Failed);
        assert!(!harness
            .state
            .object_store
            .exists(&video_key("alice", "reaped"))
            .await
            .unwrap());
        assert!(no_artifacts_left(&harness, "alice", "reaped"));
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let temp_dir = tempfile::tempdir().unwrap();
        let harness = test_harness(&temp_dir, false);
        let (queue, rx) = JobQueue::new();

        for i in 0..5 {
            let job = staged_job(&harness, "bob", &format!("clip{i}"), b"bytes").await;
            queue.submit(job).unwrap();
        }
        drop(queue);

        // The pool exits once the queue is closed and empty; spawned jobs may
        // still be running, so poll for their terminal states.
        spawn_pool(Arc::clone(&harness.worker), rx, 2).await.unwrap();
        for _ in 0..100 {
            let done = harness
                .state
                .db
                .list_uploads("bob", Some(UploadStatus::Completed))
                .unwrap();
            if done.len() == 5 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("worker pool did not complete all jobs");
    }

    #[test]
    fn test_submit_after_close() {
        let (queue, rx) = JobQueue::new();
        drop(rx);
        let job = TranscodeJob {
            owner_id: "alice".to_string(),
            file_identifier: "x".to_string(),
            source_extension: "mp4".to_string(),
            source_mime_type: "video/mp4".to_string(),
            window: ClipWindow {
                start_seconds: 0.0,
                end_seconds: 1.0,
            },
        };
        assert!(queue.submit(job).is_err());
    }
}
