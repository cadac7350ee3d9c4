//! Shared test helpers for in-crate tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::config::{CacheConfig, Config, MediaConfig, NodeConfig, ReaperConfig, StorageConfig};
use crate::media::{ClipWindow, MediaError, MediaResult, Transcoder};
use crate::object_store::{LocalStore, ObjectStore};
use crate::pipeline::{JobQueue, TranscodeJob, TranscodeWorker};
use crate::storage::models::{UploadRecord, UploadStatus};
use crate::storage::Database;
use crate::temp::TempStore;
use crate::AppState;

/// Stand-in for ffmpeg: "transcodes" by copying the input and writes a fixed thumbnail.
pub struct FakeTranscoder {
    pub fail_transcode: bool,
}

pub const FAKE_THUMBNAIL: &[u8] = b"\x89PNG fake thumbnail";

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, _window: ClipWindow) -> MediaResult<()> {
        if self.fail_transcode {
            return Err(MediaError::ToolFailed {
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        tokio::fs::copy(input, output).await?;
        Ok(())
    }

    async fn extract_frame(
        &self,
        _input: &Path,
        output: &Path,
        _frame_index: u32,
        _width: u32,
        _height: u32,
    ) -> MediaResult<()> {
        tokio::fs::write(output, FAKE_THUMBNAIL).await?;
        Ok(())
    }
}

/// A test harness: shared state, a worker over the same stores, and the job queue's
/// receiving end so tests can run jobs deterministically.
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub worker: Arc<TranscodeWorker>,
    pub jobs: mpsc::UnboundedReceiver<TranscodeJob>,
}

impl TestHarness {
    /// Run every queued job to completion.
    pub async fn drain_jobs(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(job) = self.jobs.try_recv() {
            self.worker.process(job).await;
            processed += 1;
        }
        processed
    }
}

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
            temp_dir: temp_dir.path().join("tmp").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: temp_dir.path().join("objects").to_string_lossy().to_string(),
            ..Default::default()
        },
        media: MediaConfig::default(),
        reaper: ReaperConfig::default(),
        cache: CacheConfig::default(),
        test_mode: true,
        max_upload_size: 10 * 1024 * 1024, // 10MB for tests
        identifier_attempts: 100,
    }
}

/// Create a test harness with a temporary database, local object store and fake transcoder.
pub fn test_harness(temp_dir: &tempfile::TempDir, fail_transcode: bool) -> TestHarness {
    let config = test_config(temp_dir);

    let db = Database::open(&config.node.data_dir).expect("Failed to open test database");
    let object_store: Arc<dyn ObjectStore> = Arc::new(
        LocalStore::new(&config.storage.local_storage_path)
            .expect("Failed to create test object store"),
    );
    let temp = TempStore::new(&config.node.temp_dir).expect("Failed to create temp dir");
    let (jobs, rx) = JobQueue::new();

    let worker = Arc::new(TranscodeWorker::new(
        db.clone(),
        Arc::clone(&object_store),
        Arc::new(FakeTranscoder { fail_transcode }),
        temp.clone(),
    ));

    let state = Arc::new(AppState {
        config,
        db,
        object_store,
        temp,
        jobs,
    });

    TestHarness {
        state,
        worker,
        jobs: rx,
    }
}

pub fn sample_upload(owner_id: &str, file_identifier: &str) -> UploadRecord {
    UploadRecord {
        owner_id: owner_id.to_string(),
        file_identifier: file_identifier.to_string(),
        title: "Sample clip".to_string(),
        size_bytes: 1024,
        source_extension: "mp4".to_string(),
        source_mime_type: "video/mp4".to_string(),
        start_seconds: 0.0,
        end_seconds: 3.0,
        status: UploadStatus::Processing,
        created_at: Utc::now(),
        finished_at: None,
    }
}
