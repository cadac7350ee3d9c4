//! End-to-end run against a real ffmpeg binary.
//!
//! Ignored by default: `cargo test -- --ignored` with ffmpeg and ffprobe on PATH.

use std::path::Path;
use std::sync::Arc;

use clip_host::config::{CacheConfig, Config, MediaConfig, NodeConfig, ReaperConfig, StorageConfig};
use clip_host::media::FfmpegTranscoder;
use clip_host::object_store::{thumbnail_key, video_key, LocalStore, ObjectStore};
use clip_host::pipeline::{intake, JobQueue, TranscodeWorker, UploadRequest};
use clip_host::storage::models::UploadStatus;
use clip_host::storage::Database;
use clip_host::temp::TempStore;
use clip_host::AppState;

async fn make_source_clip(path: &Path) {
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-v", "error"])
        .args(["-f", "lavfi", "-i", "testsrc=duration=10:size=320x240:rate=25"])
        .args(["-f", "lavfi", "-i", "sine=frequency=440:duration=10"])
        .args(["-shortest", "-c:v", "libx264", "-c:a", "aac"])
        .arg(path)
        .status()
        .await
        .expect("ffmpeg must be installed");
    assert!(status.success());
}

async fn probe_duration(path: &Path) -> f64 {
    let output = tokio::process::Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .await
        .expect("ffprobe must be installed");
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .expect("ffprobe printed a duration")
}

#[tokio::test]
#[ignore = "needs ffmpeg and ffprobe"]
async fn test_trimmed_clip_is_about_three_seconds() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: dir.path().join("data").to_string_lossy().to_string(),
            temp_dir: dir.path().join("tmp").to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            local_storage_path: dir.path().join("objects").to_string_lossy().to_string(),
            ..Default::default()
        },
        media: MediaConfig::default(),
        reaper: ReaperConfig::default(),
        cache: CacheConfig::default(),
        test_mode: true,
        max_upload_size: 50 * 1024 * 1024,
        identifier_attempts: 100,
    };

    let db = Database::open(&config.node.data_dir).unwrap();
    let object_store: Arc<dyn ObjectStore> =
        Arc::new(LocalStore::new(&config.storage.local_storage_path).unwrap());
    let temp = TempStore::new(&config.node.temp_dir).unwrap();
    let (jobs, mut rx) = JobQueue::new();
    let worker = TranscodeWorker::new(
        db.clone(),
        Arc::clone(&object_store),
        Arc::new(FfmpegTranscoder::new(config.media.ffmpeg_path.clone())),
        temp.clone(),
    );
    let state = AppState {
        config,
        db,
        object_store,
        temp,
        jobs,
    };

    let source = dir.path().join("source.mp4");
    make_source_clip(&source).await;
    let data = tokio::fs::read(&source).await.unwrap();

    let id = intake(
        &state,
        "alice",
        UploadRequest {
            data: data.into(),
            original_filename: Some("source.mp4".to_string()),
            start_seconds: 2.0,
            end_seconds: 5.0,
            title: "Test pattern".to_string(),
        },
    )
    .await
    .unwrap();

    let job = rx.recv().await.unwrap();
    assert_eq!(worker.process(job).await, Some(UploadStatus::Completed));

    let video = state.object_store.get(&video_key("alice", &id)).await.unwrap();
    let out = dir.path().join("fetched.mp4");
    tokio::fs::write(&out, &video).await.unwrap();
    let duration = probe_duration(&out).await;
    assert!((duration - 3.0).abs() < 0.5, "duration was {duration}");

    let thumbnail = state
        .object_store
        .get(&thumbnail_key("alice", &id))
        .await
        .unwrap();
    assert!(thumbnail.starts_with(b"\x89PNG"));
}
