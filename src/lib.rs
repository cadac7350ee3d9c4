//! clip-host - video clip ingestion and playback
//!
//! This crate accepts uploaded clips and serves them back with:
//! - Background trimming/transcoding through ffmpeg, with a thumbnail per clip
//! - Swappable object storage backends (local filesystem, GCS) behind a read cache
//! - redb embedded database for upload lifecycle and account metadata
//! - HTTP byte-range playback of finished clips
//! - A scheduled reaper for uploads whose transcode never finished

pub mod api;
pub mod config;
pub mod identifier;
pub mod media;
pub mod object_store;
pub mod pipeline;
pub mod storage;
pub mod temp;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use config::Config;
use pipeline::JobQueue;
use storage::Database;
use temp::TempStore;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub temp: TempStore,
    pub jobs: JobQueue,
}
