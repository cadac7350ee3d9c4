//! Scratch files for transcode jobs.
//!
//! Every job's files are namespaced by owner and identifier, so concurrent jobs
//! share the directory without locking and the reaper can rebuild the paths
//! from a record alone.

use std::path::{Path, PathBuf};

use bytes::Bytes;

/// The three scratch files one upload can leave behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `{owner}_{identifier}_input.{ext}`
    pub input: PathBuf,
    /// `{owner}_{identifier}.mp4`
    pub output: PathBuf,
    /// `thumbnail_{owner}_{identifier}.png`
    pub thumbnail: PathBuf,
}

impl ArtifactPaths {
    pub fn all(&self) -> [&Path; 3] {
        [&self.input, &self.output, &self.thumbnail]
    }
}

#[derive(Debug, Clone)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, std::io::Error> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn paths(&self, owner_id: &str, file_identifier: &str, extension: &str) -> ArtifactPaths {
        ArtifactPaths {
            input: self
                .dir
                .join(format!("{owner_id}_{file_identifier}_input.{extension}")),
            output: self.dir.join(format!("{owner_id}_{file_identifier}.mp4")),
            thumbnail: self
                .dir
                .join(format!("thumbnail_{owner_id}_{file_identifier}.png")),
        }
    }

    /// Write the raw upload to its input path.
    pub async fn stage_input(&self, paths: &ArtifactPaths, data: &Bytes) -> Result<(), std::io::Error> {
        tokio::fs::write(&paths.input, data).await
    }

    /// Delete every artifact, tolerating ones that are already gone.
    ///
    /// Failures are logged and skipped. Returns how many files were actually removed.
    pub async fn remove_artifacts(&self, paths: &ArtifactPaths) -> usize {
        let mut removed = 0;
        for path in paths.all() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "Removed temp file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
        removed
    }
}
