//! Adapter around the external media tool (ffmpeg).

mod command;
mod transcoder;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use transcoder::{ClipWindow, FfmpegTranscoder, Transcoder, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media tool not found: {0}")]
    ToolNotFound(String),

    #[error("Media tool exited with status {exit_code:?}: {stderr}")]
    ToolFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Media tool produced no output at {0}")]
    MissingOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
