use std::path::Path;

use async_trait::async_trait;

use super::command::{FfmpegCommand, FfmpegRunner};
use super::MediaResult;

pub const THUMBNAIL_WIDTH: u32 = 480;
pub const THUMBNAIL_HEIGHT: u32 = 270;

const CRF: u8 = 23;
const PRESET: &str = "fast";

/// Trim window in seconds, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipWindow {
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl ClipWindow {
    pub fn start_ms(&self) -> u64 {
        (self.start_seconds * 1000.0) as u64
    }

    pub fn end_ms(&self) -> u64 {
        (self.end_seconds * 1000.0) as u64
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms().saturating_sub(self.start_ms())
    }
}

/// The two operations the pipeline needs from a media tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Trim `input` to `window` and re-encode it as H.264/AAC MP4 at `output`.
    async fn transcode(&self, input: &Path, output: &Path, window: ClipWindow) -> MediaResult<()>;

    /// Write frame `frame_index` of `input`, scaled to `width`x`height`, as an image at `output`.
    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        frame_index: u32,
        width: u32,
        height: u32,
    ) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            runner: FfmpegRunner::new(ffmpeg_path),
        }
    }

    pub fn transcode_command(input: &Path, output: &Path, window: ClipWindow) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .seek(window.start_ms() as f64 / 1000.0)
            .duration(window.duration_ms() as f64 / 1000.0)
            .format("mp4")
            .video_codec("libx264")
            .audio_codec("aac")
            .preset(PRESET)
            .crf(CRF)
            .threads(0)
    }

    pub fn frame_command(
        input: &Path,
        output: &Path,
        frame_index: u32,
        width: u32,
        height: u32,
    ) -> FfmpegCommand {
        let filter = if frame_index == 0 {
            format!("scale={width}:{height}")
        } else {
            format!("select=eq(n\\,{frame_index}),scale={width}:{height}")
        };
        FfmpegCommand::new(input, output)
            .video_filter(filter)
            .frames(1)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, window: ClipWindow) -> MediaResult<()> {
        let cmd = Self::transcode_command(input, output, window);
        self.runner.run(&cmd).await
    }

    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        frame_index: u32,
        width: u32,
        height: u32,
    ) -> MediaResult<()> {
        let cmd = Self::frame_command(input, output, frame_index, width, height);
        self.runner.run(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_command_uses_fixed_preset() {
        let window = ClipWindow {
            start_seconds: 2.0,
            end_seconds: 5.0,
        };
        let args =
            FfmpegTranscoder::transcode_command(Path::new("/in.mov"), Path::new("/out.mp4"), window)
                .build_args();
        let joined = args.join(" ");

        assert!(joined.contains("-ss 2.000 -i /in.mov"));
        assert!(joined.contains("-t 3.000"));
        assert!(joined.contains("-f mp4"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-preset fast"));
        assert!(joined.contains("-crf 23"));
        assert!(joined.contains("-threads 0"));
        assert!(joined.ends_with("/out.mp4"));
    }

    #[test]
    fn test_frame_command() {
        let args = FfmpegTranscoder::frame_command(
            Path::new("/out.mp4"),
            Path::new("/thumb.png"),
            0,
            THUMBNAIL_WIDTH,
            THUMBNAIL_HEIGHT,
        )
        .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-vf scale=480:270"));
        assert!(joined.contains("-frames:v 1"));
    }

    #[test]
    fn test_window_millis() {
        let window = ClipWindow {
            start_seconds: 1.25,
            end_seconds: 4.5,
        };
        assert_eq!(window.start_ms(), 1250);
        assert_eq!(window.end_ms(), 4500);
        assert_eq!(window.duration_ms(), 3250);
    }
}
