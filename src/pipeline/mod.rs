//! The ingestion pipeline: intake on the request path, transcoding in the
//! background, and a periodic reaper for uploads that never finish.

pub mod intake;
pub mod reaper;
pub mod worker;

pub use intake::{intake, reserve_identifier, IntakeError, UploadRequest};
pub use reaper::{Reaper, SweepStats};
pub use worker::{spawn_pool, JobQueue, QueueClosed, TranscodeJob, TranscodeWorker, WorkerError};
