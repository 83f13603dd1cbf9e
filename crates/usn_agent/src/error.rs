use fsutil_capture::FsutilError;
use thiserror::Error;
use usn_events::{CursorError, DecodeError};

/// Fatal conditions that end a capture session.
///
/// Recoverable conditions (malformed records, sink and enrichment
/// failures) never reach this type; they are logged and counted by the
/// pipeline instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A fatal decode failure: permission denied or a malformed header.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The capture process exited unexpectedly. No silent restart: a
    /// restart could resume from a stale cursor mid-record.
    #[error("capture process exited unexpectedly (code {code:?})")]
    SourceCrash { code: Option<i32> },

    /// Starting the capture source failed.
    #[error("capture source failed: {0}")]
    Capture(#[from] FsutilError),

    /// Reading the capture output failed.
    #[error("reading capture output failed: {0}")]
    SourceIo(std::io::Error),

    /// Persisting the resume cursor failed. Continuing would silently void
    /// the restart contract.
    #[error("cursor persistence failed: {0}")]
    Cursor(#[from] CursorError),

    /// The decode worker panicked or was aborted.
    #[error("decode worker terminated abnormally: {0}")]
    WorkerJoin(String),
}
