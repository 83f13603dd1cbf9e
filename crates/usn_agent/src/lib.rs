#![forbid(unsafe_code)]
//! USN change-journal capture agent.
//!
//! Wires the `fsutil_capture` source to the `usn_events` decoders through
//! a bounded channel: a capture task that only reads lines and sends, and
//! a decode worker that frames blocks, types records, advances the resume
//! cursor, and delivers each record to the event sink. Backpressure over
//! the channel guarantees no journal line is dropped because of a slow
//! sink.

mod enrich;
mod error;
mod pipeline;
mod sink;

pub use enrich::{EnrichError, FsutilPathResolver, ParentPathResolver};
pub use error::SessionError;
pub use pipeline::{
    CaptureFrame, CapturePipeline, CaptureStream, PipelineConfig, SessionCounters, SessionOutcome,
    SessionReport, SessionState, ShutdownSignal, SourceExit,
};
pub use sink::JsonLineSink;
