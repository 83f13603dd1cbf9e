#![forbid(unsafe_code)]
//! Async wrapper around the `fsutil` USN journal commands.
//!
//! Owns process spawning and raw line reads only; decoding the captured
//! text lives in `usn_events`. Two surfaces are wrapped:
//! - `fsutil usn readJournal` as a streaming capture source.
//! - `fsutil file queryFileNameById` as a one-shot path-resolution query.

mod client;
mod error;
mod process;
mod query;
mod request;

pub use client::{FsutilClient, FsutilClientBuilder};
pub use error::FsutilError;
pub use process::CaptureSource;
pub use request::{ReadJournalRequest, StartPosition};
