#![forbid(unsafe_code)]
//! Decoding primitives for the text block format emitted by
//! `fsutil usn readJournal`.
//!
//! This crate is intentionally **not** a USN journal library. It provides:
//! - A blank-line-delimited block framer over the tool's raw line stream.
//! - Typed decoders for the journal header and v3.0 change-record blocks.
//! - The reason-bitmask table and its declaration-order decoder.
//! - A durable resume cursor and the sink trait records are delivered to.

mod block;
mod cursor;
mod error;
mod reason;
mod record;
mod sink;

pub use block::{Block, BlockFramer, FramedBlock};
pub use cursor::{CursorError, CursorStore};
pub use error::DecodeError;
pub use reason::{decode_reason_mask, format_reason_flags, ReasonFlag, REASON_FLAGS};
pub use record::{decode_header, decode_record, ChangeRecord, JournalHeader};
pub use record::{ACCESS_DENIED_TEXT, HEADER_KEYS, RECORD_KEYS_V3};
pub use sink::{EventSink, SinkError, SinkRecord};
