use thiserror::Error;

/// Failures raised while decoding the capture stream.
///
/// The fatal/recoverable split is part of the contract: header-block
/// failures poison cursor handling and end the session, per-record failures
/// skip one record and keep streaming.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The capture tool itself reported access denied in place of a header.
    /// Not a parsing defect; requires elevated privileges to resolve.
    #[error("capture source reported access denied: {detail}")]
    PermissionDenied { detail: String },

    /// Header block missing or carrying unparseable fields.
    #[error("malformed journal header: {reason} (block: {block:?})")]
    MalformedHeader { reason: String, block: Vec<String> },

    /// Record block missing a required field. The record is skipped.
    #[error("malformed change record: bad `{field}` field (block: {block:?})")]
    MalformedRecord {
        field: &'static str,
        block: Vec<String>,
    },

    /// The source closed mid-block; the partial block is discarded.
    #[error("capture stream closed mid-block ({pending_lines} lines without a terminator)")]
    TruncatedStream { pending_lines: usize },
}

impl DecodeError {
    /// Whether this error must end the capture session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::PermissionDenied { .. } | DecodeError::MalformedHeader { .. }
        )
    }
}
