use std::{path::PathBuf, process::ExitStatus, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsutilError {
    #[error("failed to spawn fsutil process (binary={binary:?}): {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("internal error: missing stdout pipe")]
    MissingStdout,
    #[error("fsutil query timed out after {timeout:?}")]
    QueryTimeout { timeout: Duration },
    #[error("fsutil query returned non-zero exit status: {status}")]
    QueryFailed { status: ExitStatus },
    #[error("unexpected fsutil query reply: `{reply}`")]
    QueryReply { reply: String },
}
