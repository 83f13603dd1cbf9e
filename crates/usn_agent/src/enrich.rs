use std::time::Duration;

use fsutil_capture::{FsutilClient, FsutilError};
use thiserror::Error;
use tokio::runtime::Handle;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("path resolution query failed: {0}")]
    Query(#[from] FsutilError),
    #[error("path resolution unavailable: {0}")]
    Unavailable(String),
}

/// Best-effort resolution of a record's parent directory path.
///
/// Failures leave the record's file name in its unenriched relative form;
/// they never drop or fail the record.
pub trait ParentPathResolver: Send {
    fn resolve(&mut self, volume: &str, parent_file_id: &str) -> Result<String, EnrichError>;
}

/// Resolves parent paths through `fsutil file queryFileNameById`.
///
/// Called from the blocking decode worker, so the async query is bridged
/// with `Handle::block_on`; `timeout` bounds each lookup.
pub struct FsutilPathResolver {
    client: FsutilClient,
    timeout: Duration,
    handle: Handle,
}

impl FsutilPathResolver {
    pub fn new(client: FsutilClient, timeout: Duration, handle: Handle) -> Self {
        Self {
            client,
            timeout,
            handle,
        }
    }
}

impl ParentPathResolver for FsutilPathResolver {
    fn resolve(&mut self, volume: &str, parent_file_id: &str) -> Result<String, EnrichError> {
        let query = self
            .client
            .query_file_name_by_id(volume, parent_file_id, self.timeout);
        Ok(self.handle.block_on(query)?)
    }
}
