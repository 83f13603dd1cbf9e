use std::{collections::BTreeMap, path::PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::{
    process::{spawn_with_retry, CaptureSource},
    FsutilError, ReadJournalRequest,
};

#[derive(Debug, Clone, Default)]
pub struct FsutilClientBuilder {
    binary: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl FsutilClientBuilder {
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> FsutilClient {
        FsutilClient {
            binary: self.binary,
            env: self.env,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsutilClient {
    binary: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl FsutilClient {
    pub fn builder() -> FsutilClientBuilder {
        FsutilClientBuilder::default()
    }

    /// Starts `fsutil usn readJournal` for `request` and hands back the
    /// running capture source.
    pub async fn spawn_read_journal(
        &self,
        request: &ReadJournalRequest,
    ) -> Result<CaptureSource, FsutilError> {
        let binary = self.resolve_binary();
        let mut command = Command::new(&binary);
        command
            .args(request.argv())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        self.apply_env(&mut command);

        debug!(binary = ?binary, volume = %request.volume, "starting capture source");
        let child = spawn_with_retry(&mut command, &binary)?;
        CaptureSource::new(child)
    }

    pub(crate) fn apply_env(&self, command: &mut Command) {
        for (k, v) in &self.env {
            command.env(k, v);
        }
    }

    pub(crate) fn resolve_binary(&self) -> PathBuf {
        if let Some(b) = self.binary.as_ref() {
            return b.clone();
        }
        if let Ok(v) = std::env::var("FSUTIL_BINARY") {
            if !v.trim().is_empty() {
                return PathBuf::from(v);
            }
        }
        PathBuf::from("fsutil")
    }
}
