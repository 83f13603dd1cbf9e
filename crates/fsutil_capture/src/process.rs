use std::{path::Path, process::ExitStatus, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    time,
};
use tracing::debug;

use crate::FsutilError;

pub(crate) fn spawn_with_retry(
    command: &mut Command,
    binary: &Path,
) -> Result<Child, FsutilError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(FsutilError::Spawn {
                    binary: binary.to_path_buf(),
                    source,
                });
            }
        }
    }

    unreachable!("spawn_with_retry should return before exhausting retries")
}

/// A running `fsutil usn readJournal` child and its output stream.
///
/// The child is spawned with `kill_on_drop`, so dropping the source never
/// leaks the process.
#[derive(Debug)]
pub struct CaptureSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
}

impl CaptureSource {
    pub(crate) fn new(mut child: Child) -> Result<Self, FsutilError> {
        let stdout = child.stdout.take().ok_or(FsutilError::MissingStdout)?;
        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
        })
    }

    /// Reads the next raw output line, without its terminator. Returns
    /// `None` at end of stream. The journal is encoded in the platform's
    /// native encoding, not guaranteed UTF-8, so undecodable byte
    /// sequences are replaced rather than failing the line.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.stdout.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Waits for the child to exit. Used after end of stream to classify
    /// a clean dump-mode exit versus a crash.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Bounded wait for the child to exit; past `timeout` it is forcibly
    /// terminated and reaped.
    pub async fn shutdown(mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        match time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                debug!(?timeout, "capture source did not exit in time, killing it");
                self.child.start_kill()?;
                self.child.wait().await
            }
        }
    }
}
