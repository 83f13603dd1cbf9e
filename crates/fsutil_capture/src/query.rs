use std::time::Duration;

use tokio::{process::Command, time};
use tracing::debug;

use crate::{FsutilClient, FsutilError};

impl FsutilClient {
    /// Resolves a file's path from its id via
    /// `fsutil file queryFileNameById <volume> <0xid>`, bounded by
    /// `timeout`. The id may be passed with or without the `0x` prefix
    /// (journal records print it bare).
    pub async fn query_file_name_by_id(
        &self,
        volume: &str,
        file_id: &str,
        timeout: Duration,
    ) -> Result<String, FsutilError> {
        let binary = self.resolve_binary();
        let id_arg = if file_id.starts_with("0x") || file_id.starts_with("0X") {
            file_id.to_string()
        } else {
            format!("0x{file_id}")
        };

        let mut command = Command::new(&binary);
        command
            .arg("file")
            .arg("queryFileNameById")
            .arg(volume)
            .arg(&id_arg)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        self.apply_env(&mut command);

        debug!(volume, id = %id_arg, "querying file name by id");
        let output = time::timeout(timeout, command.output())
            .await
            .map_err(|_| FsutilError::QueryTimeout { timeout })?
            .map_err(|source| FsutilError::Spawn { binary, source })?;

        if !output.status.success() {
            return Err(FsutilError::QueryFailed {
                status: output.status,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_query_reply(&stdout).ok_or_else(|| FsutilError::QueryReply {
            reply: stdout.trim().to_string(),
        })
    }
}

/// Parses the human-oriented reply, e.g.
/// `A random link name to this file is [\\?\C:\Users\report.txt]`.
fn parse_query_reply(reply: &str) -> Option<String> {
    let line = reply.lines().find(|line| line.contains(" is "))?;
    let (_, path) = line.split_once(" is ")?;
    let path = path.trim();
    let path = match path.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
        Some(inner) => inner,
        None => path,
    };
    let path = path.strip_prefix(r"\\?\").unwrap_or(path);
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_path_is_unwrapped_from_brackets_and_prefix() {
        let reply = r"A random link name to this file is [\\?\C:\Users\report.txt]";
        assert_eq!(
            parse_query_reply(reply).as_deref(),
            Some(r"C:\Users\report.txt")
        );
    }

    #[test]
    fn plain_reply_is_accepted_as_is() {
        let reply = r"A random link name to this file is C:\Users";
        assert_eq!(parse_query_reply(reply).as_deref(), Some(r"C:\Users"));
    }

    #[test]
    fn reply_without_the_is_marker_is_rejected() {
        assert!(parse_query_reply("Error: invalid id").is_none());
        assert!(parse_query_reply("").is_none());
    }
}
