use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("failed writing cursor temp file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed replacing cursor file {path:?}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable store for the last-acknowledged journal position.
///
/// The file holds the decimal `next_usn` and nothing else. Written by the
/// single decode worker only; there are no concurrent writers to guard
/// against.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted cursor. Never fails the caller: a missing file
    /// means "from the start of journal history" (0), and a corrupt or
    /// unreadable file is logged and treated the same way. It only moves
    /// where capture resumes, while aborting startup would halt ingestion
    /// behind a file permission mistake.
    pub fn load(&self) -> u64 {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(err) => {
                warn!(path = ?self.path, error = %err, "cursor file unreadable, resuming from 0");
                return 0;
            }
        };
        match text.trim().parse::<u64>() {
            Ok(usn) => usn,
            Err(_) => {
                warn!(path = ?self.path, content = %text.trim(), "cursor file is not a number, resuming from 0");
                0
            }
        }
    }

    /// Persists `usn` atomically: write a sibling temp file, fsync it, then
    /// rename over the final path, so a mid-write crash never leaves a
    /// half-written cursor. Idempotent.
    pub fn save(&self, usn: u64) -> Result<(), CursorError> {
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = fs::File::create(path)?;
            file.write_all(usn.to_string().as_bytes())?;
            file.sync_all()
        };
        write(&tmp).map_err(|source| CursorError::Write {
            path: tmp.clone(),
            source,
        })?;

        fs::rename(&tmp, &self.path).map_err(|source| CursorError::Replace {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_store_loads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_usn.txt"));
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_usn.txt"));
        store.save(41_943_040).unwrap();
        assert_eq!(store.load(), 41_943_040);

        store.save(41_943_040).unwrap();
        assert_eq!(store.load(), 41_943_040);
    }

    #[test]
    fn save_replaces_an_existing_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("last_usn.txt"));
        store.save(10).unwrap();
        store.save(20).unwrap();
        assert_eq!(store.load(), 20);
        assert!(!dir.path().join("last_usn.txt.tmp").exists());
    }

    #[test]
    fn corrupt_cursor_file_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_usn.txt");
        fs::write(&path, "not-a-usn").unwrap();
        let store = CursorStore::new(&path);
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn file_content_is_the_bare_decimal_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_usn.txt");
        let store = CursorStore::new(&path);
        store.save(1024).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1024");
    }
}
