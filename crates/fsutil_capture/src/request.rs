/// Where a capture session starts reading the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Resume at a specific sequence number (`startusn=N`). Zero means the
    /// start of journal history.
    Usn(u64),
    /// Follow the live tail only (`wait`), ignoring history.
    Tail,
}

/// Arguments for one `fsutil usn readJournal` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadJournalRequest {
    pub volume: String,
    pub start: StartPosition,
}

impl ReadJournalRequest {
    pub fn new(volume: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            start: StartPosition::Usn(0),
        }
    }

    pub fn starting_at(mut self, start: StartPosition) -> Self {
        self.start = start;
        self
    }

    /// Argument vector passed to the fsutil binary.
    pub fn argv(&self) -> Vec<String> {
        let mut args = vec![
            "usn".to_string(),
            "readJournal".to_string(),
            self.volume.clone(),
        ];
        match self.start {
            StartPosition::Usn(usn) => args.push(format!("startusn={usn}")),
            StartPosition::Tail => args.push("wait".to_string()),
        }
        args
    }
}
