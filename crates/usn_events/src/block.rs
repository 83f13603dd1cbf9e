use crate::error::DecodeError;

/// One blank-line-terminated group of raw lines. Transient: discarded once
/// decoded into a typed header or record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub lines: Vec<String>,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A framed block tagged with its position in the stream: the first block
/// of a capture session is always the header, everything after is a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramedBlock {
    Header(Block),
    Record(Block),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    AwaitingHeader,
    AwaitingRecord,
}

/// Groups a raw line stream into blocks on blank-line terminators.
///
/// Finite per capture session: once the source closes, call [`finish`] and
/// build a new framer for the next session.
///
/// [`finish`]: BlockFramer::finish
#[derive(Debug)]
pub struct BlockFramer {
    state: FramerState,
    pending: Vec<String>,
}

impl BlockFramer {
    pub fn new() -> Self {
        Self {
            state: FramerState::AwaitingHeader,
            pending: Vec::new(),
        }
    }

    /// Feeds one raw line. Returns the completed block when `line` is a
    /// blank terminator (a terminator always emits, even for an empty
    /// block), `None` while a block is still accumulating.
    pub fn push_line(&mut self, line: &str) -> Option<FramedBlock> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.chars().all(|ch| ch.is_whitespace()) {
            self.pending.push(line.to_string());
            return None;
        }

        let block = Block {
            lines: std::mem::take(&mut self.pending),
        };
        Some(match self.state {
            FramerState::AwaitingHeader => {
                self.state = FramerState::AwaitingRecord;
                FramedBlock::Header(block)
            }
            FramerState::AwaitingRecord => FramedBlock::Record(block),
        })
    }

    /// Consumes the framer at source close. A non-empty pending block means
    /// the stream was cut mid-record: the partial block is discarded and
    /// reported, never decoded.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TruncatedStream {
                pending_lines: self.pending.len(),
            })
        }
    }
}

impl Default for BlockFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_block_is_the_header_then_records() {
        let mut framer = BlockFramer::new();
        assert!(framer.push_line("USN Journal ID : 0x1").is_none());
        assert!(framer.push_line("Next USN       : 2048").is_none());
        let header = framer.push_line("").unwrap();
        assert!(matches!(&header, FramedBlock::Header(b) if b.lines.len() == 2));

        assert!(framer.push_line("Usn    : 2048").is_none());
        let record = framer.push_line("").unwrap();
        assert!(matches!(&record, FramedBlock::Record(b) if b.lines.len() == 1));
    }

    #[test]
    fn blank_terminator_emits_even_an_empty_block() {
        let mut framer = BlockFramer::new();
        framer.push_line("key : value");
        framer.push_line("");
        let empty = framer.push_line("").unwrap();
        assert!(matches!(&empty, FramedBlock::Record(b) if b.is_empty()));
    }

    #[test]
    fn carriage_returns_and_whitespace_count_as_blank() {
        let mut framer = BlockFramer::new();
        framer.push_line("key : value\r");
        let block = framer.push_line("  \r").unwrap();
        let FramedBlock::Header(block) = block else {
            panic!("expected header");
        };
        assert_eq!(block.lines, vec!["key : value".to_string()]);
    }

    #[test]
    fn finish_with_pending_lines_is_a_truncated_stream() {
        let mut framer = BlockFramer::new();
        framer.push_line("Usn    : 2048");
        framer.push_line("Reason : 0x100: File create");
        let err = framer.finish().unwrap_err();
        assert!(matches!(err, DecodeError::TruncatedStream { pending_lines: 2 }));
    }

    #[test]
    fn finish_after_a_terminator_is_clean() {
        let mut framer = BlockFramer::new();
        framer.push_line("key : value");
        framer.push_line("");
        assert!(framer.finish().is_ok());
    }
}
