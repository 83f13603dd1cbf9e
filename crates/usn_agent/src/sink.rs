use std::io::{self, Write};

use usn_events::{EventSink, SinkError, SinkRecord};

/// Writes each delivered record as one JSON object per line.
pub struct JsonLineSink<W: Write> {
    writer: W,
}

impl JsonLineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for JsonLineSink<W> {
    fn deliver(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
