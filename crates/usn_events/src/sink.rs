use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// The self-describing shape handed to the event sink: one field-name to
/// string-value mapping per change record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SinkRecord(pub BTreeMap<String, String>);

impl SinkRecord {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sink rejected record: {0}")]
    Rejected(String),
}

/// Destination for decoded change records.
///
/// Invoked synchronously from the decode worker, one record per call; sink
/// latency therefore throttles channel draining and, through backpressure,
/// the capture rate. Delivery failures are non-fatal to the session.
pub trait EventSink: Send {
    fn deliver(&mut self, record: &SinkRecord) -> Result<(), SinkError>;
}
