use std::{future::Future, path::PathBuf, time::Duration};

use fsutil_capture::{CaptureSource, FsutilClient, ReadJournalRequest, StartPosition};
use tokio::{
    sync::{mpsc, watch},
    task,
};
use tracing::{debug, info, warn};
use usn_events::{
    decode_header, decode_record, decode_reason_mask, BlockFramer, CursorStore, DecodeError,
    EventSink, FramedBlock, JournalHeader,
};

use crate::{enrich::ParentPathResolver, error::SessionError};

/// Frame type on the capture-to-decode channel. End-of-stream is a
/// distinguished value rather than a closed channel or an empty line, so
/// the decode worker can keep draining buffered lines and still tell
/// "source closed" apart from blank journal output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFrame {
    Line(String),
    EndOfStream,
}

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub volume: String,
    pub cursor_path: PathBuf,
    /// Bound of the capture-to-decode channel. A full channel blocks the
    /// capture reader instead of buffering or dropping lines.
    pub channel_capacity: usize,
    /// How long the capture process gets to exit before it is killed.
    pub shutdown_timeout: Duration,
    /// Ignore the stored cursor and follow the live journal tail.
    pub from_now: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            volume: "C:".to_string(),
            cursor_path: PathBuf::from("last_usn.txt"),
            channel_capacity: 1024,
            shutdown_timeout: Duration::from_secs(2),
            from_now: false,
        }
    }
}

/// Lifecycle of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Streaming,
    Draining,
    Faulted,
    Stopped,
}

fn transition(state: &mut SessionState, next: SessionState) {
    let from = *state;
    debug!(?from, ?next, "session state");
    *state = next;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub headers_decoded: u64,
    pub records_emitted: u64,
    pub records_skipped: u64,
    pub sink_failures: u64,
    pub enrichment_failures: u64,
}

/// How a session ended. Only `Faulted` maps to a non-zero process exit.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Source closed cleanly after a terminated final block.
    Completed,
    /// Source closed mid-block; the partial block was discarded.
    Truncated { pending_lines: usize },
    /// The shutdown signal ended the session.
    Cancelled,
    Faulted(SessionError),
}

impl SessionOutcome {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionOutcome::Faulted(_))
    }
}

#[derive(Debug)]
pub struct SessionReport {
    pub counters: SessionCounters,
    pub outcome: SessionOutcome,
}

/// Requests a graceful shutdown of the pipeline it was created with.
#[derive(Debug)]
pub struct ShutdownSignal(watch::Sender<bool>);

impl ShutdownSignal {
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

/// How the source has exited, as classified after end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceExit {
    Clean,
    Crashed { code: Option<i32> },
}

/// The seam between the pipeline and the external capture child: a lazy
/// line stream plus a bounded-exit handle. [`CaptureSource`] is the real
/// implementation; tests script their own.
pub trait CaptureStream: Send + 'static {
    fn next_line(&mut self) -> impl Future<Output = std::io::Result<Option<String>>> + Send;
    fn finish(self, timeout: Duration) -> impl Future<Output = std::io::Result<SourceExit>> + Send;
}

impl CaptureStream for CaptureSource {
    fn next_line(&mut self) -> impl Future<Output = std::io::Result<Option<String>>> + Send {
        CaptureSource::next_line(self)
    }

    fn finish(self, timeout: Duration) -> impl Future<Output = std::io::Result<SourceExit>> + Send {
        async move {
            let status = self.shutdown(timeout).await?;
            Ok(if status.success() {
                SourceExit::Clean
            } else {
                SourceExit::Crashed {
                    code: status.code(),
                }
            })
        }
    }
}

/// One end-to-end capture session: owns the channel, the cancellation
/// signal, the capture task, and the decode worker. No ambient global
/// state, so independent sessions can run side by side.
pub struct CapturePipeline {
    config: PipelineConfig,
    client: FsutilClient,
    sink: Box<dyn EventSink>,
    resolver: Option<Box<dyn ParentPathResolver>>,
    cancel: watch::Receiver<bool>,
    state: SessionState,
}

impl CapturePipeline {
    pub fn new(
        config: PipelineConfig,
        client: FsutilClient,
        sink: Box<dyn EventSink>,
    ) -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                config,
                client,
                sink,
                resolver: None,
                cancel: rx,
                state: SessionState::Idle,
            },
            ShutdownSignal(tx),
        )
    }

    /// Attaches a parent-path resolver; records are then emitted with
    /// best-effort absolute names.
    pub fn with_resolver(mut self, resolver: Box<dyn ParentPathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Loads the cursor, starts the capture source there, and runs the
    /// session to completion.
    pub async fn run(mut self) -> SessionReport {
        transition(&mut self.state, SessionState::Starting);
        let start = if self.config.from_now {
            StartPosition::Tail
        } else {
            StartPosition::Usn(CursorStore::new(&self.config.cursor_path).load())
        };
        let request = ReadJournalRequest::new(self.config.volume.clone()).starting_at(start);
        info!(volume = %request.volume, ?start, "starting capture session");

        match self.client.spawn_read_journal(&request).await {
            Ok(source) => self.run_with_source(source).await,
            Err(err) => {
                transition(&mut self.state, SessionState::Faulted);
                transition(&mut self.state, SessionState::Stopped);
                SessionReport {
                    counters: SessionCounters::default(),
                    outcome: SessionOutcome::Faulted(SessionError::Capture(err)),
                }
            }
        }
    }

    /// Runs the session against an already-started source.
    pub async fn run_with_source<S: CaptureStream>(self, source: S) -> SessionReport {
        let CapturePipeline {
            config,
            client: _,
            sink,
            resolver,
            cancel,
            mut state,
        } = self;
        if state == SessionState::Idle {
            transition(&mut state, SessionState::Starting);
        }

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let cursor = CursorStore::new(&config.cursor_path);
        let volume = config.volume.clone();

        transition(&mut state, SessionState::Streaming);
        let capture = tokio::spawn(capture_task(
            source,
            tx,
            cancel,
            config.shutdown_timeout,
        ));
        let worker = task::spawn_blocking(move || decode_worker(rx, cursor, sink, resolver, volume));

        let capture_end = match capture.await {
            Ok(end) => end,
            Err(join_err) => CaptureEnd::ReadFailed(std::io::Error::other(join_err.to_string())),
        };
        transition(&mut state, SessionState::Draining);
        let decode = match worker.await {
            Ok(result) => result,
            Err(join_err) => DecodeResult {
                counters: SessionCounters::default(),
                end: Err(SessionError::WorkerJoin(join_err.to_string())),
            },
        };

        let outcome = match (decode.end, capture_end) {
            (Err(err), _) => SessionOutcome::Faulted(err),
            (_, CaptureEnd::Crashed { code }) => {
                SessionOutcome::Faulted(SessionError::SourceCrash { code })
            }
            (_, CaptureEnd::ReadFailed(err)) => {
                SessionOutcome::Faulted(SessionError::SourceIo(err))
            }
            (Ok(_), CaptureEnd::Cancelled) => SessionOutcome::Cancelled,
            (Ok(DecodeEnd::Truncated { pending_lines }), _) => {
                SessionOutcome::Truncated { pending_lines }
            }
            (Ok(DecodeEnd::Completed), _) => SessionOutcome::Completed,
        };
        if outcome.is_fatal() {
            transition(&mut state, SessionState::Faulted);
        }
        transition(&mut state, SessionState::Stopped);

        SessionReport {
            counters: decode.counters,
            outcome,
        }
    }
}

#[derive(Debug)]
enum CaptureEnd {
    Clean,
    Cancelled,
    ReceiverClosed,
    Crashed { code: Option<i32> },
    ReadFailed(std::io::Error),
}

enum LoopEnd {
    Cancelled,
    Eof,
    ReceiverClosed,
    ReadFailed(std::io::Error),
}

/// Reads raw lines from the source and forwards them over the bounded
/// channel. Backpressure is the point: a full channel blocks the send, so
/// a slow sink stalls capture instead of losing lines.
async fn capture_task<S: CaptureStream>(
    mut source: S,
    tx: mpsc::Sender<CaptureFrame>,
    mut cancel: watch::Receiver<bool>,
    shutdown_timeout: Duration,
) -> CaptureEnd {
    let mut cancel_closed = false;
    let end = loop {
        tokio::select! {
            res = cancel.changed(), if !cancel_closed => match res {
                Ok(()) => {
                    if *cancel.borrow_and_update() {
                        debug!("cancellation observed, capture stops reading");
                        break LoopEnd::Cancelled;
                    }
                }
                Err(_) => cancel_closed = true,
            },
            line = source.next_line() => match line {
                Ok(Some(line)) => {
                    if tx.send(CaptureFrame::Line(line)).await.is_err() {
                        break LoopEnd::ReceiverClosed;
                    }
                }
                Ok(None) => break LoopEnd::Eof,
                Err(err) => break LoopEnd::ReadFailed(err),
            },
        }
    };

    // The decode worker must observe end-of-stream, not a closed channel;
    // delivery is best-effort if the worker already went away.
    if !matches!(end, LoopEnd::ReceiverClosed) {
        let _ = tx.send(CaptureFrame::EndOfStream).await;
    }

    let exit = source.finish(shutdown_timeout).await;
    match end {
        LoopEnd::Cancelled => CaptureEnd::Cancelled,
        LoopEnd::ReceiverClosed => CaptureEnd::ReceiverClosed,
        LoopEnd::ReadFailed(err) => CaptureEnd::ReadFailed(err),
        LoopEnd::Eof => match exit {
            Ok(SourceExit::Clean) => CaptureEnd::Clean,
            Ok(SourceExit::Crashed { code }) => CaptureEnd::Crashed { code },
            Err(err) => CaptureEnd::ReadFailed(err),
        },
    }
}

enum DecodeEnd {
    Completed,
    Truncated { pending_lines: usize },
}

struct DecodeResult {
    counters: SessionCounters,
    end: Result<DecodeEnd, SessionError>,
}

/// Owns framing, decoding, cursor writes, enrichment, and sink delivery.
/// The only writer of the cursor store.
fn decode_worker(
    mut rx: mpsc::Receiver<CaptureFrame>,
    cursor: CursorStore,
    mut sink: Box<dyn EventSink>,
    mut resolver: Option<Box<dyn ParentPathResolver>>,
    volume: String,
) -> DecodeResult {
    let mut counters = SessionCounters::default();
    let mut framer = BlockFramer::new();
    let mut header: Option<JournalHeader> = None;

    let fatal = |counters: SessionCounters,
                 rx: &mut mpsc::Receiver<CaptureFrame>,
                 err: SessionError| {
        // Best-effort drain so the capture task is not left blocked on a
        // full channel before it notices the receiver is gone.
        while rx.try_recv().is_ok() {}
        DecodeResult {
            counters,
            end: Err(err),
        }
    };

    loop {
        let frame = match rx.blocking_recv() {
            Some(frame) => frame,
            // Channel closed without a sentinel: the capture task died.
            // The session outcome carries the cause.
            None => break,
        };
        let line = match frame {
            CaptureFrame::EndOfStream => break,
            CaptureFrame::Line(line) => line,
        };
        let Some(block) = framer.push_line(&line) else {
            continue;
        };
        match block {
            FramedBlock::Header(block) => match decode_header(&block) {
                Ok(decoded) => {
                    // Cursor advances before any record under this header
                    // is processed: a crash after this point re-delivers,
                    // never loses.
                    if let Err(err) = cursor.save(decoded.next_usn) {
                        return fatal(counters, &mut rx, err.into());
                    }
                    debug!(next_usn = decoded.next_usn, "header decoded, cursor advanced");
                    counters.headers_decoded += 1;
                    header = Some(decoded);
                }
                Err(err) => return fatal(counters, &mut rx, err.into()),
            },
            FramedBlock::Record(block) => {
                if block.is_empty() {
                    continue;
                }
                let Some(header) = header.as_ref() else {
                    continue;
                };
                match decode_record(&block, header) {
                    Ok(mut record) => {
                        let reasons = decode_reason_mask(record.reason_mask);
                        if let Some(resolver) = resolver.as_mut() {
                            match resolver.resolve(&volume, &record.parent_file_id) {
                                Ok(parent) => {
                                    record.file_name = format!("{parent}\\{}", record.file_name);
                                }
                                Err(err) => {
                                    warn!(usn = record.usn, error = %err, "enrichment failed, emitting unenriched record");
                                    counters.enrichment_failures += 1;
                                }
                            }
                        }
                        let usn = record.usn;
                        match sink.deliver(&record.into_sink_fields(&reasons)) {
                            Ok(()) => counters.records_emitted += 1,
                            Err(err) => {
                                warn!(usn, error = %err, "sink delivery failed, record lost for the sink");
                                counters.sink_failures += 1;
                            }
                        }
                    }
                    Err(err) if !err.is_fatal() => {
                        warn!(error = %err, "skipping malformed record");
                        counters.records_skipped += 1;
                    }
                    Err(err) => return fatal(counters, &mut rx, err.into()),
                }
            }
        }
    }

    let end = match framer.finish() {
        Ok(()) => Ok(DecodeEnd::Completed),
        Err(DecodeError::TruncatedStream { pending_lines }) => {
            warn!(pending_lines, "stream closed mid-block, partial block discarded");
            Ok(DecodeEnd::Truncated { pending_lines })
        }
        Err(other) => Err(other.into()),
    };
    DecodeResult { counters, end }
}
