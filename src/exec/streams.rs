// src/exec/streams.rs

//! Streams coordinator.
//!
//! Owns the readers of one command (stdout, plus stderr unless merged), the
//! delivery queue they share, and the consumer loop that hands each
//! [`OutputEvent`] to an [`OutputSink`]. [`StreamsCoordinator::join`] is the
//! single "all output delivered" signal used by `CommandTask`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::exec::process::{OutputStream, ProcessHandle};
use crate::exec::reader::{OutputEvent, ReaderHandle, StreamReader};
use crate::types::{ReaderState, StreamOrigin};

/// Capacity of the delivery queue shared by the readers of one command.
const DELIVERY_QUEUE_CAPACITY: usize = 64;

/// Receiver of captured output lines.
///
/// Called from the coordinator's consumer loop, never from the caller's task,
/// so implementations must be `Send + Sync`.
pub trait OutputSink: Send + Sync {
    fn on_line(&self, origin: StreamOrigin, line: &str);
}

/// Per-line callback.
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// [`OutputSink`] routing lines to an optional stdout and stderr callback.
#[derive(Clone, Default)]
pub struct LineCallbacks {
    pub stdout: Option<LineCallback>,
    pub stderr: Option<LineCallback>,
}

impl fmt::Debug for LineCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineCallbacks")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

impl OutputSink for LineCallbacks {
    fn on_line(&self, origin: StreamOrigin, line: &str) {
        let callback = match origin {
            StreamOrigin::Stdout => &self.stdout,
            StreamOrigin::Stderr => &self.stderr,
        };
        if let Some(cb) = callback {
            cb(line);
        }
    }
}

/// How many lines were dispatched per stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStats {
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

impl DeliveryStats {
    fn record(&mut self, origin: StreamOrigin) {
        match origin {
            StreamOrigin::Stdout => self.stdout_lines += 1,
            StreamOrigin::Stderr => self.stderr_lines += 1,
        }
    }
}

pub struct StreamsCoordinator {
    pending: Vec<(StreamReader, OutputStream)>,
    started: Vec<ReaderHandle>,
    dispatcher: JoinHandle<DeliveryStats>,
}

impl fmt::Debug for StreamsCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamsCoordinator")
            .field("readers", &self.reader_states())
            .finish_non_exhaustive()
    }
}

impl StreamsCoordinator {
    /// Take the output streams of `process` and prepare one reader per stream.
    ///
    /// With `combine_stderr`, stderr is expected to arrive through stdout and
    /// only a stdout reader is created; a stderr stream handed out anyway is
    /// left alone rather than drained a second time.
    pub fn new(
        process: &mut dyn ProcessHandle,
        combine_stderr: bool,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<OutputEvent>(DELIVERY_QUEUE_CAPACITY);

        let mut pending = Vec::with_capacity(2);
        if let Some(stdout) = process.take_stdout() {
            pending.push((StreamReader::new(StreamOrigin::Stdout, tx.clone()), stdout));
        }
        if !combine_stderr {
            if let Some(stderr) = process.take_stderr() {
                pending.push((StreamReader::new(StreamOrigin::Stderr, tx.clone()), stderr));
            }
        }
        // Only the readers hold senders from here on, so the consumer loop
        // ends exactly when the last reader does.
        drop(tx);

        debug!(readers = pending.len(), combine_stderr, "streams coordinator created");

        let dispatcher = tokio::spawn(dispatch(rx, sink));
        Self {
            pending,
            started: Vec::new(),
            dispatcher,
        }
    }

    pub fn reader_count(&self) -> usize {
        self.pending.len() + self.started.len()
    }

    pub fn reader_states(&self) -> Vec<ReaderState> {
        self.started
            .iter()
            .map(ReaderHandle::state)
            .chain(self.pending.iter().map(|(reader, _)| reader.state()))
            .collect()
    }

    /// Start every reader that has not been started yet.
    pub fn start(&mut self) {
        for (reader, stream) in self.pending.drain(..) {
            self.started.push(reader.start(stream));
        }
    }

    /// Wait until every reader has finished and every queued line has been
    /// handed to the sink. Returns immediately when there are no readers.
    pub async fn join(self) -> DeliveryStats {
        // Dropping an unstarted reader releases its queue sender.
        for (reader, _) in self.pending {
            debug!(origin = %reader.origin(), "dropping reader that was never started");
        }

        for handle in self.started {
            handle.join().await;
        }

        match self.dispatcher.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "output dispatch loop failed");
                DeliveryStats::default()
            }
        }
    }
}

/// Consumer loop: the only place sink callbacks are invoked.
async fn dispatch(
    mut rx: mpsc::Receiver<OutputEvent>,
    sink: Arc<dyn OutputSink>,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Some(event) = rx.recv().await {
        stats.record(event.origin);
        sink.on_line(event.origin, &event.line);
    }
    debug!(
        stdout_lines = stats.stdout_lines,
        stderr_lines = stats.stderr_lines,
        "output dispatch loop finished"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::io::Cursor;
    use std::sync::Mutex;

    use crate::exec::process::BoxFuture;

    struct StreamsOnly {
        stdout: Option<OutputStream>,
        stderr: Option<OutputStream>,
    }

    impl StreamsOnly {
        fn new(stdout: Option<&str>, stderr: Option<&str>) -> Self {
            let stream =
                |s: &str| Box::new(Cursor::new(s.as_bytes().to_vec())) as OutputStream;
            Self {
                stdout: stdout.map(stream),
                stderr: stderr.map(stream),
            }
        }
    }

    impl ProcessHandle for StreamsOnly {
        fn take_stdout(&mut self) -> Option<OutputStream> {
            self.stdout.take()
        }

        fn take_stderr(&mut self) -> Option<OutputStream> {
            self.stderr.take()
        }

        fn wait(&mut self) -> BoxFuture<'_, io::Result<i32>> {
            Box::pin(async { Ok(0) })
        }

        fn kill(&mut self) -> BoxFuture<'_, io::Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<(StreamOrigin, String)>>);

    impl OutputSink for Collect {
        fn on_line(&self, origin: StreamOrigin, line: &str) {
            self.0.lock().unwrap().push((origin, line.to_string()));
        }
    }

    #[tokio::test]
    async fn two_readers_deliver_everything_before_join_returns() {
        let sink = Arc::new(Collect::default());
        let mut process = StreamsOnly::new(Some("o1\no2\n"), Some("e1\n"));

        let mut streams = StreamsCoordinator::new(&mut process, false, sink.clone());
        assert_eq!(streams.reader_count(), 2);
        assert_eq!(
            streams.reader_states(),
            vec![ReaderState::NotStarted, ReaderState::NotStarted]
        );

        streams.start();
        let stats = streams.join().await;

        assert_eq!(
            stats,
            DeliveryStats {
                stdout_lines: 2,
                stderr_lines: 1
            }
        );
        let got = sink.0.lock().unwrap().clone();
        let stdout: Vec<_> = got
            .iter()
            .filter(|(o, _)| *o == StreamOrigin::Stdout)
            .map(|(_, l)| l.as_str())
            .collect();
        assert_eq!(stdout, vec!["o1", "o2"]);
        assert_eq!(got.len(), 3);
    }

    #[tokio::test]
    async fn merged_mode_creates_a_single_reader() {
        let sink = Arc::new(Collect::default());
        let mut process = StreamsOnly::new(Some("both\n"), Some("ignored\n"));

        let mut streams = StreamsCoordinator::new(&mut process, true, sink.clone());
        assert_eq!(streams.reader_count(), 1);

        streams.start();
        let stats = streams.join().await;

        assert_eq!(stats.stdout_lines, 1);
        assert_eq!(stats.stderr_lines, 0);
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(StreamOrigin::Stdout, "both".to_string())]
        );
    }

    #[tokio::test]
    async fn join_without_readers_returns_immediately() {
        let mut process = StreamsOnly::new(None, None);
        let streams = StreamsCoordinator::new(&mut process, false, Arc::new(LineCallbacks::default()));
        assert_eq!(streams.reader_count(), 0);
        assert_eq!(streams.join().await, DeliveryStats::default());
    }

    #[tokio::test]
    async fn join_drops_readers_that_never_started() {
        let mut process = StreamsOnly::new(Some("never read\n"), None);
        let sink = Arc::new(Collect::default());
        let streams = StreamsCoordinator::new(&mut process, false, sink.clone());

        assert_eq!(streams.join().await, DeliveryStats::default());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn line_callbacks_route_by_origin() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let callbacks = LineCallbacks {
            stdout: Some(Arc::new(move |line: &str| {
                out.lock().unwrap().push(format!("out:{line}"))
            })),
            stderr: None,
        };

        callbacks.on_line(StreamOrigin::Stdout, "a");
        callbacks.on_line(StreamOrigin::Stderr, "b");

        assert_eq!(*seen.lock().unwrap(), vec!["out:a".to_string()]);
    }
}
