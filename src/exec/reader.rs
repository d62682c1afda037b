// src/exec/reader.rs

//! Single-stream reader.
//!
//! A [`StreamReader`] drains one output stream of a command on its own Tokio
//! task and pushes every line onto the shared delivery queue as an
//! [`OutputEvent`]. Starting a reader consumes it, so a reader can only ever be
//! started once.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::exec::process::OutputStream;
use crate::types::{ReaderState, StreamOrigin};

/// One unit of captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub origin: StreamOrigin,
    pub line: String,
}

/// A reader that has not been started yet.
#[derive(Debug)]
pub struct StreamReader {
    origin: StreamOrigin,
    queue: mpsc::Sender<OutputEvent>,
}

impl StreamReader {
    pub fn new(origin: StreamOrigin, queue: mpsc::Sender<OutputEvent>) -> Self {
        Self { origin, queue }
    }

    pub fn origin(&self) -> StreamOrigin {
        self.origin
    }

    pub fn state(&self) -> ReaderState {
        ReaderState::NotStarted
    }

    /// Begin draining `stream` in the background.
    pub fn start(self, stream: OutputStream) -> ReaderHandle {
        let origin = self.origin;
        let handle = tokio::spawn(drain(stream, origin, self.queue));
        ReaderHandle { origin, handle }
    }
}

/// A started reader.
#[derive(Debug)]
pub struct ReaderHandle {
    origin: StreamOrigin,
    handle: JoinHandle<usize>,
}

impl ReaderHandle {
    pub fn origin(&self) -> StreamOrigin {
        self.origin
    }

    pub fn state(&self) -> ReaderState {
        if self.handle.is_finished() {
            ReaderState::Finished
        } else {
            ReaderState::Running
        }
    }

    /// Wait until the stream is exhausted; returns the number of lines read.
    pub async fn join(self) -> usize {
        match self.handle.await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(origin = %self.origin, error = %e, "stream reader task failed");
                0
            }
        }
    }
}

async fn drain(
    stream: OutputStream,
    origin: StreamOrigin,
    queue: mpsc::Sender<OutputEvent>,
) -> usize {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut lines = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                trace!(%origin, %line, "read line");
                if queue.send(OutputEvent { origin, line }).await.is_err() {
                    debug!(%origin, "delivery queue closed; stopping reader");
                    break;
                }
                lines += 1;
            }
            Err(e) => {
                // Capture degrades to end-of-stream; the command itself is
                // unaffected.
                debug!(%origin, error = %e, "read error; treating as end of stream");
                break;
            }
        }
    }

    debug!(%origin, lines, "stream reader finished");
    lines
}

/// Strip the line terminator and decode as (lossy) UTF-8.
fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && buf[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
