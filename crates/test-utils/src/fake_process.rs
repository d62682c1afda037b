use std::io;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, DuplexStream, ReadBuf};
use tokio::sync::oneshot;

use rcontrol::exec::process::BoxFuture;
use rcontrol::exec::{OutputStream, ProcessHandle};

/// Exit code reported by a killed `FakeProcess`.
pub const KILLED_EXIT_CODE: i32 = -9;

enum Exit {
    Immediate(i32),
    Controlled(Option<oneshot::Receiver<i32>>),
    Killed(i32),
}

/// A scriptable `ProcessHandle` that doesn't spawn anything.
///
/// - output comes from in-memory buffers, pipes the test writes to, or a
///   stream that fails mid-way
/// - the exit code is either fixed or released by the test via `ExitControl`
/// - hook and kill invocations are counted and visible through
///   `FakeProcessProbe`
pub struct FakeProcess {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit: Exit,
    probe: FakeProcessProbe,
}

/// Counters shared with a `FakeProcess` after it has been handed to a task.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessProbe {
    finished_hooks: Arc<AtomicUsize>,
    kills: Arc<AtomicUsize>,
}

impl FakeProcessProbe {
    pub fn finished_hooks(&self) -> usize {
        self.finished_hooks.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

/// Lets a test decide when a controlled `FakeProcess` exits.
#[derive(Debug)]
pub struct ExitControl {
    tx: oneshot::Sender<i32>,
}

impl ExitControl {
    pub fn exit(self, code: i32) {
        let _ = self.tx.send(code);
    }
}

impl FakeProcess {
    /// A process that exits with `code` as soon as it is waited on.
    pub fn exiting_with(code: i32) -> Self {
        Self {
            stdout: None,
            stderr: None,
            exit: Exit::Immediate(code),
            probe: FakeProcessProbe::default(),
        }
    }

    /// A process that keeps running until `ExitControl::exit` is called.
    pub fn controlled() -> (Self, ExitControl) {
        let (tx, rx) = oneshot::channel();
        let process = Self {
            stdout: None,
            stderr: None,
            exit: Exit::Controlled(Some(rx)),
            probe: FakeProcessProbe::default(),
        };
        (process, ExitControl { tx })
    }

    pub fn stdout_lines<S: AsRef<str>>(mut self, lines: &[S]) -> Self {
        self.stdout = Some(lines_stream(lines));
        self
    }

    pub fn stderr_lines<S: AsRef<str>>(mut self, lines: &[S]) -> Self {
        self.stderr = Some(lines_stream(lines));
        self
    }

    pub fn stdout_stream(mut self, stream: OutputStream) -> Self {
        self.stdout = Some(stream);
        self
    }

    pub fn stderr_stream(mut self, stream: OutputStream) -> Self {
        self.stderr = Some(stream);
        self
    }

    /// Stdout backed by a pipe; the test writes to the returned end and
    /// closes it by dropping it.
    pub fn piped_stdout(self) -> (Self, DuplexStream) {
        let (writer, reader) = tokio::io::duplex(1024);
        (self.stdout_stream(Box::new(reader)), writer)
    }

    pub fn probe(&self) -> FakeProcessProbe {
        self.probe.clone()
    }
}

impl ProcessHandle for FakeProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn wait(&mut self) -> BoxFuture<'_, io::Result<i32>> {
        Box::pin(async move {
            let pending = match &mut self.exit {
                Exit::Immediate(code) | Exit::Killed(code) => return Ok(*code),
                Exit::Controlled(rx) => rx.take(),
            };

            let rx = pending.ok_or_else(|| {
                io::Error::new(io::ErrorKind::Other, "fake process wait already in progress")
            })?;
            let code = rx.await.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "exit control dropped")
            })?;
            self.exit = Exit::Immediate(code);
            Ok(code)
        })
    }

    fn kill(&mut self) -> BoxFuture<'_, io::Result<()>> {
        Box::pin(async move {
            self.probe.kills.fetch_add(1, Ordering::SeqCst);
            self.exit = Exit::Killed(KILLED_EXIT_CODE);
            Ok(())
        })
    }

    fn on_finished(&mut self) {
        self.probe.finished_hooks.fetch_add(1, Ordering::SeqCst);
    }
}

fn lines_stream<S: AsRef<str>>(lines: &[S]) -> OutputStream {
    let mut data = String::new();
    for line in lines {
        data.push_str(line.as_ref());
        data.push('\n');
    }
    Box::new(Cursor::new(data.into_bytes()))
}

/// A stream that yields `data` and then fails every further read.
#[derive(Debug)]
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.data.len() {
            let n = (this.data.len() - this.pos).min(buf.remaining());
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        } else {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "stream broke",
            )))
        }
    }
}
