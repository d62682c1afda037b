use std::sync::{Arc, Mutex};

use rcontrol::exec::{ExecOptions, OutputEvent, OutputSink};
use rcontrol::StreamOrigin;

/// An `OutputSink` that records every line it is handed, in dispatch order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<OutputEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything recorded so far, in dispatch order.
    pub fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Lines recorded for one stream, in dispatch order.
    pub fn lines(&self, origin: StreamOrigin) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.origin == origin)
            .map(|e| e.line.clone())
            .collect()
    }

    pub fn count(&self, origin: StreamOrigin) -> usize {
        self.lines(origin).len()
    }
}

impl OutputSink for RecordingSink {
    fn on_line(&self, origin: StreamOrigin, line: &str) {
        self.events.lock().unwrap().push(OutputEvent {
            origin,
            line: line.to_string(),
        });
    }
}

/// `ExecOptions` that record into `sink`.
pub fn recording_options(sink: &Arc<RecordingSink>) -> ExecOptions {
    ExecOptions::new().sink(sink.clone())
}

/// Per-stream line collector usable as an `on_stdout`/`on_stderr` callback.
#[derive(Debug, Clone, Default)]
pub struct LineCollector {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(&str) + Send + Sync + use<> {
        let lines = Arc::clone(&self.lines);
        move |line: &str| lines.lock().unwrap().push(line.to_string())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
