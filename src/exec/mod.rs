// src/exec/mod.rs

//! Command execution layer.
//!
//! - [`process`] defines the `ProcessHandle` contract and the local,
//!   `tokio::process`-backed implementation.
//! - [`reader`] drains one output stream into the delivery queue.
//! - [`streams`] owns the readers of a command plus the consumer loop that
//!   hands lines to callbacks, and signals when all output is delivered.
//! - [`task`] supervises a command from launch to its terminal state.

pub mod process;
pub mod reader;
pub mod streams;
pub mod task;

pub use process::{LocalProcess, OutputStream, ProcessHandle};
pub use reader::{OutputEvent, ReaderHandle, StreamReader};
pub use streams::{DeliveryStats, LineCallback, LineCallbacks, OutputSink, StreamsCoordinator};
pub use task::{CommandTask, ExecOptions};
