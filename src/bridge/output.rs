//! Console output shared by the reader and input roles

use log::debug;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Cloneable handle to the terminal (or any writer in tests).
///
/// Each `emit` is written and flushed under one lock, so a received chunk and a
/// prompt never tear each other; their relative order is not controlled.
#[derive(Clone)]
pub struct ConsoleOutput {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleOutput {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        let sink: Box<dyn Write + Send> = Box::new(writer);
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Write `text` and flush. A broken terminal is not worth ending the session for.
    pub fn emit(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = sink.write_all(text.as_bytes()).and_then(|_| sink.flush()) {
            debug!("Console write failed: {}", e);
        }
    }
}
