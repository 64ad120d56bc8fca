//! Session transcript
//!
//! Appends every received chunk and every sent line to a log file with a local
//! timestamp, so a session can be reviewed after the terminal scrolls away.

use crate::error::{BridgeError, Result};
use chrono::Local;
use log::warn;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Direction of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    fn marker(self) -> &'static str {
        match self {
            Direction::Received => "<<",
            Direction::Sent => ">>",
        }
    }
}

/// Timestamped record of the traffic in one session
pub struct Transcript {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl Transcript {
    /// Create (or truncate) the transcript file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(BridgeError::Transcript)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Record one entry. Failures are logged and otherwise ignored; losing the
    /// transcript must not end the session.
    pub fn record(&mut self, direction: Direction, text: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let result = writeln!(
            self.writer,
            "[{}] {} {}",
            timestamp,
            direction.marker(),
            text.escape_debug()
        )
        .and_then(|_| self.writer.flush());

        if let Err(e) = result {
            warn!("Failed to write transcript entry: {}", e);
        }
    }
}
