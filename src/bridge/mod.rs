//! Console bridge between the terminal and the serial connection
//!
//! Three units of execution share one [`Connection`]:
//! - a reader thread printing whatever the port delivers,
//! - an input thread turning console lines into events,
//! - the foreground loop, which writes lines to the port and owns shutdown.
//!
//! Both background threads feed one channel, so the foreground reacts to whichever
//! happens first: a line typed, the quit sentinel, end of input, or a dead port.
//! Every exit path stops and joins the reader before the connection is closed.

pub mod input;
#[cfg(test)]
pub(crate) mod mock;
pub mod output;
pub mod reader;

pub use output::ConsoleOutput;

use crate::config::{BridgeConfig, LineEnding, DEFAULT_PROMPT};
use crate::error::{BridgeError, Result};
use crate::serial::{Connection, Direction, Transcript};
use log::{debug, error, info, warn};
use reader::ReaderHandle;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};

/// Input line that ends the session instead of being sent
pub const QUIT_SENTINEL: &str = "q";

/// Largest chunk requested from the port per read
pub const READ_CHUNK_SIZE: usize = 1024;

pub(crate) type SharedTranscript = Arc<Mutex<Transcript>>;

/// Something the foreground loop has to react to
#[derive(Debug)]
pub enum Event {
    /// Raw bytes of a console line to forward (terminator already removed)
    Line(Vec<u8>),
    /// The quit sentinel was entered
    Quit,
    /// Standard input reached end of file
    InputClosed,
    /// Reading standard input failed
    InputFailed(io::Error),
    /// The reader hit a port error and has stopped
    PortFailed(BridgeError),
}

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Quit,
    InputClosed,
}

/// Outcome of a completed session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: Shutdown,
    pub bytes_received: u64,
    pub lines_sent: u64,
}

/// Interactive bridge over one connection
pub struct ConsoleBridge {
    connection: Arc<dyn Connection>,
    line_ending: LineEnding,
    prompt: String,
    transcript: Option<SharedTranscript>,
}

impl ConsoleBridge {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            line_ending: LineEnding::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            transcript: None,
        }
    }

    /// Build a bridge with the session settings from `config`
    pub fn from_config(connection: Arc<dyn Connection>, config: &BridgeConfig) -> Result<Self> {
        let mut bridge = Self::new(connection)
            .with_line_ending(config.line_ending)
            .with_prompt(&config.prompt);

        if let Some(ref path) = config.log_file {
            bridge = bridge.with_transcript(Transcript::create(path)?);
            info!("Recording session to {}", path.display());
        }

        Ok(bridge)
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(Arc::new(Mutex::new(transcript)));
        self
    }

    /// Run the session until the sentinel, end of input, or a failure.
    ///
    /// The connection is closed exactly once before this returns, whatever the
    /// outcome.
    pub fn run<R>(self, input: R, output: ConsoleOutput) -> Result<SessionSummary>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let reader = match ReaderHandle::spawn(
            Arc::clone(&self.connection),
            output.clone(),
            self.transcript.clone(),
            tx.clone(),
        ) {
            Ok(reader) => reader,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };

        // Detached: a blocked terminal read cannot be interrupted portably.
        if let Err(e) = input::spawn(input, self.prompt.clone(), output, tx) {
            reader.stop();
            self.close();
            return Err(e);
        }

        let mut lines_sent = 0;
        let outcome = self.forward(&rx, &mut lines_sent);

        let bytes_received = reader.stop();
        self.close();

        let reason = outcome?;
        info!(
            "Session ended ({:?}): {} bytes received, {} lines sent",
            reason, bytes_received, lines_sent
        );

        Ok(SessionSummary {
            reason,
            bytes_received,
            lines_sent,
        })
    }

    /// Writer role: react to events until the session is over
    fn forward(&self, events: &Receiver<Event>, lines_sent: &mut u64) -> Result<Shutdown> {
        loop {
            let event = match events.recv() {
                Ok(event) => event,
                Err(_) => return Ok(Shutdown::InputClosed),
            };

            match event {
                Event::Line(line) => {
                    if line.is_empty() {
                        continue;
                    }
                    let payload = self.line_ending.frame(&line);
                    if let Err(e) = self.connection.write(&payload) {
                        log_failure(&e);
                        return Err(e);
                    }
                    debug!("Sent {} bytes", payload.len());
                    if let Some(ref transcript) = self.transcript {
                        record(transcript, Direction::Sent, &String::from_utf8_lossy(&line));
                    }
                    *lines_sent += 1;
                }
                Event::Quit => return Ok(Shutdown::Quit),
                Event::InputClosed => return Ok(Shutdown::InputClosed),
                Event::InputFailed(e) => return Err(BridgeError::Input(e)),
                Event::PortFailed(e) => return Err(e),
            }
        }
    }

    fn close(&self) {
        if let Err(e) = self.connection.close() {
            warn!("Failed to close serial port: {}", e);
        }
    }
}

/// Log a failure with its cause on the same line
pub(crate) fn log_failure(e: &BridgeError) {
    match std::error::Error::source(e) {
        Some(cause) => error!("{}: {}", e, cause),
        None => error!("{}", e),
    }
}

pub(crate) fn record(transcript: &SharedTranscript, direction: Direction, text: &str) {
    transcript
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .record(direction, text);
}
