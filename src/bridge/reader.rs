//! Reader role: drains the port in the background and prints what arrives

use super::output::ConsoleOutput;
use super::{Event, SharedTranscript, READ_CHUNK_SIZE};
use crate::error::{BridgeError, Result};
use crate::serial::{Connection, Direction, Utf8StreamDecoder};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause after an empty read so a port that returns immediately does not spin
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Running reader thread and its stop flag
pub struct ReaderHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<u64>,
}

impl ReaderHandle {
    /// Start the reader thread
    pub fn spawn(
        connection: Arc<dyn Connection>,
        output: ConsoleOutput,
        transcript: Option<SharedTranscript>,
        events: Sender<Event>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("rfcomm-reader".to_string())
            .spawn(move || run(connection.as_ref(), &output, transcript, &events, &flag))
            .map_err(|source| BridgeError::Spawn {
                name: "reader",
                source,
            })?;

        Ok(Self { running, thread })
    }

    /// Ask the reader to stop and wait for it. The reader notices within one read
    /// timeout. Returns the number of bytes received.
    pub fn stop(self) -> u64 {
        self.running.store(false, Ordering::SeqCst);
        match self.thread.join() {
            Ok(received) => received,
            Err(_) => {
                warn!("Reader thread panicked");
                0
            }
        }
    }
}

fn run(
    connection: &dyn Connection,
    output: &ConsoleOutput,
    transcript: Option<SharedTranscript>,
    events: &Sender<Event>,
    running: &AtomicBool,
) -> u64 {
    let mut buffer = [0u8; READ_CHUNK_SIZE];
    let mut decoder = Utf8StreamDecoder::new();
    let mut received: u64 = 0;

    debug!("Reader started");

    while running.load(Ordering::SeqCst) {
        match connection.read(&mut buffer) {
            Ok(0) => thread::sleep(IDLE_BACKOFF),
            Ok(n) => {
                received += n as u64;
                let text = decoder.push(&buffer[..n]);
                debug!("Received {} bytes", n);
                output.emit(&text);
                if let Some(ref transcript) = transcript {
                    super::record(transcript, Direction::Received, &text);
                }
            }
            Err(e) => {
                super::log_failure(&e);
                let _ = events.send(Event::PortFailed(e));
                break;
            }
        }
    }

    let tail = decoder.finish();
    output.emit(&tail);
    if !tail.is_empty() {
        if let Some(ref transcript) = transcript {
            super::record(transcript, Direction::Received, &tail);
        }
    }
    debug!("Reader stopped after {} bytes", received);
    received
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::{wait_for, MockPort, SharedBuffer};
    use std::sync::mpsc;

    #[test]
    fn test_prints_incoming_bytes_once() {
        let port = Arc::new(MockPort::with_incoming(vec![b"ping\n".to_vec()]));
        let buffer = SharedBuffer::default();
        let (tx, _rx) = mpsc::channel();

        let reader = ReaderHandle::spawn(
            port.clone(),
            ConsoleOutput::new(buffer.clone()),
            None,
            tx,
        )
        .unwrap();

        assert!(wait_for(|| buffer.contents().contains("ping")));
        let received = reader.stop();

        assert_eq!(received, 5);
        assert_eq!(buffer.contents(), "ping\n");
        assert_eq!(buffer.contents().matches("ping").count(), 1);
    }

    #[test]
    fn test_invalid_utf8_does_not_stop_reader() {
        let port = Arc::new(MockPort::with_incoming(vec![
            vec![b'a', 0xFF],
            vec![0xC3],
            vec![0xA9, b'!'],
        ]));
        let buffer = SharedBuffer::default();
        let (tx, rx) = mpsc::channel();

        let reader = ReaderHandle::spawn(
            port.clone(),
            ConsoleOutput::new(buffer.clone()),
            None,
            tx,
        )
        .unwrap();

        assert!(wait_for(|| buffer.contents().ends_with("é!")));
        reader.stop();

        assert_eq!(buffer.contents(), "a\u{FFFD}é!");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dangling_sequence_is_flushed_to_transcript() {
        use crate::serial::Transcript;
        use std::sync::Mutex;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let transcript = Arc::new(Mutex::new(Transcript::create(&path).unwrap()));

        // Ends in the first two bytes of a four-byte sequence
        let port = Arc::new(MockPort::with_incoming(vec![vec![b'o', b'k', 0xF0, 0x9F]]));
        let buffer = SharedBuffer::default();
        let (tx, _rx) = mpsc::channel();

        let reader = ReaderHandle::spawn(
            port.clone(),
            ConsoleOutput::new(buffer.clone()),
            Some(transcript),
            tx,
        )
        .unwrap();

        assert!(wait_for(|| buffer.contents() == "ok"));
        reader.stop();

        assert_eq!(buffer.contents(), "ok\u{FFFD}");
        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<&str> = content.lines().collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("<< ok"));
        assert!(entries[1].ends_with("<< \u{FFFD}"));
    }

    #[test]
    fn test_read_failure_is_reported() {
        let port = Arc::new(MockPort::with_incoming(vec![b"last words".to_vec()]));
        port.queue_failure(std::io::ErrorKind::BrokenPipe);
        let buffer = SharedBuffer::default();
        let (tx, rx) = mpsc::channel();

        let reader = ReaderHandle::spawn(
            port.clone(),
            ConsoleOutput::new(buffer.clone()),
            None,
            tx,
        )
        .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(event, Event::PortFailed(BridgeError::Read(_))));
        assert_eq!(reader.stop(), 10);
        assert_eq!(buffer.contents(), "last words");
    }
}
