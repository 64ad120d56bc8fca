//! In-memory stand-ins for the serial port and the console, used by the bridge tests

use crate::error::{BridgeError, Result};
use crate::serial::Connection;
use std::collections::VecDeque;
use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Simulated read timeout of the mock port
const MOCK_TIMEOUT: Duration = Duration::from_millis(2);

enum Incoming {
    Data(Vec<u8>),
    Failure(io::ErrorKind),
}

/// Scripted connection: hands out queued chunks, then behaves like an idle port
#[derive(Default)]
pub struct MockPort {
    incoming: Mutex<VecDeque<Incoming>>,
    writes: Mutex<Vec<Vec<u8>>>,
    close_calls: AtomicUsize,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_incoming(chunks: Vec<Vec<u8>>) -> Self {
        let port = Self::new();
        port.incoming
            .lock()
            .unwrap()
            .extend(chunks.into_iter().map(Incoming::Data));
        port
    }

    /// Make the read after the queued chunks fail with `kind`
    pub fn queue_failure(&self, kind: io::ErrorKind) {
        self.incoming.lock().unwrap().push_back(Incoming::Failure(kind));
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Connection for MockPort {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }

        let next = self.incoming.lock().unwrap().pop_front();
        match next {
            Some(Incoming::Data(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.incoming.lock().unwrap().push_front(Incoming::Data(rest));
                }
                Ok(n)
            }
            Some(Incoming::Failure(kind)) => Err(BridgeError::Read(io::Error::from(kind))),
            None => {
                thread::sleep(MOCK_TIMEOUT);
                Ok(0)
            }
        }
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::Write(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Console sink whose contents tests can inspect
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Console input fed from the test body; reads block until a chunk is sent and hit
/// end of input once the sender is dropped
pub struct ScriptedInput {
    chunks: Receiver<Vec<u8>>,
    current: Vec<u8>,
    pos: usize,
}

impl ScriptedInput {
    pub fn new() -> (Self, Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let input = Self {
            chunks: rx,
            current: Vec::new(),
            pos: 0,
        };
        (input, tx)
    }
}

impl Read for ScriptedInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for ScriptedInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.current.len() {
            self.current = self.chunks.recv().unwrap_or_default();
            self.pos = 0;
        }
        Ok(&self.current[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.current.len());
    }
}

/// Poll `condition` for up to five seconds
pub fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_splits_long_chunks() {
        let port = MockPort::with_incoming(vec![b"abcdef".to_vec()]);
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(port.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mock_rejects_use_after_close() {
        let port = MockPort::new();
        port.close().unwrap();
        port.close().unwrap();
        assert_eq!(port.close_calls(), 2);
        assert!(matches!(port.write(b"x"), Err(BridgeError::Closed)));
    }
}
