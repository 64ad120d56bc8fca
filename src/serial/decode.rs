//! Streaming UTF-8 decoding for bytes arriving from the port
//!
//! Reads split the stream at arbitrary points, so a multi-byte character can straddle
//! two chunks. The decoder holds back an incomplete trailing sequence until the next
//! chunk arrives and replaces anything that is not valid UTF-8 with U+FFFD.

use std::str;

/// Longest prefix of a UTF-8 sequence that can still be waiting for bytes
const MAX_PENDING: usize = 3;

/// Lossy UTF-8 decoder that carries partial sequences across chunks
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. Never fails: invalid bytes become U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();

        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // `valid_up_to` bounds a checked prefix, so this copies it as-is.
                    text.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence at the end; wait for the next chunk.
                            debug_assert!(after.len() <= MAX_PENDING);
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        text
    }

    /// Flush whatever is still held back. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }

    /// Number of bytes waiting for the rest of their sequence
    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
