//! Serial port access for the RFCOMM bridge
//!
//! This module provides:
//! - Opening the RFCOMM device node and concurrent read/write access to it
//! - Listing available serial ports
//! - Lossy UTF-8 decoding of the incoming byte stream
//! - An optional session transcript

pub mod decode;
pub mod port;
pub mod transcript;

pub use decode::Utf8StreamDecoder;
pub use port::{Connection, PortConfig, SerialConnection};
pub use transcript::{Direction, Transcript};
