//! Error types for the console bridge

use std::io;
use thiserror::Error;

/// Failures surfaced by the serial handle and the bridge loops
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The port could not be opened (bad path, permissions, device absent)
    #[error("Failed to open serial port {path}")]
    Connection {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to read from serial port")]
    Read(#[source] io::Error),

    #[error("Failed to write to serial port")]
    Write(#[source] io::Error),

    #[error("Serial port is closed")]
    Closed,

    #[error("Failed to read console input")]
    Input(#[source] io::Error),

    #[error("Invalid configuration in {path}: {message}")]
    Config { path: String, message: String },

    #[error("Failed to open transcript file")]
    Transcript(#[source] io::Error),

    #[error("Failed to start {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
