//! Session configuration
//!
//! Built-in constants describe the usual RFCOMM setup. A TOML file and command line
//! flags can override them, in that order.

use crate::error::{BridgeError, Result};
use crate::serial::port::{DEFAULT_BAUD_RATE, DEFAULT_PORT_PATH, DEFAULT_TIMEOUT};
use crate::serial::PortConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prompt shown before each line of input
pub const DEFAULT_PROMPT: &str = ">";

/// Terminator appended to each line before it is written to the port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Send the line exactly as typed
    #[default]
    None,
    /// Append "\n"
    Lf,
    /// Append "\r\n"
    Crlf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::None => b"",
            LineEnding::Lf => b"\n",
            LineEnding::Crlf => b"\r\n",
        }
    }

    /// Build the payload for one input line
    pub fn frame(self, line: &[u8]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(line.len() + 2);
        payload.extend_from_slice(line);
        payload.extend_from_slice(self.as_bytes());
        payload
    }
}

/// Optional settings read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub line_ending: Option<LineEnding>,
    pub prompt: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Load a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| BridgeError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Overrides given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub line_ending: Option<LineEnding>,
    pub prompt: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Fully resolved settings for one bridge session
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub port: PortConfig,
    pub line_ending: LineEnding,
    pub prompt: String,
    pub log_file: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: PortConfig::default(),
            line_ending: LineEnding::default(),
            prompt: DEFAULT_PROMPT.to_string(),
            log_file: None,
        }
    }
}

impl BridgeConfig {
    /// Merge constants, an optional file, and command line overrides
    pub fn resolve(file: Option<(&Path, FileConfig)>, cli: Overrides) -> Result<Self> {
        let (source, file) = match file {
            Some((path, config)) => (path.display().to_string(), config),
            None => ("command line".to_string(), FileConfig::default()),
        };

        let port_path = cli
            .port
            .or(file.port)
            .unwrap_or_else(|| DEFAULT_PORT_PATH.to_string());
        let baud_rate = cli.baud_rate.or(file.baud_rate).unwrap_or(DEFAULT_BAUD_RATE);
        let timeout = cli
            .timeout_ms
            .or(file.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        if baud_rate == 0 {
            return Err(BridgeError::Config {
                path: source,
                message: "baud rate must be greater than zero".to_string(),
            });
        }
        if timeout.is_zero() {
            return Err(BridgeError::Config {
                path: source,
                message: "read timeout must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            port: PortConfig::new(&port_path)
                .with_baud_rate(baud_rate)
                .with_timeout(timeout),
            line_ending: cli.line_ending.or(file.line_ending).unwrap_or_default(),
            prompt: cli
                .prompt
                .or(file.prompt)
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            log_file: cli.log_file.or(file.log_file),
        })
    }
}
