//! Serial port configuration and connection management
//!
//! Opens the RFCOMM device node and hands out a [`Connection`] that the reader and
//! writer roles can drive concurrently.

use crate::error::{BridgeError, Result};
use colored::Colorize;
use log::{debug, info};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Virtual serial device bound by `rfcomm bind`
pub const DEFAULT_PORT_PATH: &str = "/dev/rfcomm0";

/// Baud rate used by the RFCOMM link
pub const DEFAULT_BAUD_RATE: u32 = 921600;

/// How long a single read blocks before reporting "no data"
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for serial port connection
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Serial port path (e.g., /dev/rfcomm0)
    pub port_path: String,
    /// Baud rate (default: 921600)
    pub baud_rate: u32,
    /// Data bits (default: 8)
    pub data_bits: DataBits,
    /// Parity (default: None)
    pub parity: Parity,
    /// Stop bits (default: 1)
    pub stop_bits: StopBits,
    /// Flow control (default: None)
    pub flow_control: FlowControl,
    /// Read timeout
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from(DEFAULT_PORT_PATH),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration for `port_path` with the default link settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A byte pipe shared by the reader and writer roles.
///
/// `read` and `write` may be called concurrently from two threads. `close` waits for
/// any in-flight operation and is idempotent.
pub trait Connection: Send + Sync {
    /// Read up to `buf.len()` bytes. A read timeout is `Ok(0)`, not an error.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data` and flush it to the device.
    fn write(&self, data: &[u8]) -> Result<()>;

    /// Release the device. Calling it again does nothing.
    fn close(&self) -> Result<()>;
}

/// Serial device opened through `serialport`, split into independent read and write
/// handles so that a blocked read never holds up a write.
pub struct SerialConnection {
    config: PortConfig,
    reader: Mutex<Option<Box<dyn SerialPort>>>,
    writer: Mutex<Option<Box<dyn SerialPort>>>,
}

impl SerialConnection {
    /// Open a serial connection with the given configuration
    pub fn open(config: PortConfig) -> Result<Self> {
        let connection_error = |source| BridgeError::Connection {
            path: config.port_path.clone(),
            source,
        };

        let writer = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.timeout)
            .open()
            .map_err(connection_error)?;
        let reader = writer.try_clone().map_err(connection_error)?;

        info!(
            "Opened {} at {} baud (timeout {:?})",
            config.port_path, config.baud_rate, config.timeout
        );

        Ok(Self {
            config,
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Get the port configuration
    pub fn config(&self) -> &PortConfig {
        &self.config
    }
}

fn lock(handle: &Mutex<Option<Box<dyn SerialPort>>>) -> MutexGuard<'_, Option<Box<dyn SerialPort>>> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map the outcome of a raw read so that an expired timeout reads as "no data"
pub(crate) fn absorb_timeout(result: io::Result<usize>) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
        Err(e) => Err(BridgeError::Read(e)),
    }
}

impl Connection for SerialConnection {
    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = lock(&self.reader);
        let port = guard.as_mut().ok_or(BridgeError::Closed)?;
        absorb_timeout(port.read(buf))
    }

    fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = lock(&self.writer);
        let port = guard.as_mut().ok_or(BridgeError::Closed)?;
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(BridgeError::Write)
    }

    fn close(&self) -> Result<()> {
        let reader = lock(&self.reader).take();
        let writer = lock(&self.writer).take();

        if reader.is_none() && writer.is_none() {
            return Ok(());
        }

        // Dropping the handles closes the underlying file descriptors.
        drop(reader);
        drop(writer);
        debug!("Closed {}", self.config.port_path);
        Ok(())
    }
}

/// Information about a detected serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub path: String,
    pub port_type: PortType,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    UsbSerial,
    PciSerial,
    Bluetooth,
    Unknown,
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortType::UsbSerial => write!(f, "USB Serial"),
            PortType::PciSerial => write!(f, "PCI Serial"),
            PortType::Bluetooth => write!(f, "Bluetooth"),
            PortType::Unknown => write!(f, "Unknown"),
        }
    }
}

impl PortInfo {
    /// RFCOMM nodes are reported as Bluetooth ports, or at least named like one
    pub fn is_rfcomm_candidate(&self) -> bool {
        self.port_type == PortType::Bluetooth || self.path.contains("rfcomm")
    }
}

impl From<serialport::SerialPortInfo> for PortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        let (port_type, manufacturer, product, vid, pid) = match p.port_type {
            serialport::SerialPortType::UsbPort(info) => (
                PortType::UsbSerial,
                info.manufacturer,
                info.product,
                Some(info.vid),
                Some(info.pid),
            ),
            serialport::SerialPortType::PciPort => (PortType::PciSerial, None, None, None, None),
            serialport::SerialPortType::BluetoothPort => {
                (PortType::Bluetooth, None, None, None, None)
            }
            serialport::SerialPortType::Unknown => (PortType::Unknown, None, None, None, None),
        };

        PortInfo {
            path: p.port_name,
            port_type,
            manufacturer,
            product,
            vid,
            pid,
        }
    }
}

/// List all available serial ports
pub fn list_ports() -> anyhow::Result<Vec<PortInfo>> {
    use anyhow::Context;

    let ports =
        serialport::available_ports().with_context(|| "Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// Print formatted list of available serial ports
pub fn print_ports() -> anyhow::Result<()> {
    let ports = list_ports()?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("\n{}", "Troubleshooting tips:".cyan().bold());
        println!("  1. Pair the device: bluetoothctl pair <MAC>");
        println!("  2. Bind an RFCOMM node: sudo rfcomm bind 0 <MAC> 1");
        println!("  3. Add your user to the 'dialout' group: sudo usermod -aG dialout $USER");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    println!("{}", "=".repeat(60));

    for port in &ports {
        let marker = if port.is_rfcomm_candidate() {
            " [rfcomm]".cyan().to_string()
        } else {
            String::new()
        };
        println!("\n{}: {}{}", "Port".cyan(), port.path.white().bold(), marker);
        println!("  Type: {}", port.port_type);

        if let Some(ref mfg) = port.manufacturer {
            println!("  Manufacturer: {}", mfg);
        }
        if let Some(ref prod) = port.product {
            println!("  Product: {}", prod);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            println!("  VID:PID: {:04x}:{:04x}", vid, pid);
        }
    }

    println!("\n{}", "=".repeat(60));
    println!(
        "{}",
        "Use: rfcomm-bridge connect -p <PORT> to open a session".yellow()
    );

    Ok(())
}
