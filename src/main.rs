//! RFCOMM Bridge
//!
//! An interactive console for a Bluetooth RFCOMM serial device. Everything the
//! device sends is printed as it arrives; every line typed is written to the device.
//! Entering `q` on its own line ends the session.
//!
//! # Usage
//!
//! ```bash
//! # Bind the device first
//! sudo rfcomm bind 0 <MAC> 1
//!
//! # Open a session on /dev/rfcomm0 at 921600 baud
//! rfcomm-bridge connect
//!
//! # Another node, CRLF line endings, with a transcript
//! rfcomm-bridge connect -p /dev/rfcomm1 -e crlf --log session.log
//!
//! # List available serial ports
//! rfcomm-bridge ports
//! ```

mod bridge;
mod config;
mod error;
mod serial;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bridge::{ConsoleBridge, ConsoleOutput, Shutdown};
use config::{BridgeConfig, FileConfig, LineEnding, Overrides};
use serial::SerialConnection;

/// RFCOMM Bridge
///
/// Interactive console for a Bluetooth RFCOMM serial device
#[derive(Parser)]
#[command(name = "rfcomm-bridge")]
#[command(version)]
#[command(about = "Interactive console bridge to a Bluetooth RFCOMM serial device")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive session (enter `q` to quit)
    Connect {
        /// Serial port path [default: /dev/rfcomm0]
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate [default: 921600]
        #[arg(short, long)]
        baud: Option<u32>,

        /// Read timeout in milliseconds [default: 1000]
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Terminator appended to each line sent [default: none]
        #[arg(short = 'e', long, value_enum)]
        line_ending: Option<LineEnding>,

        /// Prompt shown before each input line [default: ">"]
        #[arg(long)]
        prompt: Option<String>,

        /// TOML file with session settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Record the session to a file
        #[arg(short, long)]
        log: Option<PathBuf>,
    },

    /// List available serial ports
    Ports,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Connect {
            port,
            baud,
            timeout_ms,
            line_ending,
            prompt,
            config,
            log,
        } => handle_connect(
            config,
            Overrides {
                port,
                baud_rate: baud,
                timeout_ms,
                line_ending,
                prompt,
                log_file: log,
            },
        ),
        Commands::Ports => serial::port::print_ports(),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }
}

fn handle_connect(config_path: Option<PathBuf>, overrides: Overrides) -> Result<()> {
    let file = match config_path {
        Some(ref path) => Some((path.as_path(), FileConfig::load(path)?)),
        None => None,
    };
    let config = BridgeConfig::resolve(file, overrides)?;

    let connection = SerialConnection::open(config.port.clone())?;
    println!(
        "{} Connected to {} at {} baud",
        "[OK]".green().bold(),
        connection.config().port_path.white().bold(),
        connection.config().baud_rate
    );
    println!("{}", "Type a line to send it, q to quit".yellow());

    let summary = ConsoleBridge::from_config(Arc::new(connection), &config)?
        .run(io::BufReader::new(io::stdin()), ConsoleOutput::stdout())
        .with_context(|| format!("Session on {} failed", config.port.port_path))?;

    let reason = match summary.reason {
        Shutdown::Quit => "Connection closed",
        Shutdown::InputClosed => "Input closed, connection closed",
    };
    println!(
        "\n{} {} ({} bytes received, {} lines sent)",
        "[OK]".green().bold(),
        reason,
        summary.bytes_received,
        summary.lines_sent
    );

    Ok(())
}
