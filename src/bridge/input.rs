//! Input role: reads console lines and turns them into bridge events

use super::output::ConsoleOutput;
use super::{Event, QUIT_SENTINEL};
use crate::error::{BridgeError, Result};
use log::debug;
use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

/// Start the input thread.
///
/// The thread may sit in a blocking terminal read forever, so callers detach it
/// instead of joining. It ends on its own after the sentinel, end of input, an
/// input error, or once the bridge stops listening.
pub fn spawn<R>(
    input: R,
    prompt: String,
    output: ConsoleOutput,
    events: Sender<Event>,
) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || run(input, &prompt, &output, &events))
        .map_err(|source| BridgeError::Spawn {
            name: "input",
            source,
        })
}

fn run<R: BufRead>(mut input: R, prompt: &str, output: &ConsoleOutput, events: &Sender<Event>) {
    let mut line = Vec::new();

    loop {
        output.emit(prompt);
        line.clear();

        let event = match input.read_until(b'\n', &mut line) {
            Ok(0) => Event::InputClosed,
            Ok(_) => classify(strip_terminator(&line)),
            Err(e) => Event::InputFailed(e),
        };

        let last = !matches!(event, Event::Line(_));
        if events.send(event).is_err() || last {
            break;
        }
    }

    debug!("Input reader finished");
}

/// Drop the line terminator `read_until` leaves in place, nothing else
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Console bytes pass through untouched; only an exact sentinel line is special
fn classify(line: &[u8]) -> Event {
    if line == QUIT_SENTINEL.as_bytes() {
        Event::Quit
    } else {
        Event::Line(line.to_vec())
    }
}
