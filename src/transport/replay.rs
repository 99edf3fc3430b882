//! Newline-delimited JSON transport.
//!
//! Replays recorded sample streams from a file, or reads a live feed piped
//! into stdin. Each non-blank line is one inbound message.

use crate::transport::{Transport, TransportError, TransportEvent};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;

/// Transport reading JSON lines from any buffered reader.
pub struct ReplayTransport {
    reader: Box<dyn BufRead + Send>,
    capacity: usize,
}

impl ReplayTransport {
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R, capacity: usize) -> Self {
        Self {
            reader: Box::new(reader),
            capacity: capacity.max(1),
        }
    }

    /// Replay a recording file.
    pub fn open(path: &Path, capacity: usize) -> Result<Self, TransportError> {
        let file = File::open(path)?;
        tracing::info!(path = %path.display(), "Replaying recording");
        Ok(Self::from_reader(BufReader::new(file), capacity))
    }

    /// Read messages piped into standard input.
    pub fn stdin(capacity: usize) -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()), capacity)
    }
}

impl Transport for ReplayTransport {
    fn start(self) -> Result<Receiver<TransportEvent>, TransportError> {
        let (sender, receiver) = bounded(self.capacity);
        let reader = self.reader;

        thread::Builder::new()
            .name("replay-transport".to_string())
            .spawn(move || pump(reader, &sender))?;

        Ok(receiver)
    }
}

fn pump(reader: Box<dyn BufRead + Send>, sender: &Sender<TransportEvent>) {
    if sender.send(TransportEvent::Connected).is_err() {
        return;
    }

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = sender.send(TransportEvent::Disconnected(Some(e.to_string())));
                return;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Blocks while the engine is behind, preserving order.
        if sender
            .send(TransportEvent::Message(trimmed.as_bytes().to_vec()))
            .is_err()
        {
            return;
        }
    }

    let _ = sender.send(TransportEvent::Disconnected(None));
}
