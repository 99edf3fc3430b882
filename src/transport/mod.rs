//! Sample transports for the Fallwatch agent.
//!
//! A transport runs its receive loop on a background thread and forwards
//! [`TransportEvent`]s over a bounded channel. [`drive`] is the single
//! consumer: it hands every event to a [`StreamHandler`] and waits for it to
//! finish before taking the next one.

pub mod replay;
pub mod types;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use replay::ReplayTransport;
pub use types::{MessageError, Sample};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// How long `drive` blocks before re-checking the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Events delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection (re)established and subscribed
    Connected,
    /// One inbound message payload
    Message(Vec<u8>),
    /// The transport stopped; `None` for a clean end of stream
    Disconnected(Option<String>),
}

/// Receiver side of a transport, implemented by the engine.
pub trait StreamHandler {
    type Error: Display;

    fn handle_connect(&mut self);

    fn handle_message(&mut self, payload: &[u8]) -> Result<(), Self::Error>;

    fn handle_disconnect(&mut self, reason: Option<&str>);
}

/// A source of inbound messages.
pub trait Transport {
    /// Start the receive loop and return the event channel.
    fn start(self) -> Result<Receiver<TransportEvent>, TransportError>;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),
}

/// Why [`drive`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The transport reported a disconnect or end of stream
    Disconnected,
    /// The running flag was cleared
    Stopped,
}

/// Dispatch transport events to `handler` until the stream ends or
/// `running` is cleared.
///
/// A handler error only ends that message's processing; it is logged and
/// the loop moves on to the next event.
pub fn drive<H: StreamHandler>(
    receiver: &Receiver<TransportEvent>,
    handler: &mut H,
    running: &AtomicBool,
) -> DriveOutcome {
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(TransportEvent::Connected) => handler.handle_connect(),
            Ok(TransportEvent::Message(payload)) => {
                if let Err(e) = handler.handle_message(&payload) {
                    tracing::error!("{e}");
                }
            }
            Ok(TransportEvent::Disconnected(reason)) => {
                handler.handle_disconnect(reason.as_deref());
                return DriveOutcome::Disconnected;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                handler.handle_disconnect(Some("transport channel closed"));
                return DriveOutcome::Disconnected;
            }
        }
    }
    DriveOutcome::Stopped
}
