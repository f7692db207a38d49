//! Seam to the transport layer (WebSocket, MQTT, HTTP plumbing lives outside this crate).

use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound half of a transport. Implementations must not block: adapters call
/// this from I/O callback threads.
pub trait WireSink: Send + Sync {
    fn send_wire_message(&self, printer_id: &str, bytes: Vec<u8>) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub printer_id: String,
    pub bytes: Vec<u8>,
}

impl OutboundMessage {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Sink that queues outbound messages on a tokio channel for a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl WireSink for ChannelSink {
    fn send_wire_message(&self, printer_id: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        tracing::trace!("[{}] -> {} bytes", printer_id, bytes.len());
        self.sender
            .send(OutboundMessage { printer_id: printer_id.to_string(), bytes })
            .map_err(|_| TransportError::Closed)
    }
}
