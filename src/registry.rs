//! Sessions for every connected printer, keyed by printer id.

use crate::adapter::PrinterType;
use crate::config::AdapterConfig;
use crate::session::{EventStream, PrinterSession, SessionError};
use crate::transport::WireSink;
use futures_util::stream::{SelectAll, select_all};
use printlink_shared::{BizRequest, BizResponse};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct PrinterRegistry {
    sessions: RwLock<HashMap<String, Arc<PrinterSession>>>,
    sink: Arc<dyn WireSink>,
    config: AdapterConfig,
}

impl PrinterRegistry {
    pub fn new(sink: Arc<dyn WireSink>, config: AdapterConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            config,
        }
    }

    /// Open a session. An existing session for the same id is disconnected
    /// and replaced.
    pub async fn connect(&self, printer_type: PrinterType, printer_id: &str) -> Arc<PrinterSession> {
        let session = Arc::new(PrinterSession::new(printer_type, printer_id, self.sink.clone(), &self.config));
        let previous = self
            .sessions
            .write()
            .await
            .insert(printer_id.to_string(), session.clone());
        if let Some(previous) = previous {
            previous.disconnect();
            tracing::info!("Replaced {} session for {}", previous.printer_type(), printer_id);
        } else {
            tracing::info!("Connected {} printer {}", printer_type, printer_id);
        }
        session
    }

    pub async fn disconnect(&self, printer_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(printer_id);
        match removed {
            Some(session) => {
                session.disconnect();
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, printer_id: &str) -> Option<Arc<PrinterSession>> {
        self.sessions.read().await.get(printer_id).cloned()
    }

    /// Route an inbound message. Returns false for an unknown printer.
    pub async fn on_wire_message(&self, printer_id: &str, bytes: &[u8]) -> bool {
        match self.get(printer_id).await {
            Some(session) => {
                session.on_wire_message(bytes);
                true
            }
            None => {
                tracing::debug!("Message for unknown printer {} dropped", printer_id);
                false
            }
        }
    }

    pub async fn request(&self, printer_id: &str, request: BizRequest) -> Result<BizResponse, SessionError> {
        let session = self
            .get(printer_id)
            .await
            .ok_or_else(|| SessionError::NotConnected(printer_id.to_string()))?;
        session.request(request).await
    }

    /// Events from every printer connected at the time of the call, interleaved.
    pub async fn event_stream(&self) -> SelectAll<EventStream> {
        let streams: Vec<EventStream> = self
            .sessions
            .read()
            .await
            .values()
            .map(|session| session.event_stream())
            .collect();
        select_all(streams)
    }

    pub async fn printer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
