//! One connected printer: awaitable requests on top of an adapter plus a
//! broadcast of every status and attributes event.

use crate::adapter::{BuildError, ParseError, PrinterType, ProtocolAdapter, create_adapter};
use crate::config::AdapterConfig;
use crate::transport::{TransportError, WireSink};
use futures_core::Stream;
use printlink_shared::{BizEvent, BizRequest, BizResponse, ErrorCode, OperationKind};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

pub type EventStream = Pin<Box<dyn Stream<Item = BizEvent> + Send>>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("{0} timed out")]
    Timeout(OperationKind),
    #[error("{0} cancelled")]
    Cancelled(OperationKind),
    #[error("printer {0} is not connected")]
    NotConnected(String),
}

impl SessionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SessionError::Build(e) => e.error_code(),
            SessionError::Transport(_) | SessionError::NotConnected(_) => ErrorCode::Cancelled,
            SessionError::Timeout(_) => ErrorCode::Timeout,
            SessionError::Cancelled(_) => ErrorCode::Cancelled,
        }
    }
}

pub struct PrinterSession {
    adapter: Arc<dyn ProtocolAdapter>,
    sink: Arc<dyn WireSink>,
    waiters: Mutex<HashMap<String, oneshot::Sender<BizResponse>>>,
    events: broadcast::Sender<BizEvent>,
    default_timeout: Duration,
}

impl PrinterSession {
    pub fn new(
        printer_type: PrinterType,
        printer_id: &str,
        sink: Arc<dyn WireSink>,
        config: &AdapterConfig,
    ) -> Self {
        let adapter = create_adapter(printer_type, printer_id, sink.clone(), config);
        Self::with_adapter(adapter, sink, config)
    }

    pub fn with_adapter(adapter: Arc<dyn ProtocolAdapter>, sink: Arc<dyn WireSink>, config: &AdapterConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            adapter,
            sink,
            waiters: Mutex::new(HashMap::new()),
            events,
            default_timeout: config.default_timeout(),
        }
    }

    pub fn printer_id(&self) -> &str {
        self.adapter.printer_id()
    }

    pub fn printer_type(&self) -> PrinterType {
        self.adapter.printer_type()
    }

    pub fn adapter(&self) -> &Arc<dyn ProtocolAdapter> {
        &self.adapter
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<BizResponse>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `request` and wait for the matching reply.
    ///
    /// A vendor failure is still `Ok`: check [`BizResponse::is_success`]. On
    /// timeout the pending record is dropped so a late reply is ignored.
    pub async fn request(&self, request: BizRequest) -> Result<BizResponse, SessionError> {
        let kind = request.kind;
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let wire = self.adapter.build_request(kind, &request.params, timeout)?;
        let standard_id = wire.standard_id;

        let (tx, rx) = oneshot::channel();
        self.waiters().insert(standard_id.clone(), tx);
        if let Err(e) = self.sink.send_wire_message(self.printer_id(), wire.bytes) {
            self.waiters().remove(&standard_id);
            self.adapter.cancel(&standard_id);
            return Err(e.into());
        }
        tracing::debug!("[{}] Sent {} ({})", self.printer_id(), kind, standard_id);

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SessionError::Cancelled(kind)),
            Err(_) => {
                self.waiters().remove(&standard_id);
                self.adapter.cancel(&standard_id);
                tracing::warn!("[{}] {} timed out after {:?}", self.printer_id(), kind, timeout);
                Err(SessionError::Timeout(kind))
            }
        }
    }

    /// Fire-and-forget. The reply, if the printer sends one, is consumed silently.
    pub fn send_oneway(&self, kind: OperationKind, params: &Value) -> Result<(), SessionError> {
        let bytes = self.adapter.build_oneway(kind, params)?;
        self.sink.send_wire_message(self.printer_id(), bytes)?;
        Ok(())
    }

    /// Feed one inbound transport message. Dual messages run through the
    /// response path first, then the event path.
    pub fn on_wire_message(&self, bytes: &[u8]) {
        let class = self.adapter.classify(bytes);
        if class.is_response {
            match self.adapter.parse_response(bytes) {
                Ok(response) => self.complete(response),
                Err(ParseError::Interim(kind)) => {
                    tracing::trace!("[{}] {} acknowledged, awaiting push", self.printer_id(), kind);
                }
                Err(e) => tracing::debug!("[{}] Response not delivered: {}", self.printer_id(), e),
            }
        }
        if class.is_event {
            if let Some(event) = self.adapter.parse_event(bytes) {
                // Err only means nobody is subscribed right now.
                let _ = self.events.send(event);
            }
        }
    }

    fn complete(&self, response: BizResponse) {
        let waiter = self.waiters().remove(&response.correlation_id);
        match waiter {
            Some(tx) => {
                if tx.send(response).is_err() {
                    tracing::debug!("[{}] Caller went away before the reply", self.printer_id());
                }
            }
            None => tracing::debug!(
                "[{}] No waiter for {} ({})",
                self.printer_id(), response.kind, response.correlation_id
            ),
        }
    }

    /// Fail every request whose deadline passed. Returns how many were failed.
    pub fn expire_pending(&self, now: Instant) -> usize {
        let expired = self.adapter.expire(now);
        for pending in &expired {
            tracing::warn!("[{}] {} ({}) expired", self.printer_id(), pending.kind, pending.standard_id);
            self.complete(BizResponse::failure(
                pending.kind,
                pending.standard_id.clone(),
                ErrorCode::Timeout,
                "request timed out",
            ));
        }
        expired.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BizEvent> {
        self.events.subscribe()
    }

    /// Events as a stream. A slow consumer skips what it missed and keeps going.
    pub fn event_stream(&self) -> EventStream {
        let mut rx = self.events.subscribe();
        let printer_id = self.printer_id().to_string();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("[{}] Event subscriber lagged, skipped {}", printer_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Forget everything tied to the current connection. Blocked callers get
    /// [`SessionError::Cancelled`]; the cache starts empty on reconnect.
    pub fn disconnect(&self) {
        let drained = self.adapter.drain_pending();
        let mut waiters = self.waiters();
        for pending in &drained {
            waiters.remove(&pending.standard_id);
        }
        waiters.clear();
        drop(waiters);
        self.adapter.reset_sequence_state();
        tracing::info!("[{}] Disconnected, {} pending request(s) cancelled", self.printer_id(), drained.len());
    }

    pub fn pending_count(&self) -> usize {
        self.adapter.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelSink, OutboundMessage};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn session(printer_type: PrinterType) -> (Arc<PrinterSession>, UnboundedReceiver<OutboundMessage>) {
        let (sink, rx) = ChannelSink::new();
        let config = AdapterConfig { default_timeout_ms: 200, ..AdapterConfig::default() };
        (Arc::new(PrinterSession::new(printer_type, "p1", Arc::new(sink), &config)), rx)
    }

    #[tokio::test]
    async fn test_request_times_out_and_clears_pending() {
        let (session, mut rx) = session(PrinterType::Cc2);
        let result = session
            .request(BizRequest::bare(OperationKind::PausePrint).with_timeout(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(SessionError::Timeout(OperationKind::PausePrint))));
        assert_eq!(session.pending_count(), 0);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_build_error_surfaces_without_sending() {
        let (session, mut rx) = session(PrinterType::Cc);
        let err = session
            .request(BizRequest::new(OperationKind::GetCanvasInfo, json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::NotImplemented);
        assert!(rx.try_recv().is_err());
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_waiters() {
        let (session, _rx) = session(PrinterType::Moonraker);
        let waiting = {
            let session = session.clone();
            tokio::spawn(async move { session.request(BizRequest::bare(OperationKind::GetStatus)).await })
        };
        while session.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        session.disconnect();
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(SessionError::Cancelled(OperationKind::GetStatus))));
        assert_eq!(session.pending_count(), 0);
    }
}
