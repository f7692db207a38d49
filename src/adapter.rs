//! The `ProtocolAdapter` capability and the machinery every vendor adapter shares.
//!
//! Adapters never run threads and never block. Requests are built and inbound
//! messages parsed on whatever thread calls in; the only shared mutable state
//! (pending requests and the status cache) sits behind one mutex per adapter,
//! taken for the table or cache mutation and never across JSON parsing.

use crate::adapters::{cc::CcAdapter, cc2::Cc2Adapter, moonraker::MoonrakerAdapter};
use crate::config::AdapterConfig;
use crate::transport::WireSink;
use printlink_shared::reconciler::DeltaOutcome;
use printlink_shared::{
    BizEvent, BizResponse, ErrorCode, OperationKind, PendingRequest, RequestCorrelator,
    StatusReconciler,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("operation not implemented: {0}")]
    NotImplemented(OperationKind),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl BuildError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BuildError::NotImplemented(_) => ErrorCode::NotImplemented,
            BuildError::InvalidParameter(_) => ErrorCode::InvalidParameter,
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("unknown vendor command {0}")]
    UnknownCommand(String),
    #[error("no pending request for {0}")]
    NoPendingRequest(String),
    #[error("acknowledgement for {0}, payload follows in a push")]
    Interim(OperationKind),
    #[error("reply to one-way {0} consumed")]
    OneWayReply(OperationKind),
    #[error("message is not a response")]
    NotAResponse,
}

impl ParseError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ParseError::Malformed(_) | ParseError::UnknownCommand(_) | ParseError::NotAResponse => {
                ErrorCode::VendorInvalidResponse
            }
            ParseError::NoPendingRequest(_) | ParseError::Interim(_) | ParseError::OneWayReply(_) => {
                ErrorCode::NoPendingRequestFound
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_response: bool,
    pub is_event: bool,
}

impl Classification {
    pub const NONE: Classification = Classification { is_response: false, is_event: false };
    pub const RESPONSE: Classification = Classification { is_response: true, is_event: false };
    pub const EVENT: Classification = Classification { is_response: false, is_event: true };
    pub const BOTH: Classification = Classification { is_response: true, is_event: true };

    pub fn is_empty(&self) -> bool {
        !self.is_response && !self.is_event
    }
}

/// Bytes ready for the transport plus the id the caller waits on.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub standard_id: String,
    pub vendor_id: String,
    pub kind: OperationKind,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    Cc,
    Cc2,
    Moonraker,
}

impl fmt::Display for PrinterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterType::Cc => f.write_str("cc"),
            PrinterType::Cc2 => f.write_str("cc2"),
            PrinterType::Moonraker => f.write_str("moonraker"),
        }
    }
}

impl FromStr for PrinterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cc" => Ok(PrinterType::Cc),
            "cc2" => Ok(PrinterType::Cc2),
            "moonraker" | "klipper" => Ok(PrinterType::Moonraker),
            other => Err(format!("unknown printer type '{}'", other)),
        }
    }
}

pub trait ProtocolAdapter: Send + Sync {
    fn printer_type(&self) -> PrinterType;

    fn printer_id(&self) -> &str;

    /// Translate an operation into wire bytes and record it as pending.
    fn build_request(
        &self,
        kind: OperationKind,
        params: &Value,
        timeout: Duration,
    ) -> Result<WireRequest, BuildError>;

    /// Wire bytes for a send-and-forget message. Nothing is recorded as pending.
    fn build_oneway(&self, kind: OperationKind, params: &Value) -> Result<Vec<u8>, BuildError>;

    fn classify(&self, bytes: &[u8]) -> Classification;

    fn parse_response(&self, bytes: &[u8]) -> Result<BizResponse, ParseError>;

    fn parse_event(&self, bytes: &[u8]) -> Option<BizEvent>;

    /// Forget the status cache and sequence tracking (reconnect).
    fn reset_sequence_state(&self);

    /// Drop a pending request the caller gave up on.
    fn cancel(&self, standard_id: &str) -> Option<PendingRequest>;

    /// Remove and return requests whose deadline passed.
    fn expire(&self, now: Instant) -> Vec<PendingRequest>;

    /// Remove every pending request (disconnect).
    fn drain_pending(&self) -> Vec<PendingRequest>;

    fn pending_count(&self) -> usize;
}

pub fn create_adapter(
    printer_type: PrinterType,
    printer_id: &str,
    sink: Arc<dyn WireSink>,
    config: &AdapterConfig,
) -> Arc<dyn ProtocolAdapter> {
    let core = AdapterCore::new(printer_id, sink, config);
    match printer_type {
        PrinterType::Cc => Arc::new(CcAdapter::new(core)),
        PrinterType::Cc2 => Arc::new(Cc2Adapter::new(core)),
        PrinterType::Moonraker => Arc::new(MoonrakerAdapter::new(core)),
    }
}

pub(crate) struct EngineState {
    pub(crate) correlator: RequestCorrelator,
    pub(crate) reconciler: StatusReconciler,
    oneway: VecDeque<(String, OperationKind)>,
    abandoned: VecDeque<String>,
}

/// Correlator, reconciler and one-way bookkeeping composed behind one lock.
pub(crate) struct AdapterCore {
    printer_id: String,
    sink: Arc<dyn WireSink>,
    state: Mutex<EngineState>,
    counter: AtomicU64,
    oneway_history: usize,
}

impl AdapterCore {
    pub(crate) fn new(printer_id: &str, sink: Arc<dyn WireSink>, config: &AdapterConfig) -> Self {
        Self {
            printer_id: printer_id.to_string(),
            sink,
            state: Mutex::new(EngineState {
                correlator: RequestCorrelator::new(),
                reconciler: StatusReconciler::new(config.resync_threshold),
                oneway: VecDeque::new(),
                abandoned: VecDeque::new(),
            }),
            counter: AtomicU64::new(1),
            oneway_history: config.oneway_history.max(1),
        }
    }

    pub(crate) fn printer_id(&self) -> &str {
        &self.printer_id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        // A panic elsewhere must not wedge the printer; the tables stay usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn next_counter(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn new_standard_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub(crate) fn register(
        &self,
        kind: OperationKind,
        vendor_id: String,
        timeout: Duration,
        bytes: Vec<u8>,
    ) -> WireRequest {
        let standard_id = Self::new_standard_id();
        self.lock()
            .correlator
            .record(standard_id.clone(), vendor_id.clone(), kind, timeout);
        tracing::debug!("[{}] {} pending as {} (vendor id {})", self.printer_id, kind, standard_id, vendor_id);
        WireRequest { standard_id, vendor_id, kind, bytes }
    }

    pub(crate) fn remember_oneway(&self, vendor_id: String, kind: OperationKind) {
        let mut state = self.lock();
        if state.oneway.len() >= self.oneway_history {
            state.oneway.pop_front();
        }
        state.oneway.push_back((vendor_id, kind));
    }

    pub(crate) fn take_oneway(&self, vendor_id: &str) -> Option<OperationKind> {
        let mut state = self.lock();
        let pos = state.oneway.iter().position(|(id, _)| id == vendor_id)?;
        state.oneway.remove(pos).map(|(_, kind)| kind)
    }

    /// Status queries the caller gave up on. Their late replies still carry a
    /// full snapshot worth caching.
    fn remember_abandoned(&self, state: &mut EngineState, pending: &PendingRequest) {
        if pending.kind != OperationKind::GetStatus {
            return;
        }
        if state.abandoned.len() >= self.oneway_history {
            state.abandoned.pop_front();
        }
        state.abandoned.push_back(pending.vendor_id.clone());
    }

    /// True once per abandoned status query id.
    pub(crate) fn take_abandoned(&self, vendor_id: &str) -> bool {
        let mut state = self.lock();
        match state.abandoned.iter().position(|id| id == vendor_id) {
            Some(pos) => state.abandoned.remove(pos).is_some(),
            None => false,
        }
    }

    pub(crate) fn is_known_vendor_id(&self, vendor_id: &str) -> bool {
        let state = self.lock();
        state.correlator.find_by_vendor_id(vendor_id).is_some()
            || state.oneway.iter().any(|(id, _)| id == vendor_id)
            || state.abandoned.iter().any(|id| id == vendor_id)
    }

    pub(crate) fn send_oneway(&self, kind: OperationKind, bytes: Vec<u8>) {
        if let Err(e) = self.sink.send_wire_message(&self.printer_id, bytes) {
            tracing::warn!("[{}] One-way {} not sent: {}", self.printer_id, kind, e);
        }
    }

    /// Run a delta through the reconciler. On `Resync` the adapter supplies the
    /// one-way full-status request, which goes straight to the sink.
    pub(crate) fn reconcile_delta(
        &self,
        delta: &Value,
        sequence_id: Option<i64>,
        resync: impl FnOnce() -> Option<(String, Vec<u8>)>,
    ) -> Option<Value> {
        let outcome = self.lock().reconciler.apply_delta(delta, sequence_id);
        match outcome {
            DeltaOutcome::Merged(merged) => Some(merged),
            DeltaOutcome::Withheld | DeltaOutcome::DroppedNoCache => None,
            DeltaOutcome::Resync => {
                tracing::warn!("[{}] Status pushes out of sequence, requesting full status", self.printer_id);
                if let Some((vendor_id, bytes)) = resync() {
                    self.remember_oneway(vendor_id, OperationKind::GetStatus);
                    self.send_oneway(OperationKind::GetStatus, bytes);
                }
                None
            }
        }
    }

    pub(crate) fn apply_full(&self, full: Value, sequence_id: Option<i64>) {
        self.lock().reconciler.apply_full(full, sequence_id);
    }

    pub(crate) fn preview(&self, delta: &Value, sequence_id: Option<i64>) -> Option<Value> {
        self.lock().reconciler.preview(delta, sequence_id)
    }

    pub(crate) fn reset(&self) {
        let mut state = self.lock();
        state.reconciler.clear();
        state.oneway.clear();
        state.abandoned.clear();
    }

    pub(crate) fn cancel(&self, standard_id: &str) -> Option<PendingRequest> {
        let mut state = self.lock();
        let pending = state.correlator.remove_by_standard_id(standard_id)?;
        self.remember_abandoned(&mut state, &pending);
        Some(pending)
    }

    pub(crate) fn expire(&self, now: Instant) -> Vec<PendingRequest> {
        let mut state = self.lock();
        let expired = state.correlator.expire(now);
        for pending in &expired {
            self.remember_abandoned(&mut state, pending);
        }
        expired
    }

    pub(crate) fn drain(&self) -> Vec<PendingRequest> {
        self.lock().correlator.drain()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.lock().correlator.len()
    }
}

/// Translate a vendor failure into a failed response for `pending`.
pub(crate) fn failed_response(pending: &PendingRequest, code: ErrorCode, message: String) -> BizResponse {
    BizResponse::failure(pending.kind, pending.standard_id.clone(), code, message)
}

/// Serialize unified data for a response or event payload.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<Value, ParseError> {
    serde_json::to_value(value).map_err(|e| ParseError::Malformed(e.to_string()))
}

pub(crate) fn parse_json(printer_id: &str, bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            tracing::debug!("[{}] Dropping non-object message", printer_id);
            None
        }
        Err(e) => {
            tracing::debug!("[{}] Dropping unparseable message: {}", printer_id, e);
            None
        }
    }
}
