//! Transport-agnostic envelopes exchanged with the orchestration layer.

use crate::error::ErrorCode;
use crate::operation::OperationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// An outbound call as issued by the orchestration layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BizRequest {
    pub kind: OperationKind,
    pub params: Value,
    /// Falls back to the configured default when `None`.
    pub timeout: Option<Duration>,
}

impl BizRequest {
    pub fn new(kind: OperationKind, params: Value) -> Self {
        Self { kind, params, timeout: None }
    }

    /// A request with no parameters.
    pub fn bare(kind: OperationKind) -> Self {
        Self::new(kind, Value::Object(Default::default()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BizResponse {
    pub kind: OperationKind,
    /// The standard id issued when the request was built.
    pub correlation_id: String,
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl BizResponse {
    pub fn success(kind: OperationKind, correlation_id: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
            error_code: ErrorCode::Success,
            message: "success".to_string(),
            data,
        }
    }

    pub fn failure(
        kind: OperationKind,
        correlation_id: impl Into<String>,
        error_code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
            error_code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_code.is_success()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BizEvent {
    pub kind: OperationKind,
    pub printer_id: String,
    pub data: Value,
    pub received_at: DateTime<Utc>,
}

impl BizEvent {
    pub fn new(kind: OperationKind, printer_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            printer_id: printer_id.into(),
            data,
            received_at: Utc::now(),
        }
    }
}
