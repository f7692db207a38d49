//! Unified, vendor-agnostic error taxonomy and per-vendor translation tables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[error("success")]
    Success,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("operation not implemented")]
    NotImplemented,
    #[error("printer busy")]
    VendorBusy,
    #[error("access denied by printer")]
    VendorAccessDenied,
    #[error("file not found on printer")]
    VendorFileNotFound,
    #[error("file corrupted or failed verification")]
    VendorFileCorrupted,
    #[error("operation rejected by printer")]
    VendorOperationRejected,
    #[error("invalid response from printer")]
    VendorInvalidResponse,
    #[error("unknown printer error {0}")]
    VendorUnknownError(i64),
    #[error("no pending request found")]
    NoPendingRequestFound,
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
}

impl ErrorCode {
    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

/// One vendor's error code switch table.
///
/// Vendor codes are not comparable across vendors, so each adapter carries its
/// own static table.
#[derive(Debug)]
pub struct ErrorTable {
    vendor: &'static str,
    entries: &'static [(i64, ErrorCode, &'static str)],
}

impl ErrorTable {
    pub const fn new(vendor: &'static str, entries: &'static [(i64, ErrorCode, &'static str)]) -> Self {
        Self { vendor, entries }
    }

    pub fn vendor(&self) -> &'static str {
        self.vendor
    }

    pub fn entries(&self) -> &'static [(i64, ErrorCode, &'static str)] {
        self.entries
    }

    /// Translate a vendor code into the unified code and a display message.
    ///
    /// Code 0 is success unless the table says otherwise. Anything else not in
    /// the table becomes [`ErrorCode::VendorUnknownError`] carrying the code.
    pub fn translate(&self, vendor_code: i64, vendor_message: Option<&str>) -> (ErrorCode, String) {
        let detail = vendor_message.map(str::trim).filter(|m| !m.is_empty());
        if let Some((_, code, text)) = self.entries.iter().find(|(c, _, _)| *c == vendor_code) {
            let message = match detail {
                Some(detail) => format!("{} ({} code {}): {}", text, self.vendor, vendor_code, detail),
                None => format!("{} ({} code {})", text, self.vendor, vendor_code),
            };
            return (*code, message);
        }
        if vendor_code == 0 {
            return (ErrorCode::Success, "success".to_string());
        }
        tracing::warn!("Unmapped {} error code {}", self.vendor, vendor_code);
        let message = match detail {
            Some(detail) => format!("{} unknown error code {}: {}", self.vendor, vendor_code, detail),
            None => format!("{} unknown error code {}", self.vendor, vendor_code),
        };
        (ErrorCode::VendorUnknownError(vendor_code), message)
    }
}
