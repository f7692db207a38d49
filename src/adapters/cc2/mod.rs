//! CC2 family adapter (numeric-method JSON over MQTT).
//!
//! Requests are `{"id", "method", "params"}` with a per-connection counter id;
//! replies echo the id and carry `result.error_code`. Status arrives as
//! sequenced partial pushes (method 6000, the push sequence in `id`) that are
//! merged into a cached snapshot, and attributes as method 6008 pushes. Both
//! push methods are answered on the response path and the event path.

pub mod attributes;
pub mod canvas;
pub mod status;

use crate::adapter::{
    AdapterCore, BuildError, Classification, ParseError, PrinterType, ProtocolAdapter, WireRequest,
    failed_response, parse_json, to_payload,
};
use crate::adapters::fields::{as_i64_lenient, i64_or, string_or_empty};
use crate::params::{
    self, BedType, CancelDownloadParams, DownloadParams, FanParams, HomeAxisParams, LightParams,
    MoveAxisParams, NameParams, SpeedParams, StartPrintParams, StorageMedia, TemperatureParams,
    percent_to_pwm,
};
use printlink_shared::models::{SpeedMode, component};
use printlink_shared::{
    BizEvent, BizResponse, CommandTable, ErrorCode, ErrorTable, FirmwareVersion, OperationKind,
    PendingRequest,
};
use serde_json::{Value, json};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

pub const METHOD_STATUS_PUSH: i64 = 6000;
pub const METHOD_ATTRIBUTES_PUSH: i64 = 6008;

pub static COMMANDS: CommandTable<i64> = CommandTable::new(&[
    (OperationKind::GetAttributes, 1001),
    (OperationKind::GetStatus, 1002),
    (OperationKind::StartPrint, 1020),
    (OperationKind::PausePrint, 1021),
    (OperationKind::StopPrint, 1022),
    (OperationKind::ResumePrint, 1023),
    (OperationKind::HomeAxis, 1026),
    (OperationKind::MoveAxis, 1027),
    (OperationKind::SetTemperature, 1028),
    (OperationKind::SetLight, 1029),
    (OperationKind::SetFanSpeed, 1030),
    (OperationKind::SetPrintSpeed, 1031),
    (OperationKind::UpdatePrinterName, 1043),
    (OperationKind::StartFileDownload, 1045),
    (OperationKind::CancelFileDownload, 1046),
    (OperationKind::LoadFilament, 2001),
    (OperationKind::UnloadFilament, 2002),
    (OperationKind::SetTrayFilament, 2003),
    (OperationKind::SetAutoRefill, 2004),
    (OperationKind::GetCanvasInfo, 2005),
    (OperationKind::StatusPushed, METHOD_STATUS_PUSH),
    (OperationKind::AttributesPushed, METHOD_ATTRIBUTES_PUSH),
]);

pub static ERRORS: ErrorTable = ErrorTable::new(
    "CC2",
    &[
        (1000, ErrorCode::InvalidParameter, "invalid parameter"),
        (1001, ErrorCode::VendorBusy, "printer busy"),
        (1002, ErrorCode::NotImplemented, "unsupported command"),
        (1003, ErrorCode::VendorAccessDenied, "access denied"),
        (1004, ErrorCode::VendorFileNotFound, "file not found"),
        (1005, ErrorCode::VendorOperationRejected, "not allowed in current state"),
        (1006, ErrorCode::VendorFileCorrupted, "file checksum mismatch"),
        (1007, ErrorCode::VendorOperationRejected, "insufficient storage"),
        (1008, ErrorCode::VendorOperationRejected, "canvas not connected"),
        (1009, ErrorCode::VendorBusy, "print in progress"),
    ],
);

const TEMPERATURE_ZONES: [&str; 2] = [component::EXTRUDER, component::HEATED_BED];

fn requires_canvas(kind: OperationKind) -> bool {
    matches!(
        kind,
        OperationKind::GetCanvasInfo
            | OperationKind::SetAutoRefill
            | OperationKind::LoadFilament
            | OperationKind::UnloadFilament
            | OperationKind::SetTrayFilament
    )
}

/// Push body lives in `result`; some firmware builds use `params`.
fn push_payload(msg: &Value) -> Option<&Value> {
    msg.get("result").or_else(|| msg.get("params")).filter(|v| v.is_object())
}

fn message_id(msg: &Value) -> Option<String> {
    let id = string_or_empty(msg.get("id"));
    (!id.is_empty()).then_some(id)
}

pub struct Cc2Adapter {
    core: AdapterCore,
    /// Learned from the attributes; `None` until the first reply or push.
    firmware: Mutex<Option<FirmwareVersion>>,
}

impl Cc2Adapter {
    pub(crate) fn new(core: AdapterCore) -> Self {
        Self { core, firmware: Mutex::new(None) }
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        *self.firmware.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn note_firmware(&self, firmware: Option<FirmwareVersion>) {
        if let Some(fw) = firmware {
            let mut slot = self.firmware.lock().unwrap_or_else(PoisonError::into_inner);
            if *slot != Some(fw) {
                tracing::info!("[{}] Firmware {}", self.core.printer_id(), fw);
                *slot = Some(fw);
            }
        }
    }

    /// A known firmware without canvas support rejects canvas work up front.
    fn canvas_unsupported(&self) -> bool {
        match self.firmware() {
            Some(fw) => !attributes::supports_multi_filament(Some(&fw)),
            None => false,
        }
    }

    fn encode(&self, kind: OperationKind, params: &Value) -> Result<(String, Vec<u8>), BuildError> {
        if kind.is_event_only() {
            return Err(BuildError::NotImplemented(kind));
        }
        let method = *COMMANDS.to_wire(kind).ok_or(BuildError::NotImplemented(kind))?;
        if requires_canvas(kind) && self.canvas_unsupported() {
            return Err(BuildError::NotImplemented(kind));
        }
        let body = self.request_params(kind, params)?;
        let id = self.core.next_counter();
        let envelope = json!({ "id": id, "method": method, "params": body });
        let bytes = serde_json::to_vec(&envelope).map_err(|e| BuildError::InvalidParameter(e.to_string()))?;
        Ok((id.to_string(), bytes))
    }

    fn request_params(&self, kind: OperationKind, params: &Value) -> Result<Value, BuildError> {
        match kind {
            OperationKind::GetStatus
            | OperationKind::GetAttributes
            | OperationKind::PausePrint
            | OperationKind::ResumePrint
            | OperationKind::StopPrint => Ok(json!({})),
            OperationKind::StartPrint => {
                let p: StartPrintParams = params::decode(kind, params)?;
                p.validate()?;
                if !p.slot_map.is_empty() && self.canvas_unsupported() {
                    return Err(BuildError::InvalidParameter(
                        "firmware does not support multi-filament slot mapping".to_string(),
                    ));
                }
                let slot_map: Vec<Value> = p
                    .slot_map
                    .iter()
                    .map(|s| json!({ "t": s.t, "canvas_id": s.canvas_id, "tray_id": s.tray_id }))
                    .collect();
                Ok(json!({
                    "filename": p.filename,
                    "storage_media": match p.storage {
                        StorageMedia::Local => "local",
                        StorageMedia::Udisk => "u-disk",
                    },
                    "config": {
                        "bedlevel_force": p.auto_bed_leveling,
                        "delay_video": p.time_lapse,
                        "print_layout": match p.bed_type {
                            BedType::Textured => "A",
                            BedType::Smooth => "B",
                        },
                        "slot_map": slot_map,
                    },
                }))
            }
            OperationKind::HomeAxis => {
                let p: HomeAxisParams = params::decode(kind, params)?;
                Ok(json!({ "homed_axes": p.axes()?.to_ascii_lowercase() }))
            }
            OperationKind::MoveAxis => {
                let p: MoveAxisParams = params::decode(kind, params)?;
                Ok(json!({ "axes": p.axis()?.to_ascii_lowercase().to_string(), "distance": p.distance }))
            }
            OperationKind::SetTemperature => {
                let p: TemperatureParams = params::decode(kind, params)?;
                p.validate(&TEMPERATURE_ZONES)?;
                let mut body = serde_json::Map::new();
                for (zone, key) in [(component::EXTRUDER, "extruder"), (component::HEATED_BED, "heater_bed")] {
                    if let Some(target) = p.get(zone) {
                        body.insert(key.to_string(), json!(target));
                    }
                }
                Ok(Value::Object(body))
            }
            OperationKind::SetFanSpeed => {
                let p: FanParams = params::decode(kind, params)?;
                p.validate()?;
                let mut body = serde_json::Map::new();
                for (name, key) in [
                    (component::MODEL_FAN, "fan"),
                    (component::AUXILIARY_FAN, "aux_fan"),
                    (component::BOX_FAN, "box_fan"),
                ] {
                    if let Some(speed) = p.get(name) {
                        body.insert(key.to_string(), json!(percent_to_pwm(speed)));
                    }
                }
                Ok(Value::Object(body))
            }
            OperationKind::SetPrintSpeed => {
                let p: SpeedParams = params::decode(kind, params)?;
                let mode = SpeedMode::from_code(p.mode)
                    .ok_or_else(|| BuildError::InvalidParameter(format!("unknown speed mode {}", p.mode)))?;
                Ok(json!({ "mode": mode.code() }))
            }
            OperationKind::SetLight => {
                let p: LightParams = params::decode(kind, params)?;
                if p.name != component::CHAMBER_LIGHT {
                    return Err(BuildError::InvalidParameter(format!("unknown light '{}'", p.name)));
                }
                Ok(json!({ "power": p.on as i32 }))
            }
            OperationKind::UpdatePrinterName => {
                let p: NameParams = params::decode(kind, params)?;
                if p.name.trim().is_empty() {
                    return Err(BuildError::InvalidParameter("name must not be empty".to_string()));
                }
                Ok(json!({ "hostname": p.name.trim() }))
            }
            OperationKind::StartFileDownload => {
                let p: DownloadParams = params::decode(kind, params)?;
                Ok(json!({ "url": p.url, "filename": p.filename, "md5": p.md5.unwrap_or_default() }))
            }
            OperationKind::CancelFileDownload => {
                let p: CancelDownloadParams = params::decode(kind, params)?;
                Ok(json!({ "filename": p.filename.unwrap_or_default() }))
            }
            other if requires_canvas(other) => canvas::request_params(other, params),
            other => Err(BuildError::NotImplemented(other)),
        }
    }

    fn payload_for(&self, kind: OperationKind, result: &Value) -> Result<Option<Value>, ParseError> {
        if !kind.has_payload() {
            return Ok(None);
        }
        let data = match kind {
            OperationKind::GetStatus => {
                to_payload(&status::extract_status(self.core.printer_id(), result))?
            }
            OperationKind::GetAttributes => {
                let (attributes, firmware) = attributes::extract_attributes(self.core.printer_id(), result);
                self.note_firmware(firmware);
                to_payload(&attributes)?
            }
            OperationKind::GetCanvasInfo => {
                let info = result.get("canvas_info").unwrap_or(result);
                to_payload(&canvas::parse_canvas(info))?
            }
            _ => return Ok(None),
        };
        Ok(Some(data))
    }

    /// Response half of a push: peek the oldest query, never remove it.
    fn parse_push_reply(&self, msg: &Value, kind: OperationKind) -> Result<BizResponse, ParseError> {
        let payload = push_payload(msg).ok_or_else(|| ParseError::Malformed("push without body".to_string()))?;
        let pending = self
            .core
            .lock()
            .correlator
            .find_oldest_by_kind(kind)
            .cloned()
            .ok_or_else(|| ParseError::NoPendingRequest(kind.to_string()))?;
        let data = match kind {
            OperationKind::GetStatus => {
                // Only a delta the event path will merge and emit answers the query.
                let merged = self
                    .core
                    .preview(payload, as_i64_lenient(msg.get("id")))
                    .ok_or_else(|| ParseError::NoPendingRequest(kind.to_string()))?;
                to_payload(&status::extract_status(self.core.printer_id(), &merged))?
            }
            _ => {
                let (attributes, firmware) = attributes::extract_attributes(self.core.printer_id(), payload);
                self.note_firmware(firmware);
                to_payload(&attributes)?
            }
        };
        Ok(BizResponse::success(kind, pending.standard_id, Some(data)))
    }

    fn parse_reply(&self, msg: &Value, method: Option<i64>) -> Result<BizResponse, ParseError> {
        let result = msg
            .get("result")
            .ok_or_else(|| ParseError::Malformed("reply without result".to_string()))?;
        let id = message_id(msg);
        let error_code = i64_or(result.get("error_code"), 0);
        let pending = match id.as_deref() {
            Some(id) => self.core.lock().correlator.remove(id),
            None => None,
        };

        let Some(pending) = pending else {
            let oneway = id.as_deref().and_then(|id| self.core.take_oneway(id));
            let abandoned = id.as_deref().is_some_and(|id| self.core.take_abandoned(id));
            let kind = oneway
                .or_else(|| abandoned.then_some(OperationKind::GetStatus))
                .or_else(|| method.and_then(|m| COMMANDS.from_wire(&m)));
            // Resync replies and late full snapshots still refresh the cache.
            if kind == Some(OperationKind::GetStatus) && error_code == 0 {
                self.core.apply_full(result.clone(), None);
            }
            return Err(match oneway {
                Some(kind) => ParseError::OneWayReply(kind),
                None => ParseError::NoPendingRequest(id.unwrap_or_else(|| format!("method {:?}", method))),
            });
        };

        if error_code != 0 {
            let detail = result.get("message").and_then(Value::as_str);
            let (code, message) = ERRORS.translate(error_code, detail);
            return Ok(failed_response(&pending, code, message));
        }
        if pending.kind == OperationKind::GetStatus {
            self.core.apply_full(result.clone(), None);
        }
        let data = self.payload_for(pending.kind, result)?;
        Ok(BizResponse::success(pending.kind, pending.standard_id, data))
    }
}

impl ProtocolAdapter for Cc2Adapter {
    fn printer_type(&self) -> PrinterType {
        PrinterType::Cc2
    }

    fn printer_id(&self) -> &str {
        self.core.printer_id()
    }

    fn build_request(&self, kind: OperationKind, params: &Value, timeout: Duration) -> Result<WireRequest, BuildError> {
        let (vendor_id, bytes) = self.encode(kind, params)?;
        Ok(self.core.register(kind, vendor_id, timeout, bytes))
    }

    fn build_oneway(&self, kind: OperationKind, params: &Value) -> Result<Vec<u8>, BuildError> {
        let (vendor_id, bytes) = self.encode(kind, params)?;
        self.core.remember_oneway(vendor_id, kind);
        Ok(bytes)
    }

    fn classify(&self, bytes: &[u8]) -> Classification {
        let Some(msg) = parse_json(self.core.printer_id(), bytes) else {
            return Classification::NONE;
        };
        let method = as_i64_lenient(msg.get("method"));
        if matches!(method, Some(METHOD_STATUS_PUSH | METHOD_ATTRIBUTES_PUSH)) {
            return Classification::BOTH;
        }
        if message_id(&msg).is_some_and(|id| self.core.is_known_vendor_id(&id)) {
            return Classification::RESPONSE;
        }
        if msg.get("result").is_some() && method.and_then(|m| COMMANDS.from_wire(&m)).is_some() {
            return Classification::RESPONSE;
        }
        tracing::debug!("[{}] Dropping CC2 message with method {:?}", self.core.printer_id(), method);
        Classification::NONE
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<BizResponse, ParseError> {
        let msg = parse_json(self.core.printer_id(), bytes)
            .ok_or_else(|| ParseError::Malformed("not a JSON object".to_string()))?;
        let method = as_i64_lenient(msg.get("method"));
        match method {
            Some(METHOD_STATUS_PUSH) => self.parse_push_reply(&msg, OperationKind::GetStatus),
            Some(METHOD_ATTRIBUTES_PUSH) => self.parse_push_reply(&msg, OperationKind::GetAttributes),
            _ => self.parse_reply(&msg, method),
        }
    }

    fn parse_event(&self, bytes: &[u8]) -> Option<BizEvent> {
        let msg = parse_json(self.core.printer_id(), bytes)?;
        match as_i64_lenient(msg.get("method"))? {
            METHOD_STATUS_PUSH => {
                let delta = push_payload(&msg)?;
                let sequence_id = as_i64_lenient(msg.get("id"));
                let merged = self.core.reconcile_delta(delta, sequence_id, || {
                    self.encode(OperationKind::GetStatus, &Value::Null).ok()
                });
                let merged = merged?;
                // The response path already answered the waiting query.
                self.core.lock().correlator.remove_oldest_by_kind(OperationKind::GetStatus);
                let data = to_payload(&status::extract_status(self.core.printer_id(), &merged)).ok()?;
                Some(BizEvent::new(OperationKind::StatusPushed, self.core.printer_id(), data))
            }
            METHOD_ATTRIBUTES_PUSH => {
                let payload = push_payload(&msg)?;
                self.core.lock().correlator.remove_oldest_by_kind(OperationKind::GetAttributes);
                let (attributes, firmware) = attributes::extract_attributes(self.core.printer_id(), payload);
                self.note_firmware(firmware);
                let data = to_payload(&attributes).ok()?;
                Some(BizEvent::new(OperationKind::AttributesPushed, self.core.printer_id(), data))
            }
            _ => None,
        }
    }

    fn reset_sequence_state(&self) {
        self.core.reset();
    }

    fn cancel(&self, standard_id: &str) -> Option<PendingRequest> {
        self.core.cancel(standard_id)
    }

    fn expire(&self, now: Instant) -> Vec<PendingRequest> {
        self.core.expire(now)
    }

    fn drain_pending(&self) -> Vec<PendingRequest> {
        self.core.drain()
    }

    fn pending_count(&self) -> usize {
        self.core.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table_round_trip() {
        for (kind, method) in COMMANDS.entries() {
            assert_eq!(COMMANDS.to_wire(*kind), Some(method));
            assert_eq!(COMMANDS.from_wire(method), Some(*kind));
        }
        assert_eq!(COMMANDS.from_wire(&1), None);
    }

    #[test]
    fn test_error_table_is_complete() {
        for (vendor_code, expected, _) in ERRORS.entries() {
            let (code, message) = ERRORS.translate(*vendor_code, Some("detail"));
            assert_eq!(code, *expected);
            assert!(message.contains(&vendor_code.to_string()));
            assert!(message.ends_with("detail"));
        }
        assert_eq!(ERRORS.translate(0, None).0, ErrorCode::Success);
        assert_eq!(ERRORS.translate(1234, None).0, ErrorCode::VendorUnknownError(1234));
    }

    #[test]
    fn test_push_payload_locations() {
        assert!(push_payload(&json!({"method": 6000, "result": {"a": 1}})).is_some());
        assert!(push_payload(&json!({"method": 6000, "params": {"a": 1}})).is_some());
        assert!(push_payload(&json!({"method": 6000, "result": 5})).is_none());
    }
}
