//! CC family adapter (SDCP envelopes over WebSocket).
//!
//! Requests go out on `sdcp/request/<mainboard>` and are acknowledged on
//! `sdcp/response/<mainboard>` with an `Ack` code. Status and attribute
//! payloads never come back in the acknowledgement: they arrive as pushes on
//! `sdcp/status/…` and `sdcp/attributes/…`, which echo no request id. A push is
//! therefore matched to the oldest pending query of its kind and is both a
//! response and an event.

use crate::adapter::{
    AdapterCore, BuildError, Classification, ParseError, PrinterType, ProtocolAdapter, WireRequest,
    failed_response, parse_json, to_payload,
};
use crate::adapters::fields::{
    as_bool_lenient, as_i64_lenient, coordinates, f64_or, i64_or, path, string_or_empty,
    u32_or_zero, u64_or_zero,
};
use crate::params::{
    self, BedType, CancelDownloadParams, DownloadParams, FanParams, HomeAxisParams, LightParams,
    MoveAxisParams, NameParams, SpeedParams, StartPrintParams, StorageMedia, TemperatureParams,
};
use chrono::Utc;
use printlink_shared::models::{
    Capabilities, FanStatus, LightStatus, MachineState, PrintJob, SpeedMode, StorageStatus,
    SubState, TemperatureRange, TemperatureStatus, component,
};
use printlink_shared::{
    BizEvent, BizResponse, CommandTable, ErrorTable, ErrorCode, OperationKind, PendingRequest,
    UnifiedAttributesData, UnifiedStatusData,
};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

pub static COMMANDS: CommandTable<i64> = CommandTable::new(&[
    (OperationKind::GetStatus, 0),
    (OperationKind::GetAttributes, 1),
    (OperationKind::StartPrint, 128),
    (OperationKind::PausePrint, 129),
    (OperationKind::StopPrint, 130),
    (OperationKind::ResumePrint, 131),
    (OperationKind::UpdatePrinterName, 192),
    (OperationKind::CancelFileDownload, 255),
    (OperationKind::StartFileDownload, 256),
    (OperationKind::MoveAxis, 401),
    (OperationKind::HomeAxis, 402),
    (OperationKind::SetTemperature, 403),
    (OperationKind::SetFanSpeed, 404),
    (OperationKind::SetPrintSpeed, 405),
    (OperationKind::SetLight, 406),
]);

pub static ERRORS: ErrorTable = ErrorTable::new(
    "CC",
    &[
        (1, ErrorCode::VendorBusy, "printer busy"),
        (2, ErrorCode::VendorFileNotFound, "file not found"),
        (3, ErrorCode::VendorFileCorrupted, "MD5 check failed"),
        (4, ErrorCode::VendorFileCorrupted, "file read failed"),
        (5, ErrorCode::VendorOperationRejected, "resolution mismatch"),
        (6, ErrorCode::InvalidParameter, "unrecognized file format"),
        (7, ErrorCode::VendorOperationRejected, "machine model mismatch"),
        (8, ErrorCode::VendorAccessDenied, "connection limit reached"),
    ],
);

static MACHINE_STATES: &[(i64, MachineState)] = &[
    (0, MachineState::Idle),
    (1, MachineState::Printing),
    (2, MachineState::FileTransferring),
    (3, MachineState::Calibrating),
    (4, MachineState::SelfChecking),
    (5, MachineState::AutoLeveling),
    (6, MachineState::Homing),
    (7, MachineState::FilamentOperating),
    (8, MachineState::Updating),
    (9, MachineState::Busy),
];

static SUB_STATES: &[(i64, SubState)] = &[
    (0, SubState::None),
    (1, SubState::Homing),
    (2, SubState::Preparing),
    (3, SubState::Printing),
    (4, SubState::Printing),
    (5, SubState::Pausing),
    (6, SubState::Paused),
    (7, SubState::Stopping),
    (8, SubState::Stopped),
    (9, SubState::Completed),
    (10, SubState::Preparing),
    (13, SubState::Printing),
    (15, SubState::Resuming),
    (16, SubState::Resuming),
    (18, SubState::Preparing),
    (19, SubState::Preheating),
    (20, SubState::Leveling),
    (21, SubState::Preheating),
];

const TOPIC_REQUEST: &str = "sdcp/request/";
const TOPIC_RESPONSE: &str = "sdcp/response/";
const TOPIC_STATUS: &str = "sdcp/status/";
const TOPIC_ATTRIBUTES: &str = "sdcp/attributes/";

const TEMPERATURE_ZONES: [&str; 3] = [component::EXTRUDER, component::HEATED_BED, component::CHAMBER];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Response,
    Status,
    Attributes,
    Other,
}

fn channel(msg: &Value) -> Channel {
    match msg.get("Topic").and_then(Value::as_str) {
        Some(topic) if topic.contains(TOPIC_RESPONSE) => Channel::Response,
        Some(topic) if topic.contains(TOPIC_STATUS) => Channel::Status,
        Some(topic) if topic.contains(TOPIC_ATTRIBUTES) => Channel::Attributes,
        Some(_) => Channel::Other,
        None if msg.get("Status").is_some() => Channel::Status,
        None if msg.get("Attributes").is_some() => Channel::Attributes,
        None if path(msg, &["Data", "RequestID"]).is_some() => Channel::Response,
        None => Channel::Other,
    }
}

pub fn machine_state(code: i64) -> MachineState {
    MACHINE_STATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or(MachineState::Unknown)
}

pub fn sub_state(code: i64) -> SubState {
    SUB_STATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or(SubState::Unknown)
}

pub struct CcAdapter {
    core: AdapterCore,
    client_id: String,
}

impl CcAdapter {
    pub(crate) fn new(core: AdapterCore) -> Self {
        Self {
            core,
            client_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    fn encode(&self, kind: OperationKind, params: &Value) -> Result<(String, Vec<u8>), BuildError> {
        if kind.is_event_only() {
            return Err(BuildError::NotImplemented(kind));
        }
        let cmd = *COMMANDS.to_wire(kind).ok_or(BuildError::NotImplemented(kind))?;
        let data = request_data(kind, params)?;
        let request_id = uuid::Uuid::new_v4().simple().to_string();
        let mainboard = self.core.printer_id();
        let envelope = json!({
            "Id": self.client_id,
            "Data": {
                "Cmd": cmd,
                "Data": data,
                "RequestID": request_id,
                "MainboardID": mainboard,
                "TimeStamp": Utc::now().timestamp(),
                "From": 1,
            },
            "Topic": format!("{}{}", TOPIC_REQUEST, mainboard),
        });
        let bytes = serde_json::to_vec(&envelope).map_err(|e| BuildError::InvalidParameter(e.to_string()))?;
        Ok((request_id, bytes))
    }

    fn parse_ack(&self, msg: &Value) -> Result<BizResponse, ParseError> {
        let data = msg.get("Data").ok_or_else(|| ParseError::Malformed("missing Data".to_string()))?;
        let request_id = data
            .get("RequestID")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::Malformed("missing RequestID".to_string()))?;
        let ack = as_i64_lenient(path(data, &["Data", "Ack"]))
            .ok_or_else(|| ParseError::Malformed("missing Ack".to_string()))?;

        let pending = {
            let mut state = self.core.lock();
            let found = state.correlator.find_by_vendor_id(request_id).map(|p| p.kind);
            match found {
                // The payload follows as a push; keep the record for it.
                Some(kind) if kind.is_snapshot_query() && ack == 0 => return Err(ParseError::Interim(kind)),
                Some(_) => state.correlator.remove(request_id),
                None => None,
            }
        };
        let Some(pending) = pending else {
            if let Some(kind) = self.core.take_oneway(request_id) {
                return Err(ParseError::OneWayReply(kind));
            }
            tracing::debug!("[{}] Ack for unknown request {}", self.core.printer_id(), request_id);
            return Err(ParseError::NoPendingRequest(request_id.to_string()));
        };

        let cmd = i64_or(data.get("Cmd"), -1);
        if COMMANDS.from_wire(&cmd) != Some(pending.kind) {
            tracing::debug!(
                "[{}] Ack Cmd {} does not match pending {} ({})",
                self.core.printer_id(), cmd, pending.kind, pending.standard_id
            );
        }
        if ack != 0 {
            let (code, message) = ERRORS.translate(ack, None);
            return Ok(failed_response(&pending, code, message));
        }
        Ok(BizResponse::success(pending.kind, pending.standard_id, None))
    }

    /// Response half of a status/attributes push: peek, never remove.
    fn parse_push_reply(&self, msg: &Value, kind: OperationKind) -> Result<BizResponse, ParseError> {
        let pending = self
            .core
            .lock()
            .correlator
            .find_oldest_by_kind(kind)
            .cloned()
            .ok_or_else(|| ParseError::NoPendingRequest(kind.to_string()))?;
        let data = match kind {
            OperationKind::GetStatus => {
                let status = msg.get("Status").ok_or_else(|| ParseError::Malformed("missing Status".to_string()))?;
                to_payload(&self.extract_status(status))?
            }
            _ => {
                let attributes = msg
                    .get("Attributes")
                    .ok_or_else(|| ParseError::Malformed("missing Attributes".to_string()))?;
                to_payload(&self.extract_attributes(attributes))?
            }
        };
        Ok(BizResponse::success(kind, pending.standard_id, Some(data)))
    }

    pub fn extract_status(&self, status: &Value) -> UnifiedStatusData {
        let mut out = UnifiedStatusData::new(self.core.printer_id());
        let state_code = match status.get("CurrentStatus") {
            Some(Value::Array(codes)) => as_i64_lenient(codes.first()),
            other => as_i64_lenient(other),
        };
        out.state = state_code.map(machine_state).unwrap_or(MachineState::Unknown);

        let info = status.get("PrintInfo").unwrap_or(&Value::Null);
        out.sub_state = match as_i64_lenient(info.get("Status")) {
            Some(code) => sub_state(code),
            None => SubState::None,
        };
        let error_number = i64_or(info.get("ErrorNumber"), 0);
        if error_number != 0 {
            out.exception_codes.push(error_number);
        }

        let current_ticks = u64_or_zero(info.get("CurrentTicks"));
        let total_ticks = u64_or_zero(info.get("TotalTicks"));
        let current_layer = u32_or_zero(info.get("CurrentLayer"));
        let total_layer = u32_or_zero(info.get("TotalLayer"));
        let progress = match info.get("Progress") {
            Some(p) => f64_or(Some(p), 0.0),
            None if total_layer > 0 => current_layer as f64 * 100.0 / total_layer as f64,
            None => 0.0,
        };
        out.print_job = PrintJob {
            file_name: string_or_empty(info.get("Filename")),
            task_id: string_or_empty(info.get("TaskId")),
            progress: progress.clamp(0.0, 100.0),
            current_time_secs: current_ticks,
            total_time_secs: total_ticks,
            remaining_time_secs: total_ticks.saturating_sub(current_ticks),
            current_layer,
            total_layer,
            speed_mode: as_i64_lenient(info.get("PrintSpeedPct")).map(|pct| SpeedMode::from_percent(pct as f64)),
        };

        for (zone, current, target) in [
            (component::EXTRUDER, "TempOfNozzle", "TempTargetNozzle"),
            (component::HEATED_BED, "TempOfHotbed", "TempTargetHotbed"),
            (component::CHAMBER, "TempOfBox", "TempTargetBox"),
        ] {
            if status.get(current).is_some() || status.get(target).is_some() {
                out.temperatures.insert(
                    zone.to_string(),
                    TemperatureStatus {
                        current: f64_or(status.get(current), 0.0),
                        target: f64_or(status.get(target), 0.0),
                    },
                );
            }
        }

        if let Some(fans) = status.get("CurrentFanSpeed") {
            for (name, key) in [
                (component::MODEL_FAN, "ModelFan"),
                (component::AUXILIARY_FAN, "AuxiliaryFan"),
                (component::BOX_FAN, "BoxFan"),
            ] {
                if let Some(speed) = fans.get(key) {
                    out.fans.insert(
                        name.to_string(),
                        FanStatus { speed: f64_or(Some(speed), 0.0).clamp(0.0, 100.0), rpm: None },
                    );
                }
            }
        }

        if let Some(on) = as_bool_lenient(path(status, &["LightStatus", "SecondLight"])) {
            out.lights.insert(
                component::CHAMBER_LIGHT.to_string(),
                LightStatus { brightness: if on { 100 } else { 0 }, connected: true },
            );
        }

        out.axis_position = coordinates(status.get("CurrenCoord"));

        let usb = as_bool_lenient(status.get("UsbDiskStatus")).unwrap_or(false);
        out.storages.insert(component::LOCAL_STORAGE.to_string(), StorageStatus { connected: true });
        out.storages.insert(component::UDISK.to_string(), StorageStatus { connected: usb });
        out.external_devices.usb_connected = usb;
        out.external_devices.camera_connected = as_bool_lenient(status.get("CameraStatus")).unwrap_or(false);

        out.normalized()
    }

    pub fn extract_attributes(&self, attributes: &Value) -> UnifiedAttributesData {
        let brand = string_or_empty(attributes.get("BrandName"));
        let mainboard_id = string_or_empty(attributes.get("MainboardID"));
        let serial_number = match attributes.get("SerialNumber") {
            Some(sn) => string_or_empty(Some(sn)),
            None => mainboard_id.clone(),
        };
        let declared: Vec<&str> = attributes
            .get("Capabilities")
            .and_then(Value::as_array)
            .map(|caps| caps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut storage_media = vec![component::LOCAL_STORAGE.to_string()];
        if attributes.get("UsbDiskStatus").is_some() {
            storage_media.push(component::UDISK.to_string());
        }

        UnifiedAttributesData {
            printer_id: self.core.printer_id().to_string(),
            name: string_or_empty(attributes.get("Name")),
            model: string_or_empty(attributes.get("MachineName")),
            manufacturer: brand.clone(),
            brand,
            firmware_version: string_or_empty(attributes.get("FirmwareVersion")),
            serial_number,
            mainboard_id,
            capabilities: Capabilities {
                fans: vec![
                    component::MODEL_FAN.to_string(),
                    component::AUXILIARY_FAN.to_string(),
                    component::BOX_FAN.to_string(),
                ],
                temperature_zones: vec![
                    TemperatureRange { name: component::EXTRUDER.to_string(), min: 0.0, max: 320.0 },
                    TemperatureRange { name: component::HEATED_BED.to_string(), min: 0.0, max: 110.0 },
                    TemperatureRange { name: component::CHAMBER.to_string(), min: 0.0, max: 60.0 },
                ],
                lights: vec![component::CHAMBER_LIGHT.to_string()],
                storage_media,
                multi_filament: false,
                auto_bed_leveling: true,
                time_lapse: declared.iter().any(|c| *c == "TIME_LAPSE" || *c == "VIDEO_STREAM"),
                auto_refill: false,
            },
        }
    }
}

fn request_data(kind: OperationKind, params: &Value) -> Result<Value, BuildError> {
    match kind {
        OperationKind::GetStatus
        | OperationKind::GetAttributes
        | OperationKind::PausePrint
        | OperationKind::ResumePrint
        | OperationKind::StopPrint => Ok(json!({})),
        OperationKind::StartPrint => {
            let p: StartPrintParams = params::decode(kind, params)?;
            p.validate()?;
            if !p.slot_map.is_empty() {
                return Err(BuildError::InvalidParameter("multi-filament slot mapping not supported".to_string()));
            }
            let prefix = match p.storage {
                StorageMedia::Local => "/local/",
                StorageMedia::Udisk => "/usb/",
            };
            let platform = match p.bed_type {
                BedType::Textured => 0,
                BedType::Smooth => 1,
            };
            Ok(json!({
                "Filename": format!("{}{}", prefix, p.filename.trim_start_matches('/')),
                "StartLayer": 0,
                "Calibration_switch": p.auto_bed_leveling as i32,
                "PrintPlatformType": platform,
                "Tlp_Switch": p.time_lapse as i32,
            }))
        }
        OperationKind::HomeAxis => {
            let p: HomeAxisParams = params::decode(kind, params)?;
            Ok(json!({ "Axis": p.axes()? }))
        }
        OperationKind::MoveAxis => {
            let p: MoveAxisParams = params::decode(kind, params)?;
            Ok(json!({ "Axis": p.axis()?.to_string(), "Step": p.distance }))
        }
        OperationKind::SetTemperature => {
            let p: TemperatureParams = params::decode(kind, params)?;
            p.validate(&TEMPERATURE_ZONES)?;
            let mut data = serde_json::Map::new();
            for (zone, key) in [
                (component::EXTRUDER, "TempTargetNozzle"),
                (component::HEATED_BED, "TempTargetHotbed"),
                (component::CHAMBER, "TempTargetBox"),
            ] {
                if let Some(target) = p.get(zone) {
                    data.insert(key.to_string(), json!(target));
                }
            }
            Ok(Value::Object(data))
        }
        OperationKind::SetFanSpeed => {
            let p: FanParams = params::decode(kind, params)?;
            p.validate()?;
            let mut fans = serde_json::Map::new();
            for (name, key) in [
                (component::MODEL_FAN, "ModelFan"),
                (component::AUXILIARY_FAN, "AuxiliaryFan"),
                (component::BOX_FAN, "BoxFan"),
            ] {
                if let Some(speed) = p.get(name) {
                    fans.insert(key.to_string(), json!(speed.round() as i64));
                }
            }
            Ok(json!({ "TargetFanSpeed": fans }))
        }
        OperationKind::SetPrintSpeed => {
            let p: SpeedParams = params::decode(kind, params)?;
            let mode = SpeedMode::from_code(p.mode)
                .ok_or_else(|| BuildError::InvalidParameter(format!("unknown speed mode {}", p.mode)))?;
            Ok(json!({ "PrintSpeedPct": mode.percent() }))
        }
        OperationKind::SetLight => {
            let p: LightParams = params::decode(kind, params)?;
            if p.name != component::CHAMBER_LIGHT {
                return Err(BuildError::InvalidParameter(format!("unknown light '{}'", p.name)));
            }
            Ok(json!({ "LightStatus": { "SecondLight": p.on } }))
        }
        OperationKind::UpdatePrinterName => {
            let p: NameParams = params::decode(kind, params)?;
            if p.name.trim().is_empty() {
                return Err(BuildError::InvalidParameter("name must not be empty".to_string()));
            }
            Ok(json!({ "Name": p.name.trim() }))
        }
        OperationKind::StartFileDownload => {
            let p: DownloadParams = params::decode(kind, params)?;
            Ok(json!({ "Url": p.url, "FileName": p.filename, "MD5": p.md5.unwrap_or_default() }))
        }
        OperationKind::CancelFileDownload => {
            let p: CancelDownloadParams = params::decode(kind, params)?;
            Ok(json!({ "Uuid": "", "FileName": p.filename.unwrap_or_default() }))
        }
        other => Err(BuildError::NotImplemented(other)),
    }
}

impl ProtocolAdapter for CcAdapter {
    fn printer_type(&self) -> PrinterType {
        PrinterType::Cc
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
        match channel(&msg) {
            Channel::Response => Classification::RESPONSE,
            ch @ (Channel::Status | Channel::Attributes) => {
                let query = if ch == Channel::Status {
                    OperationKind::GetStatus
                } else {
                    OperationKind::GetAttributes
                };
                if self.core.lock().correlator.has_pending_kind(query) {
                    Classification::BOTH
                } else {
                    Classification::EVENT
                }
            }
            Channel::Other => {
                tracing::debug!("[{}] Ignoring SDCP message on unhandled topic", self.core.printer_id());
                Classification::NONE
            }
        }
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<BizResponse, ParseError> {
        let msg = parse_json(self.core.printer_id(), bytes)
            .ok_or_else(|| ParseError::Malformed("not a JSON object".to_string()))?;
        match channel(&msg) {
            Channel::Response => self.parse_ack(&msg),
            Channel::Status => self.parse_push_reply(&msg, OperationKind::GetStatus),
            Channel::Attributes => self.parse_push_reply(&msg, OperationKind::GetAttributes),
            Channel::Other => Err(ParseError::NotAResponse),
        }
    }

    fn parse_event(&self, bytes: &[u8]) -> Option<BizEvent> {
        let msg = parse_json(self.core.printer_id(), bytes)?;
        match channel(&msg) {
            Channel::Status => {
                let status = msg.get("Status")?;
                let answered = self.core.lock().correlator.remove_oldest_by_kind(OperationKind::GetStatus);
                let merged = if answered.is_some() {
                    // A push answering an explicit query is the full snapshot.
                    self.core.apply_full(status.clone(), None);
                    status.clone()
                } else {
                    self.core.reconcile_delta(status, None, || None)?
                };
                let data = to_payload(&self.extract_status(&merged)).ok()?;
                Some(BizEvent::new(OperationKind::StatusPushed, self.core.printer_id(), data))
            }
            Channel::Attributes => {
                let attributes = msg.get("Attributes")?;
                self.core.lock().correlator.remove_oldest_by_kind(OperationKind::GetAttributes);
                let data = to_payload(&self.extract_attributes(attributes)).ok()?;
                Some(BizEvent::new(OperationKind::AttributesPushed, self.core.printer_id(), data))
            }
            Channel::Response | Channel::Other => None,
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
        for (kind, code) in COMMANDS.entries() {
            assert_eq!(COMMANDS.to_wire(*kind), Some(code));
            assert_eq!(COMMANDS.from_wire(code), Some(*kind));
        }
        assert_eq!(COMMANDS.from_wire(&9999), None);
    }

    #[test]
    fn test_error_table_is_complete() {
        for (vendor_code, expected, _) in ERRORS.entries() {
            let (code, message) = ERRORS.translate(*vendor_code, None);
            assert_eq!(code, *expected);
            assert!(!matches!(code, ErrorCode::VendorUnknownError(_)));
            assert!(message.contains(&vendor_code.to_string()));
        }
        let (code, message) = ERRORS.translate(4242, None);
        assert_eq!(code, ErrorCode::VendorUnknownError(4242));
        assert!(message.contains("4242"));
    }

    #[test]
    fn test_unmapped_states_are_unknown() {
        assert_eq!(machine_state(1), MachineState::Printing);
        assert_eq!(machine_state(77), MachineState::Unknown);
        assert_eq!(sub_state(6), SubState::Paused);
        assert_eq!(sub_state(-3), SubState::Unknown);
    }

    #[test]
    fn test_channel_routing() {
        assert_eq!(channel(&json!({"Topic": "sdcp/response/abc"})), Channel::Response);
        assert_eq!(channel(&json!({"Topic": "sdcp/status/abc"})), Channel::Status);
        assert_eq!(channel(&json!({"Topic": "sdcp/attributes/abc"})), Channel::Attributes);
        assert_eq!(channel(&json!({"Topic": "sdcp/notice/abc"})), Channel::Other);
        assert_eq!(channel(&json!({"Data": {"RequestID": "x"}})), Channel::Response);
        assert_eq!(channel(&json!({"Status": {}})), Channel::Status);
    }

    #[test]
    fn test_request_data_shaping() {
        let data = request_data(
            OperationKind::StartPrint,
            &json!({"filename": "cube.gcode", "storage": "udisk", "bedType": "smooth", "autoBedLeveling": true}),
        )
        .unwrap();
        assert_eq!(data["Filename"], "/usb/cube.gcode");
        assert_eq!(data["PrintPlatformType"], 1);
        assert_eq!(data["Calibration_switch"], 1);
        assert_eq!(data["Tlp_Switch"], 0);

        let data = request_data(OperationKind::SetFanSpeed, &json!({"model": 100, "auxiliary": 40})).unwrap();
        assert_eq!(data, json!({"TargetFanSpeed": {"ModelFan": 100, "AuxiliaryFan": 40}}));

        let data = request_data(OperationKind::SetPrintSpeed, &json!({"mode": 3})).unwrap();
        assert_eq!(data, json!({"PrintSpeedPct": 160}));

        assert!(matches!(
            request_data(OperationKind::GetCanvasInfo, &json!({})),
            Err(BuildError::NotImplemented(OperationKind::GetCanvasInfo))
        ));
    }
}
