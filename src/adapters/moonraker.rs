//! Moonraker adapter (JSON-RPC 2.0 over WebSocket) for Klipper based printers.
//!
//! Most motion and heater control has no dedicated RPC and is sent as G-code
//! through `printer.gcode.script`. Status comes back as a full object snapshot
//! in the subscribe reply, then as unsequenced `notify_status_update` deltas.

use crate::adapter::{
    AdapterCore, BuildError, Classification, ParseError, PrinterType, ProtocolAdapter, WireRequest,
    failed_response, parse_json, to_payload,
};
use crate::adapters::fields::{as_f64_lenient, f64_or, i64_or, string_or_empty, u32_or_zero};
use crate::params::{
    self, FanParams, HomeAxisParams, LightParams, MoveAxisParams, SpeedParams, StartPrintParams,
    StorageMedia, TemperatureParams, percent_to_pwm,
};
use printlink_shared::models::{
    Capabilities, FanStatus, LightStatus, MachineState, PrintJob, SpeedMode, StorageStatus, SubState,
    TemperatureRange, TemperatureStatus, component,
};
use printlink_shared::{
    BizEvent, BizResponse, CommandTable, ErrorCode, ErrorTable, OperationKind, PendingRequest,
    UnifiedAttributesData, UnifiedStatusData,
};
use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// Either a native RPC method or a G-code/macro sent through the script RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoonrakerCommand {
    Rpc(&'static str),
    Script(&'static str),
}

impl MoonrakerCommand {
    pub fn method(&self) -> &'static str {
        match self {
            MoonrakerCommand::Rpc(method) => method,
            MoonrakerCommand::Script(_) => "printer.gcode.script",
        }
    }
}

pub static COMMANDS: CommandTable<MoonrakerCommand> = CommandTable::new(&[
    (OperationKind::GetStatus, MoonrakerCommand::Rpc("printer.objects.subscribe")),
    (OperationKind::GetAttributes, MoonrakerCommand::Rpc("printer.info")),
    (OperationKind::StartPrint, MoonrakerCommand::Rpc("printer.print.start")),
    (OperationKind::PausePrint, MoonrakerCommand::Rpc("printer.print.pause")),
    (OperationKind::ResumePrint, MoonrakerCommand::Rpc("printer.print.resume")),
    (OperationKind::StopPrint, MoonrakerCommand::Rpc("printer.print.cancel")),
    (OperationKind::HomeAxis, MoonrakerCommand::Script("G28")),
    (OperationKind::MoveAxis, MoonrakerCommand::Script("G91")),
    (OperationKind::SetTemperature, MoonrakerCommand::Script("M104")),
    (OperationKind::SetFanSpeed, MoonrakerCommand::Script("M106")),
    (OperationKind::SetPrintSpeed, MoonrakerCommand::Script("M220")),
    (OperationKind::SetLight, MoonrakerCommand::Script("SET_LED")),
    (OperationKind::StatusPushed, MoonrakerCommand::Rpc("notify_status_update")),
]);

pub static ERRORS: ErrorTable = ErrorTable::new(
    "Moonraker",
    &[
        (-32700, ErrorCode::InvalidParameter, "parse error"),
        (-32600, ErrorCode::InvalidParameter, "invalid request"),
        (-32601, ErrorCode::NotImplemented, "method not found"),
        (-32602, ErrorCode::InvalidParameter, "invalid params"),
        (-32603, ErrorCode::VendorOperationRejected, "internal error"),
        (400, ErrorCode::InvalidParameter, "bad request"),
        (401, ErrorCode::VendorAccessDenied, "unauthorized"),
        (403, ErrorCode::VendorAccessDenied, "forbidden"),
        (404, ErrorCode::VendorFileNotFound, "not found"),
        (409, ErrorCode::VendorBusy, "conflict"),
        (503, ErrorCode::VendorBusy, "klippy not ready"),
    ],
);

/// Printer objects subscribed to by `GetStatus`.
pub const STATUS_OBJECTS: [&str; 11] = [
    "webhooks",
    "print_stats",
    "virtual_sdcard",
    "display_status",
    "idle_timeout",
    "toolhead",
    "gcode_move",
    "extruder",
    "heater_bed",
    "fan",
    "temperature_sensor chamber",
];

const TEMPERATURE_ZONES: [&str; 3] = [component::EXTRUDER, component::HEATED_BED, component::CHAMBER];
const CHAMBER_LIGHT_LED: &str = "chamber_light";
const DEFAULT_MOVE_FEEDRATE: f64 = 3000.0;

fn message_id(msg: &Value) -> Option<String> {
    let id = string_or_empty(msg.get("id"));
    (!id.is_empty()).then_some(id)
}

/// Klipper fan and LED commands take 0.0-1.0.
fn unit_fraction(percent: f64) -> String {
    format!("{:.2}", percent.clamp(0.0, 100.0) / 100.0)
}

fn script(kind: OperationKind, params: &Value) -> Result<String, BuildError> {
    match kind {
        OperationKind::HomeAxis => {
            let p: HomeAxisParams = params::decode(kind, params)?;
            let axes = p.axes()?;
            if axes == "XYZ" {
                return Ok("G28".to_string());
            }
            let axes: Vec<String> = axes.chars().map(|c| c.to_string()).collect();
            Ok(format!("G28 {}", axes.join(" ")))
        }
        OperationKind::MoveAxis => {
            let p: MoveAxisParams = params::decode(kind, params)?;
            let axis = p.axis()?;
            let feedrate = p.feedrate.unwrap_or(DEFAULT_MOVE_FEEDRATE);
            if !(feedrate.is_finite() && feedrate > 0.0) {
                return Err(BuildError::InvalidParameter(format!("invalid feedrate {}", feedrate)));
            }
            Ok(format!("G91\nG1 {}{} F{}\nG90", axis, p.distance, feedrate))
        }
        OperationKind::SetTemperature => {
            let p: TemperatureParams = params::decode(kind, params)?;
            p.validate(&TEMPERATURE_ZONES)?;
            let mut lines = Vec::new();
            if let Some(target) = p.get(component::EXTRUDER) {
                lines.push(format!("M104 S{}", target));
            }
            if let Some(target) = p.get(component::HEATED_BED) {
                lines.push(format!("M140 S{}", target));
            }
            if let Some(target) = p.get(component::CHAMBER) {
                lines.push(format!("SET_HEATER_TEMPERATURE HEATER=chamber TARGET={}", target));
            }
            Ok(lines.join("\n"))
        }
        OperationKind::SetFanSpeed => {
            let p: FanParams = params::decode(kind, params)?;
            p.validate()?;
            let mut lines = Vec::new();
            if let Some(speed) = p.get(component::MODEL_FAN) {
                lines.push(format!("M106 S{}", percent_to_pwm(speed)));
            }
            if let Some(speed) = p.get(component::AUXILIARY_FAN) {
                lines.push(format!("SET_FAN_SPEED FAN=auxiliary_fan SPEED={}", unit_fraction(speed)));
            }
            if let Some(speed) = p.get(component::BOX_FAN) {
                lines.push(format!("SET_FAN_SPEED FAN=box_fan SPEED={}", unit_fraction(speed)));
            }
            Ok(lines.join("\n"))
        }
        OperationKind::SetPrintSpeed => {
            let p: SpeedParams = params::decode(kind, params)?;
            let mode = SpeedMode::from_code(p.mode)
                .ok_or_else(|| BuildError::InvalidParameter(format!("unknown speed mode {}", p.mode)))?;
            Ok(format!("M220 S{}", mode.percent()))
        }
        OperationKind::SetLight => {
            let p: LightParams = params::decode(kind, params)?;
            if p.name != component::CHAMBER_LIGHT {
                return Err(BuildError::InvalidParameter(format!("unknown light '{}'", p.name)));
            }
            let level = match (p.on, p.brightness) {
                (false, _) => 0.0,
                (true, Some(b)) => f64::from(b.min(100)),
                (true, None) => 100.0,
            };
            Ok(format!("SET_LED LED={} WHITE={}", CHAMBER_LIGHT_LED, unit_fraction(level)))
        }
        other => Err(BuildError::NotImplemented(other)),
    }
}

fn rpc_params(kind: OperationKind, params: &Value) -> Result<Value, BuildError> {
    match kind {
        OperationKind::GetStatus => {
            let objects: serde_json::Map<String, Value> =
                STATUS_OBJECTS.iter().map(|o| (o.to_string(), Value::Null)).collect();
            Ok(json!({ "objects": objects }))
        }
        OperationKind::StartPrint => {
            let p: StartPrintParams = params::decode(kind, params)?;
            p.validate()?;
            if p.storage == StorageMedia::Udisk {
                return Err(BuildError::InvalidParameter("only local storage can be printed from".to_string()));
            }
            if !p.slot_map.is_empty() {
                return Err(BuildError::InvalidParameter("multi-filament slot mapping not supported".to_string()));
            }
            Ok(json!({ "filename": p.filename.trim_start_matches('/') }))
        }
        _ => Ok(json!({})),
    }
}

/// Klipper `webhooks` / `print_stats` / `idle_timeout` into machine and sub state.
pub fn machine_state(status: &Value) -> (MachineState, SubState) {
    let webhooks = status
        .get("webhooks")
        .and_then(|w| w.get("state"))
        .and_then(Value::as_str);
    match webhooks {
        Some("startup") => return (MachineState::Initializing, SubState::None),
        Some("shutdown") | Some("error") => return (MachineState::Error, SubState::None),
        Some("disconnected") => return (MachineState::Offline, SubState::None),
        _ => {}
    }
    let print_state = status
        .get("print_stats")
        .and_then(|p| p.get("state"))
        .and_then(Value::as_str);
    match print_state {
        Some("printing") => (MachineState::Printing, SubState::Printing),
        Some("paused") => (MachineState::Printing, SubState::Paused),
        Some("complete") => (MachineState::Idle, SubState::Completed),
        Some("cancelled") => (MachineState::Idle, SubState::Stopped),
        Some("error") => (MachineState::Error, SubState::None),
        Some("standby") => {
            let idle = status
                .get("idle_timeout")
                .and_then(|i| i.get("state"))
                .and_then(Value::as_str);
            if idle == Some("Printing") {
                (MachineState::Busy, SubState::None)
            } else {
                (MachineState::Idle, SubState::None)
            }
        }
        Some(_) => (MachineState::Unknown, SubState::Unknown),
        None => (MachineState::Unknown, SubState::None),
    }
}

pub fn extract_status(printer_id: &str, status: &Value) -> UnifiedStatusData {
    let mut out = UnifiedStatusData::new(printer_id);
    (out.state, out.sub_state) = machine_state(status);

    let stats = status.get("print_stats").unwrap_or(&Value::Null);
    let fraction = status
        .get("virtual_sdcard")
        .and_then(|v| as_f64_lenient(v.get("progress")))
        .or_else(|| status.get("display_status").and_then(|d| as_f64_lenient(d.get("progress"))))
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let elapsed = f64_or(stats.get("print_duration"), 0.0).max(0.0);
    let estimated_total = if fraction > 0.0 { elapsed / fraction } else { 0.0 };
    let info = stats.get("info").unwrap_or(&Value::Null);
    out.print_job = PrintJob {
        file_name: string_or_empty(stats.get("filename")),
        task_id: String::new(),
        progress: (fraction * 100.0).clamp(0.0, 100.0),
        current_time_secs: elapsed as u64,
        total_time_secs: estimated_total as u64,
        remaining_time_secs: (estimated_total - elapsed).max(0.0) as u64,
        current_layer: u32_or_zero(info.get("current_layer")),
        total_layer: u32_or_zero(info.get("total_layer")),
        speed_mode: status
            .get("gcode_move")
            .and_then(|g| as_f64_lenient(g.get("speed_factor")))
            .map(|factor| SpeedMode::from_percent(factor * 100.0)),
    };

    for (zone, object) in [
        (component::EXTRUDER, "extruder"),
        (component::HEATED_BED, "heater_bed"),
        (component::CHAMBER, "temperature_sensor chamber"),
    ] {
        if let Some(sensor) = status.get(object) {
            out.temperatures.insert(
                zone.to_string(),
                TemperatureStatus {
                    current: f64_or(sensor.get("temperature"), 0.0),
                    target: f64_or(sensor.get("target"), 0.0),
                },
            );
        }
    }

    if let Some(fan) = status.get("fan") {
        out.fans.insert(
            component::MODEL_FAN.to_string(),
            FanStatus {
                speed: (f64_or(fan.get("speed"), 0.0).clamp(0.0, 1.0) * 100.0).round(),
                rpm: as_f64_lenient(fan.get("rpm")).map(|r| r.max(0.0) as u32),
            },
        );
    }

    let led_key = format!("led {}", CHAMBER_LIGHT_LED);
    if let Some(color) = status
        .get(&led_key)
        .and_then(|led| led.get("color_data"))
        .and_then(Value::as_array)
        .and_then(|chain| chain.first())
        .and_then(Value::as_array)
    {
        let level = color
            .iter()
            .filter_map(|c| as_f64_lenient(Some(c)))
            .fold(0.0_f64, f64::max);
        out.lights.insert(
            component::CHAMBER_LIGHT.to_string(),
            LightStatus { brightness: (level.clamp(0.0, 1.0) * 100.0).round() as u8, connected: true },
        );
    }

    if let Some(position) = status
        .get("toolhead")
        .and_then(|t| t.get("position"))
        .and_then(Value::as_array)
    {
        let axes: Vec<f64> = position.iter().take(3).filter_map(|v| as_f64_lenient(Some(v))).collect();
        if axes.len() == 3 {
            out.axis_position = axes;
        }
    }

    out.storages.insert(component::LOCAL_STORAGE.to_string(), StorageStatus { connected: true });
    // Klipper serves prints from its virtual SD card.
    if status.get("virtual_sdcard").is_some() {
        out.storages.insert(component::SD_CARD.to_string(), StorageStatus { connected: true });
        out.external_devices.sd_connected = true;
    }

    out.normalized()
}

pub fn extract_attributes(printer_id: &str, info: &Value) -> UnifiedAttributesData {
    UnifiedAttributesData {
        printer_id: printer_id.to_string(),
        name: string_or_empty(info.get("hostname")),
        model: "Klipper".to_string(),
        brand: String::new(),
        manufacturer: String::new(),
        firmware_version: string_or_empty(info.get("software_version")),
        serial_number: String::new(),
        mainboard_id: printer_id.to_string(),
        capabilities: Capabilities {
            fans: vec![
                component::MODEL_FAN.to_string(),
                component::AUXILIARY_FAN.to_string(),
                component::BOX_FAN.to_string(),
            ],
            temperature_zones: vec![
                TemperatureRange { name: component::EXTRUDER.to_string(), min: 0.0, max: 300.0 },
                TemperatureRange { name: component::HEATED_BED.to_string(), min: 0.0, max: 120.0 },
                TemperatureRange { name: component::CHAMBER.to_string(), min: 0.0, max: 80.0 },
            ],
            lights: vec![component::CHAMBER_LIGHT.to_string()],
            storage_media: vec![component::LOCAL_STORAGE.to_string()],
            multi_filament: false,
            auto_bed_leveling: false,
            time_lapse: false,
            auto_refill: false,
        },
    }
}

pub struct MoonrakerAdapter {
    core: AdapterCore,
}

impl MoonrakerAdapter {
    pub(crate) fn new(core: AdapterCore) -> Self {
        Self { core }
    }

    fn encode(&self, kind: OperationKind, params: &Value) -> Result<(String, Vec<u8>), BuildError> {
        if kind.is_event_only() {
            return Err(BuildError::NotImplemented(kind));
        }
        let command = *COMMANDS.to_wire(kind).ok_or(BuildError::NotImplemented(kind))?;
        let body = match command {
            MoonrakerCommand::Rpc(_) => rpc_params(kind, params)?,
            MoonrakerCommand::Script(_) => json!({ "script": script(kind, params)? }),
        };
        let id = self.core.next_counter();
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": command.method(),
            "params": body,
            "id": id,
        });
        let bytes = serde_json::to_vec(&envelope).map_err(|e| BuildError::InvalidParameter(e.to_string()))?;
        Ok((id.to_string(), bytes))
    }

    fn status_delta(&self, method: &str, msg: &Value) -> Option<Value> {
        match method {
            "notify_status_update" => msg
                .get("params")
                .and_then(Value::as_array)
                .and_then(|p| p.first())
                .filter(|d| d.is_object())
                .cloned(),
            "notify_klippy_ready" => Some(json!({ "webhooks": { "state": "ready" } })),
            "notify_klippy_shutdown" => Some(json!({ "webhooks": { "state": "shutdown" } })),
            "notify_klippy_disconnected" => Some(json!({ "webhooks": { "state": "disconnected" } })),
            _ => None,
        }
    }
}

impl ProtocolAdapter for MoonrakerAdapter {
    fn printer_type(&self) -> PrinterType {
        PrinterType::Moonraker
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
        if message_id(&msg).is_some_and(|id| self.core.is_known_vendor_id(&id)) {
            return Classification::RESPONSE;
        }
        match msg.get("method").and_then(Value::as_str) {
            Some(method) if method.starts_with("notify_") => Classification::EVENT,
            method => {
                tracing::debug!("[{}] Dropping Moonraker message (method {:?})", self.core.printer_id(), method);
                Classification::NONE
            }
        }
    }

    fn parse_response(&self, bytes: &[u8]) -> Result<BizResponse, ParseError> {
        let msg = parse_json(self.core.printer_id(), bytes)
            .ok_or_else(|| ParseError::Malformed("not a JSON object".to_string()))?;
        let id = message_id(&msg).ok_or(ParseError::NotAResponse)?;
        let pending = self.core.lock().correlator.remove(&id);

        let Some(pending) = pending else {
            if let Some(kind) = self.core.take_oneway(&id) {
                if kind == OperationKind::GetStatus {
                    if let Some(status) = msg.get("result").and_then(|r| r.get("status")) {
                        self.core.apply_full(status.clone(), None);
                    }
                }
                return Err(ParseError::OneWayReply(kind));
            }
            if self.core.take_abandoned(&id) {
                if let Some(status) = msg.get("result").and_then(|r| r.get("status")) {
                    tracing::debug!("[{}] Caching late status reply {}", self.core.printer_id(), id);
                    self.core.apply_full(status.clone(), None);
                }
            }
            return Err(ParseError::NoPendingRequest(id));
        };

        if let Some(error) = msg.get("error") {
            let vendor_code = i64_or(error.get("code"), -1);
            let (code, message) = ERRORS.translate(vendor_code, error.get("message").and_then(Value::as_str));
            return Ok(failed_response(&pending, code, message));
        }
        let Some(result) = msg.get("result") else {
            return Ok(failed_response(
                &pending,
                ErrorCode::VendorInvalidResponse,
                "reply carries neither result nor error".to_string(),
            ));
        };

        let data = match pending.kind {
            kind if !kind.has_payload() => None,
            OperationKind::GetStatus => {
                let status = result.get("status").unwrap_or(result);
                self.core.apply_full(status.clone(), None);
                Some(to_payload(&extract_status(self.core.printer_id(), status))?)
            }
            OperationKind::GetAttributes => Some(to_payload(&extract_attributes(self.core.printer_id(), result))?),
            _ => None,
        };
        Ok(BizResponse::success(pending.kind, pending.standard_id, data))
    }

    fn parse_event(&self, bytes: &[u8]) -> Option<BizEvent> {
        let msg = parse_json(self.core.printer_id(), bytes)?;
        let method = msg.get("method").and_then(Value::as_str)?;
        let Some(delta) = self.status_delta(method, &msg) else {
            tracing::trace!("[{}] Ignoring {}", self.core.printer_id(), method);
            return None;
        };
        let merged = self.core.reconcile_delta(&delta, None, || None)?;
        let data = to_payload(&extract_status(self.core.printer_id(), &merged)).ok()?;
        Some(BizEvent::new(OperationKind::StatusPushed, self.core.printer_id(), data))
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
        for (kind, command) in COMMANDS.entries() {
            assert_eq!(COMMANDS.to_wire(*kind), Some(command));
            assert_eq!(COMMANDS.from_wire(command), Some(*kind));
        }
        assert_eq!(COMMANDS.from_wire(&MoonrakerCommand::Rpc("server.info")), None);
        assert_eq!(MoonrakerCommand::Script("G28").method(), "printer.gcode.script");
    }

    #[test]
    fn test_error_table_is_complete() {
        for (vendor_code, expected, _) in ERRORS.entries() {
            let (code, message) = ERRORS.translate(*vendor_code, None);
            assert_eq!(code, *expected);
            assert!(message.contains(&vendor_code.to_string()));
        }
        assert_eq!(ERRORS.translate(-1, None).0, ErrorCode::VendorUnknownError(-1));
    }

    #[test]
    fn test_scripts() {
        assert_eq!(script(OperationKind::HomeAxis, &json!({})).unwrap(), "G28");
        assert_eq!(script(OperationKind::HomeAxis, &json!({"axes": "xy"})).unwrap(), "G28 X Y");
        assert_eq!(
            script(OperationKind::MoveAxis, &json!({"axis": "z", "distance": 1.5, "feedrate": 600})).unwrap(),
            "G91\nG1 Z1.5 F600\nG90"
        );
        assert_eq!(
            script(OperationKind::SetTemperature, &json!({"extruder": 215, "heatedBed": 60})).unwrap(),
            "M104 S215\nM140 S60"
        );
        assert_eq!(
            script(OperationKind::SetFanSpeed, &json!({"model": 100, "auxiliary": 50})).unwrap(),
            "M106 S255\nSET_FAN_SPEED FAN=auxiliary_fan SPEED=0.50"
        );
        assert_eq!(script(OperationKind::SetPrintSpeed, &json!({"mode": 0})).unwrap(), "M220 S50");
        assert_eq!(
            script(OperationKind::SetLight, &json!({"on": true, "brightness": 40})).unwrap(),
            "SET_LED LED=chamber_light WHITE=0.40"
        );
    }

    #[test]
    fn test_machine_state_mapping() {
        let state = |v: Value| machine_state(&v);
        assert_eq!(
            state(json!({"webhooks": {"state": "ready"}, "print_stats": {"state": "paused"}})),
            (MachineState::Printing, SubState::Paused)
        );
        assert_eq!(
            state(json!({"print_stats": {"state": "complete"}})),
            (MachineState::Idle, SubState::Completed)
        );
        assert_eq!(
            state(json!({"print_stats": {"state": "standby"}, "idle_timeout": {"state": "Printing"}})),
            (MachineState::Busy, SubState::None)
        );
        assert_eq!(
            state(json!({"webhooks": {"state": "shutdown"}, "print_stats": {"state": "printing"}})),
            (MachineState::Error, SubState::None)
        );
    }

    #[test]
    fn test_udisk_print_rejected() {
        let err = rpc_params(OperationKind::StartPrint, &json!({"filename": "a.gcode", "storage": "udisk"}));
        assert!(matches!(err, Err(BuildError::InvalidParameter(_))));
        assert_eq!(
            rpc_params(OperationKind::StartPrint, &json!({"filename": "/a.gcode"})).unwrap(),
            json!({"filename": "a.gcode"})
        );
    }
}
