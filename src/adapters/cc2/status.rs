// CC2 status payload (method 1002 reply and 6000 pushes) into UnifiedStatusData

use super::canvas::parse_canvas;
use crate::adapters::fields::{
    as_bool_lenient, as_f64_lenient, as_i64_lenient, f64_or, i64_or, string_or_empty, u32_or_zero,
    u64_or_zero,
};
use printlink_shared::models::{
    FanStatus, LightStatus, MachineState, PrintJob, SpeedMode, StorageStatus, SubState,
    TemperatureStatus, component,
};
use printlink_shared::UnifiedStatusData;
use serde_json::Value;

static MACHINE_STATES: &[(i64, MachineState)] = &[
    (0, MachineState::Initializing),
    (1, MachineState::Idle),
    (2, MachineState::Printing),
    (3, MachineState::FilamentOperating),
    (4, MachineState::AutoLeveling),
    (5, MachineState::Calibrating),
    (6, MachineState::Calibrating),
    (7, MachineState::SelfChecking),
    (8, MachineState::Updating),
    (9, MachineState::Homing),
    (10, MachineState::FileTransferring),
    (11, MachineState::Busy),
    (12, MachineState::FilamentOperating),
    (13, MachineState::Busy),
    (14, MachineState::Error),
];

static SUB_STATES: &[(i64, SubState)] = &[
    (0, SubState::None),
    (1041, SubState::Preparing),
    (1042, SubState::Preheating),
    (1043, SubState::Homing),
    (1044, SubState::Leveling),
    (1045, SubState::Printing),
    (1046, SubState::Pausing),
    (1047, SubState::Paused),
    (1048, SubState::Resuming),
    (1049, SubState::Stopping),
    (1050, SubState::Stopped),
    (1051, SubState::Completed),
    (2501, SubState::Leveling),
    (2701, SubState::Homing),
    (2801, SubState::LoadingFilament),
    (2901, SubState::UnloadingFilament),
    (3001, SubState::Downloading),
];

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

/// Fan speeds arrive on the 0-255 PWM scale.
fn pwm_to_percent(pwm: f64) -> f64 {
    (pwm.clamp(0.0, 255.0) * 100.0 / 255.0).round()
}

pub fn extract_status(printer_id: &str, status: &Value) -> UnifiedStatusData {
    let mut out = UnifiedStatusData::new(printer_id);

    let machine = status.get("machine_status").unwrap_or(&Value::Null);
    out.state = as_i64_lenient(machine.get("status"))
        .map(machine_state)
        .unwrap_or(MachineState::Unknown);
    out.sub_state = sub_state(i64_or(machine.get("sub_status"), 0));
    out.exception_codes = match machine.get("exception_status") {
        Some(Value::Array(codes)) => codes
            .iter()
            .filter_map(|c| as_i64_lenient(Some(c)))
            .filter(|c| *c != 0)
            .collect(),
        other => as_i64_lenient(other).filter(|c| *c != 0).into_iter().collect(),
    };

    let print = status.get("print_status").unwrap_or(&Value::Null);
    let gcode_move = status.get("gcode_move").unwrap_or(&Value::Null);
    let elapsed = u64_or_zero(print.get("print_duration"));
    let total = u64_or_zero(print.get("total_duration"));
    let remaining = match print.get("remaining_time_sec") {
        Some(r) => u64_or_zero(Some(r)),
        None => total.saturating_sub(elapsed),
    };
    out.print_job = PrintJob {
        file_name: string_or_empty(print.get("filename")),
        task_id: string_or_empty(print.get("uuid")),
        progress: f64_or(machine.get("progress"), 0.0).clamp(0.0, 100.0),
        current_time_secs: elapsed,
        total_time_secs: total,
        remaining_time_secs: remaining,
        current_layer: u32_or_zero(print.get("current_layer")),
        total_layer: u32_or_zero(print.get("total_layer")),
        speed_mode: as_i64_lenient(gcode_move.get("speed_mode")).and_then(SpeedMode::from_code),
    };

    for (zone, key) in [
        (component::EXTRUDER, "extruder"),
        (component::HEATED_BED, "heater_bed"),
        (component::CHAMBER, "ztemperature_sensor"),
    ] {
        if let Some(sensor) = status.get(key) {
            out.temperatures.insert(
                zone.to_string(),
                TemperatureStatus {
                    current: f64_or(sensor.get("temperature"), 0.0),
                    target: f64_or(sensor.get("target"), 0.0),
                },
            );
        }
    }

    if let Some(fans) = status.get("fans") {
        for (name, key) in [
            (component::MODEL_FAN, "fan"),
            (component::AUXILIARY_FAN, "aux_fan"),
            (component::BOX_FAN, "box_fan"),
        ] {
            if let Some(fan) = fans.get(key) {
                out.fans.insert(
                    name.to_string(),
                    FanStatus {
                        speed: pwm_to_percent(f64_or(fan.get("speed"), 0.0)),
                        rpm: as_i64_lenient(fan.get("rpm")).map(|r| r.clamp(0, u32::MAX as i64) as u32),
                    },
                );
            }
        }
    }

    if let Some(led) = status.get("led") {
        let on = as_bool_lenient(led.get("status")).unwrap_or(false);
        let brightness = match as_f64_lenient(led.get("brightness")) {
            Some(b) if on => b.clamp(0.0, 100.0) as u8,
            _ if on => 100,
            _ => 0,
        };
        out.lights.insert(
            component::CHAMBER_LIGHT.to_string(),
            LightStatus { brightness, connected: true },
        );
    }

    let axes: Vec<f64> = ["x", "y", "z"]
        .iter()
        .map_while(|axis| as_f64_lenient(gcode_move.get(*axis)))
        .collect();
    if axes.len() == 3 {
        out.axis_position = axes;
    }

    let devices = status.get("external_device").unwrap_or(&Value::Null);
    let usb = as_bool_lenient(devices.get("u_disk")).unwrap_or(false);
    out.storages.insert(component::LOCAL_STORAGE.to_string(), StorageStatus { connected: true });
    out.storages.insert(component::UDISK.to_string(), StorageStatus { connected: usb });
    out.external_devices.usb_connected = usb;
    out.external_devices.camera_connected = as_bool_lenient(devices.get("camera")).unwrap_or(false);
    out.external_devices.canvas_connected = as_bool_lenient(devices.get("canvas")).unwrap_or(false);

    out.canvas = status.get("canvas_info").map(parse_canvas);

    out.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_tables() {
        assert_eq!(machine_state(2), MachineState::Printing);
        assert_eq!(machine_state(14), MachineState::Error);
        assert_eq!(machine_state(99), MachineState::Unknown);
        assert_eq!(sub_state(1047), SubState::Paused);
        assert_eq!(sub_state(0), SubState::None);
        assert_eq!(sub_state(4242), SubState::Unknown);
    }

    #[test]
    fn test_extract_full_status() {
        let status = json!({
            "machine_status": {"status": 2, "sub_status": 1045, "exception_status": [0, 503], "progress": 42},
            "print_status": {"filename": "benchy.gcode", "uuid": "t-1", "current_layer": 10, "total_layer": 100,
                              "print_duration": 600, "total_duration": 3600},
            "extruder": {"temperature": 210.4, "target": 210},
            "heater_bed": {"temperature": "59.8", "target": 60},
            "fans": {"fan": {"speed": 255, "rpm": 7000}, "aux_fan": {"speed": 0}},
            "led": {"status": 1},
            "gcode_move": {"x": 10.0, "y": 20.5, "z": 0.2, "speed_mode": 2},
            "external_device": {"u_disk": true, "camera": 1, "canvas": false}
        });
        let s = extract_status("p1", &status);
        assert_eq!(s.state, MachineState::Printing);
        assert_eq!(s.sub_state, SubState::Printing);
        assert_eq!(s.exception_codes, vec![503]);
        assert_eq!(s.print_job.progress, 42.0);
        assert_eq!(s.print_job.remaining_time_secs, 3000);
        assert_eq!(s.print_job.speed_mode, Some(SpeedMode::Sport));
        assert_eq!(s.temperatures[component::HEATED_BED].current, 59.8);
        assert_eq!(s.fans[component::MODEL_FAN].speed, 100.0);
        assert_eq!(s.fans[component::MODEL_FAN].rpm, Some(7000));
        assert_eq!(s.fans[component::AUXILIARY_FAN].speed, 0.0);
        assert_eq!(s.lights[component::CHAMBER_LIGHT].brightness, 100);
        assert_eq!(s.axis_position, vec![10.0, 20.5, 0.2]);
        assert!(s.storages[component::UDISK].connected);
        assert!(s.external_devices.camera_connected);
        assert!(s.canvas.is_none());
    }

    #[test]
    fn test_sparse_status_does_not_invent_components() {
        let s = extract_status("p1", &json!({"machine_status": {"status": 1}}));
        assert_eq!(s.state, MachineState::Idle);
        assert!(s.temperatures.is_empty());
        assert!(s.fans.is_empty());
        assert!(s.axis_position.is_empty());
    }
}
