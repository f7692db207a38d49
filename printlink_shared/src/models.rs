//! Unified status and attribute models every adapter translates into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical component names used as map keys and in request parameters.
pub mod component {
    pub const EXTRUDER: &str = "extruder";
    pub const HEATED_BED: &str = "heatedBed";
    pub const CHAMBER: &str = "chamber";

    pub const MODEL_FAN: &str = "model";
    pub const AUXILIARY_FAN: &str = "auxiliary";
    pub const BOX_FAN: &str = "box";

    pub const CHAMBER_LIGHT: &str = "chamberLight";

    pub const LOCAL_STORAGE: &str = "local";
    pub const UDISK: &str = "udisk";
    pub const SD_CARD: &str = "sdcard";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    #[default]
    Unknown,
    Offline,
    Initializing,
    Idle,
    Printing,
    Homing,
    AutoLeveling,
    Calibrating,
    FilamentOperating,
    FileTransferring,
    SelfChecking,
    Updating,
    Busy,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubState {
    #[default]
    None,
    Unknown,
    Preparing,
    Preheating,
    Homing,
    Leveling,
    Printing,
    Pausing,
    Paused,
    Resuming,
    Stopping,
    Stopped,
    Completed,
    LoadingFilament,
    UnloadingFilament,
    Downloading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedMode {
    Silent,
    Balanced,
    Sport,
    Ludicrous,
}

impl SpeedMode {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SpeedMode::Silent),
            1 => Some(SpeedMode::Balanced),
            2 => Some(SpeedMode::Sport),
            3 => Some(SpeedMode::Ludicrous),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            SpeedMode::Silent => 0,
            SpeedMode::Balanced => 1,
            SpeedMode::Sport => 2,
            SpeedMode::Ludicrous => 3,
        }
    }

    /// Feed-rate percentage commonly used for each mode.
    pub fn percent(self) -> u32 {
        match self {
            SpeedMode::Silent => 50,
            SpeedMode::Balanced => 100,
            SpeedMode::Sport => 130,
            SpeedMode::Ludicrous => 160,
        }
    }

    /// Closest mode for a feed-rate percentage.
    pub fn from_percent(percent: f64) -> Self {
        [SpeedMode::Silent, SpeedMode::Balanced, SpeedMode::Sport, SpeedMode::Ludicrous]
            .into_iter()
            .min_by(|a, b| {
                let da = (a.percent() as f64 - percent).abs();
                let db = (b.percent() as f64 - percent).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(SpeedMode::Balanced)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrintJob {
    pub file_name: String,
    pub task_id: String,
    /// 0.0 - 100.0
    pub progress: f64,
    pub current_time_secs: u64,
    pub total_time_secs: u64,
    pub remaining_time_secs: u64,
    pub current_layer: u32,
    pub total_layer: u32,
    pub speed_mode: Option<SpeedMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureStatus {
    pub current: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FanStatus {
    /// Percent, 0.0 - 100.0
    pub speed: f64,
    pub rpm: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightStatus {
    pub brightness: u8,
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageStatus {
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tray {
    pub tray_id: i64,
    pub loaded: bool,
    pub brand: String,
    pub filament_type: String,
    pub filament_name: String,
    /// "#RRGGBB"
    pub color: String,
    pub min_nozzle_temp: f64,
    pub max_nozzle_temp: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Canvas {
    pub canvas_id: i64,
    pub connected: bool,
    pub trays: Vec<Tray>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasStatus {
    pub active_canvas_id: Option<i64>,
    pub active_tray_id: Option<i64>,
    pub auto_refill: bool,
    pub canvases: Vec<Canvas>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalDevices {
    pub usb_connected: bool,
    pub sd_connected: bool,
    pub camera_connected: bool,
    pub canvas_connected: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnifiedStatusData {
    pub printer_id: String,
    pub state: MachineState,
    pub sub_state: SubState,
    pub exception_codes: Vec<i64>,
    pub print_job: PrintJob,
    pub temperatures: BTreeMap<String, TemperatureStatus>,
    pub fans: BTreeMap<String, FanStatus>,
    pub lights: BTreeMap<String, LightStatus>,
    pub storages: BTreeMap<String, StorageStatus>,
    /// Ordered X, Y, Z
    pub axis_position: Vec<f64>,
    pub canvas: Option<CanvasStatus>,
    pub external_devices: ExternalDevices,
}

impl UnifiedStatusData {
    pub fn new(printer_id: impl Into<String>) -> Self {
        Self {
            printer_id: printer_id.into(),
            ..Self::default()
        }
    }

    /// Printers keep reporting the last job while idle; only surface it while printing.
    pub fn normalize(&mut self) {
        if self.state != MachineState::Printing {
            self.print_job = PrintJob::default();
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub fans: Vec<String>,
    pub temperature_zones: Vec<TemperatureRange>,
    pub lights: Vec<String>,
    pub storage_media: Vec<String>,
    pub multi_filament: bool,
    pub auto_bed_leveling: bool,
    pub time_lapse: bool,
    pub auto_refill: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnifiedAttributesData {
    pub printer_id: String,
    pub name: String,
    pub model: String,
    pub brand: String,
    pub manufacturer: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub mainboard_id: String,
    pub capabilities: Capabilities,
}
