//! Typed request parameters accepted by every adapter.
//!
//! Callers pass JSON; each adapter decodes the shape it needs through
//! [`decode`] and then reshapes it into vendor field names.

use crate::adapter::BuildError;
use printlink_shared::models::component;
use printlink_shared::OperationKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn decode<T: DeserializeOwned>(kind: OperationKind, params: &Value) -> Result<T, BuildError> {
    let params = if params.is_null() { Value::Object(Default::default()) } else { params.clone() };
    serde_json::from_value(params)
        .map_err(|e| BuildError::InvalidParameter(format!("{}: {}", kind, e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMedia {
    #[default]
    Local,
    Udisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BedType {
    #[default]
    Textured,
    Smooth,
}

/// Filament slot `t` in the sliced file, printed from the given canvas tray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMapping {
    pub t: u32,
    #[serde(default)]
    pub canvas_id: i64,
    pub tray_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPrintParams {
    pub filename: String,
    #[serde(default)]
    pub storage: StorageMedia,
    #[serde(default)]
    pub auto_bed_leveling: bool,
    #[serde(default)]
    pub bed_type: BedType,
    #[serde(default)]
    pub time_lapse: bool,
    #[serde(default)]
    pub slot_map: Vec<SlotMapping>,
}

impl StartPrintParams {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.filename.trim().is_empty() {
            return Err(BuildError::InvalidParameter("filename must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeAxisParams {
    /// Any combination of "XYZ"; all axes when absent.
    #[serde(default)]
    pub axes: Option<String>,
}

impl HomeAxisParams {
    pub fn axes(&self) -> Result<String, BuildError> {
        let axes = self.axes.as_deref().unwrap_or("XYZ").to_ascii_uppercase();
        if axes.is_empty() || !axes.chars().all(|c| matches!(c, 'X' | 'Y' | 'Z')) {
            return Err(BuildError::InvalidParameter(format!("invalid home axes '{}'", axes)));
        }
        Ok(axes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAxisParams {
    pub axis: String,
    /// Millimetres, relative.
    pub distance: f64,
    /// mm/min
    #[serde(default)]
    pub feedrate: Option<f64>,
}

impl MoveAxisParams {
    pub fn axis(&self) -> Result<char, BuildError> {
        let mut chars = self.axis.trim().chars();
        match (chars.next().map(|c| c.to_ascii_uppercase()), chars.next()) {
            (Some(c @ ('X' | 'Y' | 'Z' | 'E')), None) if self.distance.is_finite() => Ok(c),
            _ => Err(BuildError::InvalidParameter(format!(
                "invalid move '{}' by {}",
                self.axis, self.distance
            ))),
        }
    }
}

/// Target temperatures keyed by logical zone name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureParams(pub BTreeMap<String, f64>);

impl TemperatureParams {
    pub fn validate(&self, zones: &[&str]) -> Result<(), BuildError> {
        if self.0.is_empty() {
            return Err(BuildError::InvalidParameter("no temperature targets given".to_string()));
        }
        for (zone, target) in &self.0 {
            if !zones.contains(&zone.as_str()) {
                return Err(BuildError::InvalidParameter(format!("unknown temperature zone '{}'", zone)));
            }
            if !target.is_finite() || *target < 0.0 {
                return Err(BuildError::InvalidParameter(format!("invalid target {} for '{}'", target, zone)));
            }
        }
        Ok(())
    }

    pub fn get(&self, zone: &str) -> Option<f64> {
        self.0.get(zone).copied()
    }
}

/// Fan speeds in percent keyed by logical fan name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FanParams(pub BTreeMap<String, f64>);

impl FanParams {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.0.is_empty() {
            return Err(BuildError::InvalidParameter("no fan speeds given".to_string()));
        }
        for (fan, speed) in &self.0 {
            if ![component::MODEL_FAN, component::AUXILIARY_FAN, component::BOX_FAN].contains(&fan.as_str()) {
                return Err(BuildError::InvalidParameter(format!("unknown fan '{}'", fan)));
            }
            if !(0.0..=100.0).contains(speed) {
                return Err(BuildError::InvalidParameter(format!("fan speed {} out of range for '{}'", speed, fan)));
            }
        }
        Ok(())
    }

    pub fn get(&self, fan: &str) -> Option<f64> {
        self.0.get(fan).copied()
    }
}

/// Percent 0-100 to the 0-255 PWM scale most firmwares use.
pub fn percent_to_pwm(percent: f64) -> u8 {
    (percent.clamp(0.0, 100.0) * 255.0 / 100.0).round() as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedParams {
    pub mode: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightParams {
    #[serde(default = "default_light")]
    pub name: String,
    pub on: bool,
    #[serde(default)]
    pub brightness: Option<u8>,
}

fn default_light() -> String {
    component::CHAMBER_LIGHT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelDownloadParams {
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoRefillParams {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayParams {
    #[serde(default)]
    pub canvas_id: i64,
    pub tray_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayFilamentParams {
    #[serde(default)]
    pub canvas_id: i64,
    pub tray_id: i64,
    pub brand: String,
    pub filament_type: String,
    #[serde(default)]
    pub filament_name: String,
    pub color: String,
    #[serde(default)]
    pub min_nozzle_temp: Option<f64>,
    #[serde(default)]
    pub max_nozzle_temp: Option<f64>,
}

impl TrayFilamentParams {
    pub fn validate(&self) -> Result<(), BuildError> {
        let hex = self.color.trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BuildError::InvalidParameter(format!("invalid color '{}'", self.color)));
        }
        if let (Some(min), Some(max)) = (self.min_nozzle_temp, self.max_nozzle_temp) {
            if min > max {
                return Err(BuildError::InvalidParameter(format!("nozzle range {}..{} is inverted", min, max)));
            }
        }
        Ok(())
    }
}
