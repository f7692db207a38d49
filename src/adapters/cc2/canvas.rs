//! Multi-filament unit ("canvas") payloads.

use crate::adapter::BuildError;
use crate::adapters::fields::{as_bool_lenient, as_i64_lenient, f64_or, i64_or, string_or_empty};
use crate::params::{self, AutoRefillParams, TrayFilamentParams, TrayParams};
use printlink_shared::models::{Canvas, CanvasStatus, Tray};
use printlink_shared::OperationKind;
use serde_json::{Value, json};

fn parse_tray(tray: &Value) -> Tray {
    let color = string_or_empty(tray.get("filament_color"));
    Tray {
        tray_id: i64_or(tray.get("tray_id"), 0),
        loaded: as_bool_lenient(tray.get("status")).unwrap_or(false),
        brand: string_or_empty(tray.get("brand")),
        filament_type: string_or_empty(tray.get("filament_type")),
        filament_name: string_or_empty(tray.get("filament_name")),
        color: if color.is_empty() || color.starts_with('#') { color } else { format!("#{}", color) },
        min_nozzle_temp: f64_or(tray.get("min_nozzle_temp"), 0.0),
        max_nozzle_temp: f64_or(tray.get("max_nozzle_temp"), 0.0),
    }
}

/// `canvas_info` object from a 2005 reply or a status push.
pub fn parse_canvas(info: &Value) -> CanvasStatus {
    let canvases = info
        .get("canvas_list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|canvas| Canvas {
                    canvas_id: i64_or(canvas.get("canvas_id"), 0),
                    connected: as_bool_lenient(canvas.get("connected")).unwrap_or(false),
                    trays: canvas
                        .get("tray_list")
                        .and_then(Value::as_array)
                        .map(|trays| trays.iter().map(parse_tray).collect())
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    CanvasStatus {
        active_canvas_id: as_i64_lenient(info.get("active_canvas_id")),
        active_tray_id: as_i64_lenient(info.get("active_tray_id")),
        auto_refill: as_bool_lenient(info.get("auto_refill")).unwrap_or(false),
        canvases,
    }
}

pub(super) fn request_params(kind: OperationKind, params: &Value) -> Result<Value, BuildError> {
    match kind {
        OperationKind::GetCanvasInfo => Ok(json!({})),
        OperationKind::SetAutoRefill => {
            let p: AutoRefillParams = params::decode(kind, params)?;
            Ok(json!({ "auto_refill": p.enabled }))
        }
        OperationKind::LoadFilament | OperationKind::UnloadFilament => {
            let p: TrayParams = params::decode(kind, params)?;
            Ok(json!({ "canvas_id": p.canvas_id, "tray_id": p.tray_id }))
        }
        OperationKind::SetTrayFilament => {
            let p: TrayFilamentParams = params::decode(kind, params)?;
            p.validate()?;
            let mut body = json!({
                "canvas_id": p.canvas_id,
                "tray_id": p.tray_id,
                "brand": p.brand,
                "filament_type": p.filament_type,
                "filament_name": p.filament_name,
                "filament_color": format!("#{}", p.color.trim_start_matches('#').to_ascii_uppercase()),
            });
            if let Some(min) = p.min_nozzle_temp {
                body["min_nozzle_temp"] = json!(min);
            }
            if let Some(max) = p.max_nozzle_temp {
                body["max_nozzle_temp"] = json!(max);
            }
            Ok(body)
        }
        other => Err(BuildError::NotImplemented(other)),
    }
}
