//! Abstract operations understood by every adapter, independent of any wire format.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    GetStatus,
    GetAttributes,
    StartPrint,
    PausePrint,
    ResumePrint,
    StopPrint,
    HomeAxis,
    MoveAxis,
    SetTemperature,
    SetFanSpeed,
    SetPrintSpeed,
    SetLight,
    GetCanvasInfo,
    SetAutoRefill,
    LoadFilament,
    UnloadFilament,
    SetTrayFilament,
    StartFileDownload,
    CancelFileDownload,
    UpdatePrinterName,
    /// Unsolicited status push. Never built as a request.
    StatusPushed,
    /// Unsolicited attributes push. Never built as a request.
    AttributesPushed,
}

impl OperationKind {
    pub const ALL: [OperationKind; 22] = [
        OperationKind::GetStatus,
        OperationKind::GetAttributes,
        OperationKind::StartPrint,
        OperationKind::PausePrint,
        OperationKind::ResumePrint,
        OperationKind::StopPrint,
        OperationKind::HomeAxis,
        OperationKind::MoveAxis,
        OperationKind::SetTemperature,
        OperationKind::SetFanSpeed,
        OperationKind::SetPrintSpeed,
        OperationKind::SetLight,
        OperationKind::GetCanvasInfo,
        OperationKind::SetAutoRefill,
        OperationKind::LoadFilament,
        OperationKind::UnloadFilament,
        OperationKind::SetTrayFilament,
        OperationKind::StartFileDownload,
        OperationKind::CancelFileDownload,
        OperationKind::UpdatePrinterName,
        OperationKind::StatusPushed,
        OperationKind::AttributesPushed,
    ];

    /// Kinds that only ever arrive from the printer.
    pub fn is_event_only(self) -> bool {
        matches!(self, OperationKind::StatusPushed | OperationKind::AttributesPushed)
    }

    /// Status and attribute queries may be answered by a push that is also an event.
    pub fn is_snapshot_query(self) -> bool {
        matches!(self, OperationKind::GetStatus | OperationKind::GetAttributes)
    }

    /// Whether a successful response carries a payload worth surfacing.
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            OperationKind::GetStatus | OperationKind::GetAttributes | OperationKind::GetCanvasInfo
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::GetStatus => "get_status",
            OperationKind::GetAttributes => "get_attributes",
            OperationKind::StartPrint => "start_print",
            OperationKind::PausePrint => "pause_print",
            OperationKind::ResumePrint => "resume_print",
            OperationKind::StopPrint => "stop_print",
            OperationKind::HomeAxis => "home_axis",
            OperationKind::MoveAxis => "move_axis",
            OperationKind::SetTemperature => "set_temperature",
            OperationKind::SetFanSpeed => "set_fan_speed",
            OperationKind::SetPrintSpeed => "set_print_speed",
            OperationKind::SetLight => "set_light",
            OperationKind::GetCanvasInfo => "get_canvas_info",
            OperationKind::SetAutoRefill => "set_auto_refill",
            OperationKind::LoadFilament => "load_filament",
            OperationKind::UnloadFilament => "unload_filament",
            OperationKind::SetTrayFilament => "set_tray_filament",
            OperationKind::StartFileDownload => "start_file_download",
            OperationKind::CancelFileDownload => "cancel_file_download",
            OperationKind::UpdatePrinterName => "update_printer_name",
            OperationKind::StatusPushed => "status_pushed",
            OperationKind::AttributesPushed => "attributes_pushed",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
