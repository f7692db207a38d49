// CC2 attributes (method 1001 reply and 6008 pushes)

use crate::adapters::fields::{path, string_or_empty};
use printlink_shared::models::{Capabilities, TemperatureRange, component};
use printlink_shared::{FirmwareVersion, UnifiedAttributesData};
use serde_json::Value;

/// Canvas and auto refill shipped with firmware 1.2.
pub const MULTI_FILAMENT_FIRMWARE: (u32, u32) = (1, 2);

pub fn supports_multi_filament(firmware: Option<&FirmwareVersion>) -> bool {
    let (major, minor) = MULTI_FILAMENT_FIRMWARE;
    firmware.is_some_and(|fw| fw.at_least(major, minor))
}

pub fn extract_attributes(printer_id: &str, attributes: &Value) -> (UnifiedAttributesData, Option<FirmwareVersion>) {
    let raw_firmware = match path(attributes, &["software_version", "ota_version"]) {
        Some(v) => string_or_empty(Some(v)),
        None => string_or_empty(attributes.get("firmware_version")),
    };
    let firmware = FirmwareVersion::parse(&raw_firmware);
    let multi_filament = supports_multi_filament(firmware.as_ref());

    let data = UnifiedAttributesData {
        printer_id: printer_id.to_string(),
        name: string_or_empty(attributes.get("hostname")),
        model: string_or_empty(attributes.get("machine_model")),
        brand: string_or_empty(attributes.get("brand")),
        manufacturer: string_or_empty(attributes.get("manufacturer")),
        firmware_version: raw_firmware,
        serial_number: string_or_empty(attributes.get("sn")),
        mainboard_id: string_or_empty(attributes.get("mainboard_id")),
        capabilities: Capabilities {
            fans: vec![
                component::MODEL_FAN.to_string(),
                component::AUXILIARY_FAN.to_string(),
                component::BOX_FAN.to_string(),
            ],
            temperature_zones: vec![
                TemperatureRange { name: component::EXTRUDER.to_string(), min: 0.0, max: 300.0 },
                TemperatureRange { name: component::HEATED_BED.to_string(), min: 0.0, max: 110.0 },
            ],
            lights: vec![component::CHAMBER_LIGHT.to_string()],
            storage_media: vec![component::LOCAL_STORAGE.to_string(), component::UDISK.to_string()],
            multi_filament,
            auto_bed_leveling: true,
            time_lapse: true,
            auto_refill: multi_filament,
        },
    };
    (data, firmware)
}
