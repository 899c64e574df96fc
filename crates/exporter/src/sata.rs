use crate::naming::{attribute_metric_name, canonical_name, Facet, NAMESPACE};
use crate::registry::{ExportRegistry, MetricIdentity, MetricKind};
use crate::ExportError;
use log::debug;
use smartmon_core::{AttributeTable, DeviceDescriptor};

const DEVICE_INFO_HELP: &str =
    "Information metric for the device with various attributes as labels";

pub fn device_info_name() -> String {
    format!("{}_device_info", NAMESPACE)
}

/// `smartmon_device_info` set to 1, carrying the descriptor as labels.
pub fn register_device_info(
    registry: &mut ExportRegistry,
    device: &DeviceDescriptor,
) -> Result<(), ExportError> {
    let identity = MetricIdentity::new(device_info_name())
        .label("disk", device.name.as_str())
        .label("size_bytes", device.size_bytes.to_string())
        .label("storage_controller", device.controller.to_string())
        .label("vendor", device.vendor.as_str())
        .label("model", device.model.as_str())
        .label("serial_number", device.serial_number.as_str());
    registry.register(identity, MetricKind::Gauge, DEVICE_INFO_HELP, 1.0)
}

/// Registers value, worst and threshold for every named attribute. The
/// threshold is taken from the same position in the threshold list; a
/// missing one fails the whole table.
/// Returns the number of metrics registered.
pub fn map_attribute_table(
    registry: &mut ExportRegistry,
    disk: &str,
    table: &AttributeTable,
) -> Result<usize, ExportError> {
    let mut registered = 0;
    for (position, attribute) in table.attributes.iter().enumerate() {
        let Some(canonical) = canonical_name(&attribute.name) else {
            debug!("{}: attribute {} has no name, not exported", disk, attribute.id);
            continue;
        };
        let id = attribute.id.to_string();
        for facet in Facet::ALL {
            let value = match facet {
                Facet::Value => attribute.current,
                Facet::Worst => attribute.worst,
                Facet::Threshold => {
                    table
                        .threshold_at(position)
                        .ok_or_else(|| ExportError::MissingThreshold {
                            disk: disk.to_string(),
                            id: attribute.id,
                            position,
                        })?
                }
            };
            let Some(name) = attribute_metric_name(&attribute.name, facet) else {
                continue;
            };
            let help = format!("SMART attribute {} {}", canonical, facet.describe());
            let identity = MetricIdentity::new(name)
                .label("disk", disk)
                .label("id", id.as_str());
            registry.register(identity, MetricKind::Counter, &help, f64::from(value))?;
            registered += 1;
        }
    }
    Ok(registered)
}
