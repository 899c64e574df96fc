use crate::naming::{field_metric_name, snake_case_field};
use crate::registry::{ExportRegistry, MetricIdentity, MetricKind};
use crate::ExportError;
use log::{debug, warn};
use smartmon_core::{FieldValue, TypedField};

/// How a field of a given shape is exported, if at all.
fn extract(field: &TypedField, disk: &str) -> Option<(MetricKind, f64)> {
    match &field.value {
        FieldValue::U8(value) => Some((MetricKind::Counter, f64::from(*value))),
        FieldValue::U16(value) => Some((MetricKind::Counter, f64::from(*value))),
        FieldValue::Wide(value) => {
            if value.hi != 0 {
                warn!(
                    "{}: {} exceeds 64 bits, exporting the low word only",
                    disk, field.name
                );
            }
            Some((MetricKind::Gauge, value.lo as f64))
        }
        FieldValue::U32(_) | FieldValue::U16Array(_) | FieldValue::Reserved => None,
    }
}

/// Registers one metric per exportable field of an NVMe SMART record, in
/// declaration order. Returns the number of metrics registered.
pub fn map_typed_record(
    registry: &mut ExportRegistry,
    disk: &str,
    record: &[TypedField],
) -> Result<usize, ExportError> {
    let mut registered = 0;
    for field in record {
        let Some((kind, value)) = extract(field, disk) else {
            debug!("{}: field {} has no exportable shape", disk, field.name);
            continue;
        };
        let Some(name) = field_metric_name(field.name) else {
            continue;
        };
        let help = format!(
            "NVMe SMART log field {}",
            snake_case_field(field.name).unwrap_or_default().trim_start_matches('_')
        );
        let identity = MetricIdentity::new(name).label("disk", disk);
        registry.register(identity, kind, &help, value)?;
        registered += 1;
    }
    Ok(registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartmon_core::{NvmeSmartLog, Uint128, NVME_SMART_LOG_LEN};

    #[test]
    fn small_integers_become_counters() {
        let record = vec![
            TypedField::new("PowerOnHours", FieldValue::U16(500)),
            TypedField::new("CritWarning", FieldValue::U8(0)),
        ];
        let mut registry = ExportRegistry::new();
        assert_eq!(map_typed_record(&mut registry, "nvme0n1", &record).unwrap(), 2);
        let text = registry.render().unwrap();
        assert!(text.contains("# TYPE smartmon_power_on_hours counter"));
        assert!(text.contains("smartmon_power_on_hours{disk=\"nvme0n1\"} 500"));
        assert!(text.contains("smartmon_crit_warning{disk=\"nvme0n1\"} 0"));
    }

    #[test]
    fn wide_counters_keep_the_low_word() {
        let record = vec![TypedField::new(
            "DataUnitsRead",
            FieldValue::Wide(Uint128 { lo: 123_456, hi: 9 }),
        )];
        let mut registry = ExportRegistry::new();
        map_typed_record(&mut registry, "nvme0n1", &record).unwrap();
        let text = registry.render().unwrap();
        assert!(text.contains("# TYPE smartmon_data_units_read gauge"));
        assert!(text.contains("smartmon_data_units_read{disk=\"nvme0n1\"} 123456"));
    }

    #[test]
    fn other_shapes_are_skipped() {
        let record = vec![
            TypedField::new("WarningTempTime", FieldValue::U32(12)),
            TypedField::new("TempSensor", FieldValue::U16Array(vec![300, 301])),
            TypedField::new("Rsvd232", FieldValue::Reserved),
        ];
        let mut registry = ExportRegistry::new();
        assert_eq!(map_typed_record(&mut registry, "nvme0n1", &record).unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn full_log_exports_sixteen_fields() {
        let record = NvmeSmartLog::parse(&[0u8; NVME_SMART_LOG_LEN]).unwrap().record();
        let mut registry = ExportRegistry::new();
        let registered = map_typed_record(&mut registry, "nvme0n1", &record).unwrap();
        // 5 x u8, 1 x u16, 10 x 128-bit
        assert_eq!(registered, 16);
        assert!(registered <= record.len());
        assert!(registry.contains(
            &MetricIdentity::new("smartmon_num_err_log_entries").label("disk", "nvme0n1")
        ));
        assert!(registry.contains(
            &MetricIdentity::new("smartmon_endurance_crit_warning").label("disk", "nvme0n1")
        ));
    }

    #[test]
    fn repeated_field_is_a_collision() {
        let record = vec![
            TypedField::new("PowerCycles", FieldValue::U8(1)),
            TypedField::new("PowerCycles", FieldValue::U8(2)),
        ];
        let mut registry = ExportRegistry::new();
        let err = map_typed_record(&mut registry, "nvme0n1", &record).unwrap_err();
        assert!(matches!(err, ExportError::DuplicateMetric(_)));
    }
}
