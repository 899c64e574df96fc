//! NVMe SMART / Health Information log page (log identifier 02h).

use crate::{FieldValue, TypedField, TypedRecord, Uint128};

pub const NVME_SMART_LOG_LEN: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvmeSmartLog {
    pub crit_warning: u8,
    pub temperature: u16, // kelvin
    pub avail_spare: u8,
    pub spare_thresh: u8,
    pub percent_used: u8,
    pub endurance_crit_warning: u8,
    pub data_units_read: Uint128,
    pub data_units_written: Uint128,
    pub host_reads: Uint128,
    pub host_writes: Uint128,
    pub ctrl_busy_time: Uint128,
    pub power_cycles: Uint128,
    pub power_on_hours: Uint128,
    pub unsafe_shutdowns: Uint128,
    pub media_errors: Uint128,
    pub num_err_log_entries: Uint128,
    pub warning_temp_time: u32,
    pub crit_comp_time: u32,
    pub temp_sensor: [u16; 8],
    pub thm_temp1_trans_count: u32,
    pub thm_temp2_trans_count: u32,
    pub thm_temp1_total_time: u32,
    pub thm_temp2_total_time: u32,
}

/// One entry of the log's static schema: the field's CamelCase identifier and
/// how its value is pulled out of a decoded log.
pub struct NvmeField {
    pub name: &'static str,
    pub extract: fn(&NvmeSmartLog) -> FieldValue,
}

/// Fields in page order.
pub const NVME_SMART_LOG_FIELDS: &[NvmeField] = &[
    NvmeField { name: "CritWarning", extract: |log| FieldValue::U8(log.crit_warning) },
    NvmeField { name: "Temperature", extract: |log| FieldValue::U16(log.temperature) },
    NvmeField { name: "AvailSpare", extract: |log| FieldValue::U8(log.avail_spare) },
    NvmeField { name: "SpareThresh", extract: |log| FieldValue::U8(log.spare_thresh) },
    NvmeField { name: "PercentUsed", extract: |log| FieldValue::U8(log.percent_used) },
    NvmeField { name: "EnduranceCritWarning", extract: |log| FieldValue::U8(log.endurance_crit_warning) },
    NvmeField { name: "Rsvd6", extract: |_| FieldValue::Reserved },
    NvmeField { name: "DataUnitsRead", extract: |log| FieldValue::Wide(log.data_units_read) },
    NvmeField { name: "DataUnitsWritten", extract: |log| FieldValue::Wide(log.data_units_written) },
    NvmeField { name: "HostReads", extract: |log| FieldValue::Wide(log.host_reads) },
    NvmeField { name: "HostWrites", extract: |log| FieldValue::Wide(log.host_writes) },
    NvmeField { name: "CtrlBusyTime", extract: |log| FieldValue::Wide(log.ctrl_busy_time) },
    NvmeField { name: "PowerCycles", extract: |log| FieldValue::Wide(log.power_cycles) },
    NvmeField { name: "PowerOnHours", extract: |log| FieldValue::Wide(log.power_on_hours) },
    NvmeField { name: "UnsafeShutdowns", extract: |log| FieldValue::Wide(log.unsafe_shutdowns) },
    NvmeField { name: "MediaErrors", extract: |log| FieldValue::Wide(log.media_errors) },
    NvmeField { name: "NumErrLogEntries", extract: |log| FieldValue::Wide(log.num_err_log_entries) },
    NvmeField { name: "WarningTempTime", extract: |log| FieldValue::U32(log.warning_temp_time) },
    NvmeField { name: "CritCompTime", extract: |log| FieldValue::U32(log.crit_comp_time) },
    NvmeField { name: "TempSensor", extract: |log| FieldValue::U16Array(log.temp_sensor.to_vec()) },
    NvmeField { name: "ThmTemp1TransCount", extract: |log| FieldValue::U32(log.thm_temp1_trans_count) },
    NvmeField { name: "ThmTemp2TransCount", extract: |log| FieldValue::U32(log.thm_temp2_trans_count) },
    NvmeField { name: "ThmTemp1TotalTime", extract: |log| FieldValue::U32(log.thm_temp1_total_time) },
    NvmeField { name: "ThmTemp2TotalTime", extract: |log| FieldValue::U32(log.thm_temp2_total_time) },
    NvmeField { name: "Rsvd232", extract: |_| FieldValue::Reserved },
];

impl NvmeSmartLog {
    /// Decodes the little-endian log page. Returns `None` when the buffer is
    /// shorter than a full page.
    pub fn parse(page: &[u8]) -> Option<Self> {
        if page.len() < NVME_SMART_LOG_LEN {
            return None;
        }
        let mut temp_sensor = [0u16; 8];
        for (index, sensor) in temp_sensor.iter_mut().enumerate() {
            *sensor = read_u16(page, 200 + index * 2);
        }
        Some(Self {
            crit_warning: page[0],
            temperature: read_u16(page, 1),
            avail_spare: page[3],
            spare_thresh: page[4],
            percent_used: page[5],
            endurance_crit_warning: page[6],
            data_units_read: read_u128(page, 32),
            data_units_written: read_u128(page, 48),
            host_reads: read_u128(page, 64),
            host_writes: read_u128(page, 80),
            ctrl_busy_time: read_u128(page, 96),
            power_cycles: read_u128(page, 112),
            power_on_hours: read_u128(page, 128),
            unsafe_shutdowns: read_u128(page, 144),
            media_errors: read_u128(page, 160),
            num_err_log_entries: read_u128(page, 176),
            warning_temp_time: read_u32(page, 192),
            crit_comp_time: read_u32(page, 196),
            temp_sensor,
            thm_temp1_trans_count: read_u32(page, 216),
            thm_temp2_trans_count: read_u32(page, 220),
            thm_temp1_total_time: read_u32(page, 224),
            thm_temp2_total_time: read_u32(page, 228),
        })
    }

    pub fn record(&self) -> TypedRecord {
        NVME_SMART_LOG_FIELDS
            .iter()
            .map(|field| TypedField::new(field.name, (field.extract)(self)))
            .collect()
    }
}

fn read_u16(page: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([page[offset], page[offset + 1]])
}

fn read_u32(page: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&page[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u128(page: &[u8], offset: usize) -> Uint128 {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&page[offset..offset + 16]);
    Uint128::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Vec<u8> {
        let mut page = vec![0u8; NVME_SMART_LOG_LEN];
        page[0] = 0x04;
        page[1..3].copy_from_slice(&310u16.to_le_bytes());
        page[3] = 100;
        page[4] = 10;
        page[5] = 3;
        page[128..136].copy_from_slice(&500u64.to_le_bytes());
        page[136] = 0x01;
        page[192..196].copy_from_slice(&7u32.to_le_bytes());
        page[202..204].copy_from_slice(&305u16.to_le_bytes());
        page[228..232].copy_from_slice(&9u32.to_le_bytes());
        page
    }

    #[test]
    fn decodes_page_offsets() {
        let log = NvmeSmartLog::parse(&sample_page()).unwrap();
        assert_eq!(log.crit_warning, 4);
        assert_eq!(log.temperature, 310);
        assert_eq!(log.avail_spare, 100);
        assert_eq!(log.spare_thresh, 10);
        assert_eq!(log.percent_used, 3);
        assert_eq!(log.power_on_hours, Uint128 { lo: 500, hi: 1 });
        assert_eq!(log.warning_temp_time, 7);
        assert_eq!(log.temp_sensor[1], 305);
        assert_eq!(log.thm_temp2_total_time, 9);
    }

    #[test]
    fn rejects_short_page() {
        assert!(NvmeSmartLog::parse(&[0u8; 100]).is_none());
    }

    #[test]
    fn record_follows_schema_order() {
        let log = NvmeSmartLog::parse(&sample_page()).unwrap();
        let record = log.record();
        assert_eq!(record.len(), NVME_SMART_LOG_FIELDS.len());
        assert_eq!(record[0], TypedField::new("CritWarning", FieldValue::U8(4)));
        assert_eq!(record[1], TypedField::new("Temperature", FieldValue::U16(310)));
        let hours = record.iter().find(|field| field.name == "PowerOnHours").unwrap();
        assert_eq!(hours.value, FieldValue::Wide(Uint128 { lo: 500, hi: 1 }));
        assert_eq!(record.last().unwrap().value, FieldValue::Reserved);
    }

    #[test]
    fn schema_names_are_unique() {
        let mut names: Vec<_> = NVME_SMART_LOG_FIELDS.iter().map(|field| field.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NVME_SMART_LOG_FIELDS.len());
    }
}
