//! ATA SMART over the SCSI generic ATA PASS-THROUGH(16) command.

use crate::handle::DeviceHandle;
use log::debug;
use smartmon_core::{AttributeTable, ReadError, SmartAttribute};
use std::ptr;

const SG_IO: u64 = 0x2285;
const SG_INTERFACE_ID: i32 = b'S' as i32;
const SG_DXFER_FROM_DEV: i32 = -3;
const SG_TIMEOUT_MS: u32 = 10_000;

const ATA_PASS_THROUGH_16: u8 = 0x85;
const ATA_PROTOCOL_PIO_IN: u8 = 4;
const ATA_SMART_CMD: u8 = 0xB0;
const SMART_READ_DATA: u8 = 0xD0;
const SMART_READ_THRESHOLDS: u8 = 0xD1;
const SMART_LBA_MID: u8 = 0x4F;
const SMART_LBA_HIGH: u8 = 0xC2;

// CHECK CONDITION with descriptor-format sense
const SAM_STAT_CHECK_CONDITION: u8 = 0x02;
const SENSE_DESCRIPTOR_FORMAT: u8 = 0x72;
const SENSE_KEY_NO_SENSE: u8 = 0x00;
const SENSE_KEY_RECOVERED_ERROR: u8 = 0x01;
const SENSE_ATA_RETURN_DESCRIPTOR: u8 = 0x09;
const ATA_STATUS_ERR: u8 = 0x01;
const DRIVER_SENSE: u16 = 0x08;

const SMART_PAGE_LEN: usize = 512;
const SMART_SLOTS: usize = 30;
const SMART_SLOT_LEN: usize = 12;
const SMART_SLOTS_OFFSET: usize = 2;

#[repr(C)]
struct SgIoHdr {
    interface_id: i32,
    dxfer_direction: i32,
    cmd_len: u8,
    mx_sb_len: u8,
    iovec_count: u16,
    dxfer_len: u32,
    dxferp: *mut libc::c_void,
    cmdp: *const u8,
    sbp: *mut u8,
    timeout: u32,
    flags: u32,
    pack_id: i32,
    usr_ptr: *mut libc::c_void,
    status: u8,
    masked_status: u8,
    msg_status: u8,
    sb_len_wr: u8,
    host_status: u16,
    driver_status: u16,
    resid: i32,
    duration: u32,
    info: u32,
}

pub(crate) fn read_attribute_table(handle: &DeviceHandle) -> Result<AttributeTable, ReadError> {
    let data = read_smart_page(handle, SMART_READ_DATA, "SMART READ DATA")?;
    let thresholds = read_smart_page(handle, SMART_READ_THRESHOLDS, "SMART READ THRESHOLDS")?;
    parse_attribute_table(&data, &thresholds).map_err(|reason| ReadError::Malformed {
        path: handle.path().to_path_buf(),
        reason,
    })
}

fn read_smart_page(
    handle: &DeviceHandle,
    feature: u8,
    op: &'static str,
) -> Result<[u8; SMART_PAGE_LEN], ReadError> {
    let mut page = [0u8; SMART_PAGE_LEN];
    let mut sense = [0u8; 32];
    let cdb = smart_cdb(feature);
    let mut hdr = SgIoHdr {
        interface_id: SG_INTERFACE_ID,
        dxfer_direction: SG_DXFER_FROM_DEV,
        cmd_len: cdb.len() as u8,
        mx_sb_len: sense.len() as u8,
        iovec_count: 0,
        dxfer_len: SMART_PAGE_LEN as u32,
        dxferp: page.as_mut_ptr().cast(),
        cmdp: cdb.as_ptr(),
        sbp: sense.as_mut_ptr(),
        timeout: SG_TIMEOUT_MS,
        flags: 0,
        pack_id: 0,
        usr_ptr: ptr::null_mut(),
        status: 0,
        masked_status: 0,
        msg_status: 0,
        sb_len_wr: 0,
        host_status: 0,
        driver_status: 0,
        resid: 0,
        duration: 0,
        info: 0,
    };
    // SAFETY: hdr matches struct sg_io_hdr and its buffers outlive the call.
    unsafe { handle.ioctl(op, SG_IO, &mut hdr)? };
    let sense_len = usize::from(hdr.sb_len_wr).min(sense.len());
    if let Some(failure) = sg_failure(hdr.status, hdr.host_status, hdr.driver_status, &sense[..sense_len]) {
        return Err(ReadError::Ioctl {
            path: handle.path().to_path_buf(),
            op,
            source: std::io::Error::other(failure),
        });
    }
    Ok(page)
}

/// Describes why a completed SG_IO request failed, or `None` when it
/// succeeded. A CHECK CONDITION is only accepted when the sense data is the
/// ATA status return descriptor of a command that finished without error.
fn sg_failure(status: u8, host_status: u16, driver_status: u16, sense: &[u8]) -> Option<String> {
    let describe = || {
        format!(
            "scsi status {:#x}, host status {:#x}, driver status {:#x}, sense {:02x?}",
            status, host_status, driver_status, sense
        )
    };
    if host_status != 0 || driver_status & !DRIVER_SENSE != 0 {
        return Some(describe());
    }
    match status {
        0 => None,
        SAM_STAT_CHECK_CONDITION if is_ata_return_ok(sense) => None,
        _ => Some(describe()),
    }
}

fn is_ata_return_ok(sense: &[u8]) -> bool {
    if sense.len() < 22 || sense[0] & 0x7f != SENSE_DESCRIPTOR_FORMAT {
        return false;
    }
    let key = sense[1] & 0x0f;
    if key != SENSE_KEY_NO_SENSE && key != SENSE_KEY_RECOVERED_ERROR {
        return false;
    }
    // first descriptor starts at byte 8; the ATA status register is its byte 13
    sense[8] == SENSE_ATA_RETURN_DESCRIPTOR && sense[8 + 13] & ATA_STATUS_ERR == 0
}

fn smart_cdb(feature: u8) -> [u8; 16] {
    let mut cdb = [0u8; 16];
    cdb[0] = ATA_PASS_THROUGH_16;
    cdb[1] = ATA_PROTOCOL_PIO_IN << 1;
    // T_DIR from device, BYT_BLOK blocks, T_LENGTH in the sector count field
    cdb[2] = 0x0e;
    cdb[4] = feature;
    cdb[6] = 1;
    cdb[10] = SMART_LBA_MID;
    cdb[12] = SMART_LBA_HIGH;
    cdb[14] = ATA_SMART_CMD;
    cdb
}

/// Pairs the SMART data page with the threshold page slot by slot. Empty
/// slots (id 0) are dropped from both lists at the same position.
pub(crate) fn parse_attribute_table(data: &[u8], thresholds: &[u8]) -> Result<AttributeTable, String> {
    verify_checksum(data, "data")?;
    verify_checksum(thresholds, "threshold")?;
    // a page the device never filled is all zeroes and still sums to 0
    if u16::from_le_bytes([data[0], data[1]]) == 0 {
        return Err("data page has no revision number".to_string());
    }
    let mut table = AttributeTable::default();
    for slot in 0..SMART_SLOTS {
        let offset = SMART_SLOTS_OFFSET + slot * SMART_SLOT_LEN;
        let entry = &data[offset..offset + SMART_SLOT_LEN];
        let limit = &thresholds[offset..offset + SMART_SLOT_LEN];
        let id = entry[0];
        if id == 0 {
            continue;
        }
        if limit[0] != id {
            debug!("threshold slot {} holds id {} for attribute {}", slot, limit[0], id);
        }
        table.attributes.push(SmartAttribute {
            id,
            name: attribute_name(id).to_string(),
            current: entry[3],
            worst: entry[4],
        });
        table.thresholds.push(limit[1]);
    }
    Ok(table)
}

fn verify_checksum(page: &[u8], kind: &str) -> Result<(), String> {
    if page.len() < SMART_PAGE_LEN {
        return Err(format!("{} page is {} bytes", kind, page.len()));
    }
    let sum = page[..SMART_PAGE_LEN]
        .iter()
        .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    if sum != 0 {
        return Err(format!("{} page checksum mismatch", kind));
    }
    Ok(())
}

/// Default attribute names; ids without a generic meaning map to "".
fn attribute_name(id: u8) -> &'static str {
    match id {
        1 => "Raw_Read_Error_Rate",
        2 => "Throughput_Performance",
        3 => "Spin_Up_Time",
        4 => "Start_Stop_Count",
        5 => "Reallocated_Sector_Ct",
        7 => "Seek_Error_Rate",
        8 => "Seek_Time_Performance",
        9 => "Power_On_Hours",
        10 => "Spin_Retry_Count",
        11 => "Calibration_Retry_Count",
        12 => "Power_Cycle_Count",
        13 => "Read_Soft_Error_Rate",
        175 => "Program_Fail_Count_Chip",
        176 => "Erase_Fail_Count_Chip",
        177 => "Wear_Leveling_Count",
        178 => "Used_Rsvd_Blk_Cnt_Chip",
        179 => "Used_Rsvd_Blk_Cnt_Tot",
        180 => "Unused_Rsvd_Blk_Cnt_Tot",
        181 => "Program_Fail_Cnt_Total",
        182 => "Erase_Fail_Count_Total",
        183 => "Runtime_Bad_Block",
        184 => "End-to-End_Error",
        187 => "Reported_Uncorrect",
        188 => "Command_Timeout",
        189 => "High_Fly_Writes",
        190 => "Airflow_Temperature_Cel",
        191 => "G-Sense_Error_Rate",
        192 => "Power-Off_Retract_Count",
        193 => "Load_Cycle_Count",
        194 => "Temperature_Celsius",
        195 => "Hardware_ECC_Recovered",
        196 => "Reallocated_Event_Count",
        197 => "Current_Pending_Sector",
        198 => "Offline_Uncorrectable",
        199 => "UDMA_CRC_Error_Count",
        200 => "Multi_Zone_Error_Rate",
        201 => "Soft_Read_Error_Rate",
        202 => "Data_Address_Mark_Errs",
        220 => "Disk_Shift",
        222 => "Loaded_Hours",
        223 => "Load_Retry_Count",
        224 => "Load_Friction",
        226 => "Load-in_Time",
        227 => "Torq-amp_Count",
        228 => "Power-off_Retract_Count",
        230 => "Head_Amplitude",
        231 => "Temperature_Celsius",
        232 => "Available_Reservd_Space",
        233 => "Media_Wearout_Indicator",
        240 => "Head_Flying_Hours",
        241 => "Total_LBAs_Written",
        242 => "Total_LBAs_Read",
        250 => "Read_Error_Retry_Rate",
        254 => "Free_Fall_Sensor",
        _ => "",
    }
}
