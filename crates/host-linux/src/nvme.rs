use crate::handle::DeviceHandle;
use smartmon_core::{NvmeSmartLog, ReadError, NVME_SMART_LOG_LEN};
use std::path::Path;

// _IOWR('N', 0x41, struct nvme_admin_cmd)
const NVME_IOCTL_ADMIN_CMD: u64 = 0xC048_4E41;
const NVME_ADMIN_GET_LOG_PAGE: u8 = 0x02;
const NVME_LOG_SMART_INFO: u32 = 0x02;
const NVME_NSID_ALL: u32 = 0xFFFF_FFFF;
const GET_LOG_PAGE_OP: &str = "NVMe GET LOG PAGE";

#[repr(C)]
#[derive(Debug, Default)]
struct NvmePassthruCommand {
    opcode: u8,
    flags: u8,
    rsvd1: u16,
    nsid: u32,
    cdw2: u32,
    cdw3: u32,
    metadata: u64,
    addr: u64,
    metadata_len: u32,
    data_len: u32,
    cdw10: u32,
    cdw11: u32,
    cdw12: u32,
    cdw13: u32,
    cdw14: u32,
    cdw15: u32,
    timeout_ms: u32,
    result: u32,
}

fn smart_log_command(buffer: &mut [u8; NVME_SMART_LOG_LEN]) -> NvmePassthruCommand {
    let dwords = (NVME_SMART_LOG_LEN / 4) as u32 - 1;
    NvmePassthruCommand {
        opcode: NVME_ADMIN_GET_LOG_PAGE,
        nsid: NVME_NSID_ALL,
        addr: buffer.as_mut_ptr() as u64,
        data_len: NVME_SMART_LOG_LEN as u32,
        cdw10: NVME_LOG_SMART_INFO | (dwords << 16),
        ..Default::default()
    }
}

pub(crate) fn read_smart_log(handle: &DeviceHandle) -> Result<NvmeSmartLog, ReadError> {
    let mut page = [0u8; NVME_SMART_LOG_LEN];
    let mut cmd = smart_log_command(&mut page);
    // SAFETY: cmd matches struct nvme_admin_cmd and addr points at page,
    // which is live and NVME_SMART_LOG_LEN bytes long.
    let status = unsafe { handle.ioctl(GET_LOG_PAGE_OP, NVME_IOCTL_ADMIN_CMD, &mut cmd)? };
    check_completion(handle.path(), status)?;
    NvmeSmartLog::parse(&page).ok_or_else(|| ReadError::Malformed {
        path: handle.path().to_path_buf(),
        reason: "short SMART log page".to_string(),
    })
}

/// A positive ioctl result is the NVMe completion status of a command the
/// controller rejected; the buffer was not filled.
fn check_completion(path: &Path, status: i32) -> Result<(), ReadError> {
    if status == 0 {
        return Ok(());
    }
    Err(ReadError::Ioctl {
        path: path.to_path_buf(),
        op: GET_LOG_PAGE_OP,
        source: std::io::Error::other(format!(
            "completion status {:#x} (type {:#x}, code {:#x})",
            status,
            (status >> 8) & 0x7,
            status & 0xff
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_command_is_an_ioctl_error() {
        // invalid log page
        let err = check_completion(Path::new("/dev/nvme0n1"), 0x109).unwrap_err();
        assert!(matches!(err, ReadError::Ioctl { op: "NVMe GET LOG PAGE", .. }));
        let source = std::error::Error::source(&err).unwrap().to_string();
        assert!(source.contains("0x109"));
        assert!(check_completion(Path::new("/dev/nvme0n1"), 0).is_ok());
    }

    #[test]
    fn admin_command_layout() {
        assert_eq!(std::mem::size_of::<NvmePassthruCommand>(), 72);
        let expected = (3u64 << 30) | (72 << 16) | ((b'N' as u64) << 8) | 0x41;
        assert_eq!(NVME_IOCTL_ADMIN_CMD, expected);
    }

    #[test]
    fn requests_whole_smart_log() {
        let mut page = [0u8; NVME_SMART_LOG_LEN];
        let cmd = smart_log_command(&mut page);
        assert_eq!(cmd.opcode, 0x02);
        assert_eq!(cmd.nsid, u32::MAX);
        assert_eq!(cmd.data_len, 512);
        assert_eq!(cmd.cdw10, 0x02 | (127 << 16));
        assert_eq!(cmd.addr, page.as_ptr() as u64);
    }
}
