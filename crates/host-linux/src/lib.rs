use anyhow::{Context, Result};
use log::debug;
use smartmon_core::{ControllerKind, DeviceCatalog, DeviceDescriptor, UNKNOWN};
use std::fs;
use std::path::{Path, PathBuf};

mod ata;
mod handle;
mod nvme;
mod reader;

pub use reader::DeviceReader;

/// Block device catalog backed by sysfs, with udev properties as fallback
/// for identity fields the kernel does not expose.
#[derive(Debug, Clone)]
pub struct SysfsCatalog {
    block_root: PathBuf,
    udev_root: PathBuf,
}

impl SysfsCatalog {
    pub fn new(block_root: impl Into<PathBuf>, udev_root: impl Into<PathBuf>) -> Self {
        Self {
            block_root: block_root.into(),
            udev_root: udev_root.into(),
        }
    }
}

impl DeviceCatalog for SysfsCatalog {
    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        enumerate_disks(&self.block_root, &self.udev_root)
    }
}

fn enumerate_disks(block_root: &Path, udev_root: &Path) -> Result<Vec<DeviceDescriptor>> {
    let mut disks = Vec::new();
    let entries = fs::read_dir(block_root)
        .with_context(|| format!("read {}", block_root.display()))?;
    for entry in entries {
        let entry = entry?;
        let disk_name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if is_virtual_disk(&disk_name, &path) {
            debug!("skipping virtual block device {}", disk_name);
            continue;
        }
        if !path.join("device").exists() {
            continue;
        }
        let size_bytes = read_u64(path.join("size"))
            .map(|sectors| sectors.saturating_mul(512))
            .unwrap_or(0);
        let udev = read_udev_properties(&path, udev_root);
        let vendor = read_string(path.join("device/vendor"))
            .or_else(|| udev_property(&udev, &["ID_VENDOR"]))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let model = read_string(path.join("device/model"))
            .or_else(|| udev_property(&udev, &["ID_MODEL"]))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let serial_number = read_string(path.join("device/serial"))
            .or_else(|| udev_property(&udev, &["ID_SERIAL_SHORT", "ID_SCSI_SERIAL"]))
            .unwrap_or_else(|| UNKNOWN.to_string());
        disks.push(DeviceDescriptor {
            controller: ControllerKind::from_device_name(&disk_name),
            name: disk_name,
            size_bytes,
            vendor,
            model,
            serial_number,
        });
    }
    disks.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(disks)
}

/// `E:KEY=VALUE` lines of the udev database entry for a block device.
fn read_udev_properties(disk_path: &Path, udev_root: &Path) -> Vec<(String, String)> {
    let Some(dev) = read_string(disk_path.join("dev")) else {
        return Vec::new();
    };
    let data = fs::read_to_string(udev_root.join(format!("b{}", dev))).unwrap_or_default();
    data.lines()
        .filter_map(|line| line.strip_prefix("E:"))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.trim().to_string()))
        .collect()
}

fn udev_property(properties: &[(String, String)], keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|wanted| {
        properties
            .iter()
            .find(|(key, value)| key == wanted && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}

fn read_string(path: impl AsRef<Path>) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_u64(path: impl AsRef<Path>) -> Option<u64> {
    read_string(path).and_then(|value| value.parse::<u64>().ok())
}

fn is_virtual_disk(name: &str, path: &Path) -> bool {
    if name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram") {
        return true;
    }
    if let Ok(target) = fs::canonicalize(path.join("device")) {
        if target.to_string_lossy().contains("/virtual/") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: impl AsRef<Path>, contents: &str) {
        let path = path.as_ref();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn add_disk(root: &Path, name: &str, sectors: u64) -> PathBuf {
        let disk = root.join("block").join(name);
        fs::create_dir_all(disk.join("device")).unwrap();
        write(disk.join("size"), &format!("{}\n", sectors));
        disk
    }

    #[test]
    fn enumerates_sorted_physical_disks() {
        let tmp = TempDir::new().unwrap();
        let sdb = add_disk(tmp.path(), "sdb", 100);
        write(sdb.join("device/vendor"), "ATA     \n");
        write(sdb.join("device/model"), "Samsung SSD 870\n");
        let nvme = add_disk(tmp.path(), "nvme0n1", 2048);
        write(nvme.join("device/serial"), "  S5GXNF0R  \n");
        add_disk(tmp.path(), "loop0", 10);
        fs::create_dir_all(tmp.path().join("block/dm-0")).unwrap();

        let catalog = SysfsCatalog::new(tmp.path().join("block"), tmp.path().join("udev"));
        let disks = catalog.devices().unwrap();

        let names: Vec<_> = disks.iter().map(|disk| disk.name.as_str()).collect();
        assert_eq!(names, ["nvme0n1", "sdb"]);
        assert_eq!(disks[0].controller, ControllerKind::Nvme);
        assert_eq!(disks[0].size_bytes, 2048 * 512);
        assert_eq!(disks[0].serial_number, "S5GXNF0R");
        assert_eq!(disks[0].vendor, UNKNOWN);
        assert_eq!(disks[1].controller, ControllerKind::Scsi);
        assert_eq!(disks[1].vendor, "ATA");
        assert_eq!(disks[1].model, "Samsung SSD 870");
        assert_eq!(disks[1].serial_number, UNKNOWN);
    }

    #[test]
    fn falls_back_to_udev_properties() {
        let tmp = TempDir::new().unwrap();
        let sda = add_disk(tmp.path(), "sda", 1);
        write(sda.join("dev"), "8:0\n");
        write(
            tmp.path().join("udev/b8:0"),
            "S:disk/by-id/ata-WDC\nE:ID_VENDOR=WDC\nE:ID_SERIAL_SHORT=WD-123\nE:ID_MODEL=WDC_WD10\n",
        );

        let catalog = SysfsCatalog::new(tmp.path().join("block"), tmp.path().join("udev"));
        let disks = catalog.devices().unwrap();

        assert_eq!(disks[0].vendor, "WDC");
        assert_eq!(disks[0].model, "WDC_WD10");
        assert_eq!(disks[0].serial_number, "WD-123");
    }

    #[test]
    fn skips_disks_backed_by_virtual_devices() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("devices/virtual/block/vda");
        fs::create_dir_all(&target).unwrap();
        let disk = tmp.path().join("block/vda");
        fs::create_dir_all(&disk).unwrap();
        std::os::unix::fs::symlink(&target, disk.join("device")).unwrap();

        let catalog = SysfsCatalog::new(tmp.path().join("block"), tmp.path().join("udev"));
        assert!(catalog.devices().unwrap().is_empty());
    }

    #[test]
    fn missing_block_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let catalog = SysfsCatalog::new(tmp.path().join("absent"), tmp.path());
        assert!(catalog.devices().is_err());
    }
}
