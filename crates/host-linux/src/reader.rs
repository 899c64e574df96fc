use crate::handle::DeviceHandle;
use crate::{ata, nvme};
use log::debug;
use smartmon_core::{AttributeReader, AttributeTable, DeviceDescriptor, ReadError, TypedRecord};
use std::path::PathBuf;

/// Reads SMART data through the device node `<dev_root>/<name>`. Each read
/// opens its own handle and closes it before returning.
#[derive(Debug, Clone)]
pub struct DeviceReader {
    dev_root: PathBuf,
}

impl DeviceReader {
    pub fn new(dev_root: impl Into<PathBuf>) -> Self {
        Self {
            dev_root: dev_root.into(),
        }
    }

    fn device_path(&self, device: &DeviceDescriptor) -> PathBuf {
        self.dev_root.join(&device.name)
    }
}

impl AttributeReader for DeviceReader {
    fn read_sata(&self, device: &DeviceDescriptor) -> Result<AttributeTable, ReadError> {
        let path = self.device_path(device);
        debug!("reading ATA SMART attributes from {}", path.display());
        let handle = DeviceHandle::open(&path)?;
        ata::read_attribute_table(&handle)
    }

    fn read_nvme(&self, device: &DeviceDescriptor) -> Result<TypedRecord, ReadError> {
        let path = self.device_path(device);
        debug!("reading NVMe SMART log from {}", path.display());
        let handle = DeviceHandle::open(&path)?;
        Ok(nvme::read_smart_log(&handle)?.record())
    }
}
