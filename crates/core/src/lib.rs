use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod nvme;

pub use nvme::{NvmeSmartLog, NVME_SMART_LOG_LEN};

/// Placeholder used by catalogs for metadata the host does not report.
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,              // kernel name, e.g. "sda", "nvme0n1"
    pub size_bytes: u64,
    pub controller: ControllerKind,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Scsi,
    Nvme,
    Ide,
    Virtio,
    Mmc,
    Unknown,
}

impl ControllerKind {
    /// Classifies a block device by its kernel name prefix.
    pub fn from_device_name(name: &str) -> Self {
        if name.starts_with("nvme") {
            ControllerKind::Nvme
        } else if name.starts_with("sd") {
            ControllerKind::Scsi
        } else if name.starts_with("hd") {
            ControllerKind::Ide
        } else if name.starts_with("vd") {
            ControllerKind::Virtio
        } else if name.starts_with("mmcblk") {
            ControllerKind::Mmc
        } else {
            ControllerKind::Unknown
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControllerKind::Scsi => "SCSI",
            ControllerKind::Nvme => "NVMe",
            ControllerKind::Ide => "IDE",
            ControllerKind::Virtio => "virtio",
            ControllerKind::Mmc => "MMC",
            ControllerKind::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One slot of an ATA SMART data page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartAttribute {
    pub id: u8,
    pub name: String, // empty when the id has no known name
    pub current: u8,
    pub worst: u8,
}

/// SMART attributes of a SATA-like disk with the thresholds read from the
/// separate threshold page. `thresholds[i]` belongs to `attributes[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeTable {
    pub attributes: Vec<SmartAttribute>,
    pub thresholds: Vec<u8>,
}

impl AttributeTable {
    pub fn threshold_at(&self, position: usize) -> Option<u8> {
        self.thresholds.get(position).copied()
    }
}

/// 128-bit little-endian counter split into two 64-bit words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uint128 {
    pub lo: u64,
    pub hi: u64,
}

impl Uint128 {
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        let value = u128::from_le_bytes(bytes);
        Self {
            lo: value as u64,
            hi: (value >> 64) as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    Wide(Uint128),
    U16Array(Vec<u16>),
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedField {
    pub name: &'static str, // CamelCase identifier
    pub value: FieldValue,
}

impl TypedField {
    pub fn new(name: &'static str, value: FieldValue) -> Self {
        Self { name, value }
    }
}

/// Fixed-schema record in declaration order.
pub type TypedRecord = Vec<TypedField>;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{op} failed on {}", path.display())]
    Ioctl {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed SMART data from {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

impl ReadError {
    pub fn is_open(&self) -> bool {
        matches!(self, ReadError::Open { .. })
    }
}

pub trait DeviceCatalog {
    fn devices(&self) -> anyhow::Result<Vec<DeviceDescriptor>>;
}

/// Reads raw SMART data for one disk. Implementations open and close the
/// device inside each call.
pub trait AttributeReader {
    fn read_sata(&self, device: &DeviceDescriptor) -> Result<AttributeTable, ReadError>;
    fn read_nvme(&self, device: &DeviceDescriptor) -> Result<TypedRecord, ReadError>;
}
