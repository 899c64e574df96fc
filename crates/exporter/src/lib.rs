//! Normalizes SMART data from SATA attribute tables and NVMe health logs into
//! one flat set of `smartmon_*` metrics and renders them as Prometheus text.
//!
//! A run is all-or-nothing: devices are processed one after another and the
//! first error aborts the run before any text is produced.

use log::{debug, info};
use smartmon_core::{AttributeReader, ControllerKind, DeviceCatalog, DeviceDescriptor, ReadError};
use thiserror::Error;

pub mod naming;
pub mod nvme;
pub mod output;
pub mod registry;
pub mod sata;

pub use output::{OutputTarget, DEFAULT_TEXTFILE_PATH};
pub use registry::{ExportRegistry, MetricIdentity, MetricKind};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to enumerate block devices: {0:#}")]
    Catalog(anyhow::Error),
    #[error("cannot open disk {disk}")]
    DeviceOpen {
        disk: String,
        #[source]
        source: ReadError,
    },
    #[error("cannot read SMART data of disk {disk}")]
    AttributeRead {
        disk: String,
        #[source]
        source: ReadError,
    },
    #[error("disk {disk} has no threshold for attribute {id} at position {position}")]
    MissingThreshold {
        disk: String,
        id: u8,
        position: usize,
    },
    #[error("metric {0} registered twice")]
    DuplicateMetric(String),
    #[error("metric registry rejected a metric")]
    Sink(#[from] prometheus::Error),
    #[error("failed to write metrics to {target}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn from_read(disk: &str, source: ReadError) -> Self {
        let disk = disk.to_string();
        if source.is_open() {
            ExportError::DeviceOpen { disk, source }
        } else {
            ExportError::AttributeRead { disk, source }
        }
    }
}

/// Collects every disk from `catalog` into a fresh registry.
pub fn collect<C, R>(catalog: &C, reader: &R) -> Result<ExportRegistry, ExportError>
where
    C: DeviceCatalog + ?Sized,
    R: AttributeReader + ?Sized,
{
    let devices = catalog.devices().map_err(ExportError::Catalog)?;
    info!("found {} block devices", devices.len());
    let mut registry = ExportRegistry::new();
    for device in &devices {
        export_device(&mut registry, reader, device)?;
    }
    Ok(registry)
}

/// One complete run: enumerate, read, normalize, render.
pub fn run_export<C, R>(catalog: &C, reader: &R) -> Result<String, ExportError>
where
    C: DeviceCatalog + ?Sized,
    R: AttributeReader + ?Sized,
{
    let registry = collect(catalog, reader)?;
    info!("collected {} metrics", registry.len());
    registry.render()
}

/// Runs an export and writes it to `target`. The target is only touched
/// once the whole run has succeeded.
pub fn export_to<C, R>(catalog: &C, reader: &R, target: &OutputTarget) -> Result<(), ExportError>
where
    C: DeviceCatalog + ?Sized,
    R: AttributeReader + ?Sized,
{
    let exposition = run_export(catalog, reader)?;
    target.write(&exposition)
}

fn export_device<R>(
    registry: &mut ExportRegistry,
    reader: &R,
    device: &DeviceDescriptor,
) -> Result<(), ExportError>
where
    R: AttributeReader + ?Sized,
{
    match device.controller {
        ControllerKind::Scsi => {
            sata::register_device_info(registry, device)?;
            let table = reader
                .read_sata(device)
                .map_err(|err| ExportError::from_read(&device.name, err))?;
            let count = sata::map_attribute_table(registry, &device.name, &table)?;
            debug!("{}: {} attribute metrics", device.name, count);
        }
        ControllerKind::Nvme => {
            let record = reader
                .read_nvme(device)
                .map_err(|err| ExportError::from_read(&device.name, err))?;
            let count = nvme::map_typed_record(registry, &device.name, &record)?;
            debug!("{}: {} log metrics", device.name, count);
        }
        other => debug!("{}: {} controller not supported, skipping", device.name, other),
    }
    Ok(())
}
