use anyhow::Result;
use clap::builder::{OsStringValueParser, TypedValueParser};
use clap::{Parser, ValueEnum};
use log::warn;
use smartmon_core::{AttributeReader, DeviceCatalog};
use smartmon_exporter::{export_to, OutputTarget, DEFAULT_TEXTFILE_PATH};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Export disk SMART attributes in the Prometheus text format
#[derive(Parser, Debug)]
#[command(name = "smartmon_exporter", version, about)]
struct Cli {
    /// Write to the node_exporter textfile collector instead of stdout
    // an empty PATH is accepted and means stdout
    #[arg(
        short,
        long,
        value_name = "PATH",
        value_parser = OsStringValueParser::new().map(PathBuf::from)
    )]
    output: Option<PathBuf>,

    /// Print the detected disks as JSON and exit
    #[arg(long)]
    list_devices: bool,

    /// Diagnostic output on stderr
    #[arg(long, value_name = "LEVEL", default_value = "warn", env = "SMARTMON_LOG_LEVEL")]
    log_level: LogLevel,

    #[arg(long, value_name = "PATH", env = "SMARTMON_TEXTFILE_PATH", default_value = DEFAULT_TEXTFILE_PATH, hide = true)]
    textfile_path: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "/sys/block", hide = true)]
    sysfs_root: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "/run/udev/data", hide = true)]
    udev_root: PathBuf,

    #[arg(long, value_name = "DIR", default_value = "/dev", hide = true)]
    dev_root: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let (catalog, reader) = host_collaborators(&cli)?;
    if cli.list_devices {
        let devices = catalog.devices()?;
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    let target = output_target(&cli);
    export_to(catalog.as_ref(), reader.as_ref(), &target)?;
    Ok(())
}

/// The textfile location is fixed; a non-empty path given to `--output` only
/// selects file output.
fn output_target(cli: &Cli) -> OutputTarget {
    match &cli.output {
        None => OutputTarget::Stdout,
        Some(requested) if requested.as_os_str().is_empty() => OutputTarget::Stdout,
        Some(requested) => {
            if requested != &cli.textfile_path {
                warn!(
                    "ignoring output path {}, writing to {}",
                    requested.display(),
                    cli.textfile_path.display()
                );
            }
            OutputTarget::Textfile(cli.textfile_path.clone())
        }
    }
}

fn host_collaborators(cli: &Cli) -> Result<(Box<dyn DeviceCatalog>, Box<dyn AttributeReader>)> {
    #[cfg(target_os = "linux")]
    {
        use smartmon_host_linux::{DeviceReader, SysfsCatalog};
        return Ok((
            Box::new(SysfsCatalog::new(&cli.sysfs_root, &cli.udev_root)),
            Box::new(DeviceReader::new(&cli.dev_root)),
        ));
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cli;
        Err(anyhow::anyhow!("SMART collection is only supported on Linux"))
    }
}

fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}
