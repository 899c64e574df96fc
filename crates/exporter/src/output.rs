use crate::ExportError;
use log::info;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Where node_exporter's textfile collector picks up `*.prom` files.
pub const DEFAULT_TEXTFILE_PATH: &str = "/var/lib/node_exporter/textfile_collector/smartmon.prom";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Textfile(PathBuf),
}

impl OutputTarget {
    pub fn write(&self, exposition: &str) -> Result<(), ExportError> {
        match self {
            OutputTarget::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(exposition.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|source| ExportError::Write {
                        target: "stdout".to_string(),
                        source,
                    })
            }
            OutputTarget::Textfile(path) => write_textfile(path, exposition),
        }
    }
}

/// Replaces `path` through a sibling temporary file so a concurrent reader
/// sees either the previous contents or the new ones.
pub fn write_textfile(path: &Path, exposition: &str) -> Result<(), ExportError> {
    let write_error = |source| ExportError::Write {
        target: path.display().to_string(),
        source,
    };
    let mut staging = path.as_os_str().to_owned();
    staging.push(format!(".{}.tmp", std::process::id()));
    let staging = PathBuf::from(staging);
    if let Err(source) = fs::write(&staging, exposition).and_then(|_| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(write_error(source));
    }
    info!("wrote {} bytes to {}", exposition.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn textfile_overwrites_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("smartmon.prom");
        fs::write(&path, "stale\nstale\nstale\n").unwrap();

        OutputTarget::Textfile(path.clone()).write("fresh 1\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh 1\n");
        let leftovers: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn missing_directory_is_a_write_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent/smartmon.prom");
        let err = write_textfile(&path, "x 1\n").unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(!path.exists());
    }
}
