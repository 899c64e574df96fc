use log::trace;
use smartmon_core::ReadError;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Open device node. The descriptor is closed when the handle is dropped, on
/// success and error paths alike.
pub(crate) struct DeviceHandle {
    file: File,
    path: PathBuf,
}

impl DeviceHandle {
    pub(crate) fn open(path: &Path) -> Result<Self, ReadError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| ReadError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        trace!("opened {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the non-negative result of the call; some drivers report
    /// command-level status there.
    ///
    /// # Safety
    ///
    /// `arg` must have the layout the driver expects for `request`, and any
    /// buffer it points to must stay valid for the duration of the call.
    pub(crate) unsafe fn ioctl<T>(
        &self,
        op: &'static str,
        request: u64,
        arg: &mut T,
    ) -> Result<i32, ReadError> {
        let rc = libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T);
        if rc < 0 {
            return Err(ReadError::Ioctl {
                path: self.path.clone(),
                op,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(rc)
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        trace!("closing {}", self.path.display());
    }
}
