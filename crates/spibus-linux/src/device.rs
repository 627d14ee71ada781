//! spidev character device adapter
//!
//! `SpidevFile` is the only place that turns borrowed buffers into the
//! integer addresses the kernel expects and issues the raw `ioctl(2)`.

use crate::error::{Result, SpidevError};

use spibus_core::device::{ControlArg, ControlDevice};
use spibus_core::error::Errno;
use spibus_core::ioctl::IoctlCode;
use spibus_core::transfer::{Segment, TransferDescriptor};

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Device node of a bus/chip-select pair
pub fn spidev_path(bus: u32, chip: u32) -> PathBuf {
    PathBuf::from(format!("/dev/spidev{}.{}", bus, chip))
}

/// An open `/dev/spidevX.Y` node
#[derive(Debug)]
pub struct SpidevFile {
    file: Option<File>,
    path: PathBuf,
}

impl SpidevFile {
    /// Open a spidev node read/write
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("spidev: Opening device {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| SpidevError::OpenFailed {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    /// Path the device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> std::result::Result<RawFd, Errno> {
        self.file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or(Errno::EBADF)
    }
}

/// Copy a segment's descriptor with the buffer addresses filled in
fn bind(segment: &mut Segment<'_>) -> TransferDescriptor {
    let mut desc = *segment.descriptor();
    let (tx, rx) = segment.buffers_mut();
    desc.tx_buf = tx.map_or(0, |buf| buf.as_ptr() as u64);
    desc.rx_buf = rx.map_or(0, |buf| buf.as_mut_ptr() as u64);
    desc
}

fn check(ret: libc::c_int) -> std::result::Result<(), Errno> {
    nix::errno::Errno::result(ret)
        .map(drop)
        .map_err(|e| Errno(e as i32))
}

impl ControlDevice for SpidevFile {
    fn control(&mut self, code: IoctlCode, arg: ControlArg<'_, '_>) -> std::result::Result<(), Errno> {
        let fd = self.fd()?;
        let request = code.raw();

        // The pointers below stay valid for the whole call: scalars are
        // borrowed through `arg`, and message buffers stay borrowed by the
        // segments while the kernel reads and fills them.
        let ret = match arg {
            ControlArg::WriteU8(value) => unsafe {
                libc::ioctl(fd, request as _, value as *const u8)
            },
            ControlArg::WriteU32(value) => unsafe {
                libc::ioctl(fd, request as _, value as *const u32)
            },
            ControlArg::ReadU8(value) => unsafe { libc::ioctl(fd, request as _, value as *mut u8) },
            ControlArg::ReadU32(value) => unsafe {
                libc::ioctl(fd, request as _, value as *mut u32)
            },
            ControlArg::Message(segments) => {
                let mut descriptors: Vec<TransferDescriptor> =
                    segments.iter_mut().map(|seg| bind(seg)).collect();
                unsafe { libc::ioctl(fd, request as _, descriptors.as_mut_ptr()) }
            }
        };

        check(ret)
    }

    fn close(&mut self) -> std::result::Result<(), Errno> {
        let file = self.file.take().ok_or(Errno::EBADF)?;
        log::debug!("spidev: Closing {}", self.path.display());
        let ret = unsafe { libc::close(file.into_raw_fd()) };
        check(ret)
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
///
/// A single message may not move more than this many bytes in total.
pub fn kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("spidev: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("spidev: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("spidev: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("spidev: Using page size {} as buffer size", page_size);
    page_size
}
