//! Character-device transport
//!
//! The kernel driver exposes the controller as `/dev/rmiN` (register
//! file: seek to the register address, then read or write) or `/dev/tcmN`
//! (packet FIFO). Three ioctls control the driver: reset, irq enable and
//! raw mode.

use crate::error::{CharDevError, Result};

use synadiag_core::error::Result as CoreResult;
use synadiag_core::{Protocol, Transport};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Device nodes probed by [`find_device`], in order
pub const DEFAULT_CANDIDATES: &[&str] = &["/dev/rmi0", "/dev/rmi1", "/dev/tcm0", "/dev/tcm1"];

/// Driver ioctl constants
mod ioctl {
    use nix::{ioctl_none, ioctl_write_int};

    const DEVICE_IOC_MAGIC: u8 = b's';

    const DEVICE_IOC_TYPE_RESET: u8 = 0;
    const DEVICE_IOC_TYPE_IRQ: u8 = 1;
    const DEVICE_IOC_TYPE_RAW: u8 = 2;

    ioctl_none!(device_ioc_reset, DEVICE_IOC_MAGIC, DEVICE_IOC_TYPE_RESET);
    ioctl_write_int!(device_ioc_irq, DEVICE_IOC_MAGIC, DEVICE_IOC_TYPE_IRQ);
    ioctl_write_int!(device_ioc_raw, DEVICE_IOC_MAGIC, DEVICE_IOC_TYPE_RAW);
}

/// Protocol implied by a device node name
pub fn protocol_for_path(path: &str) -> Option<Protocol> {
    Protocol::from_node_path(path)
}

/// First existing node among `candidates`
pub fn find_device(candidates: &[&str]) -> Option<(String, Option<Protocol>)> {
    for path in candidates {
        if Path::new(path).exists() {
            log::info!("chardev: Found device node {}", path);
            return Some((path.to_string(), protocol_for_path(path)));
        }
        log::debug!("chardev: {} not present", path);
    }
    None
}

/// Open character device
pub struct CharDevice {
    file: File,
    path: String,
}

impl CharDevice {
    /// Open `path` for reading and writing
    pub fn open(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(CharDevError::NotFound(path.to_string()));
        }

        log::debug!("chardev: Opening {}", path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CharDevError::OpenFailed {
                path: path.to_string(),
                source: e,
            })?;

        log::info!("chardev: Opened {}", path);
        Ok(Self {
            file,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn seek(&mut self, addr: Option<u16>) -> Result<()> {
        if let Some(addr) = addr {
            self.file.seek(SeekFrom::Start(addr as u64))?;
        }
        Ok(())
    }

    fn raw_read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
        self.seek(addr)?;
        let n = self.file.read(buf)?;
        log::trace!("chardev: read {:?} {} bytes", addr, n);
        Ok(n)
    }

    fn raw_write(&mut self, addr: Option<u16>, data: &[u8]) -> Result<usize> {
        self.seek(addr)?;
        let n = self.file.write(data)?;
        log::trace!("chardev: write {:?} {} bytes", addr, n);
        Ok(n)
    }

    fn set_raw(&mut self, raw: bool) -> Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::device_ioc_raw(fd, raw as _).map_err(|e| CharDevError::IoctlFailed {
                request: "raw mode",
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
        log::debug!("chardev: raw mode {}", if raw { "on" } else { "off" });
        Ok(())
    }

    fn set_irq_enabled(&mut self, enable: bool) -> Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::device_ioc_irq(fd, enable as _).map_err(|e| CharDevError::IoctlFailed {
                request: "irq",
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
        log::debug!("chardev: irq {}", if enable { "enabled" } else { "disabled" });
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let fd = self.file.as_raw_fd();
        unsafe {
            ioctl::device_ioc_reset(fd).map_err(|e| CharDevError::IoctlFailed {
                request: "reset",
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }
        log::debug!("chardev: hardware reset");
        Ok(())
    }
}

impl Transport for CharDevice {
    fn read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> CoreResult<usize> {
        Ok(self.raw_read(addr, buf)?)
    }

    fn write(&mut self, addr: Option<u16>, data: &[u8]) -> CoreResult<usize> {
        Ok(self.raw_write(addr, data)?)
    }

    fn set_raw_mode(&mut self, raw: bool) -> CoreResult<()> {
        Ok(self.set_raw(raw)?)
    }

    fn set_irq(&mut self, enable: bool) -> CoreResult<()> {
        Ok(self.set_irq_enabled(enable)?)
    }

    fn hardware_reset(&mut self) -> CoreResult<()> {
        Ok(self.reset()?)
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}
