//! F34: flash / bootloader, used here only for the configuration id

use crate::pdt::FunctionDescriptor;
use synadiag_core::{Result, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F34Info {
    pub fd: FunctionDescriptor,
    pub config_id: Vec<u8>,
}

impl F34Info {
    /// Configuration id length for a bootloader version field
    pub fn config_id_size(version: u8) -> usize {
        match version {
            0 | 1 => 4,
            _ => 32,
        }
    }

    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        let mut config_id = vec![0u8; Self::config_id_size(fd.version)];
        t.read_register(fd.control_base, &mut config_id)?;
        let info = Self { fd, config_id };
        log::debug!("F34: v{} config id {}", info.fd.version, info.config_id_hex());
        Ok(info)
    }

    pub fn config_id_hex(&self) -> String {
        self.config_id.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
