//! F01: RMI device control

use crate::pdt::FunctionDescriptor;
use bitflags::bitflags;
use synadiag_core::bits::{ascii_field, le24};
use synadiag_core::{Result, Transport};

/// Offset of the product id within the query registers
const PRODUCT_ID_OFFSET: u16 = 11;
const PRODUCT_ID_LEN: usize = 10;
/// Offset of the ASIC id byte
const ASIC_ID_OFFSET: u16 = 17;
/// Offset of the 24-bit firmware build id
const BUILD_ID_OFFSET: u16 = 18;

bitflags! {
    /// F01 control 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceControl: u8 {
        const SLEEP_MODE = 0x03;
        const NO_SLEEP = 1 << 2;
        const CHARGER_CONNECTED = 1 << 5;
        const REPORT_RATE = 1 << 6;
        const CONFIGURED = 1 << 7;
    }
}

bitflags! {
    /// F01 data 0
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u8 {
        const STATUS_CODE = 0x0F;
        const FLASH_PROG = 1 << 6;
        const UNCONFIGURED = 1 << 7;
    }
}

/// F01 command: soft reset
pub const CMD_RESET: u8 = 0x01;

/// Identity read from F01
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F01Info {
    pub fd: FunctionDescriptor,
    pub manufacturer_id: u8,
    pub product_id: String,
    pub asic_id: u8,
    pub build_id: u32,
}

impl F01Info {
    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        let manufacturer_id = t.read_byte(fd.query_base)?;

        let mut product = [0u8; PRODUCT_ID_LEN];
        t.read_register(fd.query_base + PRODUCT_ID_OFFSET, &mut product)?;
        let asic_id = t.read_byte(fd.query_base + ASIC_ID_OFFSET)?;

        let mut build = [0u8; 3];
        t.read_register(fd.query_base + BUILD_ID_OFFSET, &mut build)?;

        let info = Self {
            fd,
            manufacturer_id,
            product_id: ascii_field(&product),
            asic_id,
            build_id: le24(&build, 0),
        };
        log::info!(
            "F01: product {} asic 0x{:02X} build {}",
            info.product_id,
            info.asic_id,
            info.build_id
        );
        Ok(info)
    }

    /// Read device status (data 0)
    pub fn status<T: Transport + ?Sized>(&self, t: &mut T) -> Result<DeviceStatus> {
        Ok(DeviceStatus::from_bits_retain(t.read_byte(self.fd.data_base)?))
    }

    /// Set or clear the no-sleep bit
    pub fn set_no_sleep<T: Transport + ?Sized>(&self, t: &mut T, no_sleep: bool) -> Result<()> {
        let mut ctrl = DeviceControl::from_bits_retain(t.read_byte(self.fd.control_base)?);
        ctrl.set(DeviceControl::NO_SLEEP, no_sleep);
        t.write_byte(self.fd.control_base, ctrl.bits())
    }

    /// Address of the interrupt enable register (control 1)
    pub fn interrupt_enable_addr(&self) -> u16 {
        self.fd.control_base + 1
    }

    /// Enable or disable the interrupt bits in `mask`
    pub fn set_interrupts<T: Transport + ?Sized>(
        &self,
        t: &mut T,
        mask: u32,
        enable: bool,
        sources: u8,
    ) -> Result<()> {
        let len = (sources as usize).div_ceil(8).max(1);
        let mut buf = vec![0u8; len];
        t.read_register(self.interrupt_enable_addr(), &mut buf)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            let bits = ((mask >> (i * 8)) & 0xFF) as u8;
            if enable {
                *byte |= bits;
            } else {
                *byte &= !bits;
            }
        }
        t.write_register(self.interrupt_enable_addr(), &buf)
    }

    /// Issue a soft reset
    pub fn reset<T: Transport + ?Sized>(&self, t: &mut T) -> Result<()> {
        log::debug!("F01: soft reset");
        t.write_byte(self.fd.command_base, CMD_RESET)
    }
}
