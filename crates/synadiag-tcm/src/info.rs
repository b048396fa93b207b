//! Identify, application info and boot info structures
//!
//! Payloads shorter than a structure leave the missing fields zero; longer
//! payloads are truncated to the structure size.

use crate::protocol::{MODE_APPLICATION, MODE_BOOTLOADER};
use std::fmt;
use synadiag_core::bits::{ascii_field, le16, le32};

/// Copy `payload` into a zeroed buffer of `size` bytes
fn clamp(payload: &[u8], size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    let n = payload.len().min(size);
    if payload.len() != size {
        log::debug!("tcm: structure payload is {} bytes, expected {}", payload.len(), size);
    }
    buf[..n].copy_from_slice(&payload[..n]);
    buf
}

/// Identify report / response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyInfo {
    pub version: u8,
    pub mode: u8,
    pub part_number: String,
    pub build_id: u32,
    /// Largest FIFO write, 0 for unlimited
    pub max_write_size: u16,
}

impl IdentifyInfo {
    pub const SIZE: usize = 24;

    pub fn parse(payload: &[u8]) -> Self {
        let b = clamp(payload, Self::SIZE);
        Self {
            version: b[0],
            mode: b[1],
            part_number: ascii_field(&b[2..18]),
            build_id: le32(&b, 18),
            max_write_size: le16(&b, 22),
        }
    }

    pub fn in_application(&self) -> bool {
        self.mode == MODE_APPLICATION
    }

    pub fn in_bootloader(&self) -> bool {
        self.mode == MODE_BOOTLOADER
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            MODE_APPLICATION => "application",
            MODE_BOOTLOADER => "bootloader",
            _ => "unknown",
        }
    }
}

/// Application firmware information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub version: u16,
    pub status: u16,
    pub static_config_size: u16,
    pub dynamic_config_size: u16,
    pub app_config_start_block: u16,
    pub app_config_size: u16,
    pub max_touch_report_config_size: u16,
    pub max_touch_report_payload_size: u16,
    pub customer_config_id: [u8; 16],
    pub max_x: u16,
    pub max_y: u16,
    pub max_objects: u16,
    pub num_of_buttons: u16,
    pub num_of_image_rows: u16,
    pub num_of_image_cols: u16,
    pub has_hybrid_data: u16,
}

impl AppInfo {
    pub const SIZE: usize = 46;

    pub fn parse(payload: &[u8]) -> Self {
        let b = clamp(payload, Self::SIZE);
        let mut customer_config_id = [0u8; 16];
        customer_config_id.copy_from_slice(&b[16..32]);
        Self {
            version: le16(&b, 0),
            status: le16(&b, 2),
            static_config_size: le16(&b, 4),
            dynamic_config_size: le16(&b, 6),
            app_config_start_block: le16(&b, 8),
            app_config_size: le16(&b, 10),
            max_touch_report_config_size: le16(&b, 12),
            max_touch_report_payload_size: le16(&b, 14),
            customer_config_id,
            max_x: le16(&b, 32),
            max_y: le16(&b, 34),
            max_objects: le16(&b, 36),
            num_of_buttons: le16(&b, 38),
            num_of_image_rows: le16(&b, 40),
            num_of_image_cols: le16(&b, 42),
            has_hybrid_data: le16(&b, 44),
        }
    }

    pub fn customer_config_id_hex(&self) -> String {
        self.customer_config_id
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Bootloader information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootInfo {
    pub version: u8,
    pub status: u8,
    pub asic_id: u16,
    pub write_block_size_words: u8,
    pub erase_page_size_words: u16,
    pub max_write_payload_size: u16,
    pub last_reset_reason: u8,
    pub pc_at_time_of_last_reset: u16,
    pub boot_config_start_block: u16,
    pub boot_config_size_blocks: u16,
    pub display_config_start_block: u32,
    pub display_config_length_blocks: u16,
    pub backup_display_config_start_block: u32,
    pub backup_display_config_length_blocks: u16,
    pub custom_otp_start_block: u16,
    pub custom_otp_length_blocks: u16,
}

impl BootInfo {
    pub const SIZE: usize = 32;

    pub fn parse(payload: &[u8]) -> Self {
        let b = clamp(payload, Self::SIZE);
        Self {
            version: b[0],
            status: b[1],
            asic_id: le16(&b, 2),
            write_block_size_words: b[4],
            erase_page_size_words: le16(&b, 5),
            max_write_payload_size: le16(&b, 7),
            last_reset_reason: b[9],
            pc_at_time_of_last_reset: le16(&b, 10),
            boot_config_start_block: le16(&b, 12),
            boot_config_size_blocks: le16(&b, 14),
            display_config_start_block: le32(&b, 16),
            display_config_length_blocks: le16(&b, 20),
            backup_display_config_start_block: le32(&b, 22),
            backup_display_config_length_blocks: le16(&b, 26),
            custom_otp_start_block: le16(&b, 28),
            custom_otp_length_blocks: le16(&b, 30),
        }
    }
}

impl fmt::Display for IdentifyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Identify version: {}", self.version)?;
        writeln!(f, "Mode:             {} (0x{:02X})", self.mode_name(), self.mode)?;
        writeln!(f, "Part number:      {}", self.part_number)?;
        writeln!(f, "Build ID:         {}", self.build_id)?;
        write!(f, "Max write size:   {}", self.max_write_size)
    }
}

impl fmt::Display for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "App info version: {}", self.version)?;
        writeln!(f, "Status:           0x{:04X}", self.status)?;
        writeln!(f, "Static config:    {} bytes", self.static_config_size)?;
        writeln!(f, "Dynamic config:   {} bytes", self.dynamic_config_size)?;
        writeln!(
            f,
            "App config:       block {}, {} blocks",
            self.app_config_start_block, self.app_config_size
        )?;
        writeln!(f, "Customer config:  {}", self.customer_config_id_hex())?;
        writeln!(f, "Max X x Y:        {} x {}", self.max_x, self.max_y)?;
        writeln!(f, "Max objects:      {}", self.max_objects)?;
        writeln!(f, "Buttons:          {}", self.num_of_buttons)?;
        writeln!(
            f,
            "Image rows x cols: {} x {}",
            self.num_of_image_rows, self.num_of_image_cols
        )?;
        write!(f, "Hybrid data:      {}", self.has_hybrid_data != 0)
    }
}

impl fmt::Display for BootInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Boot info version: {}", self.version)?;
        writeln!(f, "Status:            0x{:02X}", self.status)?;
        writeln!(f, "ASIC ID:           0x{:04X}", self.asic_id)?;
        writeln!(f, "Write block:       {} words", self.write_block_size_words)?;
        writeln!(f, "Erase page:        {} words", self.erase_page_size_words)?;
        writeln!(f, "Max write payload: {} bytes", self.max_write_payload_size)?;
        writeln!(
            f,
            "Last reset:        reason {}, pc 0x{:04X}",
            self.last_reset_reason, self.pc_at_time_of_last_reset
        )?;
        writeln!(
            f,
            "Boot config:       block {}, {} blocks",
            self.boot_config_start_block, self.boot_config_size_blocks
        )?;
        writeln!(
            f,
            "Display config:    block {}, {} blocks",
            self.display_config_start_block, self.display_config_length_blocks
        )?;
        writeln!(
            f,
            "Backup display:    block {}, {} blocks",
            self.backup_display_config_start_block, self.backup_display_config_length_blocks
        )?;
        write!(
            f,
            "Custom OTP:        block {}, {} blocks",
            self.custom_otp_start_block, self.custom_otp_length_blocks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_parse() {
        let mut p = vec![0u8; 24];
        p[0] = 2;
        p[1] = MODE_BOOTLOADER;
        p[2..8].copy_from_slice(b"s3706b");
        p[18..22].copy_from_slice(&7890u32.to_le_bytes());
        p[22..24].copy_from_slice(&256u16.to_le_bytes());
        let id = IdentifyInfo::parse(&p);
        assert_eq!(id.part_number, "s3706b");
        assert_eq!(id.build_id, 7890);
        assert_eq!(id.max_write_size, 256);
        assert!(id.in_bootloader());
        assert!(id.to_string().contains("bootloader"));
    }

    #[test]
    fn test_short_payload_zero_fills() {
        let id = IdentifyInfo::parse(&[2, MODE_APPLICATION, b'a']);
        assert_eq!(id.part_number, "a");
        assert_eq!(id.build_id, 0);
        assert_eq!(id.max_write_size, 0);

        let info = AppInfo::parse(&[1, 0]);
        assert_eq!(info.version, 1);
        assert_eq!(info.num_of_image_rows, 0);
    }

    #[test]
    fn test_app_info_parse() {
        let mut p = vec![0u8; 50];
        p[16..20].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        p[36..38].copy_from_slice(&10u16.to_le_bytes());
        p[40..42].copy_from_slice(&16u16.to_le_bytes());
        p[42..44].copy_from_slice(&24u16.to_le_bytes());
        let info = AppInfo::parse(&p);
        assert_eq!(info.max_objects, 10);
        assert_eq!((info.num_of_image_rows, info.num_of_image_cols), (16, 24));
        assert!(info.customer_config_id_hex().starts_with("deadbeef00"));
    }

    #[test]
    fn test_boot_info_parse() {
        let mut p = vec![0u8; 32];
        p[2..4].copy_from_slice(&0x3908u16.to_le_bytes());
        p[4] = 32;
        p[5..7].copy_from_slice(&16u16.to_le_bytes());
        p[7..9].copy_from_slice(&128u16.to_le_bytes());
        p[16..20].copy_from_slice(&0x1000u32.to_le_bytes());
        let info = BootInfo::parse(&p);
        assert_eq!(info.asic_id, 0x3908);
        assert_eq!(info.write_block_size_words, 32);
        assert_eq!(info.erase_page_size_words, 16);
        assert_eq!(info.max_write_payload_size, 128);
        assert_eq!(info.display_config_start_block, 0x1000);
    }
}
