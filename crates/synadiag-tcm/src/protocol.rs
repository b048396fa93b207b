//! TCM protocol constants
//!
//! Commands are `[command, len_lo, len_hi, payload...]`. Responses and
//! reports share one header `[0xA5, code, len_lo, len_hi]`; a non-empty
//! payload follows as `[0xA5, 0x03, payload..., 0x5A]`.

/// Start of every header and payload frame
pub const MARKER: u8 = 0xA5;
/// Last byte of a payload frame
pub const END_MARKER: u8 = 0x5A;
/// Code byte of a payload frame
pub const CONTINUED_READ: u8 = 0x03;
/// Header size in bytes
pub const HEADER_SIZE: usize = 4;
/// Frame overhead around a payload (marker, code, end marker)
pub const FRAME_OVERHEAD: usize = 3;

/// Command codes
pub mod cmd {
    /// Continuation chunk of a long command
    pub const CONTINUE_WRITE: u8 = 0x01;
    /// Identify firmware and mode
    pub const IDENTIFY: u8 = 0x02;
    /// Firmware reset
    pub const RESET: u8 = 0x04;
    /// Enable a report code
    pub const ENABLE_REPORT: u8 = 0x05;
    /// Disable a report code
    pub const DISABLE_REPORT: u8 = 0x06;
    /// Bootloader information (bootloader mode)
    pub const GET_BOOT_INFO: u8 = 0x10;
    /// Erase flash pages (bootloader mode)
    pub const ERASE_FLASH: u8 = 0x11;
    /// Write flash words (bootloader mode)
    pub const WRITE_FLASH: u8 = 0x12;
    /// Read flash words (bootloader mode)
    pub const READ_FLASH: u8 = 0x13;
    /// Leave the bootloader for the application firmware
    pub const RUN_APPLICATION_FIRMWARE: u8 = 0x14;
    /// Enter the bootloader
    pub const RUN_BOOTLOADER_FIRMWARE: u8 = 0x1F;
    /// Application information
    pub const GET_APPLICATION_INFO: u8 = 0x20;
    /// Static configuration blob
    pub const GET_STATIC_CONFIG: u8 = 0x21;
    /// Read one dynamic configuration entry
    pub const GET_DYNAMIC_CONFIG: u8 = 0x23;
    /// Write one dynamic configuration entry
    pub const SET_DYNAMIC_CONFIG: u8 = 0x24;
    /// Touch report configuration program
    pub const GET_TOUCH_REPORT_CONFIG: u8 = 0x25;
    /// Re-zero the baseline
    pub const REZERO: u8 = 0x27;
    /// Run a production test
    pub const PRODUCTION_TEST: u8 = 0x2A;
}

/// Status codes
pub mod status {
    pub const IDLE: u8 = 0x00;
    pub const OK: u8 = 0x01;
    pub const BUSY: u8 = 0x02;
    pub const NOT_IMPLEMENTED: u8 = 0x0E;
    pub const ERROR: u8 = 0x0F;
}

/// Report codes; anything at or above [`report::FIRST`] is a report
pub mod report {
    pub const FIRST: u8 = 0x10;
    pub const IDENTIFY: u8 = 0x10;
    pub const TOUCH: u8 = 0x11;
    pub const DELTA: u8 = 0x12;
    pub const RAW: u8 = 0x13;
}

/// Dynamic configuration entry ids
pub mod dynamic_config {
    pub const NO_DOZE: u8 = 0x01;
    pub const INHIBIT_FREQUENCY_SHIFT: u8 = 0x03;
    pub const REQUESTED_FREQUENCY: u8 = 0x04;
}

/// Identify mode byte: application firmware
pub const MODE_APPLICATION: u8 = 0x01;
/// Identify mode byte: bootloader
pub const MODE_BOOTLOADER: u8 = 0x0B;
