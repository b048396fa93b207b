//! Uniform controller interface
//!
//! The RMI and TCM engines each implement [`TouchController`]. The device
//! manager holds one boxed instance and dispatches every host call through
//! it.

use crate::error::{Error, Result};
use crate::hires::{HighResistanceLimits, HighResistanceReport};
use crate::image::Image;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Wire protocol spoken by a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Rmi,
    Tcm,
}

impl Protocol {
    /// Protocol implied by a device node name (`rmi*` or `tcm*`)
    pub fn from_node_path(path: &str) -> Option<Self> {
        let name = Path::new(path).file_name()?.to_str()?;
        if name.starts_with("rmi") {
            Some(Self::Rmi)
        } else if name.starts_with("tcm") {
            Some(Self::Tcm)
        } else {
            None
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rmi => write!(f, "RMI"),
            Self::Tcm => write!(f, "TCM"),
        }
    }
}

bitflags! {
    /// Options for [`TouchController::start_report_stream`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamOptions: u8 {
        /// Keep touch reporting enabled while streaming
        const ENABLE_TOUCH = 1 << 0;
        /// Keep the controller out of doze/sleep
        const NO_SLEEP = 1 << 1;
        /// Rezero the baseline before streaming
        const REZERO = 1 << 2;
    }
}

/// One reported object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchPoint {
    /// Object slot index
    pub index: u8,
    /// Classification code (0 = no object)
    pub classification: u8,
    pub x: u32,
    pub y: u32,
    /// Pressure / signal strength
    pub z: u32,
    pub x_width: u32,
    pub y_width: u32,
    /// Firmware timestamp when the report carries one
    pub timestamp: u32,
}

impl TouchPoint {
    pub fn is_active(&self) -> bool {
        self.classification != 0
    }
}

/// Shape the caller expects a production test result to have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: usize,
    pub cols: usize,
}

impl Geometry {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }
}

/// Direction of a raw escape-hatch transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDirection {
    Read,
    Write,
}

/// Operations common to both protocol engines
pub trait TouchController: Send {
    /// Active protocol
    fn protocol(&self) -> Protocol;

    /// Human-readable identification report
    fn identify(&mut self) -> Result<String>;

    /// Firmware build id
    fn firmware_id(&self) -> u32;

    /// Configuration id rendered as hex
    fn config_id(&self) -> String;

    /// Product / part number string
    fn device_id(&self) -> String;

    /// Image rows in the requested orientation
    fn image_rows(&self, landscape: bool) -> usize;

    /// Image columns in the requested orientation
    fn image_cols(&self, landscape: bool) -> usize;

    /// Number of 0D buttons
    fn button_count(&self) -> usize;

    /// Maximum number of reported objects
    fn max_objects(&self) -> usize;

    /// Prepare the controller for continuous report capture
    fn start_report_stream(&mut self, report_type: u8, options: StreamOptions) -> Result<()>;

    /// Undo [`TouchController::start_report_stream`]
    fn stop_report_stream(&mut self, report_type: u8) -> Result<()>;

    /// Capture one image of `report_type`
    fn read_report_image(&mut self, report_type: u8, landscape: bool) -> Result<Image>;

    /// Run a production test
    ///
    /// Fills `result` and returns the number of failing cells (or frames,
    /// for the frame-based noise test).
    fn run_production_test(
        &mut self,
        test_id: u32,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize>;

    /// Number of result values `test_id` fills
    fn test_result_len(&mut self, test_id: u32) -> Result<usize>;

    /// Extended high-resistance test against a caller reference image
    fn run_extended_high_resistance(
        &mut self,
        reference: &Image,
        limits: &HighResistanceLimits,
    ) -> Result<HighResistanceReport>;

    /// TRX short test with image-based confirmation of the extended pins
    fn run_extended_trx_short(
        &mut self,
        result: &mut [i32],
        limits: &[i32],
        extended_limits: &[i32],
    ) -> Result<usize>;

    /// Size of the firmware configuration blob
    fn firmware_config_size(&mut self) -> Result<usize>;

    /// Read the firmware configuration blob, returning bytes copied
    fn firmware_config(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Raw register (RMI) or packet (TCM) access
    fn raw_command(
        &mut self,
        direction: RawDirection,
        addr_or_cmd: u16,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize>;

    /// Read the current touch frame
    fn read_touch(&mut self, max_fingers: usize) -> Result<Vec<TouchPoint>>;

    /// Select sensing-frequency gear
    fn set_gear(&mut self, gear: u8) -> Result<()>;

    /// Soft reset and re-read descriptors
    fn reset(&mut self) -> Result<()>;

    /// Return the controller to normal operation before the handle is dropped
    fn close(&mut self) -> Result<()>;

    /// Bytes per flash block
    fn flash_block_size(&mut self) -> Result<usize> {
        Err(Error::Unsupported(format!(
            "flash access on {}",
            self.protocol()
        )))
    }

    /// Read flash starting at `block`
    fn flash_read(&mut self, _block: u32, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::Unsupported(format!(
            "flash read on {}",
            self.protocol()
        )))
    }

    /// Program flash starting at `block`
    fn flash_write(&mut self, _block: u32, _data: &[u8]) -> Result<()> {
        Err(Error::Unsupported(format!(
            "flash write on {}",
            self.protocol()
        )))
    }

    /// Erase `count` blocks starting at `block`
    fn flash_erase(&mut self, _block: u32, _count: u32, _wide_format: bool) -> Result<()> {
        Err(Error::Unsupported(format!(
            "flash erase on {}",
            self.protocol()
        )))
    }
}
