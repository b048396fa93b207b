//! synadiag-tcm - Packet engine for Synaptics TCM controllers
//!
//! TCM controllers talk in framed messages over a byte FIFO. Every command
//! is answered by a status message, and the firmware pushes reports
//! (identify, touch, delta, raw) on its own once they are enabled:
//!
//! - [`protocol`]: command, status and report codes
//! - [`message`]: framing, command chunking and response polling
//! - [`info`]: identify, application info and boot info
//! - [`touch`]: touch report config compiler and interpreter
//! - [`pins`]: pin tables from the static config
//! - [`flash`]: bootloader flash read, write and erase
//! - [`prodtest`]: production tests
//! - [`device`]: [`TcmDevice`], the [`TouchController`](synadiag_core::TouchController)
//!   implementation
//!
//! # Example
//!
//! ```ignore
//! use synadiag_core::timing::TimingPolicy;
//! use synadiag_tcm::{TcmDevice, TcmOptions};
//!
//! let transport = synadiag_chardev::CharDevice::open("/dev/tcm0")?;
//! let mut dev = TcmDevice::open(transport, TimingPolicy::default(), TcmOptions::default())?;
//! println!("{}", dev.identify()?);
//! ```

pub mod config;
pub mod device;
pub mod flash;
pub mod info;
pub mod message;
pub mod pins;
pub mod prodtest;
pub mod protocol;
pub mod touch;

pub use config::{StaticConfigLayout, TcmOptions};
pub use device::{ReportSet, TcmDevice};
pub use info::{AppInfo, BootInfo, IdentifyInfo};
pub use touch::{TouchConfig, TouchReport};
