//! synadiag-chardev - Linux character-device transport
//!
//! Synaptics touch drivers expose the controller to user space at
//! `/dev/rmiN` (RMI register file) or `/dev/tcmN` (TCM packet FIFO).
//! [`CharDevice`] implements [`synadiag_core::Transport`] over such a node.
//!
//! # Example
//!
//! ```no_run
//! use synadiag_chardev::CharDevice;
//! use synadiag_core::Transport;
//!
//! let mut dev = CharDevice::open("/dev/rmi0")?;
//! // F01 query base of a typical PDT lives on page 0
//! let status = dev.read_byte(0x0013)?;
//! println!("device status: 0x{:02X}", status);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - A kernel built with the Synaptics user-space interface driver
//! - Read/write access to the device node (udev rule or root)

pub mod device;
pub mod error;

pub use device::{find_device, protocol_for_path, CharDevice, DEFAULT_CANDIDATES};
pub use error::{CharDevError, Result};
