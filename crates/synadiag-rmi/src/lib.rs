//! synadiag-rmi - Register-mapped engine for Synaptics RMI controllers
//!
//! RMI controllers expose numbered function blocks through a page
//! descriptor table. This crate scans that table, parses the blocks the
//! diagnostics need and drives the F54 analog reports used by the
//! production tests:
//!
//! - [`pdt`]: page descriptor table scan
//! - [`registers`]: F01, F12, F1A, F34, F54 and F55 register layouts
//! - [`command`]: F54 command issue and completion polling
//! - [`report`]: report sizing, capture and decoding
//! - [`calibration`]: capture preparation and gear selection
//! - [`touch`]: F12 finger record decoding
//! - [`prodtest`]: production and extended tests
//! - [`device`]: [`RmiDevice`], the [`TouchController`](synadiag_core::TouchController)
//!   implementation
//!
//! # Example
//!
//! ```ignore
//! use synadiag_core::timing::TimingPolicy;
//! use synadiag_rmi::{RmiDevice, RmiTestConfig};
//!
//! let transport = synadiag_chardev::CharDevice::open("/dev/rmi0")?;
//! let mut dev = RmiDevice::open(transport, TimingPolicy::default(), RmiTestConfig::default())?;
//! println!("{}", dev.identify()?);
//! ```

pub mod calibration;
pub mod command;
pub mod config;
pub mod device;
pub mod pdt;
pub mod prodtest;
pub mod registers;
pub mod report;
pub mod touch;

pub use config::RmiTestConfig;
pub use device::{Functions, RmiDevice, RmiState};
