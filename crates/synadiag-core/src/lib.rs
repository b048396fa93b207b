//! synadiag-core - Shared types for Synaptics touch-controller diagnostics
//!
//! This crate holds everything the protocol engines have in common:
//!
//! - [`error`]: the error taxonomy and host status codes
//! - [`transport`]: the byte-stream [`Transport`](transport::Transport) trait
//!   implemented by the character-device backend and the emulators
//! - [`timing`]: poll budgets and the bounded poll helper
//! - [`bits`]: bit-field extraction over packed buffers
//! - [`image`]: capacitance images and landscape/portrait reshaping
//! - [`limits`]: scalar or per-cell limit vectors
//! - [`hires`]: the extended high-resistance correction math
//! - [`errlog`]: the bounded diagnostic message log
//! - [`controller`]: the [`TouchController`](controller::TouchController)
//!   trait both engines implement
//!
//! # Example
//!
//! ```
//! use synadiag_core::image::Image;
//! use synadiag_core::limits::{count_out_of_range, Limits};
//!
//! let img = Image::from_vec(2, 2, vec![10, 20, 30, 40])?;
//! let min = Limits::new("min", &[15], 4)?;
//! let max = Limits::new("max", &[35], 4)?;
//! assert_eq!(count_out_of_range(img.data(), &min, &max), 2);
//! # Ok::<(), synadiag_core::error::Error>(())
//! ```

pub mod bits;
pub mod controller;
pub mod errlog;
pub mod error;
pub mod hires;
pub mod image;
pub mod limits;
pub mod timing;
pub mod transport;

pub use controller::{Geometry, Protocol, RawDirection, StreamOptions, TouchController, TouchPoint};
pub use error::{Error, Result};
pub use transport::Transport;
