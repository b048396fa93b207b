//! CLI command implementations
//!
//! Every command runs against the [`DeviceManager`](synadiag_session::DeviceManager)
//! session opened in `main`, so the same code serves RMI and TCM devices.

pub mod flash;
pub mod image;
pub mod info;
pub mod limits;
pub mod test;
pub mod touch;

mod list;

pub use list::list_devices;
