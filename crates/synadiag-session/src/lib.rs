//! synadiag-session - One device session over the RMI and TCM engines
//!
//! The host never sees the protocol engines. It opens a device by name
//! through [`DeviceManager`] and every call is forwarded to the active
//! [`TouchController`](synadiag_core::TouchController):
//!
//! ```text
//!   host / CLI
//!       │
//!       ▼
//!   DeviceManager ── DeviceOpener ──► CharDevice / DummyRmi / DummyTcm
//!       │
//!       ▼
//!   Box<dyn TouchController>  (RmiDevice or TcmDevice)
//! ```
//!
//! # Example
//!
//! ```
//! use synadiag_session::{DeviceManager, SessionConfig};
//!
//! let mut mgr = DeviceManager::new(SessionConfig::default());
//! # #[cfg(all(feature = "dummy", feature = "rmi"))]
//! # {
//! mgr.open_device("dummy-rmi")?;
//! println!("{}", mgr.identify()?);
//! mgr.close_device("dummy-rmi")?;
//! # }
//! # Ok::<(), synadiag_core::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod opener;

pub use config::SessionConfig;
pub use error::ConfigError;
pub use listener::TouchListener;
pub use manager::{DeviceManager, SharedDeviceManager};
pub use opener::{available_devices, protocol_for_device, DeviceInfo, DeviceOpener, DeviceParams, SystemOpener};
