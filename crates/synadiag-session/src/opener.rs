//! Device opening by name
//!
//! A device name is a path (`/dev/rmi0`) or an emulator (`dummy-rmi`,
//! `dummy-tcm`), optionally followed by `:key=value,...` parameters.

use crate::config::SessionConfig;
use std::collections::HashMap;
use synadiag_core::{Error, Protocol, Result, TouchController};

/// Parsed device name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceParams {
    /// Path or emulator name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl DeviceParams {
    /// Parse `name` or `name:key1=value1,key2=value2`
    pub fn parse(s: &str) -> Result<Self> {
        let (name, opts) = s.split_once(':').unwrap_or((s, ""));

        let mut params = HashMap::new();
        if !opts.is_empty() {
            for opt in opts.split(',') {
                let (key, value) = opt.split_once('=').ok_or_else(|| {
                    Error::invalid(format!(
                        "Invalid parameter format: '{}' (expected key=value)",
                        opt
                    ))
                })?;
                params.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    /// Numeric parameter `key`, if given
    pub fn get_number<N: std::str::FromStr>(&self, key: &str) -> Result<Option<N>> {
        match self.params.get(key) {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| Error::invalid(format!("Invalid value for {}: '{}'", key, v))),
            None => Ok(None),
        }
    }
}

/// Protocol implied by a device name: the emulator name or the node name
pub fn protocol_for_device(device: &str) -> Option<Protocol> {
    let name = device.split_once(':').map_or(device, |(n, _)| n);
    match name {
        "dummy-rmi" => return Some(Protocol::Rmi),
        "dummy-tcm" => return Some(Protocol::Tcm),
        _ => {}
    }
    Protocol::from_node_path(name)
}

/// Creates controllers for the device manager
pub trait DeviceOpener: Send {
    /// Open `device` and bring up the `protocol` engine on it
    fn open(
        &mut self,
        device: &str,
        protocol: Protocol,
        config: &SessionConfig,
    ) -> Result<Box<dyn TouchController>>;

    /// Whether `device` is present
    fn exists(&self, device: &str) -> bool;

    /// First present device among `candidates`
    fn find(&self, candidates: &[String]) -> Option<String> {
        candidates.iter().find(|c| self.exists(c)).cloned()
    }
}

/// Opens the backends compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl DeviceOpener for SystemOpener {
    fn open(
        &mut self,
        device: &str,
        protocol: Protocol,
        config: &SessionConfig,
    ) -> Result<Box<dyn TouchController>> {
        let params = DeviceParams::parse(device)?;
        match (params.name.as_str(), protocol) {
            #[cfg(all(feature = "dummy", feature = "rmi"))]
            ("dummy-rmi", Protocol::Rmi) => open_dummy_rmi(&params, config),

            #[cfg(all(feature = "dummy", feature = "tcm"))]
            ("dummy-tcm", Protocol::Tcm) => open_dummy_tcm(&params, config),

            ("dummy-rmi" | "dummy-tcm", _) => Err(Error::invalid(format!(
                "{} cannot speak {}",
                params.name, protocol
            ))),

            #[cfg(feature = "chardev")]
            (path, protocol) => open_chardev(path, protocol, config),

            #[cfg(not(feature = "chardev"))]
            (path, _) => Err(Error::DeviceNotFound(format!(
                "{} (character devices not supported in this build)",
                path
            ))),
        }
    }

    fn exists(&self, device: &str) -> bool {
        let name = device.split_once(':').map_or(device, |(n, _)| n);
        if matches!(name, "dummy-rmi" | "dummy-tcm") {
            return cfg!(feature = "dummy");
        }
        #[cfg(feature = "chardev")]
        {
            synadiag_chardev::find_device(&[name]).is_some()
        }
        #[cfg(not(feature = "chardev"))]
        {
            false
        }
    }
}

#[cfg(feature = "chardev")]
fn open_chardev(
    path: &str,
    protocol: Protocol,
    config: &SessionConfig,
) -> Result<Box<dyn TouchController>> {
    log::info!("Opening {} device {}...", protocol, path);
    let transport = synadiag_chardev::CharDevice::open(path)?;

    match protocol {
        #[cfg(feature = "rmi")]
        Protocol::Rmi => Ok(Box::new(synadiag_rmi::RmiDevice::open(
            transport,
            config.timing,
            config.rmi,
        )?)),

        #[cfg(feature = "tcm")]
        Protocol::Tcm => Ok(Box::new(synadiag_tcm::TcmDevice::open(
            transport,
            config.timing,
            config.tcm,
        )?)),

        #[allow(unreachable_patterns)]
        _ => {
            let _ = (transport, config);
            Err(Error::Unsupported(format!(
                "{} support not compiled in",
                protocol
            )))
        }
    }
}

#[cfg(all(feature = "dummy", feature = "rmi"))]
fn open_dummy_rmi(params: &DeviceParams, config: &SessionConfig) -> Result<Box<dyn TouchController>> {
    use synadiag_dummy::{DummyRmi, DummyRmiConfig};

    let mut dummy = DummyRmiConfig::default();
    if let Some(buttons) = params.get_number::<u8>("buttons")? {
        dummy.buttons = (buttons > 0).then_some(buttons);
    }
    log::info!("Opening RMI emulator...");
    Ok(Box::new(synadiag_rmi::RmiDevice::open(
        DummyRmi::with_config(dummy),
        config.timing,
        config.rmi,
    )?))
}

#[cfg(all(feature = "dummy", feature = "tcm"))]
fn open_dummy_tcm(params: &DeviceParams, config: &SessionConfig) -> Result<Box<dyn TouchController>> {
    use synadiag_dummy::{DummyTcm, DummyTcmConfig};

    let mut dummy = DummyTcmConfig::default();
    if let Some(rows) = params.get_number::<u16>("rows")? {
        dummy.rows = rows;
    }
    if let Some(cols) = params.get_number::<u16>("cols")? {
        dummy.cols = cols;
    }
    if let Some(bl) = params.get_number::<u8>("bootloader")? {
        dummy.start_in_bootloader = bl != 0;
    }
    log::info!("Opening TCM emulator ({} x {})...", dummy.rows, dummy.cols);
    Ok(Box::new(synadiag_tcm::TcmDevice::open(
        DummyTcm::with_config(dummy),
        config.timing,
        config.tcm,
    )?))
}

/// Information about a device kind
pub struct DeviceInfo {
    /// Name or path pattern
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Device kinds available in this build
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    #[cfg(feature = "chardev")]
    devices.push(DeviceInfo {
        name: "/dev/rmiN, /dev/tcmN",
        description: "Kernel character device (protocol from the node name)",
    });

    #[cfg(all(feature = "dummy", feature = "rmi"))]
    devices.push(DeviceInfo {
        name: "dummy-rmi",
        description: "In-memory RMI controller (buttons=<n>)",
    });

    #[cfg(all(feature = "dummy", feature = "tcm"))]
    devices.push(DeviceInfo {
        name: "dummy-tcm",
        description: "In-memory TCM controller (rows=<n>,cols=<n>,bootloader=<0|1>)",
    });

    devices
}
