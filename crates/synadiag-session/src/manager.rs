//! The device manager
//!
//! [`DeviceManager`] owns at most one open controller and forwards every
//! host call to it. Failed calls are recorded in the session's
//! [`ErrorLog`], which is cleared when a device is opened.

use crate::config::SessionConfig;
use crate::listener::{FingerState, TouchListener};
use crate::opener::{protocol_for_device, DeviceOpener, SystemOpener};
use std::sync::{Mutex, MutexGuard};
use synadiag_core::errlog::ErrorLog;
use synadiag_core::hires::{HighResistanceLimits, HighResistanceReport};
use synadiag_core::image::Image;
use synadiag_core::{
    Error, Geometry, Protocol, RawDirection, Result, StreamOptions, TouchController, TouchPoint,
};

struct ActiveDevice {
    path: String,
    protocol: Protocol,
    controller: Box<dyn TouchController>,
}

pub struct DeviceManager {
    config: SessionConfig,
    opener: Box<dyn DeviceOpener>,
    selected: Option<(String, Protocol)>,
    active: Option<ActiveDevice>,
    errors: ErrorLog,
    fingers: FingerState,
}

impl DeviceManager {
    /// Manager over the backends compiled into this build
    pub fn new(config: SessionConfig) -> Self {
        Self::with_opener(config, Box::new(SystemOpener))
    }

    pub fn with_opener(config: SessionConfig, opener: Box<dyn DeviceOpener>) -> Self {
        Self {
            config,
            opener,
            selected: None,
            active: None,
            errors: ErrorLog::new(),
            fingers: FingerState::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Path and protocol of the open device
    pub fn current(&self) -> Option<(&str, Protocol)> {
        self.active.as_ref().map(|a| (a.path.as_str(), a.protocol))
    }

    fn record<R>(&mut self, what: &str, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.errors.add_error_msg(format!("{}: {}", what, e));
        }
        result
    }

    /// Run `f` on the open controller, logging a failure
    fn dispatch<R>(
        &mut self,
        what: &str,
        f: impl FnOnce(&mut dyn TouchController) -> Result<R>,
    ) -> Result<R> {
        let result = match self.active.as_mut() {
            Some(active) => f(active.controller.as_mut()),
            None => Err(Error::NotOpen),
        };
        self.record(what, result)
    }

    /// First configured candidate that exists, with its implied protocol
    pub fn find_device(&mut self) -> Result<(String, Option<Protocol>)> {
        let found = self
            .opener
            .find(&self.config.candidates)
            .map(|path| {
                let protocol = protocol_for_device(&path);
                (path, protocol)
            })
            .ok_or_else(|| Error::DeviceNotFound(self.config.candidates.join(", ")));
        if let Ok((path, protocol)) = &found {
            log::info!("Found {} ({:?})", path, protocol);
        }
        self.record("find_device", found)
    }

    /// Choose the protocol for the next `open_device(path)`
    pub fn set_device(&mut self, path: &str, is_rmi: bool, is_tcm: bool) -> Result<()> {
        let protocol = match (is_rmi, is_tcm) {
            (true, false) => Ok(Protocol::Rmi),
            (false, true) => Ok(Protocol::Tcm),
            _ => Err(Error::invalid("exactly one of RMI and TCM must be selected")),
        };
        let protocol = self.record("set_device", protocol)?;
        log::debug!("{} selected as {}", path, protocol);
        self.selected = Some((path.to_string(), protocol));
        Ok(())
    }

    /// Open `path`; a no-op when it is already the open device
    pub fn open_device(&mut self, path: &str) -> Result<Protocol> {
        if let Some(active) = &self.active {
            if active.path == path {
                log::debug!("{} already open", path);
                return Ok(active.protocol);
            }
            let other = active.path.clone();
            log::info!("Closing {} before opening {}", other, path);
            self.close_device(&other)?;
        }

        self.errors.clear_all_error_msg();
        self.fingers.clear();

        let protocol = match &self.selected {
            Some((selected, protocol)) if selected == path => Some(*protocol),
            _ => protocol_for_device(path),
        };
        let Some(protocol) = protocol else {
            return self.record(
                "open_device",
                Err(Error::invalid(format!(
                    "cannot tell the protocol of {}; select it with set_device",
                    path
                ))),
            );
        };

        let opened = self.opener.open(path, protocol, &self.config);
        let controller = self.record("open_device", opened)?;
        log::info!("Opened {} device {}", protocol, path);
        self.active = Some(ActiveDevice {
            path: path.to_string(),
            protocol,
            controller,
        });
        Ok(protocol)
    }

    /// Close `path`; a no-op when nothing is open
    pub fn close_device(&mut self, path: &str) -> Result<()> {
        let Some(active) = self.active.as_ref() else {
            return Ok(());
        };
        if active.path != path {
            let err = Error::invalid(format!("{} is not open (open device is {})", path, active.path));
            return self.record("close_device", Err(err));
        }

        let result = self.active.take().map_or(Ok(()), |mut active| {
            log::info!("Closing {}", active.path);
            active.controller.close()
        });
        self.fingers.clear();
        self.record("close_device", result)
    }

    /// Close whatever is open
    pub fn close(&mut self) -> Result<()> {
        match self.active.as_ref().map(|a| a.path.clone()) {
            Some(path) => self.close_device(&path),
            None => Ok(()),
        }
    }

    pub fn identify(&mut self) -> Result<String> {
        self.dispatch("identify", |c| c.identify())
    }

    pub fn firmware_id(&mut self) -> Result<u32> {
        self.dispatch("firmware_id", |c| Ok(c.firmware_id()))
    }

    pub fn config_id(&mut self) -> Result<String> {
        self.dispatch("config_id", |c| Ok(c.config_id()))
    }

    pub fn device_id(&mut self) -> Result<String> {
        self.dispatch("device_id", |c| Ok(c.device_id()))
    }

    pub fn image_rows(&mut self, landscape: bool) -> Result<usize> {
        self.dispatch("image_rows", |c| Ok(c.image_rows(landscape)))
    }

    pub fn image_cols(&mut self, landscape: bool) -> Result<usize> {
        self.dispatch("image_cols", |c| Ok(c.image_cols(landscape)))
    }

    pub fn button_count(&mut self) -> Result<usize> {
        self.dispatch("button_count", |c| Ok(c.button_count()))
    }

    pub fn max_objects(&mut self) -> Result<usize> {
        self.dispatch("max_objects", |c| Ok(c.max_objects()))
    }

    pub fn start_report_stream(
        &mut self,
        report_type: u8,
        enable_touch: bool,
        no_sleep: bool,
        rezero: bool,
    ) -> Result<()> {
        let mut options = StreamOptions::empty();
        options.set(StreamOptions::ENABLE_TOUCH, enable_touch);
        options.set(StreamOptions::NO_SLEEP, no_sleep);
        options.set(StreamOptions::REZERO, rezero);
        self.dispatch("start_report_stream", |c| {
            c.start_report_stream(report_type, options)
        })
    }

    pub fn stop_report_stream(&mut self, report_type: u8) -> Result<()> {
        self.dispatch("stop_report_stream", |c| c.stop_report_stream(report_type))
    }

    /// Capture one report image into `out`
    ///
    /// `cols` and `rows` must match the device's view for `landscape` and
    /// `out` must hold exactly `rows * cols` values.
    pub fn read_report_image(
        &mut self,
        report_type: u8,
        out: &mut [i32],
        cols: usize,
        rows: usize,
        landscape: bool,
    ) -> Result<()> {
        self.dispatch("read_report_image", |c| {
            let expected = (c.image_rows(landscape), c.image_cols(landscape));
            if (rows, cols) != expected || out.len() != rows * cols {
                return Err(Error::invalid(format!(
                    "image buffer {}x{} ({} values), device image is {}x{}",
                    rows,
                    cols,
                    out.len(),
                    expected.0,
                    expected.1
                )));
            }
            let img = c.read_report_image(report_type, landscape)?;
            out.copy_from_slice(img.data());
            Ok(())
        })
    }

    /// Capture one report image
    pub fn report_image(&mut self, report_type: u8, landscape: bool) -> Result<Image> {
        self.dispatch("read_report_image", |c| {
            c.read_report_image(report_type, landscape)
        })
    }

    pub fn run_production_test(
        &mut self,
        test_id: u32,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        self.dispatch("run_production_test", |c| {
            c.run_production_test(test_id, result, limits_1, limits_2, geometry)
        })
    }

    pub fn test_result_len(&mut self, test_id: u32) -> Result<usize> {
        self.dispatch("test_result_len", |c| c.test_result_len(test_id))
    }

    pub fn run_extended_high_resistance(
        &mut self,
        reference: &Image,
        limits: &HighResistanceLimits,
    ) -> Result<HighResistanceReport> {
        self.dispatch("run_extended_high_resistance", |c| {
            c.run_extended_high_resistance(reference, limits)
        })
    }

    pub fn run_extended_trx_short(
        &mut self,
        result: &mut [i32],
        limits: &[i32],
        extended_limits: &[i32],
    ) -> Result<usize> {
        self.dispatch("run_extended_trx_short", |c| {
            c.run_extended_trx_short(result, limits, extended_limits)
        })
    }

    pub fn firmware_config_size(&mut self) -> Result<usize> {
        self.dispatch("firmware_config_size", |c| c.firmware_config_size())
    }

    pub fn firmware_config(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.dispatch("firmware_config", |c| c.firmware_config(buf))
    }

    pub fn run_raw_command(
        &mut self,
        direction: RawDirection,
        addr_or_cmd: u16,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize> {
        self.dispatch("run_raw_command", |c| {
            c.raw_command(direction, addr_or_cmd, input, output)
        })
    }

    /// Read one touch frame and report finger edges to `listener`
    ///
    /// Returns the active objects of the frame.
    pub fn query_touch_response(
        &mut self,
        max_fingers: usize,
        listener: &mut dyn TouchListener,
    ) -> Result<Vec<TouchPoint>> {
        let points = self.dispatch("query_touch_response", |c| c.read_touch(max_fingers))?;
        self.fingers.update(&points, listener);
        Ok(points.into_iter().filter(TouchPoint::is_active).collect())
    }

    pub fn set_gear(&mut self, gear: u8) -> Result<()> {
        self.dispatch("set_gear", |c| c.set_gear(gear))
    }

    pub fn reset(&mut self) -> Result<()> {
        self.fingers.clear();
        self.dispatch("reset", |c| c.reset())
    }

    pub fn flash_block_size(&mut self) -> Result<usize> {
        self.dispatch("flash_block_size", |c| c.flash_block_size())
    }

    pub fn flash_read(&mut self, block: u32, buf: &mut [u8]) -> Result<usize> {
        self.dispatch("flash_read", |c| c.flash_read(block, buf))
    }

    pub fn flash_write(&mut self, block: u32, data: &[u8]) -> Result<()> {
        self.dispatch("flash_write", |c| c.flash_write(block, data))
    }

    pub fn flash_erase(&mut self, block: u32, count: u32, wide_format: bool) -> Result<()> {
        self.dispatch("flash_erase", |c| c.flash_erase(block, count, wide_format))
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close device: {}", e);
        }
    }
}

/// A [`DeviceManager`] shared between threads
///
/// Every call holds the lock for its whole duration, so operations from
/// different threads never interleave on the device.
pub struct SharedDeviceManager {
    inner: Mutex<DeviceManager>,
}

impl SharedDeviceManager {
    pub fn new(manager: DeviceManager) -> Self {
        Self {
            inner: Mutex::new(manager),
        }
    }

    /// Lock the manager
    ///
    /// A panic in another holder does not leave the device state torn, so a
    /// poisoned lock is taken over.
    pub fn lock(&self) -> MutexGuard<'_, DeviceManager> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn into_inner(self) -> DeviceManager {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
