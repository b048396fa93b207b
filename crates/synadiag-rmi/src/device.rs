//! RMI controller handle
//!
//! [`RmiDevice`] owns the transport and the parsed function blocks. The
//! production tests live in [`crate::prodtest`] as a second impl block.

use crate::calibration;
use crate::command::force_cal;
use crate::config::RmiTestConfig;
use crate::pdt::{function, PageDescriptorTable};
use crate::registers::f01::F01Info;
use crate::registers::f12::F12Info;
use crate::registers::f1a::F1aInfo;
use crate::registers::f34::F34Info;
use crate::registers::f54::F54Info;
use crate::registers::f55::F55Info;
use crate::report;
use crate::touch::FingerTracker;
use synadiag_core::hires::{HighResistanceLimits, HighResistanceReport};
use synadiag_core::image::{oriented_cols, oriented_rows, Image};
use synadiag_core::timing::TimingPolicy;
use synadiag_core::{
    Error, Geometry, Protocol, RawDirection, Result, StreamOptions, TouchController, TouchPoint,
    Transport,
};

/// Descriptor scan progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmiState {
    Unscanned,
    Scanning,
    Parsed,
}

/// Every function block found by a scan
#[derive(Debug, Clone)]
pub struct Functions {
    pub pdt: PageDescriptorTable,
    pub f01: F01Info,
    pub f12: F12Info,
    pub f54: F54Info,
    pub f55: Option<F55Info>,
    pub f1a: Option<F1aInfo>,
    pub f34: Option<F34Info>,
}

impl Functions {
    /// Scan the PDT and parse F34, F01, F12, F54, F55 and F1A in that order
    pub fn scan<T: Transport + ?Sized>(t: &mut T) -> Result<Self> {
        let pdt = PageDescriptorTable::scan(t)?;

        let f34 = match pdt.get(function::F34) {
            Some(fd) => Some(F34Info::parse(t, *fd)?),
            None => {
                log::warn!("F34 not found, config id unavailable");
                None
            }
        };
        let f01 = F01Info::parse(t, *pdt.require(function::F01)?)?;
        let f12 = F12Info::parse(t, *pdt.require(function::F12)?)?;
        let f54 = F54Info::parse(t, *pdt.require(function::F54)?)?;
        let f55 = match pdt.get(function::F55) {
            Some(fd) => Some(F55Info::parse(t, *fd)?),
            None => {
                log::warn!("F55 not found, pin tables unavailable");
                None
            }
        };
        let f1a = pdt
            .get(function::F1A)
            .map(|fd| F1aInfo::parse(t, *fd))
            .transpose()?;

        Ok(Self {
            pdt,
            f01,
            f12,
            f54,
            f55,
            f1a,
            f34,
        })
    }

    /// Image dimensions as (tx, rx)
    ///
    /// F55 assigned channel counts win over the F54 totals.
    pub fn dims(&self) -> (usize, usize) {
        match &self.f55 {
            Some(f55) if f55.tx_assigned > 0 && f55.rx_assigned > 0 => {
                (f55.tx_assigned, f55.rx_assigned)
            }
            _ => (
                self.f54.query.num_tx() as usize,
                self.f54.query.num_rx() as usize,
            ),
        }
    }
}

/// When the test wrapper resets the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResetPolicy {
    Always,
    OnError,
}

/// An RMI touch controller
pub struct RmiDevice<T> {
    pub(crate) transport: T,
    pub(crate) timing: TimingPolicy,
    pub(crate) tests: RmiTestConfig,
    pub(crate) state: RmiState,
    pub(crate) funcs: Option<Functions>,
    pub(crate) fingers: FingerTracker,
    pub(crate) stream_prepared: bool,
}

impl<T: Transport> RmiDevice<T> {
    /// Wrap a transport without touching the device
    pub fn new(transport: T, timing: TimingPolicy, tests: RmiTestConfig) -> Self {
        Self {
            transport,
            timing,
            tests,
            state: RmiState::Unscanned,
            funcs: None,
            fingers: FingerTracker::default(),
            stream_prepared: false,
        }
    }

    /// Wrap a transport and scan the device
    pub fn open(transport: T, timing: TimingPolicy, tests: RmiTestConfig) -> Result<Self> {
        let mut dev = Self::new(transport, timing, tests);
        dev.scan()?;
        Ok(dev)
    }

    /// (Re)scan the PDT and parse every function
    pub fn scan(&mut self) -> Result<()> {
        self.state = RmiState::Scanning;
        match Functions::scan(&mut self.transport) {
            Ok(funcs) => {
                self.funcs = Some(funcs);
                self.state = RmiState::Parsed;
                Ok(())
            }
            Err(e) => {
                self.funcs = None;
                self.state = RmiState::Unscanned;
                Err(e)
            }
        }
    }

    pub fn state(&self) -> RmiState {
        self.state
    }

    pub fn functions(&self) -> Result<&Functions> {
        self.funcs.as_ref().ok_or(Error::NotOpen)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Transport and parsed functions, borrowed together
    pub(crate) fn parts(&mut self) -> Result<(&mut T, &Functions)> {
        let funcs = self.funcs.as_ref().ok_or(Error::NotOpen)?;
        Ok((&mut self.transport, funcs))
    }

    /// (tx, rx) image dimensions, zero before a scan
    pub fn dims(&self) -> (usize, usize) {
        self.funcs.as_ref().map_or((0, 0), Functions::dims)
    }

    /// F01 soft reset, settle, rescan
    pub fn soft_reset(&mut self) -> Result<()> {
        let settle = self.timing.rmi_reset_settle_ms;
        let (t, f) = self.parts()?;
        f.f01.reset(t)?;
        t.delay_ms(settle);
        self.scan()
    }

    /// Run `f`, then reset according to `policy`
    ///
    /// A reset failure after a successful test is returned; after a failed
    /// test it is logged and the test error wins.
    pub(crate) fn with_reset<R>(
        &mut self,
        policy: ResetPolicy,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let result = f(self);
        if policy == ResetPolicy::Always || result.is_err() {
            if let Err(e) = self.soft_reset() {
                if result.is_ok() {
                    return Err(e);
                }
                log::warn!("Reset after failed test also failed: {}", e);
            }
        }
        result
    }

    /// Capture `rt` in firmware order
    pub fn read_report(&mut self, rt: u8) -> Result<Image> {
        let timing = self.timing;
        let (tx, rx) = self.dims();
        let (t, f) = self.parts()?;
        report::read_report(t, &f.f54, &timing, rt, tx, rx)
    }

    /// Run the capture preparation owed by `rt`
    pub(crate) fn prepare(&mut self, rt: u8) -> Result<bool> {
        let timing = self.timing;
        let (t, f) = self.parts()?;
        calibration::prepare(t, &f.f54, &timing, rt)
    }

    fn set_streaming(&mut self, no_sleep: bool, touch_irq: bool) -> Result<()> {
        let (t, f) = self.parts()?;
        f.f01.set_no_sleep(t, no_sleep)?;
        f.f01.set_interrupts(
            t,
            f.f12.fd.interrupt_mask(),
            touch_irq,
            f.pdt.interrupt_sources(),
        )
    }
}

impl<T: Transport + Send> TouchController for RmiDevice<T> {
    fn protocol(&self) -> Protocol {
        Protocol::Rmi
    }

    fn identify(&mut self) -> Result<String> {
        let (tx, rx) = self.dims();
        let f = self.functions()?;
        let names: Vec<String> = f
            .pdt
            .functions()
            .iter()
            .map(|fd| format!("F{:02X}", fd.number))
            .collect();
        let lines = [
            "Protocol:        RMI".to_string(),
            format!("Product ID:      {}", f.f01.product_id),
            format!("Manufacturer ID: 0x{:02X}", f.f01.manufacturer_id),
            format!("ASIC ID:         0x{:02X}", f.f01.asic_id),
            format!("Firmware build:  {}", f.f01.build_id),
            format!("Config ID:       {}", self.config_id()),
            format!("TX x RX:         {} x {}", tx, rx),
            format!("Max X x Y:       {} x {}", f.f12.tuning.max_x, f.f12.tuning.max_y),
            format!("Max objects:     {}", f.f12.max_objects),
            format!("Buttons:         {}", self.button_count()),
            format!("Functions:       {}", names.join(" ")),
        ];
        Ok(lines.join("\n"))
    }

    fn firmware_id(&self) -> u32 {
        self.funcs.as_ref().map_or(0, |f| f.f01.build_id)
    }

    fn config_id(&self) -> String {
        self.funcs
            .as_ref()
            .and_then(|f| f.f34.as_ref())
            .map(F34Info::config_id_hex)
            .unwrap_or_default()
    }

    fn device_id(&self) -> String {
        self.funcs
            .as_ref()
            .map(|f| f.f01.product_id.clone())
            .unwrap_or_default()
    }

    fn image_rows(&self, landscape: bool) -> usize {
        let (tx, rx) = self.dims();
        oriented_rows(tx, rx, landscape)
    }

    fn image_cols(&self, landscape: bool) -> usize {
        let (tx, rx) = self.dims();
        oriented_cols(tx, rx, landscape)
    }

    fn button_count(&self) -> usize {
        self.funcs
            .as_ref()
            .and_then(|f| f.f1a.as_ref())
            .map_or(0, |f1a| f1a.button_count)
    }

    fn max_objects(&self) -> usize {
        self.funcs.as_ref().map_or(0, |f| f.f12.max_objects)
    }

    fn start_report_stream(&mut self, report_type: u8, options: StreamOptions) -> Result<()> {
        log::info!("Starting report {} stream ({:?})", report_type, options);
        self.set_streaming(
            options.contains(StreamOptions::NO_SLEEP),
            options.contains(StreamOptions::ENABLE_TOUCH),
        )?;
        if options.contains(StreamOptions::REZERO) {
            let timing = self.timing;
            let (t, f) = self.parts()?;
            force_cal(t, &f.f54, &timing)?;
        }
        self.stream_prepared = self.prepare(report_type)?;
        Ok(())
    }

    fn stop_report_stream(&mut self, report_type: u8) -> Result<()> {
        log::info!("Stopping report {} stream", report_type);
        self.set_streaming(false, true)?;
        if self.stream_prepared {
            self.stream_prepared = false;
            self.soft_reset()?;
        }
        Ok(())
    }

    fn read_report_image(&mut self, report_type: u8, landscape: bool) -> Result<Image> {
        Ok(self.read_report(report_type)?.oriented(landscape))
    }

    fn run_production_test(
        &mut self,
        test_id: u32,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        self.production_test(test_id, result, limits_1, limits_2, geometry)
    }

    fn test_result_len(&mut self, test_id: u32) -> Result<usize> {
        self.result_len(test_id)
    }

    fn run_extended_high_resistance(
        &mut self,
        reference: &Image,
        limits: &HighResistanceLimits,
    ) -> Result<HighResistanceReport> {
        self.extended_high_resistance(reference, limits)
    }

    fn run_extended_trx_short(
        &mut self,
        result: &mut [i32],
        limits: &[i32],
        extended_limits: &[i32],
    ) -> Result<usize> {
        self.extended_trx_short(result, limits, extended_limits)
    }

    fn firmware_config_size(&mut self) -> Result<usize> {
        Ok(0)
    }

    fn firmware_config(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn raw_command(
        &mut self,
        direction: RawDirection,
        addr_or_cmd: u16,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize> {
        match direction {
            RawDirection::Read => {
                self.transport.read_register(addr_or_cmd, output)?;
                Ok(output.len())
            }
            RawDirection::Write => {
                self.transport.write_register(addr_or_cmd, input)?;
                Ok(input.len())
            }
        }
    }

    fn read_touch(&mut self, max_fingers: usize) -> Result<Vec<TouchPoint>> {
        let funcs = self.funcs.as_ref().ok_or(Error::NotOpen)?;
        self.fingers
            .read(&mut self.transport, &funcs.f12, max_fingers)
    }

    fn set_gear(&mut self, gear: u8) -> Result<()> {
        let timing = self.timing;
        let (t, f) = self.parts()?;
        calibration::set_gear(t, &f.f54, &timing, gear)
    }

    fn reset(&mut self) -> Result<()> {
        self.soft_reset()
    }

    fn close(&mut self) -> Result<()> {
        if self.stream_prepared {
            self.stream_prepared = false;
            self.soft_reset()?;
        }
        self.funcs = None;
        self.state = RmiState::Unscanned;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::rmi::layout;
    use synadiag_dummy::{DummyRmi, DummyRmiConfig};

    pub(crate) fn open_dummy() -> RmiDevice<DummyRmi> {
        RmiDevice::open(
            DummyRmi::new(),
            TimingPolicy::default(),
            RmiTestConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_parses_all_functions() {
        let dev = open_dummy();
        assert_eq!(dev.state(), RmiState::Parsed);
        let f = dev.functions().unwrap();
        assert!(f.f55.is_some());
        assert_eq!(dev.dims(), (4, 6));
        assert_eq!(dev.button_count(), 2);
        assert_eq!(dev.max_objects(), 10);
        assert_eq!(dev.firmware_id(), 0x012345);
        assert_eq!(dev.config_id(), "deadbeef");
        assert_eq!(dev.device_id(), "s3908p");
    }

    #[test]
    fn test_landscape_dimensions() {
        let dev = open_dummy();
        assert_eq!(dev.image_rows(false), 4);
        assert_eq!(dev.image_cols(false), 6);
        assert_eq!(dev.image_rows(true), 6);
        assert_eq!(dev.image_cols(true), 4);
    }

    #[test]
    fn test_missing_f55_falls_back_to_f54_counts() {
        let config = DummyRmiConfig {
            f55_flags: 0x00,
            buttons: None,
            ..Default::default()
        };
        let dev = RmiDevice::open(
            DummyRmi::with_config(config),
            TimingPolicy::default(),
            RmiTestConfig::default(),
        )
        .unwrap();
        // no sensor assignment: F54 q1/q0
        assert_eq!(dev.dims(), (4, 6));
        assert_eq!(dev.button_count(), 0);
    }

    #[test]
    fn test_identify_text() {
        let mut dev = open_dummy();
        let text = dev.identify().unwrap();
        assert!(text.contains("s3908p"));
        assert!(text.contains("F54"));
        assert!(text.contains("4 x 6"));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Protocol:        RMI");
        assert!(lines[10].starts_with("Functions:       F01 "));
    }

    #[test]
    fn test_firmware_config_is_empty() {
        let mut dev = open_dummy();
        assert_eq!(dev.firmware_config_size().unwrap(), 0);
        let mut buf = [0u8; 8];
        assert_eq!(dev.firmware_config(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_report_image_landscape() {
        let mut dev = open_dummy();
        dev.transport_mut()
            .set_report(report::report_type::RAW_16BIT, (0u8..48).collect());
        let img = dev
            .read_report_image(report::report_type::RAW_16BIT, true)
            .unwrap();
        assert_eq!((img.rows(), img.cols()), (6, 4));
        // row 0 of the landscape view is rx 0 down every tx
        assert_eq!(img.get(0, 1), u16::from_le_bytes([12, 13]) as i32);
    }

    #[test]
    fn test_stream_toggles_no_sleep_and_touch_irq() {
        let mut dev = open_dummy();
        dev.start_report_stream(
            report::report_type::DELTA,
            StreamOptions::NO_SLEEP | StreamOptions::REZERO,
        )
        .unwrap();
        assert_eq!(dev.transport().peek(layout::F01_CONTROL) & 0x04, 0x04);
        assert_eq!(
            dev.transport().peek(layout::F01_CONTROL + 1) & layout::F12_INTERRUPT_MASK,
            0
        );
        assert!(!dev.stream_prepared);

        dev.stop_report_stream(report::report_type::DELTA).unwrap();
        assert_eq!(dev.transport().peek(layout::F01_CONTROL) & 0x04, 0);
        assert_eq!(
            dev.transport().peek(layout::F01_CONTROL + 1) & layout::F12_INTERRUPT_MASK,
            layout::F12_INTERRUPT_MASK
        );
        assert_eq!(dev.transport().reset_count(), 0);
    }

    #[test]
    fn test_prepared_stream_resets_on_stop() {
        let mut dev = open_dummy();
        dev.start_report_stream(
            report::report_type::FULL_RAW_CAP_NO_RX_COUPLING,
            StreamOptions::ENABLE_TOUCH,
        )
        .unwrap();
        dev.stop_report_stream(report::report_type::FULL_RAW_CAP_NO_RX_COUPLING)
            .unwrap();
        assert_eq!(dev.transport().reset_count(), 1);
        assert_eq!(dev.state(), RmiState::Parsed);
    }

    #[test]
    fn test_raw_register_access() {
        let mut dev = open_dummy();
        dev.raw_command(RawDirection::Write, 0x0300, &[1, 2], &mut [])
            .unwrap();
        let mut out = [0u8; 2];
        let n = dev
            .raw_command(RawDirection::Read, 0x0300, &[], &mut out)
            .unwrap();
        assert_eq!((n, out), (2, [1, 2]));
    }

    #[test]
    fn test_close_forgets_functions() {
        let mut dev = open_dummy();
        dev.close().unwrap();
        assert!(matches!(dev.functions(), Err(Error::NotOpen)));
        assert_eq!(dev.image_rows(true), 0);
    }
}
