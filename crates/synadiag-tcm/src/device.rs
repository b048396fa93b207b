//! TCM controller handle
//!
//! [`TcmDevice`] owns the transport and the structures read at open. Raw
//! mode stays on from open until close so commands never race the driver's
//! interrupt handler.

use crate::config::TcmOptions;
use crate::flash::{self, FlashGeometry};
use crate::info::{AppInfo, BootInfo, IdentifyInfo};
use crate::message;
use crate::pins::PinTable;
use crate::protocol::{cmd, dynamic_config, report};
use crate::touch::TouchConfig;
use bitflags::bitflags;
use synadiag_core::hires::{HighResistanceLimits, HighResistanceReport};
use synadiag_core::image::{oriented_cols, oriented_rows, Image, SampleFormat};
use synadiag_core::timing::TimingPolicy;
use synadiag_core::{
    Error, Geometry, Protocol, RawDirection, Result, StreamOptions, TouchController, TouchPoint,
    Transport,
};

bitflags! {
    /// Reports this session has enabled on the firmware
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReportSet: u8 {
        const TOUCH = 1 << 0;
        const DELTA = 1 << 1;
        const RAW = 1 << 2;
    }
}

impl ReportSet {
    pub fn from_code(code: u8) -> Self {
        match code {
            report::TOUCH => Self::TOUCH,
            report::DELTA => Self::DELTA,
            report::RAW => Self::RAW,
            _ => Self::empty(),
        }
    }
}

/// Sample encoding of an image report
pub fn report_format(code: u8) -> SampleFormat {
    match code {
        report::RAW => SampleFormat::U16,
        _ => SampleFormat::I16,
    }
}

/// A TCM touch controller
pub struct TcmDevice<T> {
    pub(crate) transport: T,
    pub(crate) timing: TimingPolicy,
    pub(crate) options: TcmOptions,
    identify: Option<IdentifyInfo>,
    app_info: Option<AppInfo>,
    boot_info: Option<BootInfo>,
    touch_config: Option<TouchConfig>,
    pins: Option<PinTable>,
    reports: ReportSet,
    streaming: Option<u8>,
    opened: bool,
}

impl<T: Transport> TcmDevice<T> {
    /// Wrap a transport without touching the device
    pub fn new(transport: T, timing: TimingPolicy, options: TcmOptions) -> Self {
        Self {
            transport,
            timing,
            options,
            identify: None,
            app_info: None,
            boot_info: None,
            touch_config: None,
            pins: None,
            reports: ReportSet::empty(),
            streaming: None,
            opened: false,
        }
    }

    /// Wrap a transport and bring the application firmware up
    pub fn open(transport: T, timing: TimingPolicy, options: TcmOptions) -> Result<Self> {
        let mut dev = Self::new(transport, timing, options);
        dev.start()?;
        Ok(dev)
    }

    /// Raw mode, identify, run the application firmware, read app info
    pub fn start(&mut self) -> Result<()> {
        self.transport.set_raw_mode(true)?;
        let id = IdentifyInfo::parse(&self.command(cmd::IDENTIFY, &[])?);
        log::info!(
            "tcm: {} build {}, {} mode",
            id.part_number,
            id.build_id,
            id.mode_name()
        );
        self.identify = Some(id);
        self.opened = true;
        self.ensure_application()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn identify_info(&self) -> Option<&IdentifyInfo> {
        self.identify.as_ref()
    }

    pub fn app_info(&self) -> Option<&AppInfo> {
        self.app_info.as_ref()
    }

    pub fn boot_info(&self) -> Option<&BootInfo> {
        self.boot_info.as_ref()
    }

    pub fn reports(&self) -> ReportSet {
        self.reports
    }

    pub(crate) fn require_open(&self) -> Result<()> {
        if self.opened {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }

    fn max_write_size(&self) -> usize {
        self.identify
            .as_ref()
            .map_or(0, |id| id.max_write_size as usize)
    }

    /// Send a command and wait for its response payload
    pub fn command(&mut self, command: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let max_write = self.max_write_size();
        message::command(
            &mut self.transport,
            self.timing.tcm_response,
            command,
            payload,
            max_write,
        )
    }

    /// Send a command answered by an identify report
    fn command_expect_identify(&mut self, command: u8) -> Result<()> {
        let max_write = self.max_write_size();
        message::write_command(&mut self.transport, command, &[], max_write)?;
        let payload =
            message::wait_report(&mut self.transport, self.timing.tcm_report, report::IDENTIFY)?;
        let id = IdentifyInfo::parse(&payload);
        log::debug!("tcm: identify report, {} mode", id.mode_name());
        self.identify = Some(id);
        // the firmware forgets report enables across mode changes
        self.reports = ReportSet::empty();
        self.streaming = None;
        Ok(())
    }

    fn in_application(&self) -> bool {
        self.identify.as_ref().is_some_and(IdentifyInfo::in_application)
    }

    /// Run the application firmware when needed and read app info
    pub fn ensure_application(&mut self) -> Result<()> {
        if !self.in_application() {
            log::info!("tcm: starting application firmware");
            self.command_expect_identify(cmd::RUN_APPLICATION_FIRMWARE)?;
            self.transport.delay_ms(self.timing.tcm_mode_switch_settle_ms);
            if !self.in_application() {
                log::error!("tcm: device stayed in bootloader");
                return Err(Error::protocol("application firmware did not start"));
            }
        }
        if self.app_info.is_none() {
            let info = AppInfo::parse(&self.command(cmd::GET_APPLICATION_INFO, &[])?);
            log::debug!(
                "tcm: {} x {} image, {} objects",
                info.num_of_image_rows,
                info.num_of_image_cols,
                info.max_objects
            );
            self.app_info = Some(info);
        }
        Ok(())
    }

    /// Enter the bootloader and read boot info
    pub fn ensure_bootloader(&mut self) -> Result<&BootInfo> {
        self.require_open()?;
        if !self.identify.as_ref().is_some_and(IdentifyInfo::in_bootloader) {
            log::info!("tcm: entering bootloader");
            self.command_expect_identify(cmd::RUN_BOOTLOADER_FIRMWARE)?;
            self.transport.delay_ms(self.timing.tcm_mode_switch_settle_ms);
            if !self.identify.as_ref().is_some_and(IdentifyInfo::in_bootloader) {
                log::error!("tcm: device did not enter bootloader");
                return Err(Error::protocol("bootloader did not start"));
            }
            self.boot_info = None;
        }
        if self.boot_info.is_none() {
            let info = BootInfo::parse(&self.command(cmd::GET_BOOT_INFO, &[])?);
            self.boot_info = Some(info);
        }
        self.boot_info
            .as_ref()
            .ok_or_else(|| Error::protocol("boot info unavailable"))
    }

    fn flash_geometry(&mut self) -> Result<FlashGeometry> {
        let info = self.ensure_bootloader()?;
        FlashGeometry::from_boot_info(info)
    }

    /// Firmware reset, then back to the application firmware
    pub fn soft_reset(&mut self) -> Result<()> {
        self.require_open()?;
        log::debug!("tcm: reset");
        self.command_expect_identify(cmd::RESET)?;
        self.app_info = None;
        self.ensure_application()
    }

    /// Image shape as (rows, cols); rows are tx channels
    pub fn dims(&self) -> (usize, usize) {
        self.app_info.as_ref().map_or((0, 0), |a| {
            (a.num_of_image_rows as usize, a.num_of_image_cols as usize)
        })
    }

    fn set_report(&mut self, code: u8, enable: bool) -> Result<()> {
        let command = if enable {
            cmd::ENABLE_REPORT
        } else {
            cmd::DISABLE_REPORT
        };
        self.command(command, &[code])?;
        self.reports.set(ReportSet::from_code(code), enable);
        Ok(())
    }

    fn set_dynamic_config(&mut self, id: u8, value: u16) -> Result<()> {
        let v = value.to_le_bytes();
        self.command(cmd::SET_DYNAMIC_CONFIG, &[id, v[0], v[1]])?;
        Ok(())
    }

    /// Wait for one report of `code`, enabling it for this capture when no
    /// stream of it is running
    pub fn capture_report(&mut self, code: u8) -> Result<Vec<u8>> {
        self.require_open()?;
        self.ensure_application()?;
        if self.streaming == Some(code) {
            return message::wait_report(&mut self.transport, self.timing.tcm_report, code);
        }
        self.set_report(code, true)?;
        let captured = message::wait_report(&mut self.transport, self.timing.tcm_report, code);
        let disabled = self.set_report(code, false);
        let payload = captured?;
        disabled?;
        Ok(payload)
    }

    /// Capture report `code` as a rows x cols image in firmware order
    pub fn capture_image(&mut self, code: u8) -> Result<Image> {
        let (rows, cols) = self.dims();
        let payload = self.capture_report(code)?;
        Image::decode(rows, cols, report_format(code), &payload)
    }

    /// Pin tables, read from the static config on first use
    pub fn pins(&mut self) -> Result<&PinTable> {
        if self.pins.is_none() {
            self.ensure_application()?;
            let (rows, cols) = self.dims();
            let config = self.command(cmd::GET_STATIC_CONFIG, &[])?;
            self.pins = Some(PinTable::parse(
                &config,
                &self.options.static_config,
                rows,
                cols,
            ));
        }
        self.pins
            .as_ref()
            .ok_or_else(|| Error::protocol("pin table unavailable"))
    }

    /// Touch report config, fetched on first use and kept until close
    fn touch_config(&mut self) -> Result<&TouchConfig> {
        if self.touch_config.is_none() {
            let raw = self.command(cmd::GET_TOUCH_REPORT_CONFIG, &[])?;
            self.touch_config = Some(TouchConfig::compile(&raw)?);
        }
        self.touch_config
            .as_ref()
            .ok_or_else(|| Error::protocol("touch config unavailable"))
    }

    /// Run `f`, then reset whatever it returned
    ///
    /// A reset failure after a successful test is returned; after a failed
    /// test it is logged and the test error wins.
    pub(crate) fn with_reset<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let result = f(self);
        if let Err(e) = self.soft_reset() {
            if result.is_ok() {
                return Err(e);
            }
            log::warn!("Reset after failed test also failed: {}", e);
        }
        result
    }
}

impl<T: Transport + Send> TouchController for TcmDevice<T> {
    fn protocol(&self) -> Protocol {
        Protocol::Tcm
    }

    fn identify(&mut self) -> Result<String> {
        self.require_open()?;
        let mut sections = vec!["Protocol:         TCM".to_string()];
        if let Some(id) = &self.identify {
            sections.push(id.to_string());
        }
        if let Some(app) = &self.app_info {
            sections.push(app.to_string());
        }
        if let Some(boot) = &self.boot_info {
            sections.push(boot.to_string());
        }
        Ok(sections.join("\n"))
    }

    fn firmware_id(&self) -> u32 {
        self.identify.as_ref().map_or(0, |id| id.build_id)
    }

    fn config_id(&self) -> String {
        self.app_info
            .as_ref()
            .map(AppInfo::customer_config_id_hex)
            .unwrap_or_default()
    }

    fn device_id(&self) -> String {
        self.identify
            .as_ref()
            .map(|id| id.part_number.clone())
            .unwrap_or_default()
    }

    fn image_rows(&self, landscape: bool) -> usize {
        let (rows, cols) = self.dims();
        oriented_rows(rows, cols, landscape)
    }

    fn image_cols(&self, landscape: bool) -> usize {
        let (rows, cols) = self.dims();
        oriented_cols(rows, cols, landscape)
    }

    fn button_count(&self) -> usize {
        self.app_info
            .as_ref()
            .map_or(0, |a| a.num_of_buttons as usize)
    }

    fn max_objects(&self) -> usize {
        self.app_info.as_ref().map_or(0, |a| a.max_objects as usize)
    }

    fn start_report_stream(&mut self, report_type: u8, options: StreamOptions) -> Result<()> {
        self.require_open()?;
        self.ensure_application()?;
        log::info!("Starting report 0x{:02X} stream ({:?})", report_type, options);
        if options.contains(StreamOptions::NO_SLEEP) {
            self.set_dynamic_config(dynamic_config::NO_DOZE, 1)?;
        }
        if options.contains(StreamOptions::REZERO) {
            self.command(cmd::REZERO, &[])?;
        }
        let touch = options.contains(StreamOptions::ENABLE_TOUCH);
        if touch != self.reports.contains(ReportSet::TOUCH) {
            self.set_report(report::TOUCH, touch)?;
        }
        self.set_report(report_type, true)?;
        self.streaming = Some(report_type);
        Ok(())
    }

    fn stop_report_stream(&mut self, report_type: u8) -> Result<()> {
        self.require_open()?;
        log::info!("Stopping report 0x{:02X} stream", report_type);
        self.set_report(report_type, false)?;
        if self.streaming == Some(report_type) {
            self.streaming = None;
        }
        self.set_dynamic_config(dynamic_config::NO_DOZE, 0)
    }

    fn read_report_image(&mut self, report_type: u8, landscape: bool) -> Result<Image> {
        Ok(self.capture_image(report_type)?.oriented(landscape))
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
        _result: &mut [i32],
        _limits: &[i32],
        _extended_limits: &[i32],
    ) -> Result<usize> {
        Err(Error::UnsupportedTest(
            crate::prodtest::test_id::TRX_TRX_SHORTS as u32,
        ))
    }

    fn firmware_config_size(&mut self) -> Result<usize> {
        self.require_open()?;
        Ok(self
            .app_info
            .as_ref()
            .map_or(0, |a| a.static_config_size as usize))
    }

    fn firmware_config(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require_open()?;
        self.ensure_application()?;
        let config = self.command(cmd::GET_STATIC_CONFIG, &[])?;
        let n = config.len().min(buf.len());
        buf[..n].copy_from_slice(&config[..n]);
        Ok(n)
    }

    /// `Write` sends `addr_or_cmd` as a command and copies the response into
    /// `output`; `Read` reads `output.len()` bytes straight from the FIFO.
    fn raw_command(
        &mut self,
        direction: RawDirection,
        addr_or_cmd: u16,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize> {
        self.require_open()?;
        match direction {
            RawDirection::Write => {
                let command = u8::try_from(addr_or_cmd).map_err(|_| {
                    Error::invalid(format!("TCM command 0x{:X} out of range", addr_or_cmd))
                })?;
                let response = self.command(command, input)?;
                let n = response.len().min(output.len());
                output[..n].copy_from_slice(&response[..n]);
                Ok(n)
            }
            RawDirection::Read => self.transport.read(None, output),
        }
    }

    fn read_touch(&mut self, max_fingers: usize) -> Result<Vec<TouchPoint>> {
        self.require_open()?;
        self.ensure_application()?;
        let max_objects = self.max_objects();
        let order = self.options.bit_order;
        self.touch_config()?;
        if !self.reports.contains(ReportSet::TOUCH) {
            self.set_report(report::TOUCH, true)?;
        }

        let payload =
            match message::wait_report(&mut self.transport, self.timing.tcm_report, report::TOUCH) {
                Ok(p) => p,
                Err(Error::Timeout(_)) => {
                    log::debug!("tcm: no touch report");
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e),
            };
        let config = self.touch_config()?;
        let mut objects = config.parse(&payload, max_objects, order).objects;
        objects.truncate(max_fingers);
        Ok(objects)
    }

    fn set_gear(&mut self, gear: u8) -> Result<()> {
        self.require_open()?;
        log::info!("tcm: requesting sensing frequency {}", gear);
        self.set_dynamic_config(dynamic_config::INHIBIT_FREQUENCY_SHIFT, 1)?;
        self.set_dynamic_config(dynamic_config::REQUESTED_FREQUENCY, gear as u16)
    }

    fn reset(&mut self) -> Result<()> {
        self.soft_reset()
    }

    fn close(&mut self) -> Result<()> {
        if !self.opened {
            return Ok(());
        }
        self.opened = false;
        self.touch_config = None;
        self.pins = None;
        self.app_info = None;
        self.boot_info = None;
        self.identify = None;
        self.reports = ReportSet::empty();
        self.streaming = None;
        self.transport.hardware_reset()?;
        self.transport.set_raw_mode(false)?;
        self.transport.set_irq(true)
    }

    fn flash_block_size(&mut self) -> Result<usize> {
        Ok(self.flash_geometry()?.block_bytes())
    }

    fn flash_read(&mut self, block: u32, buf: &mut [u8]) -> Result<usize> {
        let geometry = self.flash_geometry()?;
        let max_write = self.max_write_size();
        flash::read(&mut self.transport, &self.timing, max_write, &geometry, block, buf)
    }

    fn flash_write(&mut self, block: u32, data: &[u8]) -> Result<()> {
        let geometry = self.flash_geometry()?;
        let max_write = self.max_write_size();
        flash::write(&mut self.transport, &self.timing, max_write, &geometry, block, data)
    }

    fn flash_erase(&mut self, block: u32, count: u32, wide_format: bool) -> Result<()> {
        let geometry = self.flash_geometry()?;
        let max_write = self.max_write_size();
        flash::erase(
            &mut self.transport,
            &self.timing,
            max_write,
            &geometry,
            block,
            count,
            wide_format,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::tcm::{cmd as dcmd, MODE_APPLICATION, MODE_BOOTLOADER};
    use synadiag_dummy::{DummyTcm, DummyTcmConfig, DummyTouch};

    fn open_with(config: DummyTcmConfig) -> TcmDevice<DummyTcm> {
        TcmDevice::open(
            DummyTcm::with_config(config),
            TimingPolicy::default(),
            TcmOptions::default(),
        )
        .unwrap()
    }

    fn open() -> TcmDevice<DummyTcm> {
        open_with(DummyTcmConfig::default())
    }

    #[test]
    fn test_open_reads_identify_and_app_info() {
        let dev = open();
        assert!(dev.transport().raw_mode());
        assert_eq!(dev.device_id(), "tcm-dummy");
        assert_eq!(dev.firmware_id(), 3_141_592);
        assert_eq!(dev.dims(), (4, 6));
        assert_eq!(dev.max_objects(), 10);
        // "CU"
        assert!(dev.config_id().starts_with("4355"));
        assert_eq!(dev.transport().count_commands(dcmd::RUN_APPLICATION_FIRMWARE), 0);
    }

    #[test]
    fn test_open_from_bootloader_runs_application() {
        let dev = open_with(DummyTcmConfig {
            start_in_bootloader: true,
            ..Default::default()
        });
        assert_eq!(dev.transport().mode(), MODE_APPLICATION);
        assert_eq!(dev.transport().count_commands(dcmd::RUN_APPLICATION_FIRMWARE), 1);
        assert!(dev.app_info().is_some());
    }

    #[test]
    fn test_landscape_dimensions() {
        let dev = open_with(DummyTcmConfig {
            rows: 16,
            cols: 24,
            ..Default::default()
        });
        assert_eq!(dev.image_rows(true), 24);
        assert_eq!(dev.image_cols(true), 16);
        assert_eq!(dev.image_rows(false), 16);
    }

    #[test]
    fn test_identify_text() {
        let mut dev = open();
        let text = dev.identify().unwrap();
        assert!(text.starts_with("Protocol:         TCM"));
        assert!(text.contains("tcm-dummy"));
        assert!(text.contains("4 x 6"));
        assert!(text.lines().all(|l| !l.trim().is_empty()));
        assert!(text.contains("\nMax write size:   "));
        assert!(text.contains("\nApp info version: "));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_capture_image_enables_and_disables() {
        let mut dev = open();
        let raw: Vec<u8> = (0..48).collect();
        dev.transport_mut().queue_report(report::RAW, raw);
        let img = dev.read_report_image(report::RAW, true).unwrap();
        assert_eq!((img.rows(), img.cols()), (6, 4));
        assert_eq!(img.get(0, 1), u16::from_le_bytes([12, 13]) as i32);
        assert!(!dev.transport().is_report_enabled(report::RAW));
    }

    #[test]
    fn test_stream_keeps_report_enabled() {
        let mut dev = open();
        dev.start_report_stream(
            report::DELTA,
            StreamOptions::NO_SLEEP | StreamOptions::REZERO,
        )
        .unwrap();
        assert!(dev.transport().is_report_enabled(report::DELTA));
        assert_eq!(dev.transport().dynamic_config(dynamic_config::NO_DOZE), Some(1));
        assert_eq!(dev.transport().count_commands(dcmd::REZERO), 1);

        dev.transport_mut().set_report(report::DELTA, vec![0xFF; 48]);
        let img = dev.read_report_image(report::DELTA, false).unwrap();
        assert!(img.data().iter().all(|&v| v == -1));
        assert!(dev.transport().is_report_enabled(report::DELTA));

        dev.stop_report_stream(report::DELTA).unwrap();
        assert!(!dev.transport().is_report_enabled(report::DELTA));
        assert_eq!(dev.transport().dynamic_config(dynamic_config::NO_DOZE), Some(0));
    }

    #[test]
    fn test_read_touch() {
        let mut dev = open();
        dev.transport_mut().push_touch(&[DummyTouch {
            index: 2,
            classification: 1,
            x: 500,
            y: 900,
            z: 40,
            wx: 3,
            wy: 4,
        }]);
        let points = dev.read_touch(10).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].index, 2);
        assert_eq!((points[0].x, points[0].y, points[0].z), (500, 900, 40));
        assert!(dev.reports().contains(ReportSet::TOUCH));

        // nothing pending: no frame, not an error
        assert!(dev.read_touch(10).unwrap().is_empty());
        assert_eq!(dev.transport().count_commands(dcmd::GET_TOUCH_REPORT_CONFIG), 1);
    }

    #[test]
    fn test_set_gear_uses_dynamic_config() {
        let mut dev = open();
        dev.set_gear(2).unwrap();
        let t = dev.transport();
        assert_eq!(t.dynamic_config(dynamic_config::INHIBIT_FREQUENCY_SHIFT), Some(1));
        assert_eq!(t.dynamic_config(dynamic_config::REQUESTED_FREQUENCY), Some(2));
    }

    #[test]
    fn test_firmware_config_is_static_config() {
        let mut dev = open();
        let size = dev.firmware_config_size().unwrap();
        assert_eq!(size, 880);
        let mut buf = vec![0u8; size];
        assert_eq!(dev.firmware_config(&mut buf).unwrap(), 880);
        // first rx pin of the default dummy
        assert_eq!(buf[330], 10);
    }

    #[test]
    fn test_firmware_config_leaves_bootloader() {
        let mut dev = open();
        let mut back = vec![0u8; 64];
        dev.flash_read(0, &mut back).unwrap();
        assert_eq!(dev.transport().mode(), MODE_BOOTLOADER);

        let mut buf = vec![0u8; 880];
        assert_eq!(dev.firmware_config(&mut buf).unwrap(), 880);
        assert_eq!(buf[330], 10);
        assert_eq!(dev.transport().mode(), MODE_APPLICATION);
        assert_eq!(dev.transport().count_commands(dcmd::RUN_APPLICATION_FIRMWARE), 1);
    }

    #[test]
    fn test_pins_read_in_application_mode() {
        let mut dev = open();
        dev.ensure_bootloader().unwrap();
        assert_eq!(dev.transport().mode(), MODE_BOOTLOADER);
        dev.pins().unwrap();
        assert_eq!(dev.transport().mode(), MODE_APPLICATION);
    }

    #[test]
    fn test_raw_command() {
        let mut dev = open();
        let mut out = [0u8; 24];
        let n = dev
            .raw_command(RawDirection::Write, dcmd::IDENTIFY as u16, &[], &mut out)
            .unwrap();
        assert_eq!(n, 24);
        assert_eq!(out[1], MODE_APPLICATION);
        assert!(matches!(
            dev.raw_command(RawDirection::Write, 0x100, &[], &mut out),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_flash_round_trip_through_bootloader() {
        let mut dev = open();
        let data: Vec<u8> = (0..64).map(|i| i as u8 ^ 0x5A).collect();
        dev.flash_erase(4, 1, false).unwrap();
        dev.flash_write(4, &data).unwrap();
        let mut back = vec![0u8; 64];
        assert_eq!(dev.flash_read(4, &mut back).unwrap(), 64);
        assert_eq!(back, data);
        assert_eq!(dev.transport().mode(), MODE_BOOTLOADER);
        assert_eq!(dev.boot_info().unwrap().write_block_size_words, 32);
        assert_eq!(dev.transport().count_commands(dcmd::RUN_BOOTLOADER_FIRMWARE), 1);

        dev.reset().unwrap();
        assert_eq!(dev.transport().mode(), MODE_APPLICATION);
    }

    #[test]
    fn test_flash_rejects_zero_block_size() {
        let mut dev = open_with(DummyTcmConfig {
            write_block_size_words: 0,
            ..Default::default()
        });
        assert!(matches!(
            dev.flash_write(0, &[0; 4]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_close_resets_and_releases_raw_mode() {
        let mut dev = open();
        dev.transport_mut().set_irq(false).unwrap();
        dev.close().unwrap();
        let t = dev.transport();
        assert_eq!(t.hardware_reset_count(), 1);
        assert!(!t.raw_mode());
        assert!(t.irq_enabled());
        dev.close().unwrap();
        assert_eq!(dev.transport().hardware_reset_count(), 1);
        assert!(matches!(dev.identify(), Err(Error::NotOpen)));
    }
}
