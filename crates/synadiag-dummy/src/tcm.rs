//! TCM packet-protocol emulator
//!
//! Commands written to the FIFO are reassembled (including continuation
//! chunks) and answered with `[0xA5, status, len]` headers followed by
//! `[0xA5, 0x03, payload, 0x5A]` frames. Unsolicited reports are emitted
//! only while the outbox holds no command response, unless
//! [`DummyTcm::set_reports_first`] lets queued reports jump ahead.

use std::collections::{HashMap, HashSet, VecDeque};
use synadiag_core::{Result, Transport};

const MARKER: u8 = 0xA5;
const END_MARKER: u8 = 0x5A;
const CONTINUE_READ: u8 = 0x03;

/// Command codes
pub mod cmd {
    pub const CONTINUE_WRITE: u8 = 0x01;
    pub const IDENTIFY: u8 = 0x02;
    pub const RESET: u8 = 0x04;
    pub const ENABLE_REPORT: u8 = 0x05;
    pub const DISABLE_REPORT: u8 = 0x06;
    pub const GET_BOOT_INFO: u8 = 0x10;
    pub const ERASE_FLASH: u8 = 0x11;
    pub const WRITE_FLASH: u8 = 0x12;
    pub const READ_FLASH: u8 = 0x13;
    pub const RUN_APPLICATION_FIRMWARE: u8 = 0x14;
    pub const RUN_BOOTLOADER_FIRMWARE: u8 = 0x1F;
    pub const GET_APPLICATION_INFO: u8 = 0x20;
    pub const GET_STATIC_CONFIG: u8 = 0x21;
    pub const GET_DYNAMIC_CONFIG: u8 = 0x23;
    pub const SET_DYNAMIC_CONFIG: u8 = 0x24;
    pub const GET_TOUCH_REPORT_CONFIG: u8 = 0x25;
    pub const REZERO: u8 = 0x27;
    pub const PRODUCTION_TEST: u8 = 0x2A;
}

/// Status and report codes
pub mod code {
    pub const IDLE: u8 = 0x00;
    pub const OK: u8 = 0x01;
    pub const BUSY: u8 = 0x02;
    pub const NOT_IMPLEMENTED: u8 = 0x0E;
    pub const ERROR: u8 = 0x0F;
    pub const REPORT_IDENTIFY: u8 = 0x10;
    pub const REPORT_TOUCH: u8 = 0x11;
    pub const REPORT_DELTA: u8 = 0x12;
    pub const REPORT_RAW: u8 = 0x13;
}

pub const MODE_APPLICATION: u8 = 0x01;
pub const MODE_BOOTLOADER: u8 = 0x0B;

/// Byte offsets of the pin tables inside the static config
pub mod static_config {
    pub const RX_PINS: usize = 2640 / 8;
    pub const TX_PINS: usize = 3184 / 8;
    pub const RX_GUARD_COUNT: usize = 3632 / 8;
    pub const TX_GUARD_COUNT: usize = 3648 / 8;
    pub const RX_GUARD_PINS: usize = 6896 / 8;
    pub const TX_GUARD_PINS: usize = 6928 / 8;
    pub const SIZE: usize = 880;
}

/// Touch report config understood by [`DummyTcm::push_touch`]: active
/// object count, then per object index:4 class:4 x:16 y:16 z:8 wx:8 wy:8
pub const DEFAULT_TOUCH_CONFIG: &[u8] = &[
    24, 8, // number of active objects
    1, // foreach active object
    6, 4, 7, 4, 8, 16, 9, 16, 10, 8, 11, 8, 12, 8, //
    3, // foreach end
    4, // pad to next byte
    0, // end
];

#[derive(Debug, Clone)]
pub struct DummyTcmConfig {
    pub part_number: String,
    pub build_id: u32,
    /// Identify max write size, 0 for unlimited
    pub max_write_size: u16,
    pub customer_config_id: [u8; 16],
    pub rows: u16,
    pub cols: u16,
    pub max_objects: u16,
    pub buttons: u16,
    pub tx_pins: Vec<u16>,
    pub rx_pins: Vec<u16>,
    pub tx_guard_pins: Vec<u16>,
    pub rx_guard_pins: Vec<u16>,
    pub touch_config: Vec<u8>,
    pub start_in_bootloader: bool,
    pub flash_size: usize,
    pub write_block_size_words: u8,
    pub erase_page_size_words: u16,
    pub max_write_payload_size: u16,
}

impl Default for DummyTcmConfig {
    fn default() -> Self {
        Self {
            part_number: "tcm-dummy".into(),
            build_id: 3_141_592,
            max_write_size: 64,
            customer_config_id: *b"CUSTOMER-CFG-001",
            rows: 4,
            cols: 6,
            max_objects: 10,
            buttons: 0,
            tx_pins: vec![0, 1, 2, 3],
            rx_pins: vec![10, 11, 12, 13, 14, 15],
            tx_guard_pins: Vec::new(),
            rx_guard_pins: vec![40],
            touch_config: DEFAULT_TOUCH_CONFIG.to_vec(),
            start_in_bootloader: false,
            flash_size: 64 * 1024,
            write_block_size_words: 32,
            erase_page_size_words: 16,
            max_write_payload_size: 128,
        }
    }
}

/// One object in an emulated touch report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyTouch {
    pub index: u8,
    pub classification: u8,
    pub x: u16,
    pub y: u16,
    pub z: u8,
    pub wx: u8,
    pub wy: u8,
}

struct Frame {
    code: u8,
    payload: Vec<u8>,
}

struct Incoming {
    command: u8,
    expected: usize,
    payload: Vec<u8>,
}

/// Emulated TCM controller
pub struct DummyTcm {
    config: DummyTcmConfig,
    mode: u8,
    outbox: VecDeque<Frame>,
    in_flight: Option<Vec<u8>>,
    incoming: Option<Incoming>,
    reports: VecDeque<Frame>,
    sticky_reports: HashMap<u8, Vec<u8>>,
    enabled_reports: HashSet<u8>,
    reports_first: bool,
    production_tests: HashMap<u8, Vec<u8>>,
    dynamic_config: HashMap<u8, u16>,
    not_implemented: HashSet<u8>,
    flash: Vec<u8>,
    busy_polls: u32,
    busy_remaining: u32,
    commands: Vec<u8>,
    chunks_written: usize,
    hardware_resets: usize,
    raw_mode: bool,
    irq_enabled: bool,
    elapsed_ms: u64,
}

impl Default for DummyTcm {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyTcm {
    pub fn new() -> Self {
        Self::with_config(DummyTcmConfig::default())
    }

    pub fn with_config(config: DummyTcmConfig) -> Self {
        let mode = if config.start_in_bootloader {
            MODE_BOOTLOADER
        } else {
            MODE_APPLICATION
        };
        let flash = vec![0xFF; config.flash_size];
        Self {
            config,
            mode,
            outbox: VecDeque::new(),
            in_flight: None,
            incoming: None,
            reports: VecDeque::new(),
            sticky_reports: HashMap::new(),
            enabled_reports: HashSet::new(),
            reports_first: false,
            production_tests: HashMap::new(),
            dynamic_config: HashMap::new(),
            not_implemented: HashSet::new(),
            flash,
            busy_polls: 0,
            busy_remaining: 0,
            commands: Vec::new(),
            chunks_written: 0,
            hardware_resets: 0,
            raw_mode: false,
            irq_enabled: true,
            elapsed_ms: 0,
        }
    }

    pub fn config(&self) -> &DummyTcmConfig {
        &self.config
    }

    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Answer every command after `polls` BUSY headers
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Answer `command` with NOT_IMPLEMENTED
    pub fn set_not_implemented(&mut self, command: u8) {
        self.not_implemented.insert(command);
    }

    /// Data returned by production test `id`
    pub fn set_production_test(&mut self, id: u8, data: Vec<u8>) {
        self.production_tests.insert(id, data);
    }

    /// Emit a one-shot report once `code` is enabled (identify always is)
    pub fn queue_report(&mut self, code: u8, payload: Vec<u8>) {
        self.reports.push_back(Frame { code, payload });
    }

    /// Serve queued reports ahead of pending command responses
    pub fn set_reports_first(&mut self, first: bool) {
        self.reports_first = first;
    }

    /// Emit `payload` on every idle poll while `code` is enabled
    pub fn set_report(&mut self, code: u8, payload: Vec<u8>) {
        self.sticky_reports.insert(code, payload);
    }

    /// Queue a touch report encoded with [`DEFAULT_TOUCH_CONFIG`]
    pub fn push_touch(&mut self, objects: &[DummyTouch]) {
        let mut w = BitWriter::default();
        w.push(objects.len() as u32, 8);
        for o in objects {
            w.push(o.index as u32, 4);
            w.push(o.classification as u32, 4);
            w.push(o.x as u32, 16);
            w.push(o.y as u32, 16);
            w.push(o.z as u32, 8);
            w.push(o.wx as u32, 8);
            w.push(o.wy as u32, 8);
        }
        self.queue_report(code::REPORT_TOUCH, w.bytes);
    }

    pub fn is_report_enabled(&self, code: u8) -> bool {
        self.enabled_reports.contains(&code)
    }

    pub fn dynamic_config(&self, id: u8) -> Option<u16> {
        self.dynamic_config.get(&id).copied()
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Every command code dispatched, in order
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    pub fn count_commands(&self, command: u8) -> usize {
        self.commands.iter().filter(|&&c| c == command).count()
    }

    /// FIFO write calls, continuation chunks included
    pub fn chunks_written(&self) -> usize {
        self.chunks_written
    }

    pub fn hardware_reset_count(&self) -> usize {
        self.hardware_resets
    }

    pub fn raw_mode(&self) -> bool {
        self.raw_mode
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    fn identify_payload(&self) -> Vec<u8> {
        let mut p = vec![0u8; 24];
        p[0] = 2;
        p[1] = self.mode;
        copy_str(&mut p[2..18], &self.config.part_number);
        p[18..22].copy_from_slice(&self.config.build_id.to_le_bytes());
        p[22..24].copy_from_slice(&self.config.max_write_size.to_le_bytes());
        p
    }

    fn app_info_payload(&self) -> Vec<u8> {
        let c = &self.config;
        let mut p = vec![0u8; 46];
        let words: [(usize, u16); 8] = [
            (0, 1),
            (2, 0),
            (4, static_config::SIZE as u16),
            (6, 16),
            (8, 0x40),
            (10, 4),
            (12, c.touch_config.len() as u16),
            (14, 64),
        ];
        for (off, v) in words {
            p[off..off + 2].copy_from_slice(&v.to_le_bytes());
        }
        p[16..32].copy_from_slice(&c.customer_config_id);
        let tail = [1080u16, 1920, c.max_objects, c.buttons, c.rows, c.cols, 0];
        for (i, v) in tail.iter().enumerate() {
            p[32 + i * 2..34 + i * 2].copy_from_slice(&v.to_le_bytes());
        }
        p
    }

    fn boot_info_payload(&self) -> Vec<u8> {
        let c = &self.config;
        let mut p = vec![0u8; 32];
        p[0] = 1;
        p[2..4].copy_from_slice(&0x3908u16.to_le_bytes());
        p[4] = c.write_block_size_words;
        p[5..7].copy_from_slice(&c.erase_page_size_words.to_le_bytes());
        p[7..9].copy_from_slice(&c.max_write_payload_size.to_le_bytes());
        p[9] = 1;
        p
    }

    fn static_config_payload(&self) -> Vec<u8> {
        let c = &self.config;
        let mut p = vec![0u8; static_config::SIZE];
        put_words(&mut p, static_config::RX_PINS, &c.rx_pins);
        put_words(&mut p, static_config::TX_PINS, &c.tx_pins);
        put_words(&mut p, static_config::RX_GUARD_COUNT, &[c.rx_guard_pins.len() as u16]);
        put_words(&mut p, static_config::TX_GUARD_COUNT, &[c.tx_guard_pins.len() as u16]);
        put_words(&mut p, static_config::RX_GUARD_PINS, &c.rx_guard_pins);
        put_words(&mut p, static_config::TX_GUARD_PINS, &c.tx_guard_pins);
        p
    }

    fn respond(&mut self, code: u8, payload: Vec<u8>) {
        self.outbox.push_back(Frame { code, payload });
    }

    fn switch_mode(&mut self, mode: u8) {
        self.mode = mode;
        let id = self.identify_payload();
        self.respond(code::REPORT_IDENTIFY, id);
    }

    fn flash_range(&self, word_addr: usize, bytes: usize) -> Option<std::ops::Range<usize>> {
        let start = word_addr * 2;
        (start + bytes <= self.flash.len()).then_some(start..start + bytes)
    }

    fn dispatch(&mut self, command: u8, payload: Vec<u8>) {
        log::trace!("dummy tcm: command 0x{:02X} ({} bytes)", command, payload.len());
        self.commands.push(command);
        self.busy_remaining = self.busy_polls;

        if self.not_implemented.contains(&command) {
            self.respond(code::NOT_IMPLEMENTED, Vec::new());
            return;
        }

        let in_app = self.mode == MODE_APPLICATION;
        match command {
            cmd::IDENTIFY => {
                let id = self.identify_payload();
                self.respond(code::OK, id);
            }
            cmd::RESET => {
                self.enabled_reports.clear();
                self.switch_mode(MODE_APPLICATION);
            }
            cmd::RUN_APPLICATION_FIRMWARE => self.switch_mode(MODE_APPLICATION),
            cmd::RUN_BOOTLOADER_FIRMWARE => self.switch_mode(MODE_BOOTLOADER),
            cmd::ENABLE_REPORT | cmd::DISABLE_REPORT => {
                if let Some(&c) = payload.first() {
                    if command == cmd::ENABLE_REPORT {
                        self.enabled_reports.insert(c);
                    } else {
                        self.enabled_reports.remove(&c);
                    }
                }
                self.respond(code::OK, Vec::new());
            }
            cmd::GET_APPLICATION_INFO if in_app => {
                let info = self.app_info_payload();
                self.respond(code::OK, info);
            }
            cmd::GET_STATIC_CONFIG if in_app => {
                let cfg = self.static_config_payload();
                self.respond(code::OK, cfg);
            }
            cmd::GET_TOUCH_REPORT_CONFIG if in_app => {
                let cfg = self.config.touch_config.clone();
                self.respond(code::OK, cfg);
            }
            cmd::SET_DYNAMIC_CONFIG if payload.len() >= 3 => {
                let value = u16::from_le_bytes([payload[1], payload[2]]);
                self.dynamic_config.insert(payload[0], value);
                self.respond(code::OK, Vec::new());
            }
            cmd::GET_DYNAMIC_CONFIG if !payload.is_empty() => {
                let value = self.dynamic_config.get(&payload[0]).copied().unwrap_or(0);
                self.respond(code::OK, value.to_le_bytes().to_vec());
            }
            cmd::REZERO => self.respond(code::OK, Vec::new()),
            cmd::PRODUCTION_TEST if in_app => {
                match payload.first().and_then(|id| self.production_tests.get(id)).cloned() {
                    Some(data) => self.respond(code::OK, data),
                    None => self.respond(code::ERROR, Vec::new()),
                }
            }
            cmd::GET_BOOT_INFO if !in_app => {
                let info = self.boot_info_payload();
                self.respond(code::OK, info);
            }
            cmd::READ_FLASH if !in_app && payload.len() >= 6 => {
                let addr = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let words = u16::from_le_bytes([payload[4], payload[5]]) as usize;
                match self.flash_range(addr as usize, words * 2) {
                    Some(r) => {
                        let data = self.flash[r].to_vec();
                        self.respond(code::OK, data);
                    }
                    None => self.respond(code::ERROR, Vec::new()),
                }
            }
            cmd::WRITE_FLASH if !in_app && payload.len() >= 4 => {
                let addr = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let data = &payload[4..];
                match self.flash_range(addr as usize, data.len()) {
                    Some(r) => {
                        self.flash[r].copy_from_slice(data);
                        self.respond(code::OK, Vec::new());
                    }
                    None => self.respond(code::ERROR, Vec::new()),
                }
            }
            cmd::ERASE_FLASH if !in_app => {
                let (first, count) = match payload.len() {
                    2 => (payload[0] as usize, payload[1] as usize),
                    4 => (
                        u16::from_le_bytes([payload[0], payload[1]]) as usize,
                        u16::from_le_bytes([payload[2], payload[3]]) as usize,
                    ),
                    _ => {
                        self.respond(code::ERROR, Vec::new());
                        return;
                    }
                };
                let page = self.config.erase_page_size_words as usize * 2;
                match self.flash_range(first * page / 2, count * page) {
                    Some(r) => {
                        self.flash[r].fill(0xFF);
                        self.respond(code::OK, Vec::new());
                    }
                    None => self.respond(code::ERROR, Vec::new()),
                }
            }
            cmd::GET_APPLICATION_INFO
            | cmd::GET_STATIC_CONFIG
            | cmd::GET_TOUCH_REPORT_CONFIG
            | cmd::PRODUCTION_TEST
            | cmd::GET_BOOT_INFO
            | cmd::READ_FLASH
            | cmd::WRITE_FLASH
            | cmd::ERASE_FLASH
            | cmd::SET_DYNAMIC_CONFIG
            | cmd::GET_DYNAMIC_CONFIG => self.respond(code::ERROR, Vec::new()),
            _ => self.respond(code::NOT_IMPLEMENTED, Vec::new()),
        }
    }

    fn handle_write(&mut self, data: &[u8]) {
        self.chunks_written += 1;
        let Some((&first, rest)) = data.split_first() else {
            return;
        };

        if first == cmd::CONTINUE_WRITE {
            if let Some(incoming) = self.incoming.as_mut() {
                incoming.payload.extend_from_slice(rest);
            }
        } else {
            let expected = match rest {
                [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]) as usize,
                _ => 0,
            };
            self.incoming = Some(Incoming {
                command: first,
                expected,
                payload: rest.get(2..).unwrap_or(&[]).to_vec(),
            });
        }

        if let Some(incoming) = self.incoming.take() {
            if incoming.payload.len() >= incoming.expected {
                let mut payload = incoming.payload;
                payload.truncate(incoming.expected);
                self.dispatch(incoming.command, payload);
            } else {
                self.incoming = Some(incoming);
            }
        }
    }

    fn next_queued_report(&mut self) -> Option<Frame> {
        let pos = self
            .reports
            .iter()
            .position(|f| f.code == code::REPORT_IDENTIFY || self.enabled_reports.contains(&f.code));
        pos.and_then(|i| self.reports.remove(i))
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.reports_first {
            if let Some(frame) = self.next_queued_report() {
                return Some(frame);
            }
        }
        if let Some(frame) = self.outbox.pop_front() {
            return Some(frame);
        }
        if let Some(frame) = self.next_queued_report() {
            return Some(frame);
        }
        let mut codes: Vec<u8> = self
            .sticky_reports
            .keys()
            .copied()
            .filter(|c| self.enabled_reports.contains(c))
            .collect();
        codes.sort_unstable();
        codes.first().map(|c| Frame {
            code: *c,
            payload: self.sticky_reports[c].clone(),
        })
    }

    fn handle_read(&mut self, buf: &mut [u8]) {
        buf.fill(0);
        if let Some(payload) = self.in_flight.take() {
            let mut frame = Vec::with_capacity(payload.len() + 3);
            frame.push(MARKER);
            frame.push(CONTINUE_READ);
            frame.extend_from_slice(&payload);
            frame.push(END_MARKER);
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            return;
        }

        let header = if self.busy_remaining > 0 && !self.outbox.is_empty() {
            self.busy_remaining -= 1;
            [MARKER, code::BUSY, 0, 0]
        } else {
            match self.next_frame() {
                Some(frame) => {
                    let len = (frame.payload.len() as u16).to_le_bytes();
                    if !frame.payload.is_empty() {
                        self.in_flight = Some(frame.payload);
                    }
                    [MARKER, frame.code, len[0], len[1]]
                }
                None => [MARKER, code::IDLE, 0, 0],
            }
        };
        let n = header.len().min(buf.len());
        buf[..n].copy_from_slice(&header[..n]);
    }
}

impl Transport for DummyTcm {
    fn read(&mut self, _addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
        self.handle_read(buf);
        Ok(buf.len())
    }

    fn write(&mut self, _addr: Option<u16>, data: &[u8]) -> Result<usize> {
        self.handle_write(data);
        Ok(data.len())
    }

    fn set_raw_mode(&mut self, raw: bool) -> Result<()> {
        self.raw_mode = raw;
        Ok(())
    }

    fn set_irq(&mut self, enable: bool) -> Result<()> {
        self.irq_enabled = enable;
        Ok(())
    }

    fn hardware_reset(&mut self) -> Result<()> {
        self.hardware_resets += 1;
        self.outbox.clear();
        self.in_flight = None;
        self.incoming = None;
        self.enabled_reports.clear();
        self.switch_mode(MODE_APPLICATION);
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms += ms as u64;
    }
}

fn copy_str(dst: &mut [u8], s: &str) {
    let n = s.len().min(dst.len());
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
}

fn put_words(dst: &mut [u8], offset: usize, words: &[u16]) {
    for (i, w) in words.iter().enumerate() {
        let at = offset + i * 2;
        if at + 2 <= dst.len() {
            dst[at..at + 2].copy_from_slice(&w.to_le_bytes());
        }
    }
}

/// MSB-first bit packer matching the default report bit order
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    fn push(&mut self, value: u32, width: u32) {
        for i in (0..width).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(dev: &mut DummyTcm, command: u8, payload: &[u8]) {
        let mut msg = vec![command];
        msg.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        msg.extend_from_slice(payload);
        dev.write_fifo(&msg).unwrap();
    }

    fn header(dev: &mut DummyTcm) -> [u8; 4] {
        let mut h = [0u8; 4];
        dev.read_fifo(&mut h).unwrap();
        h
    }

    #[test]
    fn test_identify_response() {
        let mut dev = DummyTcm::new();
        send(&mut dev, cmd::IDENTIFY, &[]);
        let h = header(&mut dev);
        assert_eq!(h, [MARKER, code::OK, 24, 0]);
        let mut frame = [0u8; 27];
        dev.read_fifo(&mut frame).unwrap();
        assert_eq!(&frame[..2], &[MARKER, CONTINUE_READ]);
        assert_eq!(frame[3], MODE_APPLICATION);
        assert_eq!(frame[26], END_MARKER);
        assert_eq!(header(&mut dev), [MARKER, code::IDLE, 0, 0]);
    }

    #[test]
    fn test_busy_then_ok() {
        let mut dev = DummyTcm::new();
        dev.set_busy_polls(2);
        send(&mut dev, cmd::REZERO, &[]);
        assert_eq!(header(&mut dev)[1], code::BUSY);
        assert_eq!(header(&mut dev)[1], code::BUSY);
        assert_eq!(header(&mut dev), [MARKER, code::OK, 0, 0]);
    }

    #[test]
    fn test_continuation_chunks_reassemble() {
        let mut dev = DummyTcm::new();
        dev.write_fifo(&[cmd::SET_DYNAMIC_CONFIG, 3, 0, 4]).unwrap();
        assert_eq!(header(&mut dev)[1], code::IDLE);
        dev.write_fifo(&[cmd::CONTINUE_WRITE, 0x34, 0x12]).unwrap();
        assert_eq!(header(&mut dev)[1], code::OK);
        assert_eq!(dev.dynamic_config(4), Some(0x1234));
    }

    #[test]
    fn test_reports_wait_for_enable() {
        let mut dev = DummyTcm::new();
        dev.queue_report(code::REPORT_DELTA, vec![1, 2]);
        assert_eq!(header(&mut dev)[1], code::IDLE);
        send(&mut dev, cmd::ENABLE_REPORT, &[code::REPORT_DELTA]);
        assert_eq!(header(&mut dev)[1], code::OK);
        assert_eq!(header(&mut dev), [MARKER, code::REPORT_DELTA, 2, 0]);
    }

    #[test]
    fn test_boot_info_needs_bootloader() {
        let mut dev = DummyTcm::new();
        send(&mut dev, cmd::GET_BOOT_INFO, &[]);
        assert_eq!(header(&mut dev)[1], code::ERROR);
        send(&mut dev, cmd::RUN_BOOTLOADER_FIRMWARE, &[]);
        let h = header(&mut dev);
        assert_eq!(h[1], code::REPORT_IDENTIFY);
        let mut frame = vec![0u8; 27];
        dev.read_fifo(&mut frame).unwrap();
        assert_eq!(frame[3], MODE_BOOTLOADER);
        send(&mut dev, cmd::GET_BOOT_INFO, &[]);
        assert_eq!(header(&mut dev), [MARKER, code::OK, 32, 0]);
    }

    #[test]
    fn test_bit_writer_msb_first() {
        let mut w = BitWriter::default();
        w.push(0x3, 4);
        w.push(0x1, 4);
        w.push(0xABC, 12);
        assert_eq!(w.bytes, vec![0x31, 0xAB, 0xC0]);
    }
}
