//! RMI register-map emulator
//!
//! Emulates a two-page device: page 0 carries F01, F12, F1A and F34, page 1
//! carries F54 and F55. Most registers are plain memory. F12 queries,
//! controls and data are packet registers (one address, many bytes) and the
//! F54 report data register streams whatever report was last requested.
//! Command registers clear themselves so poll loops complete.

use crate::registers::DummyRegisters;
use std::collections::{BTreeMap, HashMap, VecDeque};
use synadiag_core::{Result, Transport};

/// Register addresses used by the emulated device
pub mod layout {
    pub const F01_QUERY: u16 = 0x0040;
    pub const F01_COMMAND: u16 = 0x0058;
    pub const F01_CONTROL: u16 = 0x005A;
    pub const F01_DATA: u16 = 0x005E;

    pub const F12_QUERY: u16 = 0x0060;
    pub const F12_CONTROL: u16 = 0x0070;
    pub const F12_DATA: u16 = 0x0078;
    /// control 8, 20, 23
    pub const F12_CTRL8: u16 = F12_CONTROL;
    pub const F12_CTRL20: u16 = F12_CONTROL + 1;
    pub const F12_CTRL23: u16 = F12_CONTROL + 2;
    /// data 1, 15
    pub const F12_DATA1: u16 = F12_DATA;
    pub const F12_DATA15: u16 = F12_DATA + 1;

    pub const F1A_QUERY: u16 = 0x0080;
    pub const F34_QUERY: u16 = 0x0084;
    pub const F34_CONTROL: u16 = 0x0086;

    pub const F54_QUERY: u16 = 0x0100;
    pub const F54_COMMAND: u16 = 0x0120;
    pub const F54_CONTROL: u16 = 0x0130;
    pub const F54_DATA: u16 = 0x0180;
    pub const F54_REPORT_DATA: u16 = F54_DATA + 3;

    pub const F55_QUERY: u16 = 0x0190;
    pub const F55_CONTROL: u16 = 0x01A8;

    /// Interrupt bit of F12 in F01 control 1
    pub const F12_INTERRUPT_MASK: u8 = 1 << 2;
}

const F01_CMD_RESET: u8 = 0x01;
const F54_CMD_GET_REPORT: u8 = 0x01;
const FINGER_RECORD_SIZE: usize = 8;

/// Shape of the emulated device
#[derive(Debug, Clone)]
pub struct DummyRmiConfig {
    pub product_id: String,
    pub build_id: u32,
    pub config_id: [u8; 4],
    /// F54 queries 0..12 (query 12 only when query 6 bit 2 is set)
    pub f54_query: Vec<u8>,
    /// Optional F54 queries that follow the base block
    pub f54_chain: Vec<u8>,
    /// `false` leaves F55 out of the PDT
    pub f55: bool,
    /// F55 query 2 (flags); the rx/tx counts come from the pin tables
    pub f55_flags: u8,
    pub rx_pins: Vec<u8>,
    pub tx_pins: Vec<u8>,
    /// `None` leaves F1A out of the PDT
    pub buttons: Option<u8>,
    pub max_objects: u8,
}

impl Default for DummyRmiConfig {
    fn default() -> Self {
        Self {
            product_id: "s3908p".into(),
            build_id: 0x012345,
            config_id: [0xDE, 0xAD, 0xBE, 0xEF],
            // 6 rx, 4 tx, family 0, sense frequency control with 3 frequencies,
            // signal clarity, 0D acquisition, control 88, query 15
            f54_query: vec![6, 4, 0, 0, 0, 0, 0, 0x04, 0, 0, 0x24, 0, 0xC0, 3],
            // query 15: has query 21; query 21: has control 91
            f54_chain: vec![0x20, 0x04],
            f55: true,
            f55_flags: 0x01,
            rx_pins: vec![10, 11, 12, 13, 14, 15],
            tx_pins: vec![0, 1, 2, 3],
            buttons: Some(2),
            max_objects: 10,
        }
    }
}

/// One emulated finger slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyFinger {
    pub slot: usize,
    pub classification: u8,
    pub x: u16,
    pub y: u16,
    pub z: u8,
    pub wx: u8,
    pub wy: u8,
}

struct ReportVariant {
    report_type: u8,
    addr: u16,
    value: u8,
    data: Vec<u8>,
}

/// Emulated RMI controller
pub struct DummyRmi {
    config: DummyRmiConfig,
    regs: DummyRegisters,
    packets: BTreeMap<u16, Vec<u8>>,
    queued: HashMap<u8, VecDeque<Vec<u8>>>,
    sticky: HashMap<u8, Vec<u8>>,
    variants: Vec<ReportVariant>,
    busy_polls: u32,
    busy_remaining: u32,
    resets: usize,
    hardware_resets: usize,
    commands: Vec<u8>,
    reports_served: Vec<u8>,
    writes: Vec<(u16, Vec<u8>)>,
    raw_mode: bool,
    irq_enabled: bool,
}

impl Default for DummyRmi {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyRmi {
    pub fn new() -> Self {
        Self::with_config(DummyRmiConfig::default())
    }

    pub fn with_config(config: DummyRmiConfig) -> Self {
        let mut dev = Self {
            config,
            regs: DummyRegisters::new(),
            packets: BTreeMap::new(),
            queued: HashMap::new(),
            sticky: HashMap::new(),
            variants: Vec::new(),
            busy_polls: 0,
            busy_remaining: 0,
            resets: 0,
            hardware_resets: 0,
            commands: Vec::new(),
            reports_served: Vec::new(),
            writes: Vec::new(),
            raw_mode: false,
            irq_enabled: true,
        };
        dev.build();
        dev
    }

    fn build(&mut self) {
        use layout::*;
        let c = self.config.clone();

        // page 0, descriptors descending from 0xE9
        self.regs.load(0x00E9, &descriptor(F01_QUERY, F01_COMMAND, F01_CONTROL, F01_DATA, 0, 2, 0x01));
        self.regs.load(0x00E3, &descriptor(F12_QUERY, 0, F12_CONTROL, F12_DATA, 0, 1, 0x12));
        let mut next = 0x00DD;
        if c.buttons.is_some() {
            self.regs.load(next, &descriptor(F1A_QUERY, 0x83, 0x81, 0x82, 0, 1, 0x1A));
            next -= 6;
        }
        self.regs.load(next, &descriptor(F34_QUERY, 0x85, F34_CONTROL, 0x8A, 0, 1, 0x34));
        // page 1
        self.regs.load(0x01E9, &descriptor(F54_QUERY, F54_COMMAND, F54_CONTROL, F54_DATA, 0, 1, 0x54));
        if c.f55 {
            self.regs.load(0x01E3, &descriptor(F55_QUERY, 0x01A0, F55_CONTROL, 0x01C0, 0, 0, 0x55));
        }

        // F01 identity
        let mut product = [0u8; 10];
        let len = c.product_id.len().min(10);
        product[..len].copy_from_slice(&c.product_id.as_bytes()[..len]);
        self.regs.load(F01_QUERY, &[0x01]);
        self.regs.load(F01_QUERY + 11, &product);
        self.regs.load(F01_QUERY + 17, &[0x39]);
        let b = c.build_id.to_le_bytes();
        self.regs.load(F01_QUERY + 18, &b[..3]);
        // all interrupts enabled
        self.regs.load(F01_CONTROL + 1, &[0x3F]);

        // F12 presence maps: controls 8, 20, 23; data 1, 15
        self.packets.insert(F12_QUERY + 4, vec![4]);
        self.packets.insert(F12_QUERY + 5, vec![0, 0x00, 0x01, 0x90]);
        self.packets.insert(F12_QUERY + 7, vec![3]);
        self.packets.insert(F12_QUERY + 8, vec![0, 0x02, 0x80]);
        let mut ctrl8 = vec![0u8; 14];
        ctrl8[0..2].copy_from_slice(&1080u16.to_le_bytes());
        ctrl8[2..4].copy_from_slice(&1920u16.to_le_bytes());
        ctrl8[12] = c.rx_pins.len() as u8;
        ctrl8[13] = c.tx_pins.len() as u8;
        self.packets.insert(F12_CTRL8, ctrl8);
        self.packets.insert(F12_CTRL20, vec![0, 0, 0]);
        self.packets.insert(F12_CTRL23, vec![0x01, c.max_objects]);
        self.set_fingers(&[]);

        if let Some(buttons) = c.buttons {
            self.regs.load(F1A_QUERY, &[buttons.saturating_sub(1) & 0x07]);
        }
        self.regs.load(F34_CONTROL, &c.config_id);

        // F54 queries are plain memory
        self.regs.load(F54_QUERY, &c.f54_query);
        self.regs.load(F54_QUERY + c.f54_query.len() as u16, &c.f54_chain);

        // F55: rx, tx, flags, then control 0, control 1 (rx), control 2 (tx)
        if c.f55 {
            let rx = c.rx_pins.len() as u8;
            let tx = c.tx_pins.len() as u8;
            self.regs.load(F55_QUERY, &[rx, tx, c.f55_flags]);
            self.regs.load(F55_CONTROL + 1, &c.rx_pins);
            self.regs.load(F55_CONTROL + 1 + rx as u16, &c.tx_pins);
        }
    }

    pub fn config(&self) -> &DummyRmiConfig {
        &self.config
    }

    /// Flat register memory
    pub fn registers(&mut self) -> &mut DummyRegisters {
        &mut self.regs
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.regs.peek(addr)
    }

    /// Install a packet register: a read at `addr` returns `data`
    pub fn set_packet(&mut self, addr: u16, data: Vec<u8>) {
        self.packets.insert(addr, data);
    }

    /// Serve `data` once for the next request of `report_type`
    pub fn queue_report(&mut self, report_type: u8, data: Vec<u8>) {
        self.queued.entry(report_type).or_default().push_back(data);
    }

    /// Serve `data` for every request of `report_type` with nothing queued
    pub fn set_report(&mut self, report_type: u8, data: Vec<u8>) {
        self.sticky.insert(report_type, data);
    }

    /// Serve `data` for `report_type` while register `addr` holds `value`
    pub fn set_report_when(&mut self, report_type: u8, addr: u16, value: u8, data: Vec<u8>) {
        self.variants.push(ReportVariant {
            report_type,
            addr,
            value,
            data,
        });
    }

    /// Keep F54 command bits set for `polls` reads after each command
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Write the F12 finger records and attention bitmap
    pub fn set_fingers(&mut self, fingers: &[DummyFinger]) {
        let max = self.config.max_objects as usize;
        let mut records = vec![0u8; max * FINGER_RECORD_SIZE];
        let mut attention = vec![0u8; max.div_ceil(8).max(1)];
        for f in fingers.iter().filter(|f| f.slot < max) {
            let r = &mut records[f.slot * FINGER_RECORD_SIZE..(f.slot + 1) * FINGER_RECORD_SIZE];
            r[0] = f.classification;
            r[1..3].copy_from_slice(&f.x.to_le_bytes());
            r[3..5].copy_from_slice(&f.y.to_le_bytes());
            r[5] = f.z;
            r[6] = f.wx;
            r[7] = f.wy;
            if f.classification != 0 {
                attention[f.slot / 8] |= 1 << (f.slot % 8);
            }
        }
        self.packets.insert(layout::F12_DATA1, records);
        self.packets.insert(layout::F12_DATA15, attention);
    }

    /// Overwrite the attention bitmap alone
    pub fn set_attention(&mut self, bitmap: Vec<u8>) {
        self.packets.insert(layout::F12_DATA15, bitmap);
    }

    /// F01 soft resets seen
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn hardware_reset_count(&self) -> usize {
        self.hardware_resets
    }

    /// Every F54 command byte written, in order
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Report types served by get-report, in order
    pub fn reports_served(&self) -> &[u8] {
        &self.reports_served
    }

    /// Every register write, in order
    pub fn writes(&self) -> &[(u16, Vec<u8>)] {
        &self.writes
    }

    /// Number of register writes that started at `addr`
    pub fn writes_to(&self, addr: u16) -> usize {
        self.writes.iter().filter(|(a, _)| *a == addr).count()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.regs.elapsed_ms()
    }

    pub fn raw_mode(&self) -> bool {
        self.raw_mode
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    fn serve_report(&mut self) {
        let report_type = self.regs.peek(layout::F54_DATA);
        let data = self
            .variants
            .iter()
            .find(|v| v.report_type == report_type && self.regs.peek(v.addr) == v.value)
            .map(|v| v.data.clone())
            .or_else(|| self.queued.get_mut(&report_type).and_then(|q| q.pop_front()))
            .or_else(|| self.sticky.get(&report_type).cloned())
            .unwrap_or_default();
        log::trace!("dummy rmi: serving report {} ({} bytes)", report_type, data.len());
        self.reports_served.push(report_type);
        self.packets.insert(layout::F54_REPORT_DATA, data);
    }

    fn handle_write(&mut self, addr: u16, data: &[u8]) {
        self.writes.push((addr, data.to_vec()));
        if let Some(packet) = self.packets.get_mut(&addr) {
            *packet = data.to_vec();
            return;
        }
        self.regs.load(addr, data);

        match addr {
            layout::F01_COMMAND if data.first().is_some_and(|c| c & F01_CMD_RESET != 0) => {
                self.resets += 1;
                self.regs.load(layout::F01_COMMAND, &[0]);
            }
            layout::F54_COMMAND => {
                let cmd = data.first().copied().unwrap_or(0);
                self.commands.push(cmd);
                if cmd & F54_CMD_GET_REPORT != 0 {
                    self.serve_report();
                }
                if self.busy_polls == 0 {
                    self.regs.load(layout::F54_COMMAND, &[0]);
                } else {
                    self.busy_remaining = self.busy_polls;
                }
            }
            _ => {}
        }
    }

    fn handle_read(&mut self, addr: u16, buf: &mut [u8]) {
        if let Some(packet) = self.packets.get(&addr) {
            buf.fill(0);
            let n = packet.len().min(buf.len());
            buf[..n].copy_from_slice(&packet[..n]);
            return;
        }
        self.regs.read_into(addr, buf);
        if addr == layout::F54_COMMAND && self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            if self.busy_remaining == 0 {
                self.regs.load(layout::F54_COMMAND, &[0]);
            }
        }
    }
}

fn descriptor(query: u16, command: u16, control: u16, data: u16, version: u8, irqs: u8, number: u8) -> [u8; 6] {
    [
        query as u8,
        command as u8,
        control as u8,
        data as u8,
        (version << 5) | (irqs & 0x07),
        number,
    ]
}

impl Transport for DummyRmi {
    fn read(&mut self, addr: Option<u16>, buf: &mut [u8]) -> Result<usize> {
        self.handle_read(addr.unwrap_or(0), buf);
        Ok(buf.len())
    }

    fn write(&mut self, addr: Option<u16>, data: &[u8]) -> Result<usize> {
        self.handle_write(addr.unwrap_or(0), data);
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
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.regs.add_delay(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdt_entries() {
        let mut dev = DummyRmi::new();
        let mut raw = [0u8; 6];
        dev.read_register(0x00E9, &mut raw).unwrap();
        assert_eq!(raw[5], 0x01);
        dev.read_register(0x01E9, &mut raw).unwrap();
        assert_eq!(raw[5], 0x54);
        dev.read_register(0x02E9, &mut raw).unwrap();
        assert_eq!(raw[5], 0x00);
    }

    #[test]
    fn test_get_report_serves_queue_then_sticky() {
        let mut dev = DummyRmi::new();
        dev.set_report(3, vec![9, 9]);
        dev.queue_report(3, vec![1, 2]);

        for expected in [[1u8, 2, 0], [9, 9, 0]] {
            dev.write_byte(layout::F54_DATA, 3).unwrap();
            dev.write_byte(layout::F54_COMMAND, F54_CMD_GET_REPORT).unwrap();
            assert_eq!(dev.read_byte(layout::F54_COMMAND).unwrap(), 0);
            let mut buf = [0xFFu8; 3];
            dev.read_register(layout::F54_REPORT_DATA, &mut buf).unwrap();
            assert_eq!(buf, expected);
        }
        assert_eq!(dev.reports_served(), &[3, 3]);
    }

    #[test]
    fn test_busy_command() {
        let mut dev = DummyRmi::new();
        dev.set_busy_polls(2);
        dev.write_byte(layout::F54_COMMAND, 0x04).unwrap();
        assert_eq!(dev.read_byte(layout::F54_COMMAND).unwrap(), 0x04);
        assert_eq!(dev.read_byte(layout::F54_COMMAND).unwrap(), 0x04);
        assert_eq!(dev.read_byte(layout::F54_COMMAND).unwrap(), 0);
    }

    #[test]
    fn test_fingers() {
        let mut dev = DummyRmi::new();
        dev.set_fingers(&[DummyFinger {
            slot: 1,
            classification: 1,
            x: 0x0102,
            ..Default::default()
        }]);
        let mut att = [0u8; 2];
        dev.read_register(layout::F12_DATA15, &mut att).unwrap();
        assert_eq!(att, [0x02, 0x00]);
        let mut rec = [0u8; 16];
        dev.read_register(layout::F12_DATA1, &mut rec).unwrap();
        assert_eq!(&rec[8..11], &[1, 0x02, 0x01]);
    }

    #[test]
    fn test_reset_counter() {
        let mut dev = DummyRmi::new();
        dev.write_byte(layout::F01_COMMAND, F01_CMD_RESET).unwrap();
        assert_eq!(dev.reset_count(), 1);
        assert_eq!(dev.peek(layout::F01_COMMAND), 0);
    }
}
