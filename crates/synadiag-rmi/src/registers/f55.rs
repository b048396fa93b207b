//! F55: sensor tuning and electrode assignment
//!
//! Control 1 and 2 map rx and tx channels to physical TRX pins. The
//! production tests that report per-pin results (TRX opens and shorts) use
//! these tables to tell which pins carry a signal.

use super::{read_query_chain, QueryContext, QueryField, QueryMap, RegisterField, RegisterLayout};
use crate::pdt::FunctionDescriptor;
use synadiag_core::bits::bit;
use synadiag_core::{Result, Transport};

/// Marks a channel that is not routed to any pin
pub const UNASSIGNED: u8 = 0xFF;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct F55Query {
    pub base: [u8; 3],
    pub chain: QueryMap,
}

impl QueryContext for F55Query {
    fn chain_mut(&mut self) -> &mut QueryMap {
        &mut self.chain
    }
}

impl F55Query {
    pub fn num_rx(&self) -> u8 {
        self.base[0]
    }

    pub fn num_tx(&self) -> u8 {
        self.base[1]
    }

    pub fn has_sensor_assignment(&self) -> bool {
        bit(self.base[2], 0)
    }

    pub fn has_edge_compensation(&self) -> bool {
        bit(self.base[2], 1)
    }

    pub fn curve_compensation_mode(&self) -> u8 {
        (self.base[2] >> 2) & 0x03
    }

    pub fn has_ctrl6(&self) -> bool {
        bit(self.base[2], 4)
    }

    pub fn has_alternate_transmitter_assignment(&self) -> bool {
        bit(self.base[2], 5)
    }

    pub fn has_single_layer_multi_touch(&self) -> bool {
        bit(self.base[2], 6)
    }

    pub fn has_query5(&self) -> bool {
        bit(self.base[2], 7)
    }

    pub fn has_amp_sensor(&self) -> bool {
        self.chain.flag(23, 0)
    }

    pub fn size_of_column2mux(&self) -> u8 {
        self.chain.byte(23, 0) >> 3
    }

    pub fn has_guard_disable(&self) -> bool {
        self.chain.flag(22, 2)
    }

    pub fn has_extended_amp_pad(&self) -> bool {
        self.chain.flag(30, 2)
    }

    /// Extra column mux entries on extended amp pad parts
    pub fn extended_column2mux(&self) -> u8 {
        self.chain.byte(31, 1)
    }

    fn single_layer_flag(&self, n: u8) -> bool {
        self.has_single_layer_multi_touch() && self.chain.flag(3, n)
    }
}

macro_rules! q {
    ($n:expr, $present:expr) => {
        QueryField {
            number: $n,
            present: $present,
            size: |_| 1,
        }
    };
    ($n:expr, $present:expr, $size:expr) => {
        QueryField {
            number: $n,
            present: $present,
            size: |_| $size,
        }
    };
}

pub const QUERY_CHAIN: &[QueryField<F55Query>] = &[
    q!(3, |q| q.has_single_layer_multi_touch()),
    q!(4, |q| q.single_layer_flag(1)),
    q!(5, |q| q.has_query5()),
    q!(6, |q| q.curve_compensation_mode() == 3, 2),
    q!(8, |q| q.single_layer_flag(0)),
    q!(9, |q| q.single_layer_flag(7)),
    q!(17, |q| q.chain.flag(5, 7)),
    q!(18, |q| q.chain.flag(17, 7)),
    q!(19, |q| q.chain.flag(18, 2)),
    q!(20, |q| q.chain.flag(18, 5)),
    q!(21, |q| q.chain.flag(18, 6)),
    q!(22, |q| q.chain.flag(18, 7)),
    q!(23, |q| q.chain.flag(22, 1)),
    // queries 24 .. 27
    q!(24, |q| q.chain.flag(22, 6), 4),
    q!(28, |q| q.chain.flag(22, 7)),
    q!(29, |q| q.chain.flag(28, 6)),
    q!(30, |q| q.chain.flag(28, 7)),
    // queries 31 32
    q!(31, |q| q.chain.flag(30, 1), 2),
];

macro_rules! c {
    ($n:expr, $present:expr) => {
        RegisterField {
            number: $n,
            present: $present,
            size: |_| 1,
        }
    };
    ($n:expr, $present:expr, $size:expr) => {
        RegisterField {
            number: $n,
            present: $present,
            size: $size,
        }
    };
}

pub const CONTROL_TABLE: &[RegisterField<F55Query>] = &[
    c!(0, |_| true),
    c!(1, |q| q.has_sensor_assignment(), |q| q.num_rx() as u16),
    c!(2, |q| q.has_sensor_assignment(), |q| q.num_tx() as u16),
    c!(3, |q| q.has_edge_compensation(), |q| q.num_rx() as u16),
    c!(4, |q| q.has_edge_compensation(), |q| q.num_tx() as u16),
    c!(5, |q| matches!(q.curve_compensation_mode(), 1 | 2), |q| {
        if q.curve_compensation_mode() == 1 {
            q.num_rx().max(q.num_tx()) as u16
        } else {
            q.num_rx() as u16
        }
    }),
    c!(6, |q| q.has_ctrl6()),
    c!(7, |q| q.has_alternate_transmitter_assignment(), |q| q.num_tx() as u16),
    c!(8, |q| q.single_layer_flag(0)),
    c!(9, |q| q.single_layer_flag(1)),
    c!(12, |q| q.chain.flag(5, 1)),
    c!(13, |q| q.chain.flag(5, 3)),
    c!(14, |q| q.chain.flag(5, 5)),
    c!(16, |q| q.chain.flag(17, 1)),
    c!(17, |q| q.chain.flag(17, 3)),
    // controls 18 19
    c!(18, |q| q.chain.flag(17, 2), |_| 2),
    c!(20, |q| q.chain.flag(17, 4)),
    c!(21, |q| q.chain.flag(17, 5)),
    c!(22, |q| q.chain.flag(17, 6)),
    c!(23, |q| q.chain.flag(18, 0)),
    c!(24, |q| q.chain.flag(18, 1)),
    c!(25, |q| q.chain.flag(18, 3)),
    c!(26, |q| q.chain.flag(18, 4)),
    c!(27, |q| q.chain.flag(18, 5)),
    c!(28, |q| q.chain.flag(18, 6)),
    c!(29, |q| q.chain.flag(22, 0)),
    c!(30, |q| q.chain.flag(22, 3)),
];

/// What a physical TRX pin is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Tx(usize),
    Rx(usize),
    Guard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct F55Info {
    pub fd: FunctionDescriptor,
    pub query: F55Query,
    pub controls: RegisterLayout,
    /// Physical pin of each rx channel
    pub rx_assignment: Vec<u8>,
    /// Physical pin of each tx channel
    pub tx_assignment: Vec<u8>,
    pub rx_assigned: usize,
    pub tx_assigned: usize,
    pub guard_pin: Option<u8>,
}

impl F55Info {
    pub fn parse<T: Transport + ?Sized>(t: &mut T, fd: FunctionDescriptor) -> Result<Self> {
        let mut query = F55Query::default();
        t.read_register(fd.query_base, &mut query.base)?;
        read_query_chain(t, fd.query_base, 3, &mut query, QUERY_CHAIN)?;
        let controls = RegisterLayout::build(fd.control_base, &query, CONTROL_TABLE);

        let mut rx_assignment = Vec::new();
        let mut tx_assignment = Vec::new();
        if let (Some(rx_addr), Some(tx_addr)) = (controls.address(1), controls.address(2)) {
            rx_assignment = vec![0u8; query.num_rx() as usize];
            tx_assignment = vec![0u8; query.num_tx() as usize];
            t.read_register(rx_addr, &mut rx_assignment)?;
            t.read_register(tx_addr, &mut tx_assignment)?;
        }

        let mut rx_assigned = rx_assignment.iter().filter(|&&p| p != UNASSIGNED).count();
        let mut tx_assigned = tx_assignment.iter().filter(|&&p| p != UNASSIGNED).count();
        if query.has_amp_sensor() {
            tx_assigned = query.size_of_column2mux() as usize;
            if query.has_extended_amp_pad() {
                tx_assigned += query.extended_column2mux() as usize;
            }
            rx_assigned /= 2;
        }

        let guard_pin = match controls.address(30) {
            Some(addr) if query.has_guard_disable() => {
                Some(t.read_byte(addr)?).filter(|&p| p != UNASSIGNED)
            }
            _ => None,
        };

        log::info!(
            "F55: {} rx / {} tx assigned{}{}",
            rx_assigned,
            tx_assigned,
            if query.has_amp_sensor() { ", amp sensor" } else { "" },
            guard_pin
                .map(|p| format!(", guard pin {}", p))
                .unwrap_or_default()
        );

        Ok(Self {
            fd,
            query,
            controls,
            rx_assignment,
            tx_assignment,
            rx_assigned,
            tx_assigned,
            guard_pin,
        })
    }

    /// Classify physical `pin`, `None` when nothing is routed to it
    pub fn pin_role(&self, pin: u8) -> Option<PinRole> {
        if pin == UNASSIGNED {
            return None;
        }
        if let Some(ch) = self.tx_assignment.iter().position(|&p| p == pin) {
            return Some(PinRole::Tx(ch));
        }
        if let Some(ch) = self.rx_assignment.iter().position(|&p| p == pin) {
            return Some(PinRole::Rx(ch));
        }
        if self.guard_pin == Some(pin) {
            return Some(PinRole::Guard);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synadiag_dummy::DummyRegisters;

    fn fd() -> FunctionDescriptor {
        FunctionDescriptor {
            number: 0x55,
            query_base: 0x0500,
            command_base: 0x0500,
            control_base: 0x0600,
            data_base: 0x0700,
            version: 0,
            interrupt_count: 0,
            interrupt_offset: 0,
        }
    }

    #[test]
    fn test_assignment_tables() {
        let mut regs = DummyRegisters::new();
        regs.load(0x0500, &[3, 2, 0x01]);
        // ctrl0, ctrl1 (rx), ctrl2 (tx)
        regs.load(0x0600, &[0x00, 10, 11, UNASSIGNED, 20, 21]);
        let f55 = F55Info::parse(&mut regs, fd()).unwrap();
        assert_eq!(f55.rx_assignment, vec![10, 11, UNASSIGNED]);
        assert_eq!(f55.tx_assignment, vec![20, 21]);
        assert_eq!(f55.rx_assigned, 2);
        assert_eq!(f55.tx_assigned, 2);
        assert_eq!(f55.pin_role(21), Some(PinRole::Tx(1)));
        assert_eq!(f55.pin_role(10), Some(PinRole::Rx(0)));
        assert_eq!(f55.pin_role(30), None);
        assert_eq!(f55.pin_role(UNASSIGNED), None);
    }

    #[test]
    fn test_amp_sensor_counts_and_guard() {
        let mut regs = DummyRegisters::new();
        // q2: assignment + query5 ; q5: query17 ; q17: query18 ;
        // q18: query22 ; q22: query23 + guard disable + ctrl30 ;
        // q23: amp sensor, column2mux = 6
        regs.load(0x0500, &[4, 2, 0x81, 0x80, 0x80, 0x80, 0x0E, (6 << 3) | 1]);
        regs.load(0x0600, &[0x00, 1, 2, 3, 4, 5, 6]);
        let f55 = F55Info::parse(&mut regs, fd()).unwrap();
        assert!(f55.query.has_amp_sensor());
        assert_eq!(f55.tx_assigned, 6);
        assert_eq!(f55.rx_assigned, 2);
        // ctrl30 is the only control after ctrl2
        assert_eq!(f55.controls.address(30), Some(0x0607));
        assert_eq!(f55.guard_pin, Some(0));
        assert_eq!(f55.pin_role(5), Some(PinRole::Tx(0)));
    }
}
