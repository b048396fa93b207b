//! Sensor pin tables from the static config

use crate::config::StaticConfigLayout;
use synadiag_core::bits::le16;

/// What a physical pin is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Tx(usize),
    Rx(usize),
    Guard,
}

/// TX, RX and guard pin numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinTable {
    pub tx: Vec<u16>,
    pub rx: Vec<u16>,
    pub guard: Vec<u16>,
}

/// `count` LE16 entries starting at bit `offset`, capped at `bits` of table
fn entries(config: &[u8], offset: usize, bits: usize, count: usize) -> Vec<u16> {
    let start = offset / 8;
    (0..count.min(bits / 16))
        .map(|i| le16(config, start + i * 2))
        .collect()
}

impl PinTable {
    /// Read the tables for a `rows` (tx) by `cols` (rx) sensor
    pub fn parse(config: &[u8], layout: &StaticConfigLayout, rows: usize, cols: usize) -> Self {
        let rx_guards = le16(config, layout.rx_guard_count_offset / 8) as usize;
        let tx_guards = le16(config, layout.tx_guard_count_offset / 8) as usize;
        let mut guard = entries(
            config,
            layout.rx_guard_pins_offset,
            layout.rx_guard_pins_bits,
            rx_guards,
        );
        guard.extend(entries(
            config,
            layout.tx_guard_pins_offset,
            layout.tx_guard_pins_bits,
            tx_guards,
        ));

        let table = Self {
            tx: entries(config, layout.tx_pins_offset, layout.tx_pins_bits, rows),
            rx: entries(config, layout.rx_pins_offset, layout.rx_pins_bits, cols),
            guard,
        };
        log::debug!(
            "tcm: pins tx {:?} rx {:?} guard {:?}",
            table.tx,
            table.rx,
            table.guard
        );
        table
    }

    pub fn role(&self, pin: usize) -> Option<PinRole> {
        let pin = u16::try_from(pin).ok()?;
        if let Some(ch) = self.tx.iter().position(|&p| p == pin) {
            return Some(PinRole::Tx(ch));
        }
        if let Some(ch) = self.rx.iter().position(|&p| p == pin) {
            return Some(PinRole::Rx(ch));
        }
        self.guard.contains(&pin).then_some(PinRole::Guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(buf: &mut [u8], byte: usize, words: &[u16]) {
        for (i, w) in words.iter().enumerate() {
            buf[byte + i * 2..byte + i * 2 + 2].copy_from_slice(&w.to_le_bytes());
        }
    }

    #[test]
    fn test_default_layout() {
        let layout = StaticConfigLayout::default();
        let mut cfg = vec![0u8; 880];
        put(&mut cfg, 2640 / 8, &[20, 21, 22]);
        put(&mut cfg, 3184 / 8, &[1, 2]);
        put(&mut cfg, 3632 / 8, &[1]);
        put(&mut cfg, 3648 / 8, &[2]);
        put(&mut cfg, 6896 / 8, &[40]);
        put(&mut cfg, 6928 / 8, &[41, 42]);
        let pins = PinTable::parse(&cfg, &layout, 2, 3);
        assert_eq!(pins.tx, vec![1, 2]);
        assert_eq!(pins.rx, vec![20, 21, 22]);
        assert_eq!(pins.guard, vec![40, 41, 42]);
        assert_eq!(pins.role(2), Some(PinRole::Tx(1)));
        assert_eq!(pins.role(20), Some(PinRole::Rx(0)));
        assert_eq!(pins.role(41), Some(PinRole::Guard));
        assert_eq!(pins.role(7), None);
    }

    #[test]
    fn test_counts_capped_by_table_size() {
        let layout = StaticConfigLayout::default();
        let mut cfg = vec![0u8; 880];
        // 9 rx guards claimed, table holds 2
        put(&mut cfg, 3632 / 8, &[9]);
        let pins = PinTable::parse(&cfg, &layout, 100, 0);
        assert_eq!(pins.guard.len(), 2);
        assert_eq!(pins.tx.len(), 16);
    }
}
