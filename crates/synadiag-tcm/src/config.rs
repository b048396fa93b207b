//! TCM engine settings

use serde::{Deserialize, Serialize};
use synadiag_core::bits::BitOrder;

/// Bit offsets and widths of the pin tables inside the static config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfigLayout {
    pub rx_pins_offset: usize,
    pub rx_pins_bits: usize,
    pub tx_pins_offset: usize,
    pub tx_pins_bits: usize,
    pub rx_guard_count_offset: usize,
    pub tx_guard_count_offset: usize,
    pub rx_guard_pins_offset: usize,
    pub rx_guard_pins_bits: usize,
    pub tx_guard_pins_offset: usize,
    pub tx_guard_pins_bits: usize,
}

impl Default for StaticConfigLayout {
    fn default() -> Self {
        Self {
            rx_pins_offset: 2640,
            rx_pins_bits: 544,
            tx_pins_offset: 3184,
            tx_pins_bits: 256,
            rx_guard_count_offset: 3632,
            tx_guard_count_offset: 3648,
            rx_guard_pins_offset: 6896,
            rx_guard_pins_bits: 32,
            tx_guard_pins_offset: 6928,
            tx_guard_pins_bits: 48,
        }
    }
}

/// Settings that vary between TCM firmware builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcmOptions {
    /// Bit order of touch report fields
    pub bit_order: BitOrder,
    /// Pin table location in the static config
    pub static_config: StaticConfigLayout,
    /// Bytes in the bit-packed pin result of the TRX tests
    pub trx_bitmap_bytes: usize,
}

impl Default for TcmOptions {
    fn default() -> Self {
        Self {
            bit_order: BitOrder::Msb0,
            static_config: StaticConfigLayout::default(),
            trx_bitmap_bytes: 8,
        }
    }
}

impl TcmOptions {
    /// Pins covered by a TRX test result
    pub fn trx_pins(&self) -> usize {
        self.trx_bitmap_bytes * 8
    }
}
