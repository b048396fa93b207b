//! Bit and byte extraction from firmware buffers
//!
//! Register records and touch reports are bit packed. Fields are pulled out
//! with explicit shifts so nothing depends on host byte order or struct
//! packing.

use serde::{Deserialize, Serialize};

/// How bits are numbered within a byte while walking a packed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Bit 0 of the stream is the MSB of byte 0; values are composed most
    /// significant bit first.
    #[default]
    Msb0,
    /// Bit 0 of the stream is the LSB of byte 0; each byte contributes its
    /// low bits first and later bytes land in higher positions.
    Lsb0,
}

/// Extract `width` bits starting at `bit_offset`
///
/// `width` must be 1..=32. A field that does not fit entirely inside `data`
/// reads as 0.
pub fn extract_bits(data: &[u8], bit_offset: usize, width: u32, order: BitOrder) -> u32 {
    if width == 0 || width > 32 {
        return 0;
    }
    let end = match bit_offset.checked_add(width as usize) {
        Some(end) => end,
        None => return 0,
    };
    if end > data.len() * 8 {
        return 0;
    }

    match order {
        BitOrder::Msb0 => {
            let mut value: u32 = 0;
            let mut pos = bit_offset;
            let mut remaining = width;
            while remaining > 0 {
                let byte = data[pos / 8];
                let shift = pos % 8;
                let available = (8 - shift) as u32;
                let take = available.min(remaining);
                let chunk = (byte << shift) >> (8 - take);
                value = (value << take) | chunk as u32;
                pos += take as usize;
                remaining -= take;
            }
            value
        }
        BitOrder::Lsb0 => {
            let mut value: u32 = 0;
            let mut pos = bit_offset;
            let mut remaining = width;
            while remaining > 0 {
                let shift = (pos % 8) as u32;
                let available = 8 - shift;
                let take = available.min(remaining);
                let mask = (0xFFu32 >> (8 - take)) as u8;
                let chunk = (data[pos / 8] >> shift) & mask;
                value |= (chunk as u32) << (width - remaining);
                pos += take as usize;
                remaining -= take;
            }
            value
        }
    }
}

/// Test a single bit of a flag byte
pub fn bit(byte: u8, n: u8) -> bool {
    (byte >> n) & 1 != 0
}

/// Little-endian u16 at `offset`, 0 when out of range
pub fn le16(data: &[u8], offset: usize) -> u16 {
    match data.get(offset..offset + 2) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

/// Little-endian u24 at `offset`, 0 when out of range
pub fn le24(data: &[u8], offset: usize) -> u32 {
    match data.get(offset..offset + 3) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], 0]),
        None => 0,
    }
}

/// Little-endian u32 at `offset`, 0 when out of range
pub fn le32(data: &[u8], offset: usize) -> u32 {
    match data.get(offset..offset + 4) {
        Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

/// Printable ASCII from a fixed-size, NUL padded field
pub fn ascii_field(data: &[u8]) -> String {
    data.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb0_spans_bytes() {
        // 1010_1100 0101_0011
        let data = [0xAC, 0x53];
        assert_eq!(extract_bits(&data, 0, 4, BitOrder::Msb0), 0xA);
        assert_eq!(extract_bits(&data, 4, 8, BitOrder::Msb0), 0xC5);
        assert_eq!(extract_bits(&data, 0, 16, BitOrder::Msb0), 0xAC53);
        assert_eq!(extract_bits(&data, 15, 1, BitOrder::Msb0), 1);
    }

    #[test]
    fn test_lsb0_matches_little_endian() {
        let data = [0x34, 0x12, 0xFF];
        assert_eq!(extract_bits(&data, 0, 16, BitOrder::Lsb0), 0x1234);
        assert_eq!(extract_bits(&data, 4, 8, BitOrder::Lsb0), 0x23);
        assert_eq!(extract_bits(&data, 0, 1, BitOrder::Lsb0), 0);
        assert_eq!(extract_bits(&data, 2, 1, BitOrder::Lsb0), 1);
    }

    #[test]
    fn test_full_width_read() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(extract_bits(&data, 0, 32, BitOrder::Msb0), 0xDEADBEEF);
        assert_eq!(extract_bits(&data, 0, 32, BitOrder::Lsb0), 0xEFBEADDE);
    }

    #[test]
    fn test_out_of_range_is_zero() {
        let data = [0xFF];
        assert_eq!(extract_bits(&data, 4, 8, BitOrder::Msb0), 0);
        assert_eq!(extract_bits(&data, 0, 0, BitOrder::Lsb0), 0);
        assert_eq!(extract_bits(&data, 0, 33, BitOrder::Lsb0), 0);
    }

    #[test]
    fn test_le_helpers() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(le16(&data, 0), 0x0201);
        assert_eq!(le24(&data, 1), 0x040302);
        assert_eq!(le32(&data, 0), 0x04030201);
        assert_eq!(le32(&data, 1), 0);
    }

    #[test]
    fn test_ascii_field() {
        assert_eq!(ascii_field(b"s3908\0\0\0"), "s3908");
        assert_eq!(ascii_field(b"ab\x01c"), "ab?c");
    }
}
