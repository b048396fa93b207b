//! F54 report types and the get-report sequence

use crate::command::{issue, wait_clear, F54Command};
use crate::registers::f54::F54Info;
use synadiag_core::image::{Image, SampleFormat};
use synadiag_core::timing::TimingPolicy;
use synadiag_core::{Error, Result, Transport};

/// Report type numbers
pub mod report_type {
    pub const RAW_8BIT: u8 = 1;
    pub const DELTA: u8 = 2;
    pub const RAW_16BIT: u8 = 3;
    pub const HIGH_RESISTANCE: u8 = 4;
    pub const TX_TO_TX_SHORTS: u8 = 5;
    pub const RX_TO_RX_SHORTS_1: u8 = 7;
    pub const TRUE_BASELINE: u8 = 9;
    pub const FULL_RAW_CAP_MIN_MAX: u8 = 13;
    pub const RX_OPENS_1: u8 = 14;
    pub const TX_OPENS: u8 = 15;
    pub const TX_TO_GROUND: u8 = 16;
    pub const RX_TO_RX_SHORTS_2: u8 = 17;
    pub const RX_OPENS_2: u8 = 18;
    pub const FULL_RAW_CAP: u8 = 19;
    pub const FULL_RAW_CAP_NO_RX_COUPLING: u8 = 20;
    pub const SENSOR_SPEED: u8 = 22;
    pub const ADC_RANGE: u8 = 23;
    pub const TRX_OPEN: u8 = 24;
    pub const TRX_TO_GROUND: u8 = 25;
    pub const TRX_SHORT: u8 = 26;
    pub const ABS_RAW_CAP: u8 = 38;
    pub const ABS_DELTA_CAP: u8 = 40;
    pub const ABS_HYBRID_DELTA_CAP: u8 = 59;
    pub const ABS_HYBRID_RAW_CAP: u8 = 63;
    pub const AMP_FULL_RAW_CAP: u8 = 78;
    pub const AMP_RAW_ADC: u8 = 83;
    pub const FULL_RAW_CAP_TDDI: u8 = 92;
}

use report_type::*;

/// Number of TRX pins covered by the pin bitmap reports
pub const TRX_PINS: usize = 56;
/// Bytes of the pin bitmap reports
pub const TRX_BITMAP_SIZE: usize = 7;

/// Size in bytes of `rt` for a `tx` x `rx` sensor, `None` when unknown
pub fn report_size(rt: u8, tx: usize, rx: usize) -> Option<usize> {
    let size = match rt {
        RAW_8BIT => tx * rx,
        DELTA | RAW_16BIT | TRUE_BASELINE | FULL_RAW_CAP | FULL_RAW_CAP_NO_RX_COUPLING
        | SENSOR_SPEED | ADC_RANGE | AMP_FULL_RAW_CAP | AMP_RAW_ADC | FULL_RAW_CAP_TDDI => {
            2 * tx * rx
        }
        HIGH_RESISTANCE => 6,
        FULL_RAW_CAP_MIN_MAX => 4,
        TX_TO_TX_SHORTS | TX_OPENS | TX_TO_GROUND => tx.div_ceil(8),
        RX_TO_RX_SHORTS_1 | RX_OPENS_1 => {
            if rx < tx {
                2 * rx * rx
            } else {
                2 * tx * rx
            }
        }
        RX_TO_RX_SHORTS_2 | RX_OPENS_2 => {
            if rx > tx {
                2 * rx * (rx - tx)
            } else {
                0
            }
        }
        TRX_OPEN | TRX_TO_GROUND | TRX_SHORT => TRX_BITMAP_SIZE,
        ABS_RAW_CAP | ABS_DELTA_CAP | ABS_HYBRID_DELTA_CAP | ABS_HYBRID_RAW_CAP => 4 * (rx + tx),
        _ => return None,
    };
    Some(size)
}

/// Sample encoding of `rt`
pub fn sample_format(rt: u8) -> SampleFormat {
    match rt {
        RAW_8BIT | TX_TO_TX_SHORTS | TX_OPENS | TX_TO_GROUND | TRX_OPEN | TRX_TO_GROUND
        | TRX_SHORT => SampleFormat::U8,
        DELTA | HIGH_RESISTANCE => SampleFormat::I16,
        ABS_RAW_CAP | ABS_DELTA_CAP | ABS_HYBRID_DELTA_CAP | ABS_HYBRID_RAW_CAP => {
            SampleFormat::I32
        }
        _ => SampleFormat::U16,
    }
}

/// True for tx x rx images
pub fn is_image(rt: u8) -> bool {
    matches!(
        rt,
        RAW_8BIT
            | DELTA
            | RAW_16BIT
            | TRUE_BASELINE
            | FULL_RAW_CAP
            | FULL_RAW_CAP_NO_RX_COUPLING
            | SENSOR_SPEED
            | ADC_RANGE
            | AMP_FULL_RAW_CAP
            | AMP_RAW_ADC
            | FULL_RAW_CAP_TDDI
    )
}

/// True for the AMP sensor reports started through control 188
pub fn is_amp(rt: u8) -> bool {
    matches!(rt, AMP_FULL_RAW_CAP | AMP_RAW_ADC)
}

/// True when `rt` is captured without CBC/CDM preparation
pub fn skips_cbc_preparation(rt: u8) -> bool {
    matches!(
        rt,
        DELTA
            | RAW_16BIT
            | SENSOR_SPEED
            | ADC_RANGE
            | ABS_RAW_CAP
            | ABS_DELTA_CAP
            | ABS_HYBRID_DELTA_CAP
            | ABS_HYBRID_RAW_CAP
    )
}

/// Run the get-report sequence and read `size` bytes of report data
pub fn get_report<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
    rt: u8,
    size: usize,
) -> Result<Vec<u8>> {
    wait_clear(t, f54, F54Command::GET_REPORT, timing.rmi_get_report)?;
    t.write_byte(f54.report_type_addr(), rt)?;
    t.write_register(f54.fifo_index_addr(), &[0, 0])?;
    issue(t, f54, F54Command::GET_REPORT, timing.rmi_get_report)?;

    let mut data = vec![0u8; size];
    if size > 0 {
        t.read_register(f54.report_data_addr(), &mut data)?;
    }
    log::debug!("F54: report {} read, {} bytes", rt, size);
    Ok(data)
}

/// Capture `rt` and decode it in firmware order
///
/// Images are `tx` rows by `rx` columns; every other report is one row.
pub fn read_report<T: Transport + ?Sized>(
    t: &mut T,
    f54: &F54Info,
    timing: &TimingPolicy,
    rt: u8,
    tx: usize,
    rx: usize,
) -> Result<Image> {
    let size = report_size(rt, tx, rx)
        .ok_or_else(|| Error::invalid(format!("unknown report type {}", rt)))?;
    let raw = get_report(t, f54, timing, rt, size)?;
    let format = sample_format(rt);
    if is_image(rt) {
        Image::decode(tx, rx, format, &raw)
    } else {
        Image::decode(1, size / format.size(), format, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::tests::dummy_f54;
    use synadiag_dummy::rmi::layout;
    use synadiag_dummy::DummyRmi;

    #[test]
    fn test_report_sizes() {
        assert_eq!(report_size(RAW_8BIT, 4, 6), Some(24));
        assert_eq!(report_size(DELTA, 4, 6), Some(48));
        assert_eq!(report_size(TX_OPENS, 9, 6), Some(2));
        assert_eq!(report_size(RX_OPENS_1, 8, 6), Some(72));
        assert_eq!(report_size(RX_OPENS_1, 4, 6), Some(48));
        assert_eq!(report_size(RX_OPENS_2, 4, 6), Some(24));
        assert_eq!(report_size(RX_OPENS_2, 6, 4), Some(0));
        assert_eq!(report_size(TRX_SHORT, 4, 6), Some(7));
        assert_eq!(report_size(ABS_RAW_CAP, 4, 6), Some(40));
        assert_eq!(report_size(200, 4, 6), None);
    }

    #[test]
    fn test_get_report_sequence() {
        let mut dev = DummyRmi::new();
        let f54 = dummy_f54(&mut dev);
        dev.set_report(RAW_16BIT, (0u8..48).collect());
        let img = read_report(&mut dev, &f54, &TimingPolicy::default(), RAW_16BIT, 4, 6).unwrap();

        assert_eq!(dev.peek(layout::F54_DATA), RAW_16BIT);
        assert_eq!(dev.reports_served(), &[RAW_16BIT]);
        assert_eq!((img.rows(), img.cols()), (4, 6));
        assert_eq!(img.get(0, 0), 0x0100);
        assert_eq!(img.get(3, 5), 0x2F2E);
        // type, fifo index, then the command
        let writes: Vec<u16> = dev.writes().iter().map(|(a, _)| *a).collect();
        assert_eq!(
            writes,
            vec![layout::F54_DATA, layout::F54_DATA + 1, layout::F54_COMMAND]
        );
    }

    #[test]
    fn test_delta_is_signed() {
        let mut dev = DummyRmi::new();
        let f54 = dummy_f54(&mut dev);
        let mut raw = vec![0u8; 48];
        raw[0] = 0xFE;
        raw[1] = 0xFF;
        dev.set_report(DELTA, raw);
        let img = read_report(&mut dev, &f54, &TimingPolicy::default(), DELTA, 4, 6).unwrap();
        assert_eq!(img.get(0, 0), -2);
    }

    #[test]
    fn test_abs_report_is_one_row() {
        let mut dev = DummyRmi::new();
        let f54 = dummy_f54(&mut dev);
        let mut raw = vec![0u8; 40];
        raw[36..40].copy_from_slice(&(-7i32).to_le_bytes());
        dev.set_report(ABS_RAW_CAP, raw);
        let img = read_report(&mut dev, &f54, &TimingPolicy::default(), ABS_RAW_CAP, 4, 6).unwrap();
        assert_eq!((img.rows(), img.cols()), (1, 10));
        assert_eq!(img.get(0, 9), -7);
    }
}
