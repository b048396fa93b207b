//! TCM production tests
//!
//! The firmware runs each test on `PRODUCTION_TEST [id]` and answers with
//! the packed result. Sizes are checked before the command is sent and the
//! device is reset after every test.

use crate::device::TcmDevice;
use crate::protocol::{cmd, report};
use synadiag_core::bits::bit;
use synadiag_core::hires::{self, HighResistanceLimits, HighResistanceReport};
use synadiag_core::image::{Image, SampleFormat};
use synadiag_core::limits::{check_result_len, count_abs_above, count_out_of_range, Limits};
use synadiag_core::{Error, Geometry, Result, Transport};

/// Production test ids
pub mod test_id {
    pub const TRX_TRX_SHORTS: u8 = 1;
    pub const TRX_SENSOR_OPENS: u8 = 2;
    pub const TRX_GROUND_SHORTS: u8 = 3;
    pub const FULL_RAW: u8 = 5;
    pub const DYNAMIC_RANGE: u8 = 7;
    pub const NOISE: u8 = 10;
    pub const OPEN_SHORT_DETECTION: u8 = 11;
    pub const SENSOR_SPEED: u8 = 16;
    pub const ABS_RAW: u8 = 18;
}

use test_id::*;

fn check_geometry(geometry: Geometry, rows: usize, cols: usize) -> Result<()> {
    let shape = (geometry.rows, geometry.cols);
    if shape == (rows, cols) || shape == (cols, rows) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "geometry {}x{} does not match sensor {}x{}",
            geometry.rows, geometry.cols, rows, cols
        )))
    }
}

impl<T: Transport> TcmDevice<T> {
    pub(crate) fn production_test(
        &mut self,
        test_id: u32,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        self.require_open()?;
        let id = u8::try_from(test_id).map_err(|_| Error::UnsupportedTest(test_id))?;
        log::info!("Running TCM production test {}", id);
        match id {
            TRX_TRX_SHORTS | TRX_SENSOR_OPENS | TRX_GROUND_SHORTS => {
                self.trx_test(id, result, limits_1)
            }
            FULL_RAW | DYNAMIC_RANGE | SENSOR_SPEED => {
                let format = if id == SENSOR_SPEED {
                    SampleFormat::I16
                } else {
                    SampleFormat::U16
                };
                self.image_test(id, format, result, limits_1, limits_2, geometry)
            }
            OPEN_SHORT_DETECTION => {
                self.image_test(id, SampleFormat::U8, result, limits_1, limits_2, geometry)
            }
            NOISE => self.noise_test(result, limits_2, geometry),
            ABS_RAW => self.abs_raw_test(result, limits_1, limits_2, geometry),
            _ => Err(Error::UnsupportedTest(test_id)),
        }
    }

    /// Result length of test `test_id`
    pub(crate) fn result_len(&self, test_id: u32) -> Result<usize> {
        self.require_open()?;
        let (rows, cols) = self.dims();
        match u8::try_from(test_id).map_err(|_| Error::UnsupportedTest(test_id))? {
            TRX_TRX_SHORTS | TRX_SENSOR_OPENS | TRX_GROUND_SHORTS => Ok(self.options.trx_pins()),
            FULL_RAW | DYNAMIC_RANGE | SENSOR_SPEED | OPEN_SHORT_DETECTION | NOISE => {
                Ok(rows * cols)
            }
            ABS_RAW => Ok(rows + cols),
            _ => Err(Error::UnsupportedTest(test_id)),
        }
    }

    /// Run test `id` and return its raw result
    pub fn run_test(&mut self, id: u8) -> Result<Vec<u8>> {
        self.ensure_application()?;
        self.command(cmd::PRODUCTION_TEST, &[id])
    }

    fn image_test(
        &mut self,
        id: u8,
        format: SampleFormat,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (rows, cols) = self.dims();
        check_geometry(geometry, rows, cols)?;
        let cells = rows * cols;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;

        self.with_reset(|dev| {
            let data = dev.run_test(id)?;
            result.copy_from_slice(&format.decode(&data, cells)?);
            let failures = count_out_of_range(result, &min, &max);
            log::info!("Test {}: {} of {} cells out of range", id, failures, cells);
            Ok(failures)
        })
    }

    /// Delta noise: every |cell| must stay at or below the maximum
    fn noise_test(
        &mut self,
        result: &mut [i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (rows, cols) = self.dims();
        check_geometry(geometry, rows, cols)?;
        let cells = rows * cols;
        check_result_len("result", result.len(), cells)?;
        let max = Limits::new("max", limits_2, cells)?;

        self.with_reset(|dev| {
            let data = dev.run_test(NOISE)?;
            result.copy_from_slice(&SampleFormat::I16.decode(&data, cells)?);
            Ok(count_abs_above(result, &max))
        })
    }

    /// Absolute raw: columns then rows, u32 each
    fn abs_raw_test(
        &mut self,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (rows, cols) = self.dims();
        check_geometry(geometry, rows, cols)?;
        let cells = rows + cols;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;

        self.with_reset(|dev| {
            let data = dev.run_test(ABS_RAW)?;
            result.copy_from_slice(&SampleFormat::U32.decode(&data, cells)?);
            Ok(count_out_of_range(result, &min, &max))
        })
    }

    /// Bit-packed pin test
    ///
    /// A pin with no role in the static config reads -1 and never fails.
    /// Others read 1 when their bit differs from the expected value.
    fn trx_test(&mut self, id: u8, result: &mut [i32], expected: &[i32]) -> Result<usize> {
        let pins = self.options.trx_pins();
        check_result_len("result", result.len(), pins)?;
        let expected = Limits::new("expected", expected, pins)?;

        self.with_reset(|dev| {
            let bitmap = dev.run_test(id)?;
            let table = dev.pins()?;
            let mut failures = 0;
            for (pin, r) in result.iter_mut().enumerate() {
                if table.role(pin).is_none() {
                    *r = -1;
                    continue;
                }
                let set = bitmap
                    .get(pin / 8)
                    .is_some_and(|&b| bit(b, (pin % 8) as u8));
                *r = (set as i32 != expected.at(pin)) as i32;
                failures += *r as usize;
            }
            log::info!("Test {}: {} pins failed", id, failures);
            Ok(failures)
        })
    }

    pub(crate) fn extended_high_resistance(
        &mut self,
        reference: &Image,
        limits: &HighResistanceLimits,
    ) -> Result<HighResistanceReport> {
        self.require_open()?;
        let (rows, cols) = self.dims();
        if reference.rows() != rows || reference.cols() != cols {
            return Err(Error::invalid(format!(
                "reference is {}x{}, sensor is {}x{}",
                reference.rows(),
                reference.cols(),
                rows,
                cols
            )));
        }
        let checked = limits.check(rows, cols)?;

        self.with_reset(|dev| {
            let delta = dev.capture_image(report::DELTA)?;
            let data = dev.run_test(FULL_RAW)?;
            let baseline = Image::decode(rows, cols, SampleFormat::U16, &data)?;
            let result = hires::extended_high_resistance(&delta, &baseline, reference)?;
            let failures = result.failures(&checked);
            log::info!(
                "Extended high resistance: {} surface, {} tx, {} rx failures",
                failures.surface,
                failures.tx,
                failures.rx
            );
            Ok(HighResistanceReport { result, failures })
        })
    }
}
