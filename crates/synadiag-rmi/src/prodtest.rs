//! RMI production tests
//!
//! Every test validates buffer and limit sizes before touching the device,
//! then captures through [`RmiDevice::with_reset`] so the firmware is reset
//! according to the test's policy.

use crate::command::force_update;
use crate::device::{ResetPolicy, RmiDevice};
use crate::registers::f55::PinRole;
use crate::report::report_type::*;
use crate::report::TRX_PINS;
use synadiag_core::bits::bit;
use synadiag_core::hires::{self, HighResistanceLimits, HighResistanceReport};
use synadiag_core::image::Image;
use synadiag_core::limits::{check_result_len, count_above, count_out_of_range, Limits};
use synadiag_core::{Error, Geometry, Result, Transport};

/// Pins whose TRX short result is confirmed with the coupling image test
pub const EXTENDED_TRX_PINS: [usize; 4] = [0, 1, 32, 33];
/// Control 91 bit flipped for the second coupling capture
const CTRL91_COUPLING_TOGGLE: u8 = 0x08;

/// Caller geometry must describe the sensor in either orientation
fn check_geometry(geometry: Geometry, tx: usize, rx: usize) -> Result<()> {
    let shape = (geometry.rows, geometry.cols);
    if shape == (tx, rx) || shape == (rx, tx) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "geometry {}x{} does not match sensor {}x{}",
            geometry.rows, geometry.cols, tx, rx
        )))
    }
}

fn bitmap_bit(bitmap: &[u8], pin: usize) -> bool {
    bitmap
        .get(pin / 8)
        .is_some_and(|&b| bit(b, (pin % 8) as u8))
}

impl<T: Transport> RmiDevice<T> {
    pub(crate) fn production_test(
        &mut self,
        test_id: u32,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        self.functions()?;
        let rt = u8::try_from(test_id).map_err(|_| Error::UnsupportedTest(test_id))?;
        log::info!("Running RMI production test {}", test_id);
        match rt {
            DELTA => self.noise_test(result, limits_1, limits_2, geometry),
            RAW_16BIT | FULL_RAW_CAP_NO_RX_COUPLING | SENSOR_SPEED | AMP_FULL_RAW_CAP => {
                self.image_test(rt, ResetPolicy::Always, result, limits_1, limits_2, geometry)
            }
            ADC_RANGE | FULL_RAW_CAP_TDDI => {
                self.image_test(rt, ResetPolicy::OnError, result, limits_1, limits_2, geometry)
            }
            HIGH_RESISTANCE => self.high_resistance_test(result, limits_1, limits_2),
            TRX_OPEN | TRX_TO_GROUND | TRX_SHORT => self.trx_test(rt, result, limits_1),
            ABS_RAW_CAP => self.abs_raw_test(result, limits_1, limits_2, geometry),
            ABS_HYBRID_DELTA_CAP => self.abs_delta_peak_test(result, limits_2, geometry),
            ABS_HYBRID_RAW_CAP => self.abs_raw_average_test(result, limits_1, limits_2, geometry),
            _ => Err(Error::UnsupportedTest(test_id)),
        }
    }

    /// Result length of report type `test_id`
    pub(crate) fn result_len(&mut self, test_id: u32) -> Result<usize> {
        self.functions()?;
        let rt = u8::try_from(test_id).map_err(|_| Error::UnsupportedTest(test_id))?;
        let (tx, rx) = self.dims();
        match rt {
            DELTA | RAW_16BIT | FULL_RAW_CAP_NO_RX_COUPLING | SENSOR_SPEED | AMP_FULL_RAW_CAP
            | ADC_RANGE | FULL_RAW_CAP_TDDI => Ok(tx * rx),
            HIGH_RESISTANCE => Ok(3),
            TRX_OPEN | TRX_TO_GROUND | TRX_SHORT => Ok(TRX_PINS),
            ABS_RAW_CAP | ABS_HYBRID_DELTA_CAP | ABS_HYBRID_RAW_CAP => Ok(tx + rx),
            _ => Err(Error::UnsupportedTest(test_id)),
        }
    }

    fn image_test(
        &mut self,
        rt: u8,
        policy: ResetPolicy,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (tx, rx) = self.dims();
        check_geometry(geometry, tx, rx)?;
        let cells = tx * rx;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;

        self.with_reset(policy, |dev| {
            dev.prepare(rt)?;
            let img = dev.read_report(rt)?;
            result.copy_from_slice(img.data());
            let failures = count_out_of_range(result, &min, &max);
            log::info!("Report {}: {} of {} cells out of range", rt, failures, cells);
            Ok(failures)
        })
    }

    /// Delta noise over several frames
    ///
    /// Returns the number of failing frames. The result holds the frame
    /// average when every frame passed, else the frame with the largest
    /// absolute sum.
    fn noise_test(
        &mut self,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (tx, rx) = self.dims();
        check_geometry(geometry, tx, rx)?;
        let cells = tx * rx;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;
        let frames = self.tests.noise_frames.max(1) as usize;

        self.with_reset(ResetPolicy::OnError, |dev| {
            let mut sum = vec![0i64; cells];
            let mut failed = 0;
            let mut worst: Option<Image> = None;
            for frame in 0..frames {
                let img = dev.read_report(DELTA)?;
                for (s, &v) in sum.iter_mut().zip(img.data()) {
                    *s += v as i64;
                }
                let bad = count_out_of_range(img.data(), &min, &max);
                if bad > 0 {
                    log::debug!("Noise frame {}: {} cells out of range", frame, bad);
                    failed += 1;
                }
                let larger = match &worst {
                    Some(w) => img.abs_sum() > w.abs_sum(),
                    None => true,
                };
                if larger {
                    worst = Some(img);
                }
            }

            match worst {
                Some(w) if failed > 0 => result.copy_from_slice(w.data()),
                _ => {
                    for (r, s) in result.iter_mut().zip(&sum) {
                        *r = (*s / frames as i64) as i32;
                    }
                }
            }
            log::info!("Noise: {} of {} frames failed", failed, frames);
            Ok(failed)
        })
    }

    fn high_resistance_test(
        &mut self,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
    ) -> Result<usize> {
        check_result_len("result", result.len(), 3)?;
        let min = Limits::new("min", limits_1, 3)?;
        let max = Limits::new("max", limits_2, 3)?;

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(HIGH_RESISTANCE)?;
            let img = dev.read_report(HIGH_RESISTANCE)?;
            result.copy_from_slice(img.data());
            Ok(count_out_of_range(result, &min, &max))
        })
    }

    fn trx_test(&mut self, rt: u8, result: &mut [i32], expected: &[i32]) -> Result<usize> {
        check_result_len("result", result.len(), TRX_PINS)?;
        let expected = Limits::new("expected", expected, TRX_PINS)?;

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(rt)?;
            let (failures, _) = dev.capture_trx(rt, result, &expected)?;
            log::info!("Report {}: {} pins failed", rt, failures);
            Ok(failures)
        })
    }

    /// Capture a pin bitmap report and classify every pin
    ///
    /// Unassigned pins read -1 and never count. Without F55 no pin is
    /// assigned. Returns the failure count and the raw bitmap.
    fn capture_trx(
        &mut self,
        rt: u8,
        result: &mut [i32],
        expected: &Limits,
    ) -> Result<(usize, Vec<u8>)> {
        let img = self.read_report(rt)?;
        let bitmap: Vec<u8> = img.data().iter().map(|&v| v as u8).collect();
        let f55 = self.functions()?.f55.as_ref();

        let mut failures = 0;
        for (pin, r) in result.iter_mut().enumerate() {
            let assigned = f55.is_some_and(|f| f.pin_role(pin as u8).is_some());
            if !assigned {
                *r = -1;
                continue;
            }
            let value = bitmap_bit(&bitmap, pin) as i32;
            *r = (value != expected.at(pin)) as i32;
            failures += *r as usize;
        }
        Ok((failures, bitmap))
    }

    fn abs_raw_test(
        &mut self,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (tx, rx) = self.dims();
        check_geometry(geometry, tx, rx)?;
        let cells = tx + rx;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(ABS_RAW_CAP)?;
            let img = dev.read_report(ABS_RAW_CAP)?;
            result.copy_from_slice(img.data());
            Ok(count_out_of_range(result, &min, &max))
        })
    }

    /// Peak absolute hybrid delta over many frames against a maximum
    fn abs_delta_peak_test(
        &mut self,
        result: &mut [i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (tx, rx) = self.dims();
        check_geometry(geometry, tx, rx)?;
        let cells = tx + rx;
        check_result_len("result", result.len(), cells)?;
        let max = Limits::new("max", limits_2, cells)?;
        let frames = self.tests.abs_delta_frames.max(1);

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(ABS_HYBRID_DELTA_CAP)?;
            result.fill(0);
            for _ in 0..frames {
                let img = dev.read_report(ABS_HYBRID_DELTA_CAP)?;
                for (peak, &v) in result.iter_mut().zip(img.data()) {
                    *peak = (*peak).max(v.saturating_abs());
                }
            }
            Ok(count_above(result, &max))
        })
    }

    /// Average hybrid raw over several frames
    fn abs_raw_average_test(
        &mut self,
        result: &mut [i32],
        limits_1: &[i32],
        limits_2: &[i32],
        geometry: Geometry,
    ) -> Result<usize> {
        let (tx, rx) = self.dims();
        check_geometry(geometry, tx, rx)?;
        let cells = tx + rx;
        check_result_len("result", result.len(), cells)?;
        let min = Limits::new("min", limits_1, cells)?;
        let max = Limits::new("max", limits_2, cells)?;
        let frames = self.tests.abs_raw_frames.max(1);

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(ABS_HYBRID_RAW_CAP)?;
            let mut sum = vec![0i64; cells];
            for _ in 0..frames {
                let img = dev.read_report(ABS_HYBRID_RAW_CAP)?;
                for (s, &v) in sum.iter_mut().zip(img.data()) {
                    *s += v as i64;
                }
            }
            for (r, s) in result.iter_mut().zip(&sum) {
                *r = (*s / frames as i64) as i32;
            }
            Ok(count_out_of_range(result, &min, &max))
        })
    }

    pub(crate) fn extended_high_resistance(
        &mut self,
        reference: &Image,
        limits: &HighResistanceLimits,
    ) -> Result<HighResistanceReport> {
        self.functions()?;
        let (tx, rx) = self.dims();
        if reference.rows() != tx || reference.cols() != rx {
            return Err(Error::invalid(format!(
                "reference is {}x{}, sensor is {}x{}",
                reference.rows(),
                reference.cols(),
                tx,
                rx
            )));
        }
        let checked = limits.check(tx, rx)?;

        self.with_reset(ResetPolicy::Always, |dev| {
            let delta = dev.read_report(DELTA)?;
            dev.prepare(FULL_RAW_CAP_NO_RX_COUPLING)?;
            let baseline = dev.read_report(FULL_RAW_CAP_NO_RX_COUPLING)?;
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

    pub(crate) fn extended_trx_short(
        &mut self,
        result: &mut [i32],
        limits: &[i32],
        extended_limits: &[i32],
    ) -> Result<usize> {
        self.functions()?;
        check_result_len("result", result.len(), TRX_PINS)?;
        let expected = Limits::new("limits", limits, TRX_PINS)?;
        let extended = Limits::new("extended limits", extended_limits, EXTENDED_TRX_PINS.len())?;

        self.with_reset(ResetPolicy::Always, |dev| {
            dev.prepare(TRX_SHORT)?;
            let (mut failures, bitmap) = dev.capture_trx(TRX_SHORT, result, &expected)?;

            let flagged: Vec<(usize, usize)> = EXTENDED_TRX_PINS
                .iter()
                .copied()
                .enumerate()
                .filter(|&(_, pin)| bitmap_bit(&bitmap, pin) && result[pin] >= 0)
                .collect();
            if flagged.is_empty() {
                return Ok(failures);
            }

            let Some((before, after)) = dev.coupling_images()? else {
                log::warn!("F54 control 91 not present, extended pins keep their TRX result");
                return Ok(failures);
            };

            for (k, pin) in flagged {
                let role = dev
                    .functions()?
                    .f55
                    .as_ref()
                    .and_then(|f| f.pin_role(pin as u8));
                let diffs: Vec<i32> = match role {
                    Some(PinRole::Tx(ch)) if ch < before.rows() => (0..before.cols())
                        .map(|c| (after.get(ch, c) - before.get(ch, c)).abs())
                        .collect(),
                    Some(PinRole::Rx(ch)) if ch < before.cols() => (0..before.rows())
                        .map(|r| (after.get(r, ch) - before.get(r, ch)).abs())
                        .collect(),
                    _ => continue,
                };
                let average = diffs.iter().map(|&d| d as i64).sum::<i64>() / diffs.len().max(1) as i64;
                let fail = (average < extended.at(k) as i64) as i32;
                log::debug!(
                    "Extended TRX pin {}: average coupling change {} -> {}",
                    pin,
                    average,
                    if fail == 1 { "fail" } else { "pass" }
                );
                failures -= result[pin] as usize;
                failures += fail as usize;
                result[pin] = fail;
            }
            Ok(failures)
        })
    }

    /// Capture report 20 with control 91 at its current and toggled value
    ///
    /// `None` when control 91 is not present. Control 91 is restored even
    /// when the second capture fails.
    fn coupling_images(&mut self) -> Result<Option<(Image, Image)>> {
        let timing = self.timing;
        let Some(addr) = self.functions()?.f54.control(91) else {
            return Ok(None);
        };

        self.prepare(FULL_RAW_CAP_NO_RX_COUPLING)?;
        let before = self.read_report(FULL_RAW_CAP_NO_RX_COUPLING)?;

        let original = self.transport.read_byte(addr)?;
        self.transport.write_byte(addr, original ^ CTRL91_COUPLING_TOGGLE)?;
        let (t, f) = self.parts()?;
        force_update(t, &f.f54, &timing)?;
        let after = self.read_report(FULL_RAW_CAP_NO_RX_COUPLING);

        self.transport.write_byte(addr, original)?;
        let (t, f) = self.parts()?;
        force_update(t, &f.f54, &timing)?;
        Ok(Some((before, after?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RmiTestConfig;
    use synadiag_core::hires::HighResistanceLimits;
    use synadiag_core::timing::TimingPolicy;
    use synadiag_core::TouchController;
    use synadiag_dummy::{DummyRmi, DummyRmiConfig};

    const TX: usize = 4;
    const RX: usize = 6;
    const CELLS: usize = TX * RX;
    const GEOMETRY: Geometry = Geometry::new(TX, RX);

    fn open() -> RmiDevice<DummyRmi> {
        RmiDevice::open(
            DummyRmi::new(),
            TimingPolicy::default(),
            RmiTestConfig::default(),
        )
        .unwrap()
    }

    fn le16(values: &[i32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|&v| (v as i16).to_le_bytes())
            .collect()
    }

    fn le32(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|&v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_noise_returns_failing_frame() {
        let mut dev = open();
        for frame in 0..20 {
            let mut values = vec![3; CELLS];
            if frame == 5 {
                values[7] = 900;
            }
            dev.transport_mut().queue_report(DELTA, le16(&values));
        }
        let mut result = vec![0; CELLS];
        let failed = dev
            .run_production_test(2, &mut result, &[-100], &[100], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 1);
        assert_eq!(result[7], 900);
        assert_eq!(result[0], 3);
        assert_eq!(dev.transport().reports_served().len(), 20);
        // noise resets only on error
        assert_eq!(dev.transport().reset_count(), 0);
    }

    #[test]
    fn test_noise_passing_returns_average() {
        let mut dev = open();
        for frame in 0..20 {
            let v = if frame % 2 == 0 { 10 } else { 20 };
            dev.transport_mut().queue_report(DELTA, le16(&[v; CELLS]));
        }
        let mut result = vec![0; CELLS];
        let failed = dev
            .run_production_test(2, &mut result, &[-100], &[100], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 0);
        assert!(result.iter().all(|&v| v == 15));
    }

    #[test]
    fn test_raw_image_per_cell_limits_and_reset() {
        let mut dev = open();
        let values: Vec<i32> = (0..CELLS as i32).map(|i| 1000 + i).collect();
        dev.transport_mut().set_report(RAW_16BIT, le16(&values));
        let mut min = vec![1000; CELLS];
        min[23] = 1024;
        let mut result = vec![0; CELLS];
        let failed = dev
            .run_production_test(3, &mut result, &min, &[2000], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 1);
        assert_eq!(result, values);
        assert_eq!(dev.transport().reset_count(), 1);
    }

    #[test]
    fn test_portrait_or_landscape_geometry_accepted() {
        let mut dev = open();
        dev.transport_mut().set_report(RAW_16BIT, vec![0; 48]);
        let mut result = vec![0; CELLS];
        dev.run_production_test(3, &mut result, &[0], &[1], Geometry::new(RX, TX))
            .unwrap();
        let err = dev
            .run_production_test(3, &mut result, &[0], &[1], Geometry::new(3, 8))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn test_bad_limits_fail_before_device_access() {
        let mut dev = open();
        let writes_before = dev.transport().writes().len();
        let mut result = vec![0; CELLS];
        let err = dev
            .run_production_test(3, &mut result, &[0, 1], &[5], GEOMETRY)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        let mut short = vec![0; CELLS - 1];
        let err = dev
            .run_production_test(3, &mut short, &[0], &[5], GEOMETRY)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert_eq!(dev.transport().writes().len(), writes_before);
        assert!(dev.transport().reports_served().is_empty());
    }

    #[test]
    fn test_result_len_per_test() {
        let mut dev = open();
        assert_eq!(dev.test_result_len(DELTA as u32).unwrap(), CELLS);
        assert_eq!(dev.test_result_len(HIGH_RESISTANCE as u32).unwrap(), 3);
        assert_eq!(dev.test_result_len(TRX_SHORT as u32).unwrap(), TRX_PINS);
        assert_eq!(dev.test_result_len(ABS_RAW_CAP as u32).unwrap(), TX + RX);
        assert!(matches!(
            dev.test_result_len(99),
            Err(Error::UnsupportedTest(99))
        ));
    }

    #[test]
    fn test_unknown_test() {
        let mut dev = open();
        let err = dev
            .run_production_test(99, &mut [], &[], &[], GEOMETRY)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedTest(99)));
        let err = dev
            .run_production_test(1000, &mut [], &[], &[], GEOMETRY)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedTest(1000)));
    }

    #[test]
    fn test_adc_range_passing_skips_reset() {
        let mut dev = open();
        dev.transport_mut().set_report(ADC_RANGE, le16(&[50; CELLS]));
        let mut result = vec![0; CELLS];
        let failed = dev
            .run_production_test(23, &mut result, &[0], &[100], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 0);
        assert_eq!(dev.transport().reset_count(), 0);
    }

    #[test]
    fn test_timeout_resets_and_propagates() {
        let mut dev = open();
        dev.transport_mut().set_busy_polls(u32::MAX);
        let mut result = vec![0; CELLS];
        let err = dev
            .run_production_test(23, &mut result, &[0], &[100], GEOMETRY)
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(dev.transport().reset_count(), 1);
    }

    #[test]
    fn test_high_resistance() {
        let mut dev = open();
        dev.transport_mut()
            .set_report(HIGH_RESISTANCE, le16(&[120, 80, -40]));
        let mut result = [0; 3];
        let failed = dev
            .run_production_test(4, &mut result, &[-50], &[100, 100, 0], GEOMETRY)
            .unwrap();
        assert_eq!(result, [120, 80, -40]);
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_trx_short_marks_unassigned_pins() {
        let mut dev = open();
        // pins 1 and 12 set, pin 40 (unassigned) set
        let mut bitmap = vec![0u8; 7];
        bitmap[0] = 0x02;
        bitmap[1] = 0x10;
        bitmap[5] = 0x01;
        dev.transport_mut().set_report(TRX_SHORT, bitmap);
        let mut result = vec![0; TRX_PINS];
        let failed = dev
            .run_production_test(26, &mut result, &[0], &[], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 2);
        assert_eq!(result[1], 1);
        assert_eq!(result[12], 1);
        assert_eq!(result[0], 0);
        assert_eq!(result[40], -1);
        assert_eq!(result[4], -1);
        assert_eq!(result.iter().filter(|&&v| v >= 0).count(), 10);
    }

    #[test]
    fn test_trx_short_without_f55_scores_no_pins() {
        let config = DummyRmiConfig {
            f55: false,
            ..Default::default()
        };
        let mut dev = RmiDevice::open(
            DummyRmi::with_config(config),
            TimingPolicy::default(),
            RmiTestConfig::default(),
        )
        .unwrap();
        assert!(dev.functions().unwrap().f55.is_none());
        dev.transport_mut().set_report(TRX_SHORT, vec![0xFF; 7]);
        let mut result = vec![0; TRX_PINS];
        let failed = dev
            .run_production_test(26, &mut result, &[0], &[], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 0);
        assert!(result.iter().all(|&v| v == -1));
    }

    #[test]
    fn test_trx_open_expects_set_bits() {
        let mut dev = open();
        dev.transport_mut().set_report(TRX_OPEN, vec![0xFF; 7]);
        let mut result = vec![0; TRX_PINS];
        let failed = dev
            .run_production_test(24, &mut result, &[1], &[], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 0);
    }

    #[test]
    fn test_abs_raw() {
        let mut dev = open();
        let values: Vec<i32> = (0..10).map(|i| i * 100).collect();
        dev.transport_mut().set_report(ABS_RAW_CAP, le32(&values));
        let mut result = vec![0; TX + RX];
        let failed = dev
            .run_production_test(38, &mut result, &[100], &[800], GEOMETRY)
            .unwrap();
        assert_eq!(result, values);
        // 0 and 900
        assert_eq!(failed, 2);
    }

    #[test]
    fn test_abs_hybrid_delta_peak() {
        let mut dev = open();
        let mut rmi_tests = RmiTestConfig::default();
        rmi_tests.abs_delta_frames = 3;
        dev.tests = rmi_tests;
        dev.transport_mut().queue_report(ABS_HYBRID_DELTA_CAP, le32(&[1; 10]));
        let mut spike = [2; 10];
        spike[4] = -70;
        dev.transport_mut().queue_report(ABS_HYBRID_DELTA_CAP, le32(&spike));
        dev.transport_mut().queue_report(ABS_HYBRID_DELTA_CAP, le32(&[5; 10]));
        let mut result = vec![0; 10];
        let failed = dev
            .run_production_test(59, &mut result, &[], &[50], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 1);
        assert_eq!(result[4], 70);
        assert_eq!(result[0], 5);
    }

    #[test]
    fn test_abs_hybrid_raw_average() {
        let mut dev = open();
        for i in 0..10 {
            dev.transport_mut()
                .queue_report(ABS_HYBRID_RAW_CAP, le32(&[i * 10; 10]));
        }
        let mut result = vec![0; 10];
        let failed = dev
            .run_production_test(63, &mut result, &[40], &[50], GEOMETRY)
            .unwrap();
        assert_eq!(failed, 0);
        assert!(result.iter().all(|&v| v == 45));
    }

    #[test]
    fn test_extended_high_resistance_zero_delta() {
        let mut dev = open();
        dev.transport_mut().set_report(DELTA, vec![0; 48]);
        let baseline: Vec<i32> = (0..CELLS as i32).map(|i| 500 + i).collect();
        dev.transport_mut()
            .set_report(FULL_RAW_CAP_NO_RX_COUPLING, le16(&baseline));
        let reference = Image::from_vec(TX, RX, vec![480; CELLS]).unwrap();
        let limits = HighResistanceLimits {
            surface: &[30],
            tx_roe: &[0],
            rx_roe: &[0],
        };
        let report = dev.run_extended_high_resistance(&reference, &limits).unwrap();
        let expected: Vec<i32> = baseline.iter().map(|b| b - 480).collect();
        assert_eq!(report.result.surface.data(), &expected[..]);
        assert!(report.result.tx_roe.iter().all(|&v| v == 0));
        // 500 + 23 - 480 = 43 is the largest; 31..=43 fail
        assert_eq!(report.failures.surface, 13);
        assert_eq!(report.failures.tx + report.failures.rx, 0);
        // delta captured before baseline
        let served = dev.transport().reports_served();
        assert_eq!(served, &[DELTA, FULL_RAW_CAP_NO_RX_COUPLING]);
        assert_eq!(dev.transport().reset_count(), 1);
    }

    #[test]
    fn test_extended_high_resistance_shape_mismatch() {
        let mut dev = open();
        let reference = Image::zeroed(RX, TX);
        let limits = HighResistanceLimits {
            surface: &[1],
            tx_roe: &[1],
            rx_roe: &[1],
        };
        assert!(matches!(
            dev.run_extended_high_resistance(&reference, &limits),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_extended_trx_short_resolves_pins() {
        let mut dev = open();
        let ctrl91 = dev.functions().unwrap().f54.control(91).unwrap();
        // pins 0 and 1 (tx 0 and tx 1) flagged
        dev.transport_mut().set_report(TRX_SHORT, vec![0x03, 0, 0, 0, 0, 0, 0]);
        dev.transport_mut()
            .set_report(FULL_RAW_CAP_NO_RX_COUPLING, le16(&[100; CELLS]));
        let mut toggled = vec![100; CELLS];
        for c in 0..RX {
            toggled[c] = 150; // tx 0 row moves a lot
            toggled[RX + c] = 102; // tx 1 barely moves
        }
        dev.transport_mut().set_report_when(
            FULL_RAW_CAP_NO_RX_COUPLING,
            ctrl91,
            CTRL91_COUPLING_TOGGLE,
            le16(&toggled),
        );

        let mut result = vec![0; TRX_PINS];
        let failed = dev
            .run_extended_trx_short(&mut result, &[0], &[10])
            .unwrap();
        assert_eq!(result[0], 0);
        assert_eq!(result[1], 1);
        assert_eq!(failed, 1);
        assert_eq!(dev.transport().peek(ctrl91), 0);
        assert_eq!(dev.transport().reset_count(), 1);
    }

    #[test]
    fn test_extended_trx_short_nothing_flagged() {
        let mut dev = open();
        dev.transport_mut().set_report(TRX_SHORT, vec![0; 7]);
        let mut result = vec![0; TRX_PINS];
        let failed = dev
            .run_extended_trx_short(&mut result, &[0], &[10, 10, 10, 10])
            .unwrap();
        assert_eq!(failed, 0);
        assert!(!dev
            .transport()
            .reports_served()
            .contains(&FULL_RAW_CAP_NO_RX_COUPLING));
    }
}
