//! Test limit vectors
//!
//! A limit vector is either one value broadcast to every cell or exactly one
//! value per cell. Validation happens before a test touches the hardware.

use crate::error::{Error, Result};

/// A validated limit vector
#[derive(Debug, Clone, Copy)]
pub struct Limits<'a> {
    values: &'a [i32],
}

impl<'a> Limits<'a> {
    /// Validate `values` against a result of `cells` elements
    pub fn new(name: &str, values: &'a [i32], cells: usize) -> Result<Self> {
        if values.len() == 1 || (cells > 0 && values.len() == cells) {
            Ok(Self { values })
        } else {
            Err(Error::invalid(format!(
                "{} limit has {} entries, expected 1 or {}",
                name,
                values.len(),
                cells
            )))
        }
    }

    /// Limit for cell `i`
    pub fn at(&self, i: usize) -> i32 {
        if self.values.len() == 1 {
            self.values[0]
        } else {
            self.values[i]
        }
    }

    /// True when one value is broadcast
    pub fn is_scalar(&self) -> bool {
        self.values.len() == 1
    }
}

/// Check a caller result buffer against the expected cell count
pub fn check_result_len(name: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(Error::invalid(format!(
            "{} buffer has {} entries, expected {}",
            name, actual, expected
        )));
    }
    Ok(())
}

/// Count cells outside `[min, max]`
pub fn count_out_of_range(data: &[i32], min: &Limits, max: &Limits) -> usize {
    data.iter()
        .enumerate()
        .filter(|&(i, &v)| v < min.at(i) || v > max.at(i))
        .count()
}

/// Count cells whose magnitude exceeds `max`
pub fn count_abs_above(data: &[i32], max: &Limits) -> usize {
    data.iter()
        .enumerate()
        .filter(|&(i, &v)| v.unsigned_abs() as i64 > max.at(i) as i64)
        .count()
}

/// Count cells above `max`
pub fn count_above(data: &[i32], max: &Limits) -> usize {
    data.iter()
        .enumerate()
        .filter(|&(i, &v)| v > max.at(i))
        .count()
}
