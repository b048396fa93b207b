//! Extended high-resistance correction
//!
//! Removes per-column (RX) and per-row (TX) offsets from a baseline image
//! using median statistics of a delta image, then compares the corrected
//! surface against a reference. Shared by the RMI and TCM test routines.
//!
//! Images are in firmware order: rows are TX channels, columns are RX
//! channels.

use crate::error::{Error, Result};
use crate::image::Image;
use crate::limits::{count_above, count_abs_above, Limits};

/// Median with the upper middle element for even counts; 0 when empty
pub fn median(values: &[i32]) -> i32 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

/// Output of [`extended_high_resistance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighResistanceResult {
    /// Per-RX median delta
    pub rx_offset: Vec<i32>,
    /// Per-TX median of the RX-corrected delta
    pub tx_offset: Vec<i32>,
    /// Per-RX run-out of equalization
    pub rx_roe: Vec<i32>,
    /// Per-TX run-out of equalization
    pub tx_roe: Vec<i32>,
    /// Corrected baseline minus reference
    pub surface: Image,
}

/// Run the correction
///
/// All three images must share one shape.
pub fn extended_high_resistance(
    delta: &Image,
    baseline: &Image,
    reference: &Image,
) -> Result<HighResistanceResult> {
    let (rows, cols) = (baseline.rows(), baseline.cols());
    for (name, img) in [("delta", delta), ("reference", reference)] {
        if img.rows() != rows || img.cols() != cols {
            return Err(Error::invalid(format!(
                "{} image is {}x{}, baseline is {}x{}",
                name,
                img.rows(),
                img.cols(),
                rows,
                cols
            )));
        }
    }

    let rx_offset: Vec<i32> = (0..cols)
        .map(|c| median(&delta.column(c).collect::<Vec<_>>()))
        .collect();
    let rx_typ = median(&rx_offset);
    let rx_roe: Vec<i32> = rx_offset.iter().map(|&o| (o - rx_typ).abs()).collect();

    // RX-corrected baseline minus reference
    let mut diff = Image::zeroed(rows, cols);
    for r in 0..rows {
        for c in 0..cols {
            let corrected = baseline.get(r, c) - (rx_offset[c] - rx_typ);
            diff.set(r, c, corrected - reference.get(r, c));
        }
    }

    let tx_offset: Vec<i32> = (0..rows)
        .map(|r| {
            let row: Vec<i32> = (0..cols).map(|c| delta.get(r, c) - rx_offset[c]).collect();
            median(&row)
        })
        .collect();
    let tx_typ = median(&tx_offset);
    let tx_roe: Vec<i32> = tx_offset.iter().map(|&o| (o - tx_typ).abs()).collect();

    let mut surface = diff;
    for r in 0..rows {
        let correction = tx_offset[r] - tx_typ;
        for c in 0..cols {
            let v = surface.get(r, c) - correction;
            surface.set(r, c, v);
        }
    }

    log::debug!(
        "hires: rx_typ={} tx_typ={} max rx_roe={} max tx_roe={}",
        rx_typ,
        tx_typ,
        rx_roe.iter().copied().max().unwrap_or(0),
        tx_roe.iter().copied().max().unwrap_or(0)
    );

    Ok(HighResistanceResult {
        rx_offset,
        tx_offset,
        rx_roe,
        tx_roe,
        surface,
    })
}

/// Caller limits for the three outputs
#[derive(Debug, Clone, Copy)]
pub struct HighResistanceLimits<'a> {
    /// Maximum |surface| per cell (1 or rows*cols values)
    pub surface: &'a [i32],
    /// Maximum TX run-out (1 or rows values)
    pub tx_roe: &'a [i32],
    /// Maximum RX run-out (1 or cols values)
    pub rx_roe: &'a [i32],
}

/// Validated limits for a `rows` x `cols` result
#[derive(Debug, Clone, Copy)]
pub struct CheckedHighResistanceLimits<'a> {
    surface: Limits<'a>,
    tx_roe: Limits<'a>,
    rx_roe: Limits<'a>,
}

impl<'a> HighResistanceLimits<'a> {
    /// Validate every vector against the image shape
    pub fn check(&self, rows: usize, cols: usize) -> Result<CheckedHighResistanceLimits<'a>> {
        Ok(CheckedHighResistanceLimits {
            surface: Limits::new("surface", self.surface, rows * cols)?,
            tx_roe: Limits::new("tx run-out", self.tx_roe, rows)?,
            rx_roe: Limits::new("rx run-out", self.rx_roe, cols)?,
        })
    }
}

/// Failure counts per output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighResistanceFailures {
    pub surface: usize,
    pub tx: usize,
    pub rx: usize,
}

impl HighResistanceFailures {
    pub fn total(&self) -> usize {
        self.surface + self.tx + self.rx
    }
}

impl HighResistanceResult {
    /// Compare every output against its limit
    pub fn failures(&self, limits: &CheckedHighResistanceLimits) -> HighResistanceFailures {
        HighResistanceFailures {
            surface: count_abs_above(self.surface.data(), &limits.surface),
            tx: count_above(&self.tx_roe, &limits.tx_roe),
            rx: count_above(&self.rx_roe, &limits.rx_roe),
        }
    }
}

/// Extended high-resistance outcome returned through the device manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighResistanceReport {
    pub result: HighResistanceResult,
    pub failures: HighResistanceFailures,
}
