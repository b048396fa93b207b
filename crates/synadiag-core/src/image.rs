//! Two-dimensional capacitance images
//!
//! Controllers deliver images in firmware order: one row per transmitter
//! (RMI) or per image row (TCM), row-major. [`Image::oriented`] produces the
//! landscape or portrait view the host asks for.

use crate::error::{Error, Result};

/// Element encoding of a raw report buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit
    U8,
    /// Unsigned little-endian 16-bit
    U16,
    /// Signed little-endian 16-bit
    I16,
    /// Unsigned little-endian 32-bit
    U32,
    /// Signed little-endian 32-bit
    I32,
}

impl SampleFormat {
    /// Bytes per element
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 => 4,
        }
    }

    /// Decode up to `count` elements from `data`
    ///
    /// Fails when `data` holds fewer than `count` elements.
    pub fn decode(self, data: &[u8], count: usize) -> Result<Vec<i32>> {
        let needed = count * self.size();
        if data.len() < needed {
            return Err(Error::protocol(format!(
                "report too short: need {} bytes, got {}",
                needed,
                data.len()
            )));
        }
        let out = data[..needed]
            .chunks_exact(self.size())
            .map(|c| match self {
                Self::U8 => c[0] as i32,
                Self::U16 => u16::from_le_bytes([c[0], c[1]]) as i32,
                Self::I16 => i16::from_le_bytes([c[0], c[1]]) as i32,
                Self::U32 => u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i32,
                Self::I32 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            })
            .collect();
        Ok(out)
    }
}

/// Row-major image of signed samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
}

impl Image {
    /// All-zero image
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Wrap a row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<i32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::invalid(format!(
                "image buffer holds {} values, expected {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Decode a raw report buffer
    pub fn decode(rows: usize, cols: usize, format: SampleFormat, raw: &[u8]) -> Result<Self> {
        let data = format.decode(raw, rows * cols)?;
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[i32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [i32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<i32> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: i32) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over column `col` top to bottom
    pub fn column(&self, col: usize) -> impl Iterator<Item = i32> + '_ {
        (0..self.rows).map(move |r| self.get(r, col))
    }

    /// Swap rows and columns
    pub fn transpose(&self) -> Self {
        let mut out = Self::zeroed(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    /// Landscape or firmware-order view
    ///
    /// Landscape puts the larger dimension first. Portrait keeps firmware
    /// order untouched.
    pub fn oriented(self, landscape: bool) -> Self {
        if landscape && self.rows < self.cols {
            self.transpose()
        } else {
            self
        }
    }

    /// Sum of absolute sample values
    pub fn abs_sum(&self) -> i64 {
        self.data.iter().map(|&v| (v as i64).abs()).sum()
    }
}

/// Row count of the host view of a `rows` x `cols` firmware image
pub fn oriented_rows(rows: usize, cols: usize, landscape: bool) -> usize {
    if landscape {
        rows.max(cols)
    } else {
        rows
    }
}

/// Column count of the host view of a `rows` x `cols` firmware image
pub fn oriented_cols(rows: usize, cols: usize, landscape: bool) -> usize {
    if landscape {
        rows.min(cols)
    } else {
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_formats() {
        let raw = [0xFF, 0xFF, 0x01, 0x00];
        assert_eq!(SampleFormat::I16.decode(&raw, 2).unwrap(), vec![-1, 1]);
        assert_eq!(SampleFormat::U16.decode(&raw, 2).unwrap(), vec![65535, 1]);
        assert_eq!(SampleFormat::U8.decode(&raw, 3).unwrap(), vec![255, 255, 1]);
        assert_eq!(SampleFormat::I32.decode(&raw, 1).unwrap(), vec![0x0001_FFFF]);
        assert!(SampleFormat::U32.decode(&raw, 2).is_err());
    }

    #[test]
    fn test_landscape_puts_larger_dimension_first() {
        // tx = 2 rows, rx = 3 columns
        let img = Image::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let land = img.clone().oriented(true);
        assert_eq!((land.rows(), land.cols()), (3, 2));
        assert_eq!(land.row(0), &[1, 4]);
        assert_eq!(land.row(2), &[3, 6]);

        let portrait = img.clone().oriented(false);
        assert_eq!(portrait, img);
    }

    #[test]
    fn test_landscape_keeps_tall_images() {
        let img = Image::from_vec(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.clone().oriented(true), img);
        assert_eq!(oriented_rows(3, 2, true), 3);
        assert_eq!(oriented_rows(16, 24, true), 24);
        assert_eq!(oriented_cols(16, 24, true), 16);
        assert_eq!(oriented_rows(16, 24, false), 16);
    }

    #[test]
    fn test_from_vec_rejects_bad_length() {
        assert!(Image::from_vec(2, 2, vec![0; 3]).is_err());
    }
}
