use inf::{Error, Result};

use crate::interval::ValueInterval;
use crate::raster::Raster;
use crate::rasternum::RasterNum;
use crate::RasterSize;

/// A boolean mask: a single- or multi-channel raster of `u8` values, each
/// either `0` (invalid) or `255` (valid).
#[derive(Clone, Debug, PartialEq)]
pub struct MaskSet(Raster<u8>);

impl MaskSet {
    /// Wraps an interleaved `0`/`255` buffer directly.
    pub fn from_raw(size: RasterSize, data: Vec<u8>) -> Result<Self> {
        Self::from_raster(Raster::from_vec(size, 1, data)?)
    }

    /// Wraps an existing `u8` raster as a mask, validating it only carries
    /// `0`/`255` values.
    pub fn from_raster(raster: Raster<u8>) -> Result<Self> {
        for y in 0..raster.height() {
            for x in 0..raster.width() {
                for c in 0..raster.channels() {
                    let v = raster.get(x, y, c);
                    if v != 0 && v != 255 {
                        return Err(Error::invalid_argument("mask values must be 0 or 255"));
                    }
                }
            }
        }
        Ok(MaskSet(raster))
    }

    /// Builds a mask from the value-range predicate on `raster`, ANDed
    /// across channels into a single-channel result.
    pub fn from_valid_intervals<T: RasterNum<T>>(raster: &Raster<T>, intervals: &[ValueInterval]) -> Self {
        raster.create_mask_from_ranges(intervals)
    }

    pub fn width(&self) -> usize {
        self.0.width()
    }

    pub fn height(&self) -> usize {
        self.0.height()
    }

    pub fn channels(&self) -> usize {
        self.0.channels()
    }

    pub fn size(&self) -> RasterSize {
        self.0.size()
    }

    pub fn is_valid(&self, x: usize, y: usize, c: usize) -> bool {
        self.0.get(x, y, c) == 255
    }

    pub fn raster(&self) -> &Raster<u8> {
        &self.0
    }

    fn combine(&self, other: &Self, f: impl Fn(bool, bool) -> bool) -> Result<Self> {
        if self.size() != other.size() || self.channels() != other.channels() {
            return Err(Error::size_mismatch("mask shapes do not match"));
        }

        let mut data = Vec::with_capacity(self.size().cell_count() * self.channels());
        for y in 0..self.height() {
            for x in 0..self.width() {
                for c in 0..self.channels() {
                    let result = f(self.is_valid(x, y, c), other.is_valid(x, y, c));
                    data.push(if result { 255 } else { 0 });
                }
            }
        }
        Ok(MaskSet(Raster::from_vec(self.size(), self.channels(), data)?))
    }

    pub fn bitwise_and(&self, other: &Self) -> Result<Self> {
        self.combine(other, |a, b| a && b)
    }

    pub fn bitwise_or(&self, other: &Self) -> Result<Self> {
        self.combine(other, |a, b| a || b)
    }

    pub fn bitwise_not(&self) -> Self {
        let mut data = Vec::with_capacity(self.size().cell_count() * self.channels());
        for y in 0..self.height() {
            for x in 0..self.width() {
                for c in 0..self.channels() {
                    data.push(if self.is_valid(x, y, c) { 0 } else { 255 });
                }
            }
        }
        MaskSet(Raster::from_vec(self.size(), self.channels(), data).expect("shape preserved"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(rows: usize, cols: usize) -> RasterSize {
        RasterSize::with_rows_cols(rows, cols)
    }

    #[test]
    fn rejects_non_boolean_values() {
        let err = MaskSet::from_raw(size(1, 1), vec![128]).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn bitwise_not_inverts() {
        let m = MaskSet::from_raw(size(1, 2), vec![255, 0]).unwrap();
        let inverted = m.bitwise_not();
        assert!(!inverted.is_valid(0, 0, 0));
        assert!(inverted.is_valid(1, 0, 0));
    }

    #[test]
    fn bitwise_and_requires_both_valid() {
        let a = MaskSet::from_raw(size(1, 2), vec![255, 255]).unwrap();
        let b = MaskSet::from_raw(size(1, 2), vec![255, 0]).unwrap();
        let c = a.bitwise_and(&b).unwrap();
        assert!(c.is_valid(0, 0, 0));
        assert!(!c.is_valid(1, 0, 0));
    }

    #[test]
    fn applying_same_mask_twice_is_idempotent() {
        let r = Raster::<u8>::from_vec(size(1, 2), 1, vec![5, 50]).unwrap();
        let intervals = [ValueInterval::closed(0.0, 10.0)];
        let first = MaskSet::from_valid_intervals(&r, &intervals);
        let second = MaskSet::from_valid_intervals(&r, &intervals);
        assert_eq!(first, second);
    }
}
