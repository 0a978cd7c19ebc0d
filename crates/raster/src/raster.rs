use std::sync::Arc;

use inf::{Context, Error, Result};
use num::{ToPrimitive, Zero};

use crate::interval::{value_in_union, ValueInterval};
use crate::maskset::MaskSet;
use crate::nodata::Nodata;
use crate::rasternum::{RasterDataType, RasterNum};
use crate::{Cell, RasterSize};

/// A rectangle in the pixel-coordinate system of a raster, used to crop a
/// view out of another raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub origin: Cell,
    pub size: RasterSize,
}

impl PixelRect {
    pub const fn new(origin: Cell, size: RasterSize) -> Self {
        PixelRect { origin, size }
    }
}

/// A dense, N-channel, 2D pixel buffer over a numeric base type.
///
/// A `Raster` is either owning or a cropped view over a parent: views share
/// the same backing buffer via `Arc`, so the buffer outlives every view that
/// references it, and a mutation can only proceed once no other view holds a
/// reference (enforced through `Arc::get_mut`).
#[derive(Clone)]
pub struct Raster<T: RasterNum<T>> {
    buffer: Arc<Vec<T>>,
    parent_size: RasterSize,
    origin: Cell,
    size: RasterSize,
    channels: usize,
    channel_stride: usize,
    channel_offset: usize,
    nodata: Vec<Option<T>>,
}

impl<T: RasterNum<T>> std::fmt::Debug for Raster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("channels", &self.channels)
            .field("type", &T::TYPE)
            .finish()
    }
}

impl<T: RasterNum<T>> PartialEq for Raster<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size || self.channels != other.channels {
            return false;
        }

        for y in 0..self.size.rows {
            for x in 0..self.size.cols {
                for c in 0..self.channels {
                    if self.get(x, y, c) != other.get(x, y, c) {
                        return false;
                    }
                }
            }
        }

        true
    }
}

impl<T: RasterNum<T>> Raster<T> {
    fn validate_new(size: RasterSize, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(Error::invalid_argument("raster must have at least one channel"));
        }
        if size.is_empty() {
            return Err(Error::invalid_argument("raster size must be non-empty"));
        }
        Ok(())
    }

    /// Allocates a new owning raster with a zeroed buffer.
    pub fn new(size: RasterSize, channels: usize) -> Result<Self> {
        Self::validate_new(size, channels)?;
        let buffer = vec![T::zero(); size.cell_count() * channels];
        Ok(Self::from_owning_buffer(size, channels, buffer))
    }

    /// Allocates a new owning raster, every pixel set to `value`.
    pub fn filled_with(value: T, size: RasterSize, channels: usize) -> Result<Self> {
        Self::validate_new(size, channels)?;
        let buffer = vec![value; size.cell_count() * channels];
        Ok(Self::from_owning_buffer(size, channels, buffer))
    }

    /// Allocates a new owning raster, every pixel set to the type's nodata sentinel.
    pub fn filled_with_nodata(size: RasterSize, channels: usize) -> Result<Self> {
        Self::filled_with(T::nodata_value(), size, channels)
    }

    /// Builds an owning raster from an already interleaved pixel buffer.
    pub fn from_vec(size: RasterSize, channels: usize, data: Vec<T>) -> Result<Self> {
        Self::validate_new(size, channels)?;
        let expected = size.cell_count() * channels;
        if data.len() != expected {
            return Err(Error::size_mismatch(format!(
                "expected buffer of length {expected}, got {}",
                data.len()
            )));
        }
        Ok(Self::from_owning_buffer(size, channels, data))
    }

    fn from_owning_buffer(size: RasterSize, channels: usize, data: Vec<T>) -> Self {
        Raster {
            buffer: Arc::new(data),
            parent_size: size,
            origin: Cell::from_row_col(0, 0),
            size,
            channels,
            channel_stride: channels,
            channel_offset: 0,
            nodata: vec![None; channels],
        }
    }

    pub fn width(&self) -> usize {
        self.size.cols
    }

    pub fn height(&self) -> usize {
        self.size.rows
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn size(&self) -> RasterSize {
        self.size
    }

    pub fn data_type(&self) -> RasterDataType {
        T::TYPE
    }

    pub fn nodata_value(&self, channel: usize) -> Option<T> {
        self.nodata.get(channel).copied().flatten()
    }

    pub fn set_nodata_value(&mut self, channel: usize, value: Option<T>) -> Result<()> {
        let slot = self
            .nodata
            .get_mut(channel)
            .ok_or_else(|| Error::invalid_argument(format!("no such channel {channel}")))?;
        *slot = value;
        Ok(())
    }

    #[inline]
    fn buffer_index(&self, x: usize, y: usize, c: usize) -> usize {
        let row = self.origin.row as usize + y;
        let col = self.origin.col as usize + x;
        let pixel_offset = row * self.parent_size.cols + col;
        pixel_offset * self.channel_stride + self.channel_offset + c
    }

    /// Reads the pixel at `(x, y)` on channel `c`. Panics on out of bounds
    /// access, mirroring slice indexing; callers operating on user-supplied
    /// coordinates should check `width`/`height`/`channels` first.
    pub fn get(&self, x: usize, y: usize, c: usize) -> T {
        debug_assert!(x < self.size.cols && y < self.size.rows && c < self.channels);
        self.buffer[self.buffer_index(x, y, c)]
    }

    pub fn is_nodata_at(&self, x: usize, y: usize, c: usize) -> bool {
        let value = self.get(x, y, c);
        // For floating point types a custom per-channel sentinel augments,
        // but never overrides, NaN as "unset" (§3): NaN is never equal to
        // anything, including itself, so `value == nd` alone would let a
        // genuine NaN slip through as ordinary data whenever a custom
        // non-NaN sentinel is configured. Fixed-point types have no such
        // universal sentinel, so a configured value there still fully
        // replaces the type's own extreme-value default, as before.
        if T::has_nan() && T::is_nodata(value) {
            return true;
        }
        match self.nodata_value(c) {
            Some(nd) => value == nd,
            None => T::is_nodata(value),
        }
    }

    fn require_exclusive(&mut self) -> Result<&mut Vec<T>> {
        Arc::get_mut(&mut self.buffer)
            .ok_or_else(|| Error::internal_logic("cannot mutate raster while a view shares its buffer"))
    }

    /// Sets a single pixel in place. Requires exclusive access to the buffer.
    pub fn set_pixel(&mut self, x: usize, y: usize, c: usize, value: T) -> Result<()> {
        if x >= self.size.cols || y >= self.size.rows || c >= self.channels {
            return Err(Error::invalid_argument("pixel coordinate out of bounds"));
        }
        let index = self.buffer_index(x, y, c);
        let buf = self.require_exclusive()?;
        buf[index] = value;
        Ok(())
    }

    /// In-place broadcast assignment: sets every pixel to `value`, or only
    /// the pixels where `mask` is valid (255) when a mask is given.
    pub fn set(&mut self, value: T, mask: Option<&MaskSet>) -> Result<()> {
        if let Some(mask) = mask {
            if mask.channels() != 1 && mask.channels() != self.channels {
                return Err(Error::size_mismatch("mask channel count does not match raster"));
            }
            if mask.width() != self.width() || mask.height() != self.height() {
                return Err(Error::size_mismatch("mask size does not match raster"));
            }
        }

        let (rows, cols, channels) = (self.size.rows, self.size.cols, self.channels);
        let indices: Vec<usize> = (0..rows)
            .flat_map(|y| (0..cols).map(move |x| (x, y)))
            .flat_map(|(x, y)| (0..channels).map(move |c| (x, y, c)))
            .filter_map(|(x, y, c)| {
                let visible = match mask {
                    None => true,
                    Some(mask) => {
                        let mc = if mask.channels() == 1 { 0 } else { c };
                        mask.is_valid(x, y, mc)
                    }
                };
                visible.then(|| self.buffer_index(x, y, c))
            })
            .collect();

        let buf = self.require_exclusive().context_tag("raster.set")?;
        for index in indices {
            buf[index] = value;
        }
        Ok(())
    }

    /// Returns a cropped view sharing this raster's backing buffer. `rect` is
    /// expressed in this raster's own coordinate system.
    pub fn view(&self, rect: PixelRect) -> Result<Self> {
        if !self.size.contains(rect.origin, rect.size) {
            return Err(Error::invalid_argument("view rectangle is not contained in the parent raster"));
        }

        Ok(Raster {
            buffer: Arc::clone(&self.buffer),
            parent_size: self.parent_size,
            origin: Cell::from_row_col(
                self.origin.row + rect.origin.row,
                self.origin.col + rect.origin.col,
            ),
            size: rect.size,
            channels: self.channels,
            channel_stride: self.channel_stride,
            channel_offset: self.channel_offset,
            nodata: self.nodata.clone(),
        })
    }

    /// Converts to a raster of a different base type, saturating each pixel
    /// into the destination range. Always allocates a fresh owning buffer.
    pub fn convert_to<U>(&self) -> Raster<U>
    where
        U: RasterNum<U>,
    {
        let mut data = Vec::with_capacity(self.size.cell_count() * self.channels);
        for y in 0..self.size.rows {
            for x in 0..self.size.cols {
                for c in 0..self.channels {
                    let value = self.get(x, y, c);
                    data.push(if self.is_nodata_at(x, y, c) {
                        U::nodata_value()
                    } else {
                        inf::cast::saturating::<U>(value.to_f64().unwrap_or(0.0))
                    });
                }
            }
        }
        Raster::from_owning_buffer(self.size, self.channels, data)
    }

    /// Produces one single-channel raster per channel, sharing the backing
    /// buffer with `self` rather than copying.
    pub fn split(&self) -> Vec<Raster<T>> {
        (0..self.channels)
            .map(|c| Raster {
                buffer: Arc::clone(&self.buffer),
                parent_size: self.parent_size,
                origin: self.origin,
                size: self.size,
                channels: 1,
                channel_stride: self.channel_stride,
                channel_offset: self.channel_offset + c,
                nodata: vec![self.nodata[c]],
            })
            .collect()
    }

    /// Elementwise absolute difference. `absdiff(a, b) == absdiff(b, a)`.
    pub fn absdiff(&self, other: &Self) -> Result<Self> {
        if self.size != other.size || self.channels != other.channels {
            return Err(Error::size_mismatch("absdiff requires matching raster shapes"));
        }

        let mut data = Vec::with_capacity(self.size.cell_count() * self.channels);
        for y in 0..self.size.rows {
            for x in 0..self.size.cols {
                for c in 0..self.channels {
                    let (a, b) = (self.get(x, y, c), other.get(x, y, c));
                    if self.is_nodata_at(x, y, c) || other.is_nodata_at(x, y, c) {
                        data.push(T::nodata_value());
                    } else if a >= b {
                        data.push(a - b);
                    } else {
                        data.push(b - a);
                    }
                }
            }
        }
        Ok(Raster::from_owning_buffer(self.size, self.channels, data))
    }

    /// Builds a mask that is 255 wherever the pixel value lies in the union
    /// of `intervals`, evaluated per channel and ANDed across channels into a
    /// single-channel result.
    pub fn create_mask_from_ranges(&self, intervals: &[ValueInterval]) -> MaskSet {
        let mut data = vec![255u8; self.size.cell_count()];
        for y in 0..self.size.rows {
            for x in 0..self.size.cols {
                let mut valid = true;
                for c in 0..self.channels {
                    let value = self.get(x, y, c).to_f64().unwrap_or(f64::NAN);
                    if self.is_nodata_at(x, y, c) || !value_in_union(value, intervals) {
                        valid = false;
                        break;
                    }
                }
                data[y * self.size.cols + x] = if valid { 255 } else { 0 };
            }
        }
        MaskSet::from_raw(self.size, data).expect("mask buffer sized to match raster")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(rows: usize, cols: usize) -> RasterSize {
        RasterSize::with_rows_cols(rows, cols)
    }

    #[test]
    fn new_raster_is_zeroed() {
        let r = Raster::<u16>::new(size(2, 2), 1).unwrap();
        assert_eq!(r.get(0, 0, 0), 0);
        assert_eq!(r.width(), 2);
        assert_eq!(r.height(), 2);
    }

    #[test]
    fn view_shares_buffer_and_crops() {
        let data: Vec<u8> = (0..9).collect();
        let r = Raster::<u8>::from_vec(size(3, 3), 1, data).unwrap();
        let v = r.view(PixelRect::new(Cell::from_row_col(1, 1), size(2, 2))).unwrap();
        assert_eq!(v.get(0, 0, 0), 4);
        assert_eq!(v.get(1, 1, 0), 8);
    }

    #[test]
    fn view_out_of_bounds_is_invalid_argument() {
        let r = Raster::<u8>::new(size(2, 2), 1).unwrap();
        let err = r.view(PixelRect::new(Cell::from_row_col(1, 1), size(2, 2))).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn mutation_fails_while_view_is_alive() {
        let mut r = Raster::<u8>::new(size(2, 2), 1).unwrap();
        let _view = r.view(PixelRect::new(Cell::from_row_col(0, 0), size(1, 1))).unwrap();
        let err = r.set_pixel(0, 0, 0, 5).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InternalLogic(_)));
    }

    #[test]
    fn absdiff_is_symmetric() {
        let a = Raster::<i32>::from_vec(size(1, 2), 1, vec![10, -5]).unwrap();
        let b = Raster::<i32>::from_vec(size(1, 2), 1, vec![3, 7]).unwrap();
        let ab = a.absdiff(&b).unwrap();
        let ba = b.absdiff(&a).unwrap();
        assert_eq!(ab.get(0, 0, 0), ba.get(0, 0, 0));
        assert_eq!(ab.get(1, 0, 0), ba.get(1, 0, 0));
        assert_eq!(ab.get(0, 0, 0), 7);
        assert_eq!(ab.get(1, 0, 0), 12);
    }

    #[test]
    fn absdiff_shape_mismatch_is_size_mismatch() {
        let a = Raster::<u8>::new(size(2, 2), 1).unwrap();
        let b = Raster::<u8>::new(size(2, 3), 1).unwrap();
        let err = a.absdiff(&b).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::SizeMismatch(_)));
    }

    #[test]
    fn convert_to_saturates() {
        let r = Raster::<i32>::from_vec(size(1, 1), 1, vec![1000]).unwrap();
        let converted: Raster<u8> = r.convert_to();
        assert_eq!(converted.get(0, 0, 0), u8::MAX);
    }

    #[test]
    fn nan_is_nodata_even_under_a_custom_non_nan_sentinel() {
        let mut r = Raster::<f64>::from_vec(size(1, 2), 1, vec![f64::NAN, 5.0]).unwrap();
        r.set_nodata_value(0, Some(-9999.0)).unwrap();
        assert!(r.is_nodata_at(0, 0, 0));
        assert!(!r.is_nodata_at(1, 0, 0));

        let converted: Raster<u8> = r.convert_to();
        assert_eq!(converted.get(0, 0, 0), u8::MAX);
        assert_eq!(converted.get(1, 0, 0), 5);
    }

    #[test]
    fn split_shares_storage_and_preserves_values() {
        let r = Raster::<u8>::from_vec(size(1, 2), 2, vec![1, 2, 3, 4]).unwrap();
        let channels = r.split();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].get(0, 0, 0), 1);
        assert_eq!(channels[0].get(1, 0, 0), 3);
        assert_eq!(channels[1].get(0, 0, 0), 2);
        assert_eq!(channels[1].get(1, 0, 0), 4);
    }

    #[test]
    fn mask_from_ranges_ands_across_channels() {
        let r = Raster::<u8>::from_vec(size(1, 2), 2, vec![1, 5, 1, 50]).unwrap();
        let mask = r.create_mask_from_ranges(&[ValueInterval::closed(0.0, 10.0)]);
        assert!(mask.is_valid(0, 0, 0));
        assert!(!mask.is_valid(1, 0, 0));
    }

    #[test]
    fn set_with_mask_only_touches_valid_pixels() {
        let mut r = Raster::<u8>::new(size(1, 2), 1).unwrap();
        let mask_raster = Raster::<u8>::from_vec(size(1, 2), 1, vec![255, 0]).unwrap();
        let mask = MaskSet::from_raw(size(1, 2), vec![255, 0]).unwrap();
        let _ = mask_raster;
        r.set(9, Some(&mask)).unwrap();
        assert_eq!(r.get(0, 0, 0), 9);
        assert_eq!(r.get(1, 0, 0), 0);
    }
}
