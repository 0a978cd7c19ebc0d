use inf::{Error, Result};
use raster::{AnyRaster, Cell, MaskSet, Raster, RasterDataType, ValueInterval};
use store::ImageStore;

use crate::option_bundle::OptionBundle;

/// The common contract every pixelwise fusion algorithm implements.
pub trait FusionKernel {
    /// Validates and stores the bundle. Must be called before `predict`.
    fn process_options(&mut self, options: OptionBundle) -> Result<()>;

    /// Produces the fine-resolution prediction for `date`, respecting the
    /// configured prediction area and `mask`. Masked-out pixels are left at
    /// the output base type's no-data value.
    fn predict(&self, store: &ImageStore, date: i64, mask: Option<&MaskSet>) -> Result<AnyRaster>;

    /// Whether the Parallelizer may split this kernel's prediction area into
    /// independently computed tiles.
    fn tileable(&self) -> bool;
}

/// Reads `(tag, date)` from the store and converts it to an owning `f64`
/// raster so every kernel can do its arithmetic in one common type
/// regardless of the stored base type.
pub fn fetch_channel_f64(store: &ImageStore, tag: &str, date: i64) -> Result<Raster<f64>> {
    match store.get(tag, date)?.convert_to(RasterDataType::Float64) {
        AnyRaster::Float64(r) => Ok(r),
        _ => unreachable!("convert_to(Float64) always yields the Float64 variant"),
    }
}

fn clamp_to_data_range(value: f64, data_range: Option<ValueInterval>) -> f64 {
    match data_range {
        Some(range) => value.clamp(range.min, range.max),
        None => value,
    }
}

/// Clamps `values` into `data_range` (or leaves the native range of
/// `base_type` to do the clamping), blanks masked-out pixels to no-data, and
/// converts the result back to `base_type`. `values` is sized to a kernel's
/// `prediction_area`, which may sit at a non-zero offset into the full image
/// (e.g. one row-strip tile of a Parallelizer run); `mask`, like the source
/// rasters, is indexed in that full-image coordinate space, so `origin` is
/// added to every local `(x, y)` before consulting it.
pub fn finalize_prediction(
    mut values: Raster<f64>,
    base_type: RasterDataType,
    data_range: Option<ValueInterval>,
    mask: Option<&MaskSet>,
    origin: Cell,
) -> Result<AnyRaster> {
    for y in 0..values.height() {
        for x in 0..values.width() {
            for c in 0..values.channels() {
                let masked_out = mask
                    .map(|m| {
                        let mc = if m.channels() == 1 { 0 } else { c };
                        let gx = (origin.col + x as i32) as usize;
                        let gy = (origin.row + y as i32) as usize;
                        !m.is_valid(gx, gy, mc)
                    })
                    .unwrap_or(false);

                let v = values.get(x, y, c);
                let resolved = if masked_out || v.is_nan() {
                    f64::NAN
                } else {
                    clamp_to_data_range(v, data_range)
                };
                values.set_pixel(x, y, c, resolved)?;
            }
        }
    }

    Ok(AnyRaster::Float64(values).convert_to(base_type))
}

pub(crate) fn require_configured<'a, T>(options: &'a Option<T>) -> Result<&'a T> {
    options
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("process_options must be called before predict"))
}

#[cfg(test)]
mod tests {
    use raster::RasterSize;

    use super::*;

    #[test]
    fn mask_is_consulted_at_global_coordinates_not_local_ones() {
        // A 1x2 prediction area offset to row 1 of a taller mask: masked-out
        // at local (0, 0) only if the offset is correctly applied to reach
        // mask row 1, not mask row 0.
        let values = Raster::<f64>::from_vec(RasterSize::with_rows_cols(1, 2), 1, vec![10.0, 20.0]).unwrap();
        let mask = MaskSet::from_raw(RasterSize::with_rows_cols(2, 2), vec![255, 255, 0, 255]).unwrap();

        let result =
            finalize_prediction(values, RasterDataType::Float64, None, Some(&mask), Cell::from_row_col(1, 0)).unwrap();
        let result: Raster<f64> = result.try_into().unwrap();

        assert!(result.get(0, 0, 0).is_nan());
        assert_eq!(result.get(1, 0, 0), 20.0);
    }
}
