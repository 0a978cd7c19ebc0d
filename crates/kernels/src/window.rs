use raster::{Cell, PixelRect, Raster, RasterSize};

/// `⌊window_size/2⌋`.
pub fn half_window(window_size: usize) -> usize {
    window_size / 2
}

/// The prediction area expanded by `half` on every side, clipped to
/// `image_size`. All pixel reads for a kernel happen inside this rectangle.
pub fn sample_area(prediction_area: PixelRect, half: usize, image_size: RasterSize) -> PixelRect {
    let half = half as i32;
    let min_row = (prediction_area.origin.row - half).max(0);
    let min_col = (prediction_area.origin.col - half).max(0);
    let max_row_excl = (prediction_area.origin.row + prediction_area.size.rows as i32 + half).min(image_size.rows as i32);
    let max_col_excl = (prediction_area.origin.col + prediction_area.size.cols as i32 + half).min(image_size.cols as i32);

    PixelRect::new(
        Cell::from_row_col(min_row, min_col),
        RasterSize::with_rows_cols((max_row_excl - min_row).max(0) as usize, (max_col_excl - min_col).max(0) as usize),
    )
}

/// Inclusive pixel index range `[lo, hi]` of a `W`-wide window centred at
/// `centre`, clipped to `[0, dim)`.
pub fn clipped_window_range(centre: usize, half: usize, dim: usize) -> (usize, usize) {
    let lo = centre.saturating_sub(half);
    let hi = (centre + half).min(dim.saturating_sub(1));
    (lo, hi)
}

/// Collects every in-bounds value of channel `c` within `rect`.
pub fn channel_values_in_rect(raster: &Raster<f64>, rect: PixelRect, c: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity(rect.size.cell_count());
    for y in 0..rect.size.rows {
        for x in 0..rect.size.cols {
            values.push(raster.get(rect.origin.col as usize + x, rect.origin.row as usize + y, c));
        }
    }
    values
}

/// Collects channel `c` values over the explicit pixel-index window
/// `[lo_x, hi_x] x [lo_y, hi_y]` (inclusive), as produced by `clipped_window_range`.
pub fn window_channel_values(raster: &Raster<f64>, lo_x: usize, hi_x: usize, lo_y: usize, hi_y: usize, c: usize) -> Vec<f64> {
    let mut values = Vec::with_capacity((hi_x - lo_x + 1) * (hi_y - lo_y + 1));
    for wy in lo_y..=hi_y {
        for wx in lo_x..=hi_x {
            values.push(raster.get(wx, wy, c));
        }
    }
    values
}
