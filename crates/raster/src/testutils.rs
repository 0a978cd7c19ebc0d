use crate::raster::Raster;
use crate::rasternum::RasterNum;
use crate::RasterSize;

/// Builds a single-channel raster from a row-major literal, e.g.
/// `raster_from_rows(&[[10, 20], [30, 40]])`.
pub fn raster_from_rows<T, const COLS: usize, const ROWS: usize>(rows: &[[T; COLS]; ROWS]) -> Raster<T>
where
    T: RasterNum<T>,
{
    let data: Vec<T> = rows.iter().flatten().copied().collect();
    Raster::from_vec(RasterSize::with_rows_cols(ROWS, COLS), 1, data).expect("literal matches declared shape")
}

pub fn constant_raster<T: RasterNum<T>>(value: T, size: RasterSize) -> Raster<T> {
    Raster::filled_with(value, size, 1).expect("non-empty size")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_from_rows_preserves_layout() {
        let r = raster_from_rows(&[[10u8, 20], [30, 40]]);
        assert_eq!(r.get(0, 0, 0), 10);
        assert_eq!(r.get(1, 0, 0), 20);
        assert_eq!(r.get(0, 1, 0), 30);
        assert_eq!(r.get(1, 1, 0), 40);
    }
}
