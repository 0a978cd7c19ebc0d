//! Splits a kernel's prediction area into row-strip tiles and runs them on a
//! rayon worker pool, mirroring the row-chunked parallel pattern used
//! elsewhere in this codebase for raster-wide operations.

use std::sync::atomic::{AtomicBool, Ordering};

use inf::{Error, Result};
use kernels::{FusionKernel, OptionBundle};
use raster::{AnyRaster, Cell, MaskSet, PixelRect, Raster, RasterDataType, RasterSize};
use store::ImageStore;

/// How many worker threads the Parallelizer's internal pool should use.
#[derive(Debug, Clone, Copy)]
pub enum NumThreads {
    AllCpus,
    Count(usize),
}

/// Wraps a tileable kernel so its prediction area can be split across a
/// worker pool. Constructing one for an untileable kernel fails immediately:
/// the spec treats that composition as a configuration error, not a runtime
/// fallback to serial execution.
pub struct Parallelizer {
    num_threads: NumThreads,
}

impl Parallelizer {
    pub fn new(kernel: &dyn FusionKernel, num_threads: NumThreads) -> Result<Self> {
        if !kernel.tileable() {
            return Err(Error::invalid_argument("kernel is not tileable; cannot be composed with Parallelizer"));
        }
        Ok(Parallelizer { num_threads })
    }

    /// Runs `kernel` over `options.prediction_area()`, tiled by row strips.
    /// `cancel`, when set, is polled between tiles; if it becomes `true` the
    /// call aborts and no output is returned (partial tiles are discarded).
    pub fn predict<K>(
        &self,
        kernel: &K,
        store: &ImageStore,
        date: i64,
        mask: Option<&MaskSet>,
        options: &OptionBundle,
        cancel: Option<&AtomicBool>,
    ) -> Result<AnyRaster>
    where
        K: FusionKernel + Clone + Send + Sync,
    {
        let prediction_area = options.prediction_area();
        let tiles = self.row_strips(prediction_area);

        let thread_count = match self.num_threads {
            NumThreads::AllCpus => None,
            NumThreads::Count(n) => Some(n),
        };

        log::debug!(
            "parallelizer: predicting {date} across {} tile(s) with {} thread(s)",
            tiles.len(),
            thread_count.map(|n| n.to_string()).unwrap_or_else(|| "all cpus".to_string())
        );

        let results: Vec<(PixelRect, AnyRaster)> = if thread_count.is_some_and(|n| n <= 1) {
            let mut out = Vec::with_capacity(tiles.len());
            for tile in tiles {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    log::warn!("parallelizer: prediction for {date} cancelled before completion");
                    return Err(Error::invalid_argument("prediction cancelled before completion"));
                }
                out.push((tile, predict_tile(kernel, store, date, mask, options, tile)?));
            }
            out
        } else {
            let pool = build_thread_pool(thread_count)?;
            pool.install(|| {
                use rayon::prelude::*;
                tiles
                    .par_iter()
                    .map(|&tile| {
                        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                            log::warn!("parallelizer: prediction for {date} cancelled before completion");
                            return Err(Error::invalid_argument("prediction cancelled before completion"));
                        }
                        Ok((tile, predict_tile(kernel, store, date, mask, options, tile)?))
                    })
                    .collect::<Result<Vec<_>>>()
            })?
        };

        merge_tiles(prediction_area, &results)
    }

    fn row_strips(&self, area: PixelRect) -> Vec<PixelRect> {
        let desired = match self.num_threads {
            NumThreads::AllCpus => rayon::current_num_threads(),
            NumThreads::Count(n) => n.max(1),
        };
        let strip_count = desired.min(area.size.rows.max(1));
        let strip_height = area.size.rows.div_ceil(strip_count.max(1)).max(1);

        let mut tiles = Vec::new();
        let mut row = 0;
        while row < area.size.rows {
            let rows = strip_height.min(area.size.rows - row);
            tiles.push(PixelRect::new(
                Cell::from_row_col(area.origin.row + row as i32, area.origin.col),
                RasterSize::with_rows_cols(rows, area.size.cols),
            ));
            row += rows;
        }
        tiles
    }
}

fn build_thread_pool(thread_count: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(count) = thread_count {
        builder = builder.num_threads(count);
    }
    builder.build().map_err(|e| Error::internal_logic(format!("failed to create thread pool: {e}")))
}

fn predict_tile<K>(
    kernel: &K,
    store: &ImageStore,
    date: i64,
    mask: Option<&MaskSet>,
    options: &OptionBundle,
    tile: PixelRect,
) -> Result<AnyRaster>
where
    K: FusionKernel + Clone,
{
    let mut tile_kernel = kernel.clone();
    tile_kernel.process_options(options.with_prediction_area(tile))?;
    tile_kernel.predict(store, date, mask)
}

fn to_f64(raster: &AnyRaster) -> Raster<f64> {
    match raster.convert_to(RasterDataType::Float64) {
        AnyRaster::Float64(r) => r,
        _ => unreachable!("convert_to(Float64) always yields the Float64 variant"),
    }
}

/// Copies each tile's result into the final raster at its own offset. Tiles
/// are disjoint row strips, so there is no halo to discard here: each output
/// pixel is written by exactly the one tile that owns it.
fn merge_tiles(prediction_area: PixelRect, results: &[(PixelRect, AnyRaster)]) -> Result<AnyRaster> {
    let base_type = results.first().map(|(_, r)| r.data_type()).unwrap_or(RasterDataType::Float64);
    let channels = results.first().map(|(_, r)| r.channels()).unwrap_or(1);

    let mut merged = Raster::<f64>::filled_with(f64::NAN, prediction_area.size, channels)?;
    for (tile, raster) in results {
        let tile_f64 = to_f64(raster);
        let row_offset = (tile.origin.row - prediction_area.origin.row) as usize;
        let col_offset = (tile.origin.col - prediction_area.origin.col) as usize;
        for y in 0..tile.size.rows {
            for x in 0..tile.size.cols {
                for c in 0..channels {
                    merged.set_pixel(col_offset + x, row_offset + y, c, tile_f64.get(x, y, c))?;
                }
            }
        }
    }

    Ok(AnyRaster::Float64(merged).convert_to(base_type))
}
