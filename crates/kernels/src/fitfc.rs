//! FitFC-class kernel: per-window linear regression mapping between the
//! coarse pair, a bicubic-filtered residual field, and an RMSE-ranked
//! spatial blend. Declares itself non-tileable: the residual's bicubic
//! upsampling reads across the whole sample area.

use inf::{Error, Result};
use inf::interpolate::bicubic_weight;
use raster::{AnyRaster, MaskSet, Raster, RasterSize};
use store::ImageStore;

use crate::fusion_kernel::{fetch_channel_f64, finalize_prediction, require_configured, FusionKernel};
use crate::option_bundle::{FitFcOptions, OptionBundle};
use crate::window::{clipped_window_range, half_window, sample_area};

#[derive(Debug, Default, Clone)]
pub struct FitFcKernel {
    options: Option<FitFcOptions>,
}

impl FitFcKernel {
    pub fn new() -> Self {
        FitFcKernel::default()
    }
}

impl FusionKernel for FitFcKernel {
    fn process_options(&mut self, options: OptionBundle) -> Result<()> {
        let OptionBundle::FitFc(options) = options else {
            return Err(Error::invalid_argument("FitFcKernel requires FitFcOptions"));
        };
        options.validate()?;
        self.options = Some(options);
        Ok(())
    }

    fn tileable(&self) -> bool {
        false
    }

    fn predict(&self, store: &ImageStore, date: i64, mask: Option<&MaskSet>) -> Result<AnyRaster> {
        let options = require_configured(&self.options)?;

        let f1 = fetch_channel_f64(store, &options.high_tag, options.pair_date_1)?;
        let c1 = fetch_channel_f64(store, &options.low_tag, options.pair_date_1)?;
        let c2 = fetch_channel_f64(store, &options.low_tag, date)?;
        let base_type = store.get(&options.high_tag, options.pair_date_1)?.data_type();

        let channels = f1.channels();
        let half = half_window(options.window_size);
        let prediction_area = options.prediction_area;
        let sample_rect = sample_area(prediction_area, half, f1.size());

        let (fhat, residual) = regression_mapping(&f1, &c1, &c2, sample_rect, half, channels)?;
        let filtered_residual = bicubic_residual_filter(&residual, options.resolution_factor)?;

        let out = spatial_filter(&f1, &fhat, &filtered_residual, options, sample_rect, half)?;

        finalize_prediction(out, base_type, options.data_range, mask, options.prediction_area.origin)
    }
}

/// Solves `y ≈ a*x + b` from the raw moving-window moments. Falls back to
/// `a = 1` when the window's `x` variance is zero, still deriving `b` from
/// the means so a globally constant coarse pair reproduces its offset
/// exactly rather than collapsing to the identity map.
fn solve_window_regression(sum_x: f64, sum_y: f64, sum_xx: f64, sum_xy: f64, n: f64) -> (f64, f64) {
    let mean_x = sum_x / n;
    let mean_y = sum_y / n;
    let var_x = sum_xx / n - mean_x * mean_x;
    let cov_xy = sum_xy / n - mean_x * mean_y;

    if var_x.abs() < f64::EPSILON {
        (1.0, mean_y - mean_x)
    } else {
        let a = cov_xy / var_x;
        (a, mean_y - a * mean_x)
    }
}

/// A summed-area table: O(1) rectangular-sum queries after one O(rows*cols)
/// build pass, used so a W x W window sum never costs more than a handful of
/// array lookups regardless of W.
struct IntegralTable {
    data: Vec<f64>,
    stride: usize,
}

impl IntegralTable {
    fn build(rows: usize, cols: usize, mut sample: impl FnMut(usize, usize) -> f64) -> Self {
        let stride = cols + 1;
        let mut data = vec![0.0; (rows + 1) * stride];
        for y in 0..rows {
            for x in 0..cols {
                let v = sample(x, y);
                let above = data[y * stride + (x + 1)];
                let left = data[(y + 1) * stride + x];
                let diag = data[y * stride + x];
                data[(y + 1) * stride + (x + 1)] = v + above + left - diag;
            }
        }
        IntegralTable { data, stride }
    }

    /// Inclusive rectangle sum over `[lo_x, hi_x] x [lo_y, hi_y]`.
    fn sum(&self, lo_x: usize, hi_x: usize, lo_y: usize, hi_y: usize) -> f64 {
        let (x0, x1, y0, y1) = (lo_x, hi_x + 1, lo_y, hi_y + 1);
        self.data[y1 * self.stride + x1] - self.data[y0 * self.stride + x1] - self.data[y1 * self.stride + x0]
            + self.data[y0 * self.stride + x0]
    }
}

/// Stage 1 (regression mapping): per channel, per pixel of `sample_rect`,
/// fits the local `C2 ≈ a*C1 + b` map and derives the predicted fine value
/// and coarse residual at that pixel. Returns both fields sized to
/// `sample_rect` so stage 3 can look up any window neighbour.
fn regression_mapping(
    f1: &Raster<f64>,
    c1: &Raster<f64>,
    c2: &Raster<f64>,
    sample_rect: raster::PixelRect,
    half: usize,
    channels: usize,
) -> Result<(Raster<f64>, Raster<f64>)> {
    let mut fhat = Raster::<f64>::new(sample_rect.size, channels)?;
    let mut residual = Raster::<f64>::new(sample_rect.size, channels)?;

    for c in 0..channels {
        let table_x = IntegralTable::build(c1.height(), c1.width(), |x, y| c1.get(x, y, c));
        let table_y = IntegralTable::build(c2.height(), c2.width(), |x, y| c2.get(x, y, c));
        let table_xx = IntegralTable::build(c1.height(), c1.width(), |x, y| c1.get(x, y, c).powi(2));
        let table_xy = IntegralTable::build(c1.height(), c1.width(), |x, y| c1.get(x, y, c) * c2.get(x, y, c));

        for ly in 0..sample_rect.size.rows {
            for lx in 0..sample_rect.size.cols {
                let xc = sample_rect.origin.col as usize + lx;
                let yc = sample_rect.origin.row as usize + ly;

                let (lo_y, hi_y) = clipped_window_range(yc, half, c1.height());
                let (lo_x, hi_x) = clipped_window_range(xc, half, c1.width());
                let n = ((hi_x - lo_x + 1) * (hi_y - lo_y + 1)) as f64;

                let sum_x = table_x.sum(lo_x, hi_x, lo_y, hi_y);
                let sum_y = table_y.sum(lo_x, hi_x, lo_y, hi_y);
                let sum_xx = table_xx.sum(lo_x, hi_x, lo_y, hi_y);
                let sum_xy = table_xy.sum(lo_x, hi_x, lo_y, hi_y);

                let (a, b) = solve_window_regression(sum_x, sum_y, sum_xx, sum_xy, n);

                let f1c = f1.get(xc, yc, c);
                let c1c = c1.get(xc, yc, c);
                let c2c = c2.get(xc, yc, c);

                fhat.set_pixel(lx, ly, c, a * f1c + b)?;
                residual.set_pixel(lx, ly, c, c2c - (a * c1c + b))?;
            }
        }
    }

    Ok((fhat, residual))
}

/// Stage 2: area-mean downscale by `resolution_factor`, then bicubic
/// upscale back to the original size, smoothing high-frequency residual
/// noise without discarding its low-frequency structure.
fn bicubic_residual_filter(residual: &Raster<f64>, resolution_factor: f64) -> Result<Raster<f64>> {
    let downscaled = downscale_area_mean(residual, resolution_factor)?;
    upscale_bicubic(&downscaled, residual.size())
}

fn downscale_area_mean(raster: &Raster<f64>, factor: f64) -> Result<Raster<f64>> {
    let new_rows = ((raster.height() as f64) / factor).round().max(1.0) as usize;
    let new_cols = ((raster.width() as f64) / factor).round().max(1.0) as usize;
    let channels = raster.channels();
    let mut out = Raster::<f64>::new(RasterSize::with_rows_cols(new_rows, new_cols), channels)?;

    for ny in 0..new_rows {
        for nx in 0..new_cols {
            let y0 = ((ny as f64) * factor).floor() as usize;
            let y1 = (((ny + 1) as f64) * factor).ceil().max(y0 as f64 + 1.0) as usize;
            let x0 = ((nx as f64) * factor).floor() as usize;
            let x1 = (((nx + 1) as f64) * factor).ceil().max(x0 as f64 + 1.0) as usize;
            let y1 = y1.min(raster.height());
            let x1 = x1.min(raster.width());

            for c in 0..channels {
                let mut sum = 0.0;
                let mut count = 0usize;
                for yy in y0..y1 {
                    for xx in x0..x1 {
                        sum += raster.get(xx, yy, c);
                        count += 1;
                    }
                }
                out.set_pixel(nx, ny, c, if count > 0 { sum / count as f64 } else { 0.0 })?;
            }
        }
    }
    Ok(out)
}

fn upscale_bicubic(small: &Raster<f64>, target_size: RasterSize) -> Result<Raster<f64>> {
    let channels = small.channels();
    let mut out = Raster::<f64>::new(target_size, channels)?;

    if small.height() == target_size.rows && small.width() == target_size.cols {
        for y in 0..target_size.rows {
            for x in 0..target_size.cols {
                for c in 0..channels {
                    out.set_pixel(x, y, c, small.get(x, y, c))?;
                }
            }
        }
        return Ok(out);
    }

    let scale_y = small.height() as f64 / target_size.rows as f64;
    let scale_x = small.width() as f64 / target_size.cols as f64;

    for y in 0..target_size.rows {
        for x in 0..target_size.cols {
            let sy = (y as f64 + 0.5) * scale_y - 0.5;
            let sx = (x as f64 + 0.5) * scale_x - 0.5;
            let iy0 = sy.floor() as isize;
            let ix0 = sx.floor() as isize;

            for c in 0..channels {
                let mut value_sum = 0.0;
                let mut weight_sum = 0.0;
                for dy in -1..=2 {
                    for dx in -1..=2 {
                        let sample_y = (iy0 + dy).clamp(0, small.height() as isize - 1) as usize;
                        let sample_x = (ix0 + dx).clamp(0, small.width() as isize - 1) as usize;
                        let weight = bicubic_weight(sy - (iy0 + dy) as f64) * bicubic_weight(sx - (ix0 + dx) as f64);
                        value_sum += weight * small.get(sample_x, sample_y, c);
                        weight_sum += weight;
                    }
                }
                let value = if weight_sum != 0.0 { value_sum / weight_sum } else { 0.0 };
                out.set_pixel(x, y, c, value)?;
            }
        }
    }
    Ok(out)
}

struct Candidate {
    x: usize,
    y: usize,
    dist: f64,
    rmse: f64,
}

/// Stage 3: ranks window pixels by cross-channel RMSE against the centre,
/// keeps the closest `num_neighbors`, and blends their stage 1+2 results by
/// inverse distance.
fn spatial_filter(
    f1: &Raster<f64>,
    fhat: &Raster<f64>,
    filtered_residual: &Raster<f64>,
    options: &FitFcOptions,
    sample_rect: raster::PixelRect,
    half: usize,
) -> Result<Raster<f64>> {
    let channels = f1.channels();
    let prediction_area = options.prediction_area;
    let mut out = Raster::<f64>::new(prediction_area.size, channels)?;
    let half_window_extent = options.window_size as f64 / 2.0;

    for y in 0..prediction_area.size.rows {
        for x in 0..prediction_area.size.cols {
            let xc = prediction_area.origin.col as usize + x;
            let yc = prediction_area.origin.row as usize + y;

            let (lo_y, hi_y) = clipped_window_range(yc, half, f1.height());
            let (lo_x, hi_x) = clipped_window_range(xc, half, f1.width());

            let mut candidates: Vec<Candidate> = Vec::new();
            for wy in lo_y..=hi_y {
                for wx in lo_x..=hi_x {
                    let mse: f64 = (0..channels).map(|c| (f1.get(wx, wy, c) - f1.get(xc, yc, c)).powi(2)).sum::<f64>()
                        / channels as f64;
                    let rmse = mse.sqrt();
                    // NaN F1 pixels (the nodata sentinel, per the pixel value
                    // domain) can't be ranked or blended; drop them from candidacy
                    // rather than let partial_cmp panic.
                    if !rmse.is_finite() {
                        continue;
                    }
                    let dist = (((wx as f64) - xc as f64).powi(2) + ((wy as f64) - yc as f64).powi(2)).sqrt();
                    candidates.push(Candidate { x: wx, y: wy, dist, rmse });
                }
            }
            candidates.sort_by(|a, b| a.rmse.partial_cmp(&b.rmse).unwrap().then(a.dist.partial_cmp(&b.dist).unwrap()));
            candidates.truncate(options.num_neighbors);

            for c in 0..channels {
                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;
                for candidate in &candidates {
                    let lx = candidate.x - sample_rect.origin.col as usize;
                    let ly = candidate.y - sample_rect.origin.row as usize;
                    let d = 1.0 + candidate.dist / half_window_extent;
                    let weight = 1.0 / d;
                    weighted_sum += weight * (fhat.get(lx, ly, c) + filtered_residual.get(lx, ly, c));
                    weight_total += weight;
                }

                let predicted = if weight_total > 0.0 {
                    weighted_sum / weight_total
                } else {
                    let lx = xc - sample_rect.origin.col as usize;
                    let ly = yc - sample_rect.origin.row as usize;
                    fhat.get(lx, ly, c)
                };
                out.set_pixel(x, y, c, predicted)?;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use raster::{Cell, PixelRect};

    use super::*;

    #[test]
    fn window_regression_recovers_offset_from_constant_pair() {
        // C1 = constant(k), C2 = constant(k + 7): zero x-variance, so the
        // fallback path must still recover the additive offset via the means.
        let (a, b) = solve_window_regression(5.0 * 9.0, 12.0 * 9.0, 25.0 * 9.0, 5.0 * 12.0 * 9.0, 9.0);
        assert!((a - 1.0).abs() < 1e-9);
        assert!((b - 7.0).abs() < 1e-9);
    }

    #[test]
    fn regression_stage_zeroes_residual_for_constant_pair() {
        let s = RasterSize::with_rows_cols(2, 2);
        let f1 = Raster::<f64>::from_vec(s, 1, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let c1 = Raster::<f64>::filled_with(5.0, s, 1).unwrap();
        let c2 = Raster::<f64>::filled_with(12.0, s, 1).unwrap();
        let rect = PixelRect::new(Cell::from_row_col(0, 0), s);

        let (fhat, residual) = regression_mapping(&f1, &c1, &c2, rect, 1, 1).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert!(residual.get(x, y, 0).abs() < 1e-9);
                assert!((fhat.get(x, y, 0) - (f1.get(x, y, 0) + 7.0)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn spatial_filter_output_stays_within_convex_hull_of_candidates() {
        // A weighted average with strictly positive weights can never fall
        // outside the min/max of the values it blends.
        let s = RasterSize::with_rows_cols(2, 2);
        let f1 = Raster::<f64>::from_vec(s, 1, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let c1 = Raster::<f64>::filled_with(5.0, s, 1).unwrap();
        let c2 = Raster::<f64>::filled_with(12.0, s, 1).unwrap();

        let mut store = ImageStore::new();
        store.set("high", 1, f1.clone().into()).unwrap();
        store.set("low", 1, c1.into()).unwrap();
        store.set("low", 2, c2.into()).unwrap();

        let options = FitFcOptions {
            window_size: 3,
            prediction_area: PixelRect::new(Cell::from_row_col(0, 0), s),
            high_tag: "high".into(),
            low_tag: "low".into(),
            pair_date_1: 1,
            data_range: None,
            num_neighbors: 4,
            resolution_factor: 2.0,
        };

        let mut kernel = FitFcKernel::new();
        kernel.process_options(OptionBundle::FitFc(options)).unwrap();
        assert!(!kernel.tileable());

        let predicted = kernel.predict(&store, 2, None).unwrap();
        let predicted: Raster<f64> = predicted.try_into().unwrap();

        let expected_min = f1.get(0, 0, 0) + 7.0;
        let expected_max = f1.get(1, 1, 0) + 7.0;
        for y in 0..2 {
            for x in 0..2 {
                let v = predicted.get(x, y, 0);
                assert!(v >= expected_min - 1e-6 && v <= expected_max + 1e-6);
            }
        }
    }

    #[test]
    fn spatial_filter_ignores_nodata_candidates_instead_of_panicking() {
        let s = RasterSize::with_rows_cols(2, 2);
        let f1 = Raster::<f64>::from_vec(s, 1, vec![0.0, f64::NAN, 20.0, 30.0]).unwrap();
        let c1 = Raster::<f64>::filled_with(5.0, s, 1).unwrap();
        let c2 = Raster::<f64>::filled_with(12.0, s, 1).unwrap();

        let mut store = ImageStore::new();
        store.set("high", 1, f1.into()).unwrap();
        store.set("low", 1, c1.into()).unwrap();
        store.set("low", 2, c2.into()).unwrap();

        let options = FitFcOptions {
            window_size: 3,
            prediction_area: PixelRect::new(Cell::from_row_col(0, 0), s),
            high_tag: "high".into(),
            low_tag: "low".into(),
            pair_date_1: 1,
            data_range: None,
            num_neighbors: 4,
            resolution_factor: 2.0,
        };

        let mut kernel = FitFcKernel::new();
        kernel.process_options(OptionBundle::FitFc(options)).unwrap();
        let predicted = kernel.predict(&store, 2, None).unwrap();
        let predicted: Raster<f64> = predicted.try_into().unwrap();
        assert!(predicted.get(0, 0, 0).is_finite());
    }

    #[test]
    fn predict_before_configure_is_invalid_argument() {
        let store = ImageStore::new();
        let kernel = FitFcKernel::new();
        let err = kernel.predict(&store, 1, None).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }
}
