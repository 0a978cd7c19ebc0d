//! ESTARFM-class kernel: two bracketing pairs, a per-channel joint similarity
//! filter, a shared regression/conversion coefficient, and temporal weights.

use inf::{Error, Result};
use raster::algo::{covariance_and_variance, least_squares, mean_and_std};
use raster::{AnyRaster, MaskSet, Raster, RasterDataType};
use store::ImageStore;

use crate::fusion_kernel::{fetch_channel_f64, finalize_prediction, require_configured, FusionKernel};
use crate::option_bundle::{EstarfmOptions, OptionBundle};
use crate::window::{channel_values_in_rect, clipped_window_range, half_window, sample_area, window_channel_values};

const TEMPORAL_WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Default, Clone)]
pub struct EstarfmKernel {
    options: Option<EstarfmOptions>,
}

impl EstarfmKernel {
    pub fn new() -> Self {
        EstarfmKernel::default()
    }
}

impl FusionKernel for EstarfmKernel {
    fn process_options(&mut self, options: OptionBundle) -> Result<()> {
        let OptionBundle::Estarfm(options) = options else {
            return Err(Error::invalid_argument("EstarfmKernel requires EstarfmOptions"));
        };
        options.validate()?;
        self.options = Some(options);
        Ok(())
    }

    fn tileable(&self) -> bool {
        true
    }

    fn predict(&self, store: &ImageStore, date: i64, mask: Option<&MaskSet>) -> Result<AnyRaster> {
        let options = require_configured(&self.options)?;

        let f1 = fetch_channel_f64(store, &options.high_tag, options.pair_date_1)?;
        let c1 = fetch_channel_f64(store, &options.low_tag, options.pair_date_1)?;
        let f3 = fetch_channel_f64(store, &options.high_tag, options.pair_date_3)?;
        let c3 = fetch_channel_f64(store, &options.low_tag, options.pair_date_3)?;
        let c2 = fetch_channel_f64(store, &options.low_tag, date)?;
        let base_type = store.get(&options.high_tag, options.pair_date_1)?.data_type();

        let channels = f1.channels();
        let half = half_window(options.window_size);
        let prediction_area = options.prediction_area;
        let sample_rect = sample_area(prediction_area, half, f1.size());

        let data_range_max = options.data_range.map(|r| r.max).unwrap_or_else(|| native_max(base_type));
        let threshold = options.uncertainty_factor * data_range_max * 2f64.sqrt();

        let global_sigma: Vec<f64> = (0..channels)
            .map(|c| mean_and_std(&channel_values_in_rect(&f1, sample_rect, c)).1)
            .collect();

        let mut out = Raster::<f64>::new(prediction_area.size, channels)?;

        for y in 0..prediction_area.size.rows {
            for x in 0..prediction_area.size.cols {
                let xc = prediction_area.origin.col as usize + x;
                let yc = prediction_area.origin.row as usize + y;

                let (lo_y, hi_y) = clipped_window_range(yc, half, f1.height());
                let (lo_x, hi_x) = clipped_window_range(xc, half, f1.width());

                let tol: Vec<f64> = (0..channels)
                    .map(|c| {
                        let sigma = if options.use_local_tol {
                            mean_and_std(&window_channel_values(&f1, lo_x, hi_x, lo_y, hi_y, c)).1
                        } else {
                            global_sigma[c]
                        };
                        2.0 * sigma / options.num_classes
                    })
                    .collect();

                let similar = similar_pixels(&f1, &f3, lo_x, hi_x, lo_y, hi_y, xc, yc, channels, &tol);

                for c in 0..channels {
                    let predicted = predict_channel(&f1, &c1, &f3, &c3, &c2, &similar, c, xc, yc, options, threshold);
                    out.set_pixel(x, y, c, predicted)?;
                }
            }
        }

        finalize_prediction(out, base_type, options.data_range, mask, options.prediction_area.origin)
    }
}

fn native_max(base_type: RasterDataType) -> f64 {
    match base_type {
        RasterDataType::Uint8 => u8::MAX as f64,
        RasterDataType::Int8 => i8::MAX as f64,
        RasterDataType::Uint16 => u16::MAX as f64,
        RasterDataType::Int16 => i16::MAX as f64,
        RasterDataType::Int32 => i32::MAX as f64,
        RasterDataType::Float32 => f32::MAX as f64,
        RasterDataType::Float64 => f64::MAX,
    }
}

#[allow(clippy::too_many_arguments)]
fn similar_pixels(
    f1: &Raster<f64>,
    f3: &Raster<f64>,
    lo_x: usize,
    hi_x: usize,
    lo_y: usize,
    hi_y: usize,
    xc: usize,
    yc: usize,
    channels: usize,
    tol: &[f64],
) -> Vec<(usize, usize)> {
    let mut similar = Vec::new();
    for wy in lo_y..=hi_y {
        for wx in lo_x..=hi_x {
            let passes = (0..channels).all(|c| {
                let d1 = (f1.get(wx, wy, c) - f1.get(xc, yc, c)).abs();
                let d3 = (f3.get(wx, wy, c) - f3.get(xc, yc, c)).abs();
                d1 <= tol[c] && d3 <= tol[c]
            });
            if passes {
                similar.push((wx, wy));
            }
        }
    }
    similar
}

#[allow(clippy::too_many_arguments)]
fn predict_channel(
    f1: &Raster<f64>,
    c1: &Raster<f64>,
    f3: &Raster<f64>,
    c3: &Raster<f64>,
    c2: &Raster<f64>,
    similar: &[(usize, usize)],
    c: usize,
    xc: usize,
    yc: usize,
    options: &EstarfmOptions,
    threshold: f64,
) -> f64 {
    let fine_sum: Vec<f64> = similar.iter().map(|&(wx, wy)| f1.get(wx, wy, c) + f3.get(wx, wy, c)).collect();
    let coarse_sum: Vec<f64> = similar.iter().map(|&(wx, wy)| c1.get(wx, wy, c) + c3.get(wx, wy, c)).collect();
    let (slope, _, q) = least_squares(&coarse_sum, &fine_sum);

    let r_eff = if options.use_quality_weighted_regression {
        slope * q + (1.0 - q)
    } else if q >= 0.95 {
        slope
    } else {
        1.0
    };

    let coarse_combined: Vec<f64> = similar
        .iter()
        .flat_map(|&(wx, wy)| [c1.get(wx, wy, c), c3.get(wx, wy, c)])
        .collect();
    let (_, sigma_c) = mean_and_std(&coarse_combined);
    let v = if sigma_c > threshold {
        let fine_combined: Vec<f64> = similar
            .iter()
            .flat_map(|&(wx, wy)| [f1.get(wx, wy, c), f3.get(wx, wy, c)])
            .collect();
        let (cov, var) = covariance_and_variance(&fine_combined, &coarse_combined);
        if var > 0.0 {
            cov / var
        } else {
            1.0
        }
    } else {
        1.0
    };

    let sum_c1: f64 = similar.iter().map(|&(wx, wy)| c1.get(wx, wy, c)).sum();
    let sum_c3: f64 = similar.iter().map(|&(wx, wy)| c3.get(wx, wy, c)).sum();
    let sum_c2: f64 = similar.iter().map(|&(wx, wy)| c2.get(wx, wy, c)).sum();

    let w1_raw = 1.0 / ((sum_c1 - sum_c2).abs() + TEMPORAL_WEIGHT_EPSILON);
    let w3_raw = 1.0 / ((sum_c3 - sum_c2).abs() + TEMPORAL_WEIGHT_EPSILON);
    let total = w1_raw + w3_raw;
    let (w1, w3) = (w1_raw / total, w3_raw / total);

    let f1c = f1.get(xc, yc, c);
    let f3c = f3.get(xc, yc, c);
    let c1c = c1.get(xc, yc, c);
    let c3c = c3.get(xc, yc, c);
    let c2c = c2.get(xc, yc, c);

    w1 * (f1c + v * (c2c - c1c) * r_eff) + w3 * (f3c + v * (c2c - c3c) * r_eff)
}
