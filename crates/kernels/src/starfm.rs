//! STARFM-class kernel: moving-window weighted voting driven by a
//! spectral/temporal similarity filter, with optional double-pair blending.

use inf::{Error, Result};
use raster::algo::mean_and_std;
use raster::{AnyRaster, MaskSet, Raster, RasterSize};
use store::ImageStore;

use crate::fusion_kernel::{fetch_channel_f64, finalize_prediction, require_configured, FusionKernel};
use crate::option_bundle::{OptionBundle, StarfmOptions};
use crate::window::{channel_values_in_rect, clipped_window_range, half_window, sample_area};

#[derive(Debug, Default, Clone)]
pub struct StarfmKernel {
    options: Option<StarfmOptions>,
}

impl StarfmKernel {
    pub fn new() -> Self {
        StarfmKernel::default()
    }
}

impl FusionKernel for StarfmKernel {
    fn process_options(&mut self, options: OptionBundle) -> Result<()> {
        let OptionBundle::Starfm(options) = options else {
            return Err(Error::invalid_argument("StarfmKernel requires StarfmOptions"));
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
        let c2 = fetch_channel_f64(store, &options.low_tag, date)?;
        let base_type = store.get(&options.high_tag, options.pair_date_1)?.data_type();

        let half = half_window(options.window_size);
        let sample_rect = sample_area(options.prediction_area, half, f1.size());

        let result = match options.pair_date_3 {
            Some(pair_date_3) if options.double_pair_mode => {
                let f3 = fetch_channel_f64(store, &options.high_tag, pair_date_3)?;
                let c3 = fetch_channel_f64(store, &options.low_tag, pair_date_3)?;
                let pred1 = predict_single_pair(&f1, &c1, &c2, options, sample_rect)?;
                let pred3 = predict_single_pair(&f3, &c3, &c2, options, sample_rect)?;
                blend_double_pair(pred1, pred3, date, options.pair_date_1, pair_date_3)?
            }
            _ => predict_single_pair(&f1, &c1, &c2, options, sample_rect)?,
        };

        finalize_prediction(result, base_type, options.data_range, mask, options.prediction_area.origin)
    }
}

fn predict_single_pair(
    f_pair: &Raster<f64>,
    c_pair: &Raster<f64>,
    c_pred: &Raster<f64>,
    options: &StarfmOptions,
    sample_rect: raster::PixelRect,
) -> Result<Raster<f64>> {
    let channels = f_pair.channels();
    let prediction_area = options.prediction_area;
    let mut out = Raster::<f64>::new(prediction_area.size, channels)?;
    let half = half_window(options.window_size);

    for c in 0..channels {
        let sample_values = channel_values_in_rect(f_pair, sample_rect, c);
        let (_, sigma) = mean_and_std(&sample_values);
        let tol = 2.0 * sigma / options.num_classes;

        for y in 0..prediction_area.size.rows {
            for x in 0..prediction_area.size.cols {
                let xc = prediction_area.origin.col as usize + x;
                let yc = prediction_area.origin.row as usize + y;

                let f1_centre = f_pair.get(xc, yc, c);
                let c1_centre = c_pair.get(xc, yc, c);
                let c2_centre = c_pred.get(xc, yc, c);

                if options.copy_on_zero_diff {
                    if c1_centre == c2_centre {
                        out.set_pixel(x, y, c, f1_centre)?;
                        continue;
                    }
                    if f1_centre == c1_centre {
                        out.set_pixel(x, y, c, c2_centre)?;
                        continue;
                    }
                }

                let predicted = predict_pixel(
                    f_pair, c_pair, c_pred, options, c, tol, xc, yc, f1_centre, c1_centre, c2_centre, half,
                );
                out.set_pixel(x, y, c, predicted)?;
            }
        }
    }

    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn predict_pixel(
    f_pair: &Raster<f64>,
    c_pair: &Raster<f64>,
    c_pred: &Raster<f64>,
    options: &StarfmOptions,
    channel: usize,
    tol: f64,
    xc: usize,
    yc: usize,
    f1_centre: f64,
    c1_centre: f64,
    c2_centre: f64,
    half: usize,
) -> f64 {
    let (lo_y, hi_y) = clipped_window_range(yc, half, f_pair.height());
    let (lo_x, hi_x) = clipped_window_range(xc, half, f_pair.width());
    let half_window_extent = (options.window_size as f64) / 2.0;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for wy in lo_y..=hi_y {
        for wx in lo_x..=hi_x {
            let f1 = f_pair.get(wx, wy, channel);
            let c1 = c_pair.get(wx, wy, channel);
            let c2 = c_pred.get(wx, wy, channel);

            let spectral_ok = (f1 - f1_centre).abs() <= tol;
            let temporal_ok = (c1 - c2).abs() <= (c1_centre - c2_centre).abs();
            let candidate = if options.strict_filtering {
                spectral_ok && temporal_ok
            } else {
                spectral_ok || temporal_ok
            };
            if !candidate {
                continue;
            }

            let mut s = (f1 - c1).abs() + options.spectral_uncertainty;
            let mut t = (c1 - c2).abs() + options.temporal_uncertainty;
            let dist = (((wx as f64) - xc as f64).powi(2) + ((wy as f64) - yc as f64).powi(2)).sqrt();
            let mut d = 1.0 + dist / half_window_extent;

            if options.log_scale > 0.0 {
                s = (options.log_scale * s + 1.0).ln() + 1.0;
                t = (options.log_scale * t + 1.0).ln() + 1.0;
                d = (options.log_scale * d + 1.0).ln() + 1.0;
            }

            let combined = if options.temporal_weighting_mode { s * t * d } else { s * d };
            if !(combined > 0.0) || !combined.is_finite() {
                continue;
            }

            let weight = 1.0 / combined;
            weighted_sum += weight * (c2 + f1 - c1);
            weight_total += weight;
        }
    }

    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        c2_centre + f1_centre - c1_centre
    }
}

fn blend_double_pair(pred1: Raster<f64>, pred3: Raster<f64>, date_pred: i64, date1: i64, date3: i64) -> Result<Raster<f64>> {
    let d1 = (date_pred - date1).unsigned_abs() as f64;
    let d3 = (date_pred - date3).unsigned_abs() as f64;
    if d1 == 0.0 {
        return Ok(pred1);
    }
    if d3 == 0.0 {
        return Ok(pred3);
    }

    let w1 = 1.0 / d1;
    let w3 = 1.0 / d3;
    let total = w1 + w3;

    let size = pred1.size();
    let channels = pred1.channels();
    let mut out = Raster::<f64>::new(size, channels)?;
    for y in 0..size.rows {
        for x in 0..size.cols {
            for c in 0..channels {
                let blended = (w1 * pred1.get(x, y, c) + w3 * pred3.get(x, y, c)) / total;
                out.set_pixel(x, y, c, blended)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use raster::{Cell, PixelRect, RasterNum};

    use super::*;
    use crate::option_bundle::StarfmOptions;

    fn size(rows: usize, cols: usize) -> RasterSize {
        RasterSize::with_rows_cols(rows, cols)
    }

    fn full_area(size: RasterSize) -> PixelRect {
        PixelRect::new(Cell::from_row_col(0, 0), size)
    }

    fn base_options(prediction_area: PixelRect) -> StarfmOptions {
        StarfmOptions {
            window_size: 3,
            num_classes: 4.0,
            prediction_area,
            high_tag: "high".into(),
            low_tag: "low".into(),
            pair_date_1: 1,
            pair_date_3: None,
            data_range: None,
            spectral_uncertainty: 0.0,
            temporal_uncertainty: 0.0,
            strict_filtering: true,
            copy_on_zero_diff: true,
            temporal_weighting_mode: false,
            double_pair_mode: false,
            log_scale: 0.0,
        }
    }

    fn insert<T: RasterNum<T> + 'static>(store: &mut ImageStore, tag: &str, date: i64, values: Vec<T>, s: RasterSize)
    where
        AnyRaster: From<Raster<T>>,
    {
        store.set(tag, date, Raster::from_vec(s, 1, values).unwrap().into()).unwrap();
    }

    #[test]
    fn single_pair_zero_difference_copies_coarse() {
        let s = size(2, 2);
        let mut store = ImageStore::new();
        insert(&mut store, "high", 1, vec![10_i32, 20, 30, 40], s);
        insert(&mut store, "low", 1, vec![10_i32, 20, 30, 40], s);
        insert(&mut store, "low", 2, vec![11_i32, 22, 33, 44], s);

        let mut kernel = StarfmKernel::new();
        kernel.process_options(OptionBundle::Starfm(base_options(full_area(s)))).unwrap();

        let predicted = kernel.predict(&store, 2, None).unwrap();
        let predicted: Raster<i32> = predicted.try_into().unwrap();
        assert_eq!(predicted.get(0, 0, 0), 11);
        assert_eq!(predicted.get(1, 0, 0), 22);
        assert_eq!(predicted.get(0, 1, 0), 33);
        assert_eq!(predicted.get(1, 1, 0), 44);
    }

    #[test]
    fn masked_out_pixel_yields_no_data() {
        let s = size(2, 2);
        let mut store = ImageStore::new();
        insert(&mut store, "high", 1, vec![1.0, 2.0, 3.0, 4.0], s);
        insert(&mut store, "low", 1, vec![1.0, 2.0, 3.0, 4.0], s);
        insert(&mut store, "low", 2, vec![10.0, 20.0, 30.0, 40.0], s);

        let mask = MaskSet::from_raw(s, vec![255, 0, 255, 255]).unwrap();

        let mut kernel = StarfmKernel::new();
        kernel.process_options(OptionBundle::Starfm(base_options(full_area(s)))).unwrap();

        let predicted = kernel.predict(&store, 2, Some(&mask)).unwrap();
        let predicted: Raster<f64> = predicted.try_into().unwrap();
        assert!(predicted.is_nodata_at(1, 0, 0));
        assert_eq!(predicted.get(0, 0, 0), 10.0);
        assert_eq!(predicted.get(0, 1, 0), 30.0);
        assert_eq!(predicted.get(1, 1, 0), 40.0);
    }

    #[test]
    fn predict_before_configure_is_invalid_argument() {
        let store = ImageStore::new();
        let kernel = StarfmKernel::new();
        let err = kernel.predict(&store, 1, None).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }
}
