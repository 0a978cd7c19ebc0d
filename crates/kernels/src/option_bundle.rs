use inf::{Error, Result};
use raster::{PixelRect, ValueInterval};

fn require(condition: bool, msg: impl Into<String>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::invalid_argument(msg))
    }
}

fn validate_window_size(window_size: usize) -> Result<()> {
    require(window_size >= 3, "window_size must be at least 3")?;
    require(window_size % 2 == 1, "window_size must be odd")
}

/// STARFM regime controls, see the switches column of the option table.
#[derive(Debug, Clone)]
pub struct StarfmOptions {
    pub window_size: usize,
    pub num_classes: f64,
    pub prediction_area: PixelRect,
    pub high_tag: String,
    pub low_tag: String,
    pub pair_date_1: i64,
    pub pair_date_3: Option<i64>,
    pub data_range: Option<ValueInterval>,
    pub spectral_uncertainty: f64,
    pub temporal_uncertainty: f64,
    pub strict_filtering: bool,
    pub copy_on_zero_diff: bool,
    pub temporal_weighting_mode: bool,
    pub double_pair_mode: bool,
    /// `0.0` disables log-scaling; any value `> 0.0` is the scale factor.
    pub log_scale: f64,
}

impl StarfmOptions {
    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.window_size)?;
        require(self.num_classes >= 1.0, "num_classes must be >= 1")?;
        require(self.spectral_uncertainty >= 0.0, "spectral_uncertainty must be >= 0")?;
        require(self.temporal_uncertainty >= 0.0, "temporal_uncertainty must be >= 0")?;
        require(self.log_scale >= 0.0, "log_scale must be >= 0")?;
        if self.double_pair_mode {
            require(self.pair_date_3.is_some(), "double_pair_mode requires pair_date_3")?;
        }
        Ok(())
    }
}

/// ESTARFM-specific tolerances and blending controls.
#[derive(Debug, Clone)]
pub struct EstarfmOptions {
    pub window_size: usize,
    pub num_classes: f64,
    pub prediction_area: PixelRect,
    pub high_tag: String,
    pub low_tag: String,
    pub pair_date_1: i64,
    pub pair_date_3: i64,
    pub data_range: Option<ValueInterval>,
    pub use_local_tol: bool,
    pub use_quality_weighted_regression: bool,
    pub uncertainty_factor: f64,
}

impl EstarfmOptions {
    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.window_size)?;
        require(self.num_classes >= 1.0, "num_classes must be >= 1")?;
        require(self.uncertainty_factor >= 0.0, "uncertainty_factor must be >= 0")?;
        require(self.pair_date_1 != self.pair_date_3, "pair_date_1 and pair_date_3 must differ")
    }
}

/// FitFC regression mapping + spatial filtering controls.
#[derive(Debug, Clone)]
pub struct FitFcOptions {
    pub window_size: usize,
    pub prediction_area: PixelRect,
    pub high_tag: String,
    pub low_tag: String,
    pub pair_date_1: i64,
    pub data_range: Option<ValueInterval>,
    pub num_neighbors: usize,
    pub resolution_factor: f64,
}

impl FitFcOptions {
    pub fn validate(&self) -> Result<()> {
        validate_window_size(self.window_size)?;
        require(self.num_neighbors >= 1, "num_neighbors must be >= 1")?;
        require(self.resolution_factor > 0.0, "resolution_factor must be > 0")
    }
}

/// Validated, per-kernel configuration for a fusion run.
#[derive(Debug, Clone)]
pub enum OptionBundle {
    Starfm(StarfmOptions),
    Estarfm(EstarfmOptions),
    FitFc(FitFcOptions),
}

impl OptionBundle {
    pub fn validate(&self) -> Result<()> {
        match self {
            OptionBundle::Starfm(o) => o.validate(),
            OptionBundle::Estarfm(o) => o.validate(),
            OptionBundle::FitFc(o) => o.validate(),
        }
    }

    pub fn window_size(&self) -> usize {
        match self {
            OptionBundle::Starfm(o) => o.window_size,
            OptionBundle::Estarfm(o) => o.window_size,
            OptionBundle::FitFc(o) => o.window_size,
        }
    }

    pub fn prediction_area(&self) -> PixelRect {
        match self {
            OptionBundle::Starfm(o) => o.prediction_area,
            OptionBundle::Estarfm(o) => o.prediction_area,
            OptionBundle::FitFc(o) => o.prediction_area,
        }
    }

    pub fn data_range(&self) -> Option<ValueInterval> {
        match self {
            OptionBundle::Starfm(o) => o.data_range,
            OptionBundle::Estarfm(o) => o.data_range,
            OptionBundle::FitFc(o) => o.data_range,
        }
    }

    /// Returns a copy of this bundle with `prediction_area` replaced, used by
    /// the Parallelizer to hand each tile its own sub-rectangle.
    pub fn with_prediction_area(&self, area: PixelRect) -> OptionBundle {
        match self {
            OptionBundle::Starfm(o) => OptionBundle::Starfm(StarfmOptions { prediction_area: area, ..o.clone() }),
            OptionBundle::Estarfm(o) => OptionBundle::Estarfm(EstarfmOptions { prediction_area: area, ..o.clone() }),
            OptionBundle::FitFc(o) => OptionBundle::FitFc(FitFcOptions { prediction_area: area, ..o.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use raster::{Cell, RasterSize};

    use super::*;

    fn area() -> PixelRect {
        PixelRect::new(Cell::from_row_col(0, 0), RasterSize::with_rows_cols(4, 4))
    }

    #[test]
    fn even_window_size_is_rejected() {
        let opts = StarfmOptions {
            window_size: 4,
            num_classes: 4.0,
            prediction_area: area(),
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
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn double_pair_mode_requires_pair_date_3() {
        let opts = StarfmOptions {
            window_size: 3,
            num_classes: 4.0,
            prediction_area: area(),
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
            double_pair_mode: true,
            log_scale: 0.0,
        };
        let err = opts.validate().unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::InvalidArgument(_)));
    }
}
