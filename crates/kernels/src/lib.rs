//! Pixelwise spatio-temporal fusion kernels: STARFM, ESTARFM and FitFC.
//!
//! Each kernel implements [`FusionKernel`], consuming an [`store::ImageStore`]
//! and an [`OptionBundle`] to predict a fine-resolution raster for a date that
//! only has a coarse observation.

mod estarfm;
mod fitfc;
mod fusion_kernel;
mod option_bundle;
mod starfm;
mod window;

pub use estarfm::EstarfmKernel;
pub use fitfc::FitFcKernel;
pub use fusion_kernel::{fetch_channel_f64, finalize_prediction, FusionKernel};
pub use option_bundle::{EstarfmOptions, FitFcOptions, OptionBundle, StarfmOptions};
pub use starfm::StarfmKernel;
