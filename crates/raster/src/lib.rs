#![warn(clippy::unwrap_used)]
extern crate approx;

pub type Error = inf::Error;
pub type Result<T = ()> = inf::Result<T>;

pub mod algo;
mod anyraster;
mod cell;
mod interval;
mod maskset;
mod nodata;
mod raster;
mod rasternum;
mod rastersize;
#[cfg(test)]
mod testutils;

pub use anyraster::AnyRaster;
pub use cell::Cell;
pub use interval::ValueInterval;
pub use maskset::MaskSet;
#[doc(inline)]
pub use nodata::Nodata;
pub use raster::{PixelRect, Raster};
pub use rasternum::{RasterDataType, RasterNum};
pub use rastersize::RasterSize;
