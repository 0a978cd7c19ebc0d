mod crs;
mod georeference;
#[cfg(feature = "gdal")]
mod gdalproxy;
mod interp;
mod proxy;
mod rect;

pub use crs::Epsg;
pub use georeference::GeoReference;
#[cfg(feature = "gdal")]
pub use gdalproxy::GdalGeoInfoProxy;
pub use interp::Interp;
pub use proxy::{GeoInfoProxy, IdentityGeoInfoProxy};
pub use rect::Rect;
