use geo_types::Point;
use inf::Result;
use raster::AnyRaster;

use crate::crs::Epsg;
use crate::georeference::GeoReference;
use crate::interp::Interp;
use crate::rect::Rect;

/// The narrow boundary the fusion core requires from an external
/// geo-referencing library: reprojecting rectangles and resampling rasters
/// between grids, plus scalar/vector pixel <-> projected <-> long/lat
/// coordinate conversions.
pub trait GeoInfoProxy {
    /// Projects `rect` from `from` to `to`, sampling `num_sample_points`
    /// points along the boundary to approximate non-linear distortion.
    fn project_rect(&self, rect: Rect, from: Epsg, to: Epsg, num_sample_points: usize) -> Result<Rect>;

    /// Resamples `raster` from its `from` grid onto the `to` grid.
    fn warp(&self, raster: &AnyRaster, from: &GeoReference, to: &GeoReference, interp: Interp) -> Result<AnyRaster>;

    fn img_to_proj(&self, geo: &GeoReference, col: f64, row: f64) -> Point<f64>;
    fn proj_to_img(&self, geo: &GeoReference, point: Point<f64>) -> Result<Point<f64>>;
    fn img_to_long_lat(&self, geo: &GeoReference, col: f64, row: f64) -> Result<Point<f64>>;
    fn long_lat_to_proj(&self, geo: &GeoReference, lon_lat: Point<f64>) -> Result<Point<f64>>;

    fn img_to_proj_batch(&self, geo: &GeoReference, points: &[(f64, f64)]) -> Vec<Point<f64>> {
        points.iter().map(|&(col, row)| self.img_to_proj(geo, col, row)).collect()
    }

    fn proj_to_img_batch(&self, geo: &GeoReference, points: &[Point<f64>]) -> Result<Vec<Point<f64>>> {
        points.iter().map(|&p| self.proj_to_img(geo, p)).collect()
    }
}

/// Default, dependency-free proxy used where pixel space, projected space
/// and long/lat all coincide. Suitable for unit tests of the planner and
/// kernels that do not exercise real georeferencing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityGeoInfoProxy;

impl GeoInfoProxy for IdentityGeoInfoProxy {
    fn project_rect(&self, rect: Rect, _from: Epsg, _to: Epsg, _num_sample_points: usize) -> Result<Rect> {
        Ok(rect)
    }

    fn warp(&self, raster: &AnyRaster, _from: &GeoReference, _to: &GeoReference, _interp: Interp) -> Result<AnyRaster> {
        Ok(raster.clone())
    }

    fn img_to_proj(&self, geo: &GeoReference, col: f64, row: f64) -> Point<f64> {
        geo.img_to_proj(col, row)
    }

    fn proj_to_img(&self, geo: &GeoReference, point: Point<f64>) -> Result<Point<f64>> {
        geo.proj_to_img(point)
    }

    fn img_to_long_lat(&self, geo: &GeoReference, col: f64, row: f64) -> Result<Point<f64>> {
        Ok(geo.img_to_proj(col, row))
    }

    fn long_lat_to_proj(&self, _geo: &GeoReference, lon_lat: Point<f64>) -> Result<Point<f64>> {
        Ok(lon_lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_proxy_round_trips_pixel_coordinates() {
        let proxy = IdentityGeoInfoProxy;
        let geo = GeoReference::identity(Epsg::WGS84);
        let proj = proxy.img_to_proj(&geo, 2.0, 3.0);
        let img = proxy.proj_to_img(&geo, proj).unwrap();
        assert_eq!(img.x(), 2.0);
        assert_eq!(img.y(), 3.0);
    }

    #[test]
    fn identity_proxy_leaves_rect_unchanged() {
        let proxy = IdentityGeoInfoProxy;
        let rect = Rect::from_points(Point::new(0.0, 1.0), Point::new(1.0, 0.0));
        let projected = proxy.project_rect(rect, Epsg::WGS84, Epsg::WGS84, 33).unwrap();
        assert_eq!(projected, rect);
    }
}
