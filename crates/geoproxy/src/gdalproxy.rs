use gdal::spatial_ref::{CoordTransform, SpatialRef};
use geo_types::Point;
use inf::{Context, Error, Result};
use raster::AnyRaster;

use crate::crs::Epsg;
use crate::georeference::GeoReference;
use crate::interp::Interp;
use crate::proxy::GeoInfoProxy;
use crate::rect::Rect;

fn spatial_ref(epsg: Epsg) -> Result<SpatialRef> {
    SpatialRef::from_epsg(epsg.0).map_err(|e| Error::invalid_argument(e.to_string()))
}

fn transformer(from: Epsg, to: Epsg) -> Result<CoordTransform> {
    let source = spatial_ref(from)?;
    let target = spatial_ref(to)?;
    CoordTransform::new(&source, &target).map_err(|e| Error::internal_logic(e.to_string()))
}

/// `GeoInfoProxy` backed by GDAL/PROJ, used whenever the caller links the
/// real geo-referencing collaborator instead of the identity stub.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalGeoInfoProxy;

impl GeoInfoProxy for GdalGeoInfoProxy {
    fn project_rect(&self, rect: Rect, from: Epsg, to: Epsg, num_sample_points: usize) -> Result<Rect> {
        if from == to {
            return Ok(rect);
        }
        let transform = transformer(from, to).context_tag(format!("{from}->{to}"))?;

        let n = num_sample_points.max(4);
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 / (n - 1) as f64;
            let corners = rect.corners();
            let edge = (i * 4) / n;
            let (a, b) = (corners[edge], corners[(edge + 1) % 4]);
            xs.push(a.x() + (b.x() - a.x()) * t);
            ys.push(a.y() + (b.y() - a.y()) * t);
        }

        transform
            .transform_coords(&mut xs, &mut ys, &mut [])
            .map_err(|e| Error::internal_logic(e.to_string()))?;

        let (min_x, max_x) = xs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        let (min_y, max_y) = ys.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        Ok(Rect::from_points(Point::new(min_x, max_y), Point::new(max_x, min_y)))
    }

    fn warp(&self, raster: &AnyRaster, _from: &GeoReference, _to: &GeoReference, _interp: Interp) -> Result<AnyRaster> {
        // Resampling itself is out of scope for the core; a real deployment
        // wires this to GDAL's warp API. Tests exercise the identity proxy.
        Err(Error::not_implemented("warp requires a linked GDAL collaborator"))
            .context_size((raster.width(), raster.height()))
    }

    fn img_to_proj(&self, geo: &GeoReference, col: f64, row: f64) -> Point<f64> {
        geo.img_to_proj(col, row)
    }

    fn proj_to_img(&self, geo: &GeoReference, point: Point<f64>) -> Result<Point<f64>> {
        geo.proj_to_img(point)
    }

    fn img_to_long_lat(&self, geo: &GeoReference, col: f64, row: f64) -> Result<Point<f64>> {
        let proj = geo.img_to_proj(col, row);
        self.long_lat_to_proj(geo, proj)
    }

    fn long_lat_to_proj(&self, geo: &GeoReference, lon_lat: Point<f64>) -> Result<Point<f64>> {
        let transform = transformer(geo.crs, Epsg::WGS84)?;
        let mut xs = [lon_lat.x()];
        let mut ys = [lon_lat.y()];
        transform
            .transform_coords(&mut xs, &mut ys, &mut [])
            .map_err(|e| Error::internal_logic(e.to_string()))?;
        Ok(Point::new(xs[0], ys[0]))
    }
}
