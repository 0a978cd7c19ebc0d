use geo_types::Point;
use inf::{Error, Result};

use crate::crs::Epsg;

/// Affine mapping between pixel space and projected coordinates, using the
/// familiar GDAL geotransform layout:
/// `proj_x = origin_x + col * pixel_width  + row * row_rotation`
/// `proj_y = origin_y + col * col_rotation + row * pixel_height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoReference {
    pub crs: Epsg,
    pub transform: [f64; 6],
}

impl GeoReference {
    pub const fn new(crs: Epsg, transform: [f64; 6]) -> Self {
        GeoReference { crs, transform }
    }

    /// An identity reference: pixel `(col, row)` maps to `(col, row)`, used
    /// for tests that do not exercise real georeferencing.
    pub const fn identity(crs: Epsg) -> Self {
        GeoReference {
            crs,
            transform: [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn img_to_proj(&self, col: f64, row: f64) -> Point<f64> {
        let [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height] = self.transform;
        Point::new(
            origin_x + col * pixel_width + row * row_rotation,
            origin_y + col * col_rotation + row * pixel_height,
        )
    }

    pub fn proj_to_img(&self, point: Point<f64>) -> Result<Point<f64>> {
        let [origin_x, a, b, origin_y, c, d] = self.transform;
        let det = a * d - b * c;
        if det.abs() < f64::EPSILON {
            return Err(Error::internal_logic("geotransform is not invertible"));
        }
        let dx = point.x() - origin_x;
        let dy = point.y() - origin_y;
        let col = (d * dx - b * dy) / det;
        let row = (-c * dx + a * dy) / det;
        Ok(Point::new(col, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let geo = GeoReference::identity(Epsg::WGS84);
        let proj = geo.img_to_proj(3.0, 4.0);
        let img = geo.proj_to_img(proj).unwrap();
        assert_eq!(img.x(), 3.0);
        assert_eq!(img.y(), 4.0);
    }

    #[test]
    fn scaled_transform_round_trips() {
        let geo = GeoReference::new(Epsg::WGS84, [100.0, 10.0, 0.0, 200.0, 0.0, -10.0]);
        let proj = geo.img_to_proj(5.0, 2.0);
        assert_eq!(proj.x(), 150.0);
        assert_eq!(proj.y(), 180.0);
        let img = geo.proj_to_img(proj).unwrap();
        assert_eq!(img.x(), 5.0);
        assert_eq!(img.y(), 2.0);
    }
}
