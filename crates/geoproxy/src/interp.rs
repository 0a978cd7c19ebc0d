/// Resampling kernel used by [`crate::GeoInfoProxy::warp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interp {
    Nearest,
    Bilinear,
    Cubic,
}
