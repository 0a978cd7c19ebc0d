use num::ToPrimitive;

/// Per-type sentinel used to mark a pixel as "no data" inside the raster's
/// own buffer, so no separate validity bitmap has to be allocated.
/// Floating point types use `NaN`; fixed point types use the extreme of
/// their range, mirroring how most remote-sensing raster formats encode
/// missing data.
pub trait Nodata<T: ToPrimitive>: ToPrimitive {
    fn nodata_value() -> T;
    fn is_nodata(value: T) -> bool;
    fn has_nan() -> bool;
}

macro_rules! impl_nodata_fixed_point {
    ($t:ident, $nodata:ident) => {
        impl Nodata<$t> for $t {
            fn nodata_value() -> $t {
                $t::$nodata
            }

            fn is_nodata(value: $t) -> bool {
                value == Self::nodata_value()
            }

            fn has_nan() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_nodata_floating_point {
    ($t:ident) => {
        impl Nodata<$t> for $t {
            fn nodata_value() -> $t {
                $t::NAN
            }

            fn is_nodata(value: $t) -> bool {
                value.is_nan()
            }

            fn has_nan() -> bool {
                true
            }
        }
    };
}

impl_nodata_fixed_point!(u8, MAX);
impl_nodata_fixed_point!(i8, MIN);
impl_nodata_fixed_point!(u16, MAX);
impl_nodata_fixed_point!(i16, MIN);
impl_nodata_fixed_point!(i32, MIN);

impl_nodata_floating_point!(f32);
impl_nodata_floating_point!(f64);
