use inf::{Error, Result};

use crate::raster::Raster;
use crate::rasternum::RasterDataType;
use crate::RasterSize;

/// Type-erased raster, used wherever a raster's base type is only known at
/// runtime (the `ImageStore`, job planner, and kernel dispatch layer).
#[derive(Clone, Debug, PartialEq)]
pub enum AnyRaster {
    Uint8(Raster<u8>),
    Int8(Raster<i8>),
    Uint16(Raster<u16>),
    Int16(Raster<i16>),
    Int32(Raster<i32>),
    Float32(Raster<f32>),
    Float64(Raster<f64>),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            AnyRaster::Uint8($r) => $body,
            AnyRaster::Int8($r) => $body,
            AnyRaster::Uint16($r) => $body,
            AnyRaster::Int16($r) => $body,
            AnyRaster::Int32($r) => $body,
            AnyRaster::Float32($r) => $body,
            AnyRaster::Float64($r) => $body,
        }
    };
}

impl AnyRaster {
    pub fn width(&self) -> usize {
        dispatch!(self, r => r.width())
    }

    pub fn height(&self) -> usize {
        dispatch!(self, r => r.height())
    }

    pub fn channels(&self) -> usize {
        dispatch!(self, r => r.channels())
    }

    pub fn size(&self) -> RasterSize {
        dispatch!(self, r => r.size())
    }

    pub fn data_type(&self) -> RasterDataType {
        dispatch!(self, r => r.data_type())
    }

    pub fn shape_matches(&self, other: &AnyRaster) -> bool {
        self.size() == other.size() && self.channels() == other.channels()
    }

    /// Converts to the requested base type, always allocating a new buffer.
    pub fn convert_to(&self, target: RasterDataType) -> AnyRaster {
        match target {
            RasterDataType::Uint8 => AnyRaster::Uint8(dispatch!(self, r => r.convert_to())),
            RasterDataType::Int8 => AnyRaster::Int8(dispatch!(self, r => r.convert_to())),
            RasterDataType::Uint16 => AnyRaster::Uint16(dispatch!(self, r => r.convert_to())),
            RasterDataType::Int16 => AnyRaster::Int16(dispatch!(self, r => r.convert_to())),
            RasterDataType::Int32 => AnyRaster::Int32(dispatch!(self, r => r.convert_to())),
            RasterDataType::Float32 => AnyRaster::Float32(dispatch!(self, r => r.convert_to())),
            RasterDataType::Float64 => AnyRaster::Float64(dispatch!(self, r => r.convert_to())),
        }
    }

    /// Elementwise absolute difference; requires both operands to share a
    /// base type (`type_mismatch`) and shape (`size_mismatch`).
    pub fn absdiff(&self, other: &AnyRaster) -> Result<AnyRaster> {
        match (self, other) {
            (AnyRaster::Uint8(a), AnyRaster::Uint8(b)) => Ok(AnyRaster::Uint8(a.absdiff(b)?)),
            (AnyRaster::Int8(a), AnyRaster::Int8(b)) => Ok(AnyRaster::Int8(a.absdiff(b)?)),
            (AnyRaster::Uint16(a), AnyRaster::Uint16(b)) => Ok(AnyRaster::Uint16(a.absdiff(b)?)),
            (AnyRaster::Int16(a), AnyRaster::Int16(b)) => Ok(AnyRaster::Int16(a.absdiff(b)?)),
            (AnyRaster::Int32(a), AnyRaster::Int32(b)) => Ok(AnyRaster::Int32(a.absdiff(b)?)),
            (AnyRaster::Float32(a), AnyRaster::Float32(b)) => Ok(AnyRaster::Float32(a.absdiff(b)?)),
            (AnyRaster::Float64(a), AnyRaster::Float64(b)) => Ok(AnyRaster::Float64(a.absdiff(b)?)),
            _ => Err(Error::type_mismatch(format!(
                "cannot diff {} against {}",
                self.data_type(),
                other.data_type()
            ))),
        }
    }
}

macro_rules! impl_conversions {
    ($t:ty, $variant:ident) => {
        impl From<Raster<$t>> for AnyRaster {
            fn from(r: Raster<$t>) -> Self {
                AnyRaster::$variant(r)
            }
        }

        impl TryFrom<AnyRaster> for Raster<$t> {
            type Error = Error;

            fn try_from(value: AnyRaster) -> Result<Self> {
                match value {
                    AnyRaster::$variant(r) => Ok(r),
                    other => Err(Error::type_mismatch(format!(
                        "expected {}, got {}",
                        RasterDataType::$variant,
                        other.data_type()
                    ))),
                }
            }
        }

        impl<'a> TryFrom<&'a AnyRaster> for &'a Raster<$t> {
            type Error = Error;

            fn try_from(value: &'a AnyRaster) -> Result<Self> {
                match value {
                    AnyRaster::$variant(r) => Ok(r),
                    other => Err(Error::type_mismatch(format!(
                        "expected {}, got {}",
                        RasterDataType::$variant,
                        other.data_type()
                    ))),
                }
            }
        }
    };
}

impl_conversions!(u8, Uint8);
impl_conversions!(i8, Int8);
impl_conversions!(u16, Uint16);
impl_conversions!(i16, Int16);
impl_conversions!(i32, Int32);
impl_conversions!(f32, Float32);
impl_conversions!(f64, Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_try_from() {
        let r = Raster::<u16>::new(RasterSize::with_rows_cols(1, 1), 1).unwrap();
        let any: AnyRaster = r.into();
        let back: Raster<u16> = any.try_into().unwrap();
        assert_eq!(back.width(), 1);
    }

    #[test]
    fn wrong_type_conversion_is_type_mismatch() {
        let r = Raster::<u16>::new(RasterSize::with_rows_cols(1, 1), 1).unwrap();
        let any: AnyRaster = r.into();
        let err = Raster::<u8>::try_from(any).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn absdiff_across_types_is_type_mismatch() {
        let a: AnyRaster = Raster::<u8>::new(RasterSize::with_rows_cols(1, 1), 1).unwrap().into();
        let b: AnyRaster = Raster::<u16>::new(RasterSize::with_rows_cols(1, 1), 1).unwrap().into();
        let err = a.absdiff(&b).unwrap_err();
        assert!(matches!(err.kind, inf::ErrorKind::TypeMismatch(_)));
    }
}
