//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Every element converts losslessly enough to `f64` for aggregation;
/// zonal statistics are always computed in double precision.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value used when a decoded sample cannot be represented
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element {
    (int: $($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::MIN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata.map_or(false, |nd| *self == nd)
                }
            }
        )*
    };
    (float: $($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                // NaN is always missing; a declared nodata matches within a few ULPs
                // so values that went through f32 <-> f64 casts still compare equal.
                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if self.is_nan() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if nd.is_nan() => false,
                        Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0) * 4.0,
                        None => false,
                    }
                }
            }
        )*
    };
}

impl_raster_element!(int: i8, i16, i32, i64, u8, u16, u32, u64);
impl_raster_element!(float: f32, f64);
