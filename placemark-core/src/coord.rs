//! Geographic coordinates, their fixed-point storage encoding and the
//! great-circle distance between two points.
//!
//! Coordinates are held in memory as single-precision degrees. Persisted
//! values are scaled by `2^20` and rounded to an `i32`, which keeps exact
//! equality joins cheap and gives a resolution of roughly ten centimetres at
//! the equator.

use std::fmt;

use geo::{Distance, Geodesic, Point};
use thiserror::Error;

/// Scale applied to degrees before rounding to the persisted integer.
pub const FIXED_POINT_SCALE: f64 = 1_048_576.0;

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f32> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f32> = -180.0..=180.0;

/// Errors returned by [`Coordinates::new`].
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CoordinateError {
    /// Latitude was not finite or fell outside `[-90, 90]`.
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f32),
    /// Longitude was not finite or fell outside `[-180, 180]`.
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f32),
}

/// A latitude/longitude pair in WGS84 degrees.
///
/// The empty value is `(NaN, NaN)`; it never compares equal to anything,
/// including itself.
///
/// # Examples
///
/// ```
/// use placemark_core::Coordinates;
///
/// let rome = Coordinates::new(41.9, 12.5)?;
/// assert!(rome.is_valid());
/// assert!(Coordinates::EMPTY.is_empty());
/// # Ok::<(), placemark_core::CoordinateError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees, positive north.
    pub latitude: f32,
    /// Longitude in degrees, positive east.
    pub longitude: f32,
}

impl Coordinates {
    /// Placeholder for "no position".
    pub const EMPTY: Self = Self {
        latitude: f32::NAN,
        longitude: f32::NAN,
    };

    /// Validate and construct a coordinate pair.
    pub fn new(latitude: f32, longitude: f32) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !LATITUDE_RANGE.contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !LONGITUDE_RANGE.contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Construct a pair without range checks.
    ///
    /// Callers that persist the value must check [`Coordinates::is_valid`]
    /// first.
    #[must_use]
    pub const fn unchecked(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rebuild coordinates from their persisted fixed-point form.
    #[must_use]
    pub fn from_fixed(latitude: i32, longitude: i32) -> Self {
        Self::unchecked(decode(latitude), decode(longitude))
    }

    /// Persisted fixed-point form as `(latitude, longitude)`.
    #[must_use]
    pub fn to_fixed(self) -> (i32, i32) {
        (encode(self.latitude), encode(self.longitude))
    }

    /// Report whether this is the `(NaN, NaN)` placeholder.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.latitude.is_nan() && self.longitude.is_nan()
    }

    /// Report whether both components are finite and in range.
    #[must_use]
    pub fn is_valid(self) -> bool {
        Self::new(self.latitude, self.longitude).is_ok()
    }

    /// Geodesic distance in metres to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        distance(self, other)
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Encode degrees into the persisted fixed-point integer.
///
/// Values outside the `i32` range saturate; persisted coordinates are range
/// checked before they get here.
#[must_use]
pub fn encode(value: f32) -> i32 {
    (f64::from(value) * FIXED_POINT_SCALE).round() as i32
}

/// Decode a persisted fixed-point integer back into degrees.
#[must_use]
pub fn decode(raw: i32) -> f32 {
    (f64::from(raw) / FIXED_POINT_SCALE) as f32
}

/// Encode an `f64` degree value, used for search bounds.
pub(crate) fn encode_f64(value: f64) -> i64 {
    (value * FIXED_POINT_SCALE).round() as i64
}

/// Surface distance in metres between two points on the WGS84 ellipsoid.
///
/// The result is symmetric and zero only when both points coincide.
#[must_use]
pub fn distance(a: Coordinates, b: Coordinates) -> f64 {
    if a == b {
        return 0.0;
    }
    let origin = Point::new(f64::from(a.longitude), f64::from(a.latitude));
    let destination = Point::new(f64::from(b.longitude), f64::from(b.latitude));
    Geodesic.distance(origin, destination)
}
