use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a coordinate or region is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Coordinates must be finite numbers")]
    NonFinite,

    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("Region corners must form a convex, non-self-intersecting quadrilateral")]
    DegenerateRegion,
}

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range degrees.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    /// Check the point lies on the globe.
    ///
    /// Useful for points that arrived through deserialization and bypassed `new`.
    pub fn validate(&self) -> Result<(), GeoError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(GeoError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(GeoError::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(GeoError::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

/// Axis-aligned bounds of a region, used as an index-friendly prefilter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

/// A convex quadrilateral in (latitude, longitude) space.
///
/// Corners may be given in either winding order. Regions crossing the
/// antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[GeoPoint; 4]", into = "[GeoPoint; 4]")]
pub struct Region {
    corners: [GeoPoint; 4],
}

impl Region {
    pub fn new(corners: [GeoPoint; 4]) -> Result<Self, GeoError> {
        for corner in &corners {
            corner.validate()?;
        }

        // Convex and simple iff every turn goes the same way and none is flat.
        let mut sign = 0.0_f64;
        for i in 0..4 {
            let turn = cross(corners[i], corners[(i + 1) % 4], corners[(i + 2) % 4]);
            if turn == 0.0 || (sign != 0.0 && turn.signum() != sign) {
                return Err(GeoError::DegenerateRegion);
            }
            sign = turn.signum();
        }

        Ok(Self { corners })
    }

    /// Build the rectangle spanned by two latitude and two longitude bounds.
    pub fn from_bounds(
        min_latitude: f64,
        min_longitude: f64,
        max_latitude: f64,
        max_longitude: f64,
    ) -> Result<Self, GeoError> {
        Self::new([
            GeoPoint::new(min_latitude, min_longitude)?,
            GeoPoint::new(min_latitude, max_longitude)?,
            GeoPoint::new(max_latitude, max_longitude)?,
            GeoPoint::new(max_latitude, min_longitude)?,
        ])
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds {
            min_latitude: f64::INFINITY,
            max_latitude: f64::NEG_INFINITY,
            min_longitude: f64::INFINITY,
            max_longitude: f64::NEG_INFINITY,
        };
        for corner in &self.corners {
            bounds.min_latitude = bounds.min_latitude.min(corner.latitude);
            bounds.max_latitude = bounds.max_latitude.max(corner.latitude);
            bounds.min_longitude = bounds.min_longitude.min(corner.longitude);
            bounds.max_longitude = bounds.max_longitude.max(corner.longitude);
        }
        bounds
    }

    /// Point-in-polygon test. Points on an edge or corner count as inside.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let mut sign = 0.0_f64;
        for i in 0..4 {
            let side = cross(self.corners[i], self.corners[(i + 1) % 4], point);
            if side == 0.0 {
                continue;
            }
            if sign != 0.0 && side.signum() != sign {
                return false;
            }
            sign = side.signum();
        }
        true
    }
}

impl TryFrom<[GeoPoint; 4]> for Region {
    type Error = GeoError;

    fn try_from(corners: [GeoPoint; 4]) -> Result<Self, Self::Error> {
        Self::new(corners)
    }
}

impl From<Region> for [GeoPoint; 4] {
    fn from(region: Region) -> Self {
        region.corners
    }
}

/// Z component of (b - a) x (c - b).
fn cross(a: GeoPoint, b: GeoPoint, c: GeoPoint) -> f64 {
    let (abx, aby) = (b.latitude - a.latitude, b.longitude - a.longitude);
    let (bcx, bcy) = (c.latitude - b.latitude, c.longitude - b.longitude);
    abx * bcy - aby * bcx
}
