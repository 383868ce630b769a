use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// IUGG mean Earth radius.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;
const KM_PER_DEGREE_LAT: f64 = 111.32;

/// WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let point = Self { lat, lon };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoreError::validation(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(CoreError::validation(format!(
                "longitude {} outside [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Coarse prefilter for index scans. Always a superset of the haversine disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        // Pad by 1% so rounding at the box edge never drops a record the
        // haversine filter would keep.
        let padded = radius_km * 1.01;
        let d_lat = padded / KM_PER_DEGREE_LAT;
        let min_lat = center.lat - d_lat;
        let max_lat = center.lat + d_lat;

        let cos_lat = center.lat.to_radians().cos();
        let whole_globe = min_lat <= -90.0 || max_lat >= 90.0 || cos_lat < 1e-6;
        let (min_lon, max_lon) = if whole_globe {
            (-180.0, 180.0)
        } else {
            let d_lon = padded / (KM_PER_DEGREE_LAT * cos_lat);
            let lo = center.lon - d_lon;
            let hi = center.lon + d_lon;
            if lo < -180.0 || hi > 180.0 {
                // Crosses the antimeridian; fall back to a latitude band.
                (-180.0, 180.0)
            } else {
                (lo, hi)
            }
        };

        Self {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon,
            max_lon,
        }
    }
}
