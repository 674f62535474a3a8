//! Plain data carried between ingestion, preprocessing and instancing.

use crate::geo::geo_to_cartesian;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A raw data sample. Latitude/longitude in degrees, elevation in globe units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self { latitude, longitude, elevation }
    }

    /// Axis value by index: 0 latitude, 1 longitude, 2 elevation.
    #[inline]
    pub fn axis(&self, i: usize) -> f64 {
        match i {
            0 => self.latitude,
            1 => self.longitude,
            _ => self.elevation,
        }
    }

    #[inline]
    pub fn axis_mut(&mut self, i: usize) -> &mut f64 {
        match i {
            0 => &mut self.latitude,
            1 => &mut self.longitude,
            _ => &mut self.elevation,
        }
    }
}

/// Placement of a feature or weather report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl GeoCoordinate {
    pub const fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }

    pub fn to_cartesian(&self, radius: f64) -> DVec3 {
        geo_to_cartesian(self.latitude, self.longitude, self.altitude, radius)
    }
}

impl From<GeoPoint> for GeoCoordinate {
    fn from(p: GeoPoint) -> Self {
        Self::new(p.latitude, p.longitude, p.elevation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Vegetation,
    Building,
    Landmark,
    General,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Vegetation,
        FeatureKind::Building,
        FeatureKind::Landmark,
        FeatureKind::General,
    ];

    /// Classifies a map element from its tags.
    ///
    /// `natural=tree` wins over `building`, which wins over `historic`/`tourism`.
    pub fn classify(tags: &BTreeMap<String, String>) -> Self {
        if tags.get("natural").map(String::as_str) == Some("tree") {
            FeatureKind::Vegetation
        } else if tags.contains_key("building") {
            FeatureKind::Building
        } else if tags.contains_key("historic") || tags.contains_key("tourism") {
            FeatureKind::Landmark
        } else {
            FeatureKind::General
        }
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeatureKind::Vegetation => "vegetation",
            FeatureKind::Building => "building",
            FeatureKind::Landmark => "landmark",
            FeatureKind::General => "general",
        };

        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    pub id: i64,
    pub kind: FeatureKind,
    pub coordinate: GeoCoordinate,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent.
    pub humidity: f64,
    /// Meters per second.
    pub wind_speed: f64,
    /// Degrees, meteorological convention.
    pub wind_direction: f64,
    pub condition: String,
    pub location: GeoCoordinate,
}

/// Axis-aligned lat/lon window in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self { min_lat, min_lon, max_lat, max_lon }
    }

    /// A window of `half_extent_deg` around a centre, clamped to valid latitudes.
    pub fn around(lat_deg: f64, lon_deg: f64, half_extent_deg: f64) -> Self {
        Self {
            min_lat: (lat_deg - half_extent_deg).max(-90.0),
            min_lon: lon_deg - half_extent_deg,
            max_lat: (lat_deg + half_extent_deg).min(90.0),
            max_lon: lon_deg + half_extent_deg,
        }
    }

    pub fn contains(&self, lat_deg: f64, lon_deg: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat_deg)
            && (self.min_lon..=self.max_lon).contains(&lon_deg)
    }
}
