//! Measurement domain models.
//!
//! A catalogue is a set of [`MagnitudeMeasure`] records: one magnitude
//! estimate for one seismic event, reported by one agency on one magnitude
//! scale. Records are immutable once imported; every pipeline stage produces
//! derived values instead of mutating them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Magnitude scales commonly found in source bulletins.
///
/// Used for import-time sanity warnings only; the pipeline treats scale
/// names as opaque strings.
pub const KNOWN_SCALES: &[&str] = &[
    "mL", "mb", "Mb", "Ms", "md", "MD", "MS", "mb1", "mb1mx", "ms1", "ms1mx",
    "ML", "Ms1", "mbtmp", "Ms7", "mB", "Md", "Ml", "M", "MG", "ml", "mpv",
    "mbLg", "MW", "Mw", "MLv", "mbh", "MN", "ME",
    "Muk", // unknown magnitude (JMA)
];

/// Returns true if `scale` is one of the bulletin scales we know about.
pub fn is_known_scale(scale: &str) -> bool {
    KNOWN_SCALES.contains(&scale)
}

/// A geographic point in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

/// Mean Earth radius in kilometres, used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    /// Great-circle distance to `other` in kilometres (haversine formula).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat_deg.to_radians();
        let lat2 = other.lat_deg.to_radians();
        let dlat = (other.lat_deg - self.lat_deg).to_radians();
        let dlon = (other.lon_deg - self.lon_deg).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Hypocentre origin of a measurement: when and where the event was located.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Origin time of the event.
    pub time: DateTime<Utc>,
    /// Epicentre position.
    pub position: GeoPoint,
    /// Hypocentre depth in kilometres, when the bulletin reports one.
    pub depth_km: Option<f64>,
}

impl Origin {
    pub fn new(time: DateTime<Utc>, position: GeoPoint) -> Self {
        Self { time, position, depth_km: None }
    }

    pub fn with_depth(mut self, depth_km: f64) -> Self {
        self.depth_km = Some(depth_km);
        self
    }
}

/// A single magnitude measurement of a seismic event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeMeasure {
    /// Internal identifier.
    pub id: Uuid,
    /// Event identifier used by the source catalogue. Agencies reporting
    /// against a shared bulletin use the same key for the same event.
    pub event_key: String,
    /// Short name of the agency that produced the measurement.
    pub agency: String,
    /// Origin the measurement refers to.
    pub origin: Origin,
    /// Magnitude scale name, e.g. "mb", "Ms", "Mw".
    pub scale: String,
    /// Magnitude value in the unit of `scale`.
    pub value: f64,
    /// Standard error of `value`; absent in many source bulletins.
    pub standard_error: Option<f64>,
}

impl MagnitudeMeasure {
    pub fn new(
        event_key: impl Into<String>,
        agency: impl Into<String>,
        origin: Origin,
        scale: impl Into<String>,
        value: f64,
        standard_error: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_key: event_key.into(),
            agency: agency.into(),
            origin,
            scale: scale.into(),
            value,
            standard_error,
        }
    }

    /// True if the measurement carries no standard error.
    pub fn has_unknown_uncertainty(&self) -> bool {
        self.standard_error.is_none()
    }
}

/// A measurement converted to another scale through a regression model.
///
/// The original measure is carried along untouched; the converted value and
/// its propagated standard error are derived data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedMeasure {
    /// The measure the conversion started from.
    pub original: MagnitudeMeasure,
    /// Scale of the converted value.
    pub scale: String,
    /// Converted magnitude value.
    pub value: f64,
    /// Standard error propagated through the conversion.
    pub standard_error: f64,
    /// Index of the model used, in the homogeniser's insertion order.
    pub model_index: usize,
    /// True if the native value fell outside the model's fitted domain.
    pub extrapolated: bool,
}

/// How a homogenised record obtained its target-scale value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Provenance {
    /// The measurement was already on the target scale.
    Measured,
    /// Converted through the regression model at this index.
    Converted(usize),
    /// No model's domain contained the native value; the native value is
    /// passed through unmodified.
    Unconverted,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measured => "measured",
            Self::Converted(_) => "converted",
            Self::Unconverted => "unconverted",
        }
    }
}

/// One row of the homogenised output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomogenisedRecord {
    pub event_key: String,
    pub agency: String,
    /// Scale of the source measurement.
    pub native_scale: String,
    pub native_value: f64,
    pub native_standard_error: Option<f64>,
    /// Target-scale value: measured, converted, or passed through.
    pub target_value: f64,
    /// Propagated standard error of the target value, when derivable.
    pub target_standard_error: Option<f64>,
    pub provenance: Provenance,
}

/// Aggregate information about the stored catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogueSummary {
    pub measure_count: u64,
    pub agencies: BTreeSet<String>,
    pub scales: BTreeSet<String>,
    /// Earliest and latest origin times, when the catalogue is non-empty.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn origin() -> Origin {
        Origin::new(
            Utc.with_ymd_and_hms(1987, 2, 6, 9, 14, 15).unwrap(),
            GeoPoint::new(38.08, -81.40),
        )
    }

    #[test]
    fn haversine_matches_reference_distance() {
        // Paris -> Berlin, reference distance ~877 km.
        let paris = GeoPoint::new(48.8566, 2.3522);
        let berlin = GeoPoint::new(52.5200, 13.4050);
        let d = paris.distance_km(&berlin);
        assert!((d - 877.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        let p = GeoPoint::new(10.0, 20.0);
        assert!(p.distance_km(&p).abs() < 1e-9);
    }

    #[test]
    fn measure_uncertainty_flag() {
        let with = MagnitudeMeasure::new("e1", "ISC", origin(), "mb", 5.0, Some(0.1));
        let without = MagnitudeMeasure::new("e1", "NEIC", origin(), "Ms", 5.4, None);
        assert!(!with.has_unknown_uncertainty());
        assert!(without.has_unknown_uncertainty());
    }

    #[test]
    fn known_scales_cover_common_names() {
        assert!(is_known_scale("mb"));
        assert!(is_known_scale("Mw"));
        assert!(!is_known_scale("not-a-scale"));
    }
}
