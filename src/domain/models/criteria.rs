//! Composable boolean predicates over magnitude measurements.
//!
//! A [`Criteria`] value is a pure predicate of a single measure. Predicates
//! compose with [`Criteria::and`] and [`Criteria::or`] into new values; the
//! variant set is closed so every consumer can match exhaustively.
//!
//! Store-backed queries ([`Criteria::measures`], [`Criteria::events`],
//! [`Criteria::count`]) take an explicit repository handle; there is no
//! process-wide database state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GeoPoint, MagnitudeMeasure};
use crate::domain::ports::MeasureRepository;

/// A closed polygon on the Earth's surface, vertices in decimal degrees.
///
/// The closing edge from the last vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPolygon {
    vertices: Vec<GeoPoint>,
}

impl GeoPolygon {
    /// Build a polygon from its vertices. At least three are required for a
    /// non-degenerate area; fewer vertices yield a polygon containing
    /// nothing.
    pub fn new(vertices: Vec<GeoPoint>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.vertices
    }

    /// Point-in-polygon test by ray casting on the lat/lon plane.
    ///
    /// Treats coordinates as planar, which is the usual approximation for
    /// regional catalogue polygons; polygons spanning the antimeridian are
    /// not supported.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let (px, py) = (point.lon_deg, point.lat_deg);
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = (self.vertices[i].lon_deg, self.vertices[i].lat_deg);
            let (xj, yj) = (self.vertices[j].lon_deg, self.vertices[j].lat_deg);
            if ((yi > py) != (yj > py))
                && (px < (xj - xi) * (py - yi) / (yj - yi) + xi)
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// A composable predicate over [`MagnitudeMeasure`] records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criteria {
    /// Matches every measure. Identity element for conjunction.
    All,
    /// Origin time strictly before the instant.
    Before { time: DateTime<Utc> },
    /// Origin time strictly after the instant.
    After { time: DateTime<Utc> },
    /// Origin time within the window, inclusive of both bounds.
    Between { start: DateTime<Utc>, end: DateTime<Utc> },
    /// Agency key is a member of the set.
    WithAgencies { agencies: BTreeSet<String> },
    /// Scale name is a member of the set.
    WithMagnitudeScales { scales: BTreeSet<String> },
    /// Epicentre lies inside the polygon.
    WithinPolygon { polygon: GeoPolygon },
    /// Epicentre lies within `radius_km` great-circle kilometres of the
    /// point, inclusive of the boundary.
    WithinDistanceFromPoint { point: GeoPoint, radius_km: f64 },
    /// Both operands match.
    And { left: Box<Criteria>, right: Box<Criteria> },
    /// Either operand matches.
    Or { left: Box<Criteria>, right: Box<Criteria> },
}

impl Default for Criteria {
    fn default() -> Self {
        Self::All
    }
}

impl Criteria {
    pub fn before(time: DateTime<Utc>) -> Self {
        Self::Before { time }
    }

    pub fn after(time: DateTime<Utc>) -> Self {
        Self::After { time }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Between { start, end }
    }

    pub fn with_agencies<I, S>(agencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::WithAgencies {
            agencies: agencies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_magnitude_scales<I, S>(scales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::WithMagnitudeScales {
            scales: scales.into_iter().map(Into::into).collect(),
        }
    }

    pub fn within_polygon(polygon: GeoPolygon) -> Self {
        Self::WithinPolygon { polygon }
    }

    pub fn within_distance_from_point(point: GeoPoint, radius_km: f64) -> Self {
        Self::WithinDistanceFromPoint { point, radius_km }
    }

    /// Conjunction: a predicate matching measures that satisfy both `self`
    /// and `other`.
    pub fn and(self, other: Criteria) -> Self {
        match (self, other) {
            (Self::All, c) | (c, Self::All) => c,
            (left, right) => Self::And {
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Disjunction: a predicate matching measures that satisfy either
    /// operand.
    pub fn or(self, other: Criteria) -> Self {
        Self::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Evaluate the predicate against a single measure.
    pub fn matches(&self, measure: &MagnitudeMeasure) -> bool {
        match self {
            Self::All => true,
            Self::Before { time } => measure.origin.time < *time,
            Self::After { time } => measure.origin.time > *time,
            Self::Between { start, end } => {
                measure.origin.time >= *start && measure.origin.time <= *end
            }
            Self::WithAgencies { agencies } => agencies.contains(&measure.agency),
            Self::WithMagnitudeScales { scales } => scales.contains(&measure.scale),
            Self::WithinPolygon { polygon } => polygon.contains(&measure.origin.position),
            Self::WithinDistanceFromPoint { point, radius_km } => {
                measure.origin.position.distance_km(point) <= *radius_km
            }
            Self::And { left, right } => left.matches(measure) && right.matches(measure),
            Self::Or { left, right } => left.matches(measure) || right.matches(measure),
        }
    }

    /// Lazily filter an in-memory sequence; the output is a subsequence of
    /// the input.
    pub fn filter<'a, I>(&'a self, measures: I) -> impl Iterator<Item = MagnitudeMeasure> + 'a
    where
        I: IntoIterator<Item = MagnitudeMeasure>,
        I::IntoIter: 'a,
    {
        measures.into_iter().filter(move |m| self.matches(m))
    }

    /// The measurements in `repo` satisfying this predicate.
    pub async fn measures(
        &self,
        repo: &dyn MeasureRepository,
    ) -> DomainResult<Vec<MagnitudeMeasure>> {
        repo.matching(self).await
    }

    /// Distinct event keys in `repo` with at least one matching measure.
    pub async fn events(&self, repo: &dyn MeasureRepository) -> DomainResult<Vec<String>> {
        repo.event_keys_matching(self).await
    }

    /// Number of measurements in `repo` satisfying this predicate.
    pub async fn count(&self, repo: &dyn MeasureRepository) -> DomainResult<u64> {
        repo.count_matching(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Origin;
    use chrono::TimeZone;

    fn measure(agency: &str, scale: &str, year: i32, lat: f64, lon: f64) -> MagnitudeMeasure {
        MagnitudeMeasure::new(
            "ev-1",
            agency,
            Origin::new(
                Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
                GeoPoint::new(lat, lon),
            ),
            scale,
            5.0,
            None,
        )
    }

    #[test]
    fn between_is_inclusive_of_both_bounds() {
        let start = Utc.with_ymd_and_hms(1980, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(1990, 6, 1, 0, 0, 0).unwrap();
        let c = Criteria::between(start, end);

        assert!(c.matches(&measure("ISC", "mb", 1980, 0.0, 0.0)));
        assert!(c.matches(&measure("ISC", "mb", 1990, 0.0, 0.0)));
        assert!(c.matches(&measure("ISC", "mb", 1985, 0.0, 0.0)));
        assert!(!c.matches(&measure("ISC", "mb", 1979, 0.0, 0.0)));
        assert!(!c.matches(&measure("ISC", "mb", 1991, 0.0, 0.0)));
    }

    #[test]
    fn distance_criterion_includes_boundary_radius() {
        let centre = GeoPoint::new(0.0, 0.0);
        let m = measure("ISC", "mb", 1985, 0.0, 1.0);
        let exact = m.origin.position.distance_km(&centre);

        assert!(Criteria::within_distance_from_point(centre, exact).matches(&m));
        assert!(!Criteria::within_distance_from_point(centre, exact - 1.0).matches(&m));
    }

    #[test]
    fn polygon_criterion_uses_ray_casting() {
        let polygon = GeoPolygon::new(vec![
            GeoPoint::new(-1.0, -1.0),
            GeoPoint::new(-1.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, -1.0),
        ]);
        let c = Criteria::within_polygon(polygon);

        assert!(c.matches(&measure("ISC", "mb", 1985, 0.0, 0.0)));
        assert!(!c.matches(&measure("ISC", "mb", 1985, 2.0, 0.0)));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        let polygon = GeoPolygon::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]);
        assert!(!Criteria::within_polygon(polygon).matches(&measure("ISC", "mb", 1985, 0.5, 0.5)));
    }

    #[test]
    fn conjunction_with_all_is_identity() {
        let c = Criteria::with_agencies(["ISC"]);
        assert_eq!(Criteria::All.and(c.clone()), c);
        assert_eq!(c.clone().and(Criteria::All), c);
    }

    #[test]
    fn and_or_compose() {
        let isc_mb = Criteria::with_agencies(["ISC"]).and(Criteria::with_magnitude_scales(["mb"]));
        assert!(isc_mb.matches(&measure("ISC", "mb", 1985, 0.0, 0.0)));
        assert!(!isc_mb.matches(&measure("ISC", "Ms", 1985, 0.0, 0.0)));
        assert!(!isc_mb.matches(&measure("NEIC", "mb", 1985, 0.0, 0.0)));

        let either = Criteria::with_agencies(["ISC"]).or(Criteria::with_agencies(["NEIC"]));
        assert!(either.matches(&measure("NEIC", "mb", 1985, 0.0, 0.0)));
        assert!(!either.matches(&measure("GCMT", "mb", 1985, 0.0, 0.0)));
    }

    #[test]
    fn filter_preserves_input_order() {
        let input = vec![
            measure("ISC", "mb", 1980, 0.0, 0.0),
            measure("NEIC", "mb", 1981, 0.0, 0.0),
            measure("ISC", "Ms", 1982, 0.0, 0.0),
        ];
        let c = Criteria::with_agencies(["ISC"]);
        let out: Vec<_> = c.filter(input.clone()).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, input[0].id);
        assert_eq!(out[1].id, input[2].id);
    }
}
