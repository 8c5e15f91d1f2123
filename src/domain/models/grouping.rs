//! Grouping of measurements that report the same physical event.
//!
//! A grouper partitions a filtered measurement set exactly: every input
//! measure lands in one group, no group is empty, nothing is dropped or
//! duplicated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::models::MagnitudeMeasure;

/// Key identifying one group of measurements.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    /// The event source key shared by agencies reporting against the same
    /// bulletin.
    Event(String),
    /// An index assigned by the clustering grouper, in order of first
    /// member appearance.
    Cluster(u32),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(key) => write!(f, "event:{key}"),
            Self::Cluster(idx) => write!(f, "cluster:{idx}"),
        }
    }
}

/// Distance between two measurement origins in space-time.
///
/// The variant set is closed; parameters are exposed rather than defaulted
/// silently because source bulletins differ widely in timing and location
/// quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Absolute difference of origin times, in seconds.
    OriginTimeSeconds,
    /// Euclidean combination of epicentre separation (km) and origin-time
    /// difference scaled by `km_per_second`; the result is in kilometres.
    SpaceTime { km_per_second: f64 },
}

impl DistanceMetric {
    fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
        (a - b).num_milliseconds().abs() as f64 / 1000.0
    }

    /// Distance between the origins of two measures.
    pub fn distance(&self, a: &MagnitudeMeasure, b: &MagnitudeMeasure) -> f64 {
        match self {
            Self::OriginTimeSeconds => Self::seconds_between(a.origin.time, b.origin.time),
            Self::SpaceTime { km_per_second } => {
                let dt = Self::seconds_between(a.origin.time, b.origin.time);
                let dx = a.origin.position.distance_km(&b.origin.position);
                dx.hypot(dt * km_per_second)
            }
        }
    }
}

/// Default merge threshold for origin-time clustering, in seconds.
pub const DEFAULT_CLUSTERING_THRESHOLD_SECONDS: f64 = 200.0;

/// Strategy partitioning a measurement set into per-event groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Grouper {
    /// Group by the event source key attached to each measure. Use when
    /// agencies report against a shared event linkage.
    ByEventSourceKey,
    /// Single-linkage agglomerative clustering over measurement origins:
    /// two clusters merge while their minimum pairwise distance is at most
    /// `threshold`. Use when agencies report independently with no shared
    /// event id.
    HierarchicalClustering {
        threshold: f64,
        metric: DistanceMetric,
    },
}

impl Default for Grouper {
    fn default() -> Self {
        Self::ByEventSourceKey
    }
}

impl Grouper {
    /// Clustering grouper with the origin-time metric and the default
    /// 200 s threshold.
    pub fn clustering_by_time() -> Self {
        Self::HierarchicalClustering {
            threshold: DEFAULT_CLUSTERING_THRESHOLD_SECONDS,
            metric: DistanceMetric::OriginTimeSeconds,
        }
    }

    /// Partition `measures` into groups. Group order and member order are
    /// deterministic: keys are sorted, members keep input order.
    pub fn group(&self, measures: &[MagnitudeMeasure]) -> BTreeMap<GroupKey, Vec<MagnitudeMeasure>> {
        match self {
            Self::ByEventSourceKey => Self::group_by_event_key(measures),
            Self::HierarchicalClustering { threshold, metric } => {
                Self::group_by_clustering(measures, *threshold, metric)
            }
        }
    }

    fn group_by_event_key(
        measures: &[MagnitudeMeasure],
    ) -> BTreeMap<GroupKey, Vec<MagnitudeMeasure>> {
        let mut groups: BTreeMap<GroupKey, Vec<MagnitudeMeasure>> = BTreeMap::new();
        for m in measures {
            groups
                .entry(GroupKey::Event(m.event_key.clone()))
                .or_default()
                .push(m.clone());
        }
        groups
    }

    /// Single-linkage clustering cut at `threshold`.
    ///
    /// Cutting a single-linkage dendrogram at distance t yields exactly the
    /// connected components of the graph whose edges join origins at
    /// distance <= t, so the partition is computed with union-find instead
    /// of an explicit dendrogram.
    fn group_by_clustering(
        measures: &[MagnitudeMeasure],
        threshold: f64,
        metric: &DistanceMetric,
    ) -> BTreeMap<GroupKey, Vec<MagnitudeMeasure>> {
        let n = measures.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], i: usize) -> usize {
            let mut root = i;
            while parent[root] != root {
                root = parent[root];
            }
            // Path compression
            let mut node = i;
            while parent[node] != root {
                let next = parent[node];
                parent[node] = root;
                node = next;
            }
            root
        }

        for i in 0..n {
            for j in (i + 1)..n {
                if metric.distance(&measures[i], &measures[j]) <= threshold {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[rj.max(ri)] = rj.min(ri);
                    }
                }
            }
        }

        // Cluster indices follow first-member input order.
        let mut cluster_of_root: BTreeMap<usize, u32> = BTreeMap::new();
        let mut groups: BTreeMap<GroupKey, Vec<MagnitudeMeasure>> = BTreeMap::new();
        for (i, m) in measures.iter().enumerate() {
            let root = find(&mut parent, i);
            let next_id = cluster_of_root.len() as u32;
            let id = *cluster_of_root.entry(root).or_insert(next_id);
            groups
                .entry(GroupKey::Cluster(id))
                .or_default()
                .push(m.clone());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GeoPoint, Origin};
    use chrono::TimeZone;

    fn measure_at(event: &str, secs: i64) -> MagnitudeMeasure {
        MagnitudeMeasure::new(
            event,
            "ISC",
            Origin::new(
                Utc.timestamp_opt(1_000_000 + secs, 0).unwrap(),
                GeoPoint::new(0.0, 0.0),
            ),
            "mb",
            5.0,
            None,
        )
    }

    #[test]
    fn event_key_grouping_partitions_by_key() {
        let measures = vec![
            measure_at("a", 0),
            measure_at("b", 10),
            measure_at("a", 20),
        ];
        let groups = Grouper::ByEventSourceKey.group(&measures);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&GroupKey::Event("a".into())].len(), 2);
        assert_eq!(groups[&GroupKey::Event("b".into())].len(), 1);
    }

    #[test]
    fn clustering_merges_chained_neighbours() {
        // 0s, 150s, 300s: each neighbour pair is within 200s, so single
        // linkage chains all three into one cluster; 10_000s stands alone.
        let measures = vec![
            measure_at("w", 0),
            measure_at("x", 150),
            measure_at("y", 300),
            measure_at("z", 10_000),
        ];
        let groups = Grouper::clustering_by_time().group(&measures);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&GroupKey::Cluster(0)].len(), 3);
        assert_eq!(groups[&GroupKey::Cluster(1)].len(), 1);
    }

    #[test]
    fn clustering_threshold_is_inclusive() {
        let measures = vec![measure_at("a", 0), measure_at("b", 200)];
        let groups = Grouper::clustering_by_time().group(&measures);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn grouping_is_a_partition() {
        let measures: Vec<_> = (0..10)
            .map(|i| measure_at(&format!("e{}", i % 3), i64::from(i) * 1000))
            .collect();
        for grouper in [Grouper::ByEventSourceKey, Grouper::clustering_by_time()] {
            let groups = grouper.group(&measures);
            let total: usize = groups.values().map(Vec::len).sum();
            assert_eq!(total, measures.len());
            assert!(groups.values().all(|g| !g.is_empty()));
        }
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(Grouper::ByEventSourceKey.group(&[]).is_empty());
        assert!(Grouper::clustering_by_time().group(&[]).is_empty());
    }
}
