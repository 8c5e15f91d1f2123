//! Selection of one representative measurement per group and scale.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::models::MagnitudeMeasure;

/// Strategy choosing a single measure out of a group, restricted to one
/// magnitude scale. Invoked twice per group: once for the native scale and
/// once for the target scale, independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasureSelector {
    /// Arbitrary but seed-stable choice among eligible measures. A baseline
    /// control strategy, not meant for production conversion.
    Random { seed: u64 },
    /// The measure with the numerically smallest uncertainty; ties broken
    /// by agency lexical order.
    Precise,
    /// The measure from the highest-priority agency present, per the given
    /// total order. Yields nothing when no listed agency is present.
    AgencyRanking { ranking: Vec<String> },
}

impl Default for MeasureSelector {
    fn default() -> Self {
        Self::Precise
    }
}

impl MeasureSelector {
    /// Pick the representative measure of `scale` from `group`, or `None`
    /// when no eligible measure exists. The group is expected to have been
    /// processed by the missing-uncertainty policy already.
    pub fn select(&self, group: &[MagnitudeMeasure], scale: &str) -> Option<MagnitudeMeasure> {
        let eligible: Vec<&MagnitudeMeasure> =
            group.iter().filter(|m| m.scale == scale).collect();
        if eligible.is_empty() {
            return None;
        }

        match self {
            Self::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                let idx = rng.gen_range(0..eligible.len());
                Some(eligible[idx].clone())
            }
            Self::Precise => eligible
                .into_iter()
                .min_by(|a, b| Self::precision_order(a, b))
                .cloned(),
            Self::AgencyRanking { ranking } => ranking
                .iter()
                .find_map(|agency| eligible.iter().find(|m| &m.agency == agency))
                .map(|m| (*m).clone()),
        }
    }

    /// Smallest uncertainty first; measures without uncertainty sort last;
    /// agency name breaks ties for determinism.
    fn precision_order(a: &MagnitudeMeasure, b: &MagnitudeMeasure) -> Ordering {
        let ea = a.standard_error.unwrap_or(f64::INFINITY);
        let eb = b.standard_error.unwrap_or(f64::INFINITY);
        ea.partial_cmp(&eb)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.agency.cmp(&b.agency))
    }
}
