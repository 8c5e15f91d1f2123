//! Per-group resolution of measurements with missing uncertainty.

use serde::{Deserialize, Serialize};

use crate::domain::models::MagnitudeMeasure;

/// Strategy deciding the fate of measures whose standard error is absent.
///
/// Applied to one group at a time, after grouping and before selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingUncertaintyPolicy {
    /// Remove measures lacking uncertainty from the group.
    Discard,
    /// Fill absent uncertainty with the maximum uncertainty observed in the
    /// same group; when no measure in the group has one, discard instead.
    SetEventMaximum,
    /// Fill absent uncertainty with a fixed configured value.
    SetDefault { value: f64 },
}

impl Default for MissingUncertaintyPolicy {
    fn default() -> Self {
        Self::Discard
    }
}

impl MissingUncertaintyPolicy {
    /// Per-measure predicate evaluated before any fill logic runs. Only the
    /// discard policy condemns a measure outright; the fill policies keep
    /// it and resolve the gap in [`apply`](Self::apply).
    pub fn should_be_discarded(&self, measure: &MagnitudeMeasure) -> bool {
        match self {
            Self::Discard => measure.has_unknown_uncertainty(),
            Self::SetEventMaximum | Self::SetDefault { .. } => false,
        }
    }

    /// Transform one group's measures, resolving absent uncertainties.
    /// Measures that already carry an uncertainty are returned unchanged.
    pub fn apply(&self, group: &[MagnitudeMeasure]) -> Vec<MagnitudeMeasure> {
        match self {
            Self::Discard => group
                .iter()
                .filter(|m| !self.should_be_discarded(m))
                .cloned()
                .collect(),
            Self::SetEventMaximum => {
                let group_max = group
                    .iter()
                    .filter_map(|m| m.standard_error)
                    .fold(None, |acc: Option<f64>, e| {
                        Some(acc.map_or(e, |a| a.max(e)))
                    });
                group
                    .iter()
                    .filter_map(|m| match (m.standard_error, group_max) {
                        (Some(_), _) => Some(m.clone()),
                        (None, Some(max)) => Some(with_error(m, max)),
                        // No donor in the group: discard semantics.
                        (None, None) => None,
                    })
                    .collect()
            }
            Self::SetDefault { value } => group
                .iter()
                .map(|m| {
                    if m.has_unknown_uncertainty() {
                        with_error(m, *value)
                    } else {
                        m.clone()
                    }
                })
                .collect(),
        }
    }
}

/// Derived copy of `measure` with the given standard error. The stored
/// record is never mutated.
fn with_error(measure: &MagnitudeMeasure, standard_error: f64) -> MagnitudeMeasure {
    let mut filled = measure.clone();
    filled.standard_error = Some(standard_error);
    filled
}
