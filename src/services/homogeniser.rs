//! The homogenisation pipeline orchestrator.
//!
//! A [`Homogeniser`] owns the pipeline configuration (scales, criteria,
//! grouper, uncertainty policy, selector, model list) and memoises each
//! stage's output. Every stage is a pure function of the stored catalogue
//! and the current configuration, so results are recomputed on demand and
//! dropped whenever an earlier-stage setter runs.
//!
//! Instances are not safe for concurrent mutation; fix a stage's result
//! first if you want to share reads.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Criteria, GroupKey, Grouper, HomogenisedRecord, MagnitudeMeasure, MeasureSelector, ModelForm,
    MissingUncertaintyPolicy, Provenance, RegressionModel,
};
use crate::domain::ports::{MeasurePlotter, MeasureRepository};
use crate::services::export;

/// Pipeline stages in configuration order. Invalidation is expressed
/// against this enum so the rules stay auditable: mutating the
/// configuration of stage S drops every cache at S or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Filter,
    Group,
    Select,
}

/// Per-group selection results for one scale.
pub type SelectedMeasures = BTreeMap<GroupKey, MagnitudeMeasure>;

#[derive(Debug, Default)]
struct StageCaches {
    measures: Option<Vec<MagnitudeMeasure>>,
    groups: Option<BTreeMap<GroupKey, Vec<MagnitudeMeasure>>>,
    selection: Option<(SelectedMeasures, SelectedMeasures)>,
}

/// Orchestrates filtering, grouping, uncertainty completion, selection,
/// regression and conversion into a repeatable pipeline.
pub struct Homogeniser {
    repo: Arc<dyn MeasureRepository>,
    scales: Option<(String, String)>,
    criteria: Criteria,
    grouper: Grouper,
    selector: MeasureSelector,
    uncertainty: MissingUncertaintyPolicy,
    models: Vec<RegressionModel>,
    /// Uncertainty assumed for measures still lacking one at conversion
    /// time.
    default_uncertainty: f64,
    caches: StageCaches,
}

impl Homogeniser {
    /// Build a homogeniser over an explicit store handle, with default
    /// strategies: no filter, event-key grouping, discard policy, precise
    /// selector, no models.
    pub fn new(repo: Arc<dyn MeasureRepository>) -> Self {
        Self {
            repo,
            scales: None,
            criteria: Criteria::All,
            grouper: Grouper::default(),
            selector: MeasureSelector::default(),
            uncertainty: MissingUncertaintyPolicy::default(),
            models: Vec::new(),
            default_uncertainty: 0.0,
            caches: StageCaches::default(),
        }
    }

    /// Drop the cached outputs of `stage` and everything after it.
    fn invalidate_from(&mut self, stage: Stage) {
        if stage <= Stage::Filter {
            self.caches.measures = None;
        }
        if stage <= Stage::Group {
            self.caches.groups = None;
        }
        if stage <= Stage::Select {
            self.caches.selection = None;
        }
        debug!(?stage, "invalidated pipeline caches");
    }

    /// Set the native and target scales. Invalidates every cached stage.
    pub fn set_scales(&mut self, native: impl Into<String>, target: impl Into<String>) {
        self.scales = Some((native.into(), target.into()));
        self.invalidate_from(Stage::Filter);
    }

    /// Conjoin `criteria` with the active predicate. Invalidates every
    /// cached stage.
    pub fn add_criteria(&mut self, criteria: Criteria) {
        self.criteria = std::mem::take(&mut self.criteria).and(criteria);
        self.invalidate_from(Stage::Filter);
    }

    /// Replace the grouping strategy. Invalidates grouping and selection.
    pub fn set_grouper(&mut self, grouper: Grouper) {
        self.grouper = grouper;
        self.invalidate_from(Stage::Group);
    }

    /// Replace the selection strategy. Invalidates selection.
    pub fn set_selector(&mut self, selector: MeasureSelector) {
        self.selector = selector;
        self.invalidate_from(Stage::Select);
    }

    /// Replace the missing-uncertainty policy. Invalidates selection.
    pub fn set_missing_uncertainty_strategy(&mut self, policy: MissingUncertaintyPolicy) {
        self.uncertainty = policy;
        self.invalidate_from(Stage::Select);
    }

    /// Uncertainty assumed at conversion time for measures without one.
    pub fn set_default_uncertainty(&mut self, value: f64) {
        self.default_uncertainty = value;
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    fn require_scales(&self) -> DomainResult<(String, String)> {
        self.scales.clone().ok_or_else(|| {
            DomainError::Configuration(
                "native and target scales must be set before this stage; call set_scales first"
                    .to_string(),
            )
        })
    }

    /// Distinct event keys matching the active criteria.
    pub async fn events(&self) -> DomainResult<Vec<String>> {
        self.criteria.events(self.repo.as_ref()).await
    }

    /// The measurements matching the active criteria. Memoized.
    pub async fn measures(&mut self) -> DomainResult<Vec<MagnitudeMeasure>> {
        if self.caches.measures.is_none() {
            let measures = self.criteria.measures(self.repo.as_ref()).await?;
            debug!(count = measures.len(), "filtered catalogue measures");
            self.caches.measures = Some(measures);
        }
        Ok(self.caches.measures.clone().unwrap_or_default())
    }

    /// The filtered measurements partitioned by the active grouper.
    /// Memoized.
    pub async fn grouped_measures(
        &mut self,
    ) -> DomainResult<BTreeMap<GroupKey, Vec<MagnitudeMeasure>>> {
        if self.caches.groups.is_none() {
            let measures = self.measures().await?;
            let groups = self.grouper.group(&measures);
            debug!(groups = groups.len(), "grouped measures");
            self.caches.groups = Some(groups);
        }
        Ok(self.caches.groups.clone().unwrap_or_default())
    }

    async fn selection(&mut self) -> DomainResult<(SelectedMeasures, SelectedMeasures)> {
        let (native_scale, target_scale) = self.require_scales()?;
        if self.caches.selection.is_none() {
            let groups = self.grouped_measures().await?;
            let mut native = SelectedMeasures::new();
            let mut target = SelectedMeasures::new();
            for (key, members) in &groups {
                let processed = self.uncertainty.apply(members);
                if let Some(m) = self.selector.select(&processed, &native_scale) {
                    native.insert(key.clone(), m);
                }
                if let Some(m) = self.selector.select(&processed, &target_scale) {
                    target.insert(key.clone(), m);
                }
            }
            debug!(
                native = native.len(),
                target = target.len(),
                "selected representative measures"
            );
            self.caches.selection = Some((native, target));
        }
        Ok(self.caches.selection.clone().unwrap_or_default())
    }

    /// Representative native-scale measure per group, after the uncertainty
    /// policy. Groups without an eligible measure are absent.
    pub async fn selected_native_measures(&mut self) -> DomainResult<SelectedMeasures> {
        Ok(self.selection().await?.0)
    }

    /// Representative target-scale measure per group, after the uncertainty
    /// policy. Groups without an eligible measure are absent.
    pub async fn selected_target_measures(&mut self) -> DomainResult<SelectedMeasures> {
        Ok(self.selection().await?.1)
    }

    /// Fit a regression model on the currently selected native/target pairs
    /// and append it to the model list.
    pub async fn fit_model(&mut self, form: ModelForm) -> DomainResult<&RegressionModel> {
        let (native, target) = self.selection().await?;
        let model = RegressionModel::make_from_measures(&native, &target, form)?;
        info!(
            %form,
            samples = model.sample_size(),
            domain = ?model.domain(),
            residual_variance = model.residual_variance(),
            "fitted regression model"
        );
        self.models.push(model);
        Ok(self.models.last().expect("model just pushed"))
    }

    /// Append an externally fitted model.
    pub fn add_model(&mut self, model: RegressionModel) {
        self.models.push(model);
    }

    /// Clear the model list. Previously produced homogenised sets are
    /// unaffected; future conversions see no models.
    pub fn reset_models(&mut self) {
        self.models.clear();
    }

    pub fn models(&self) -> &[RegressionModel] {
        &self.models
    }

    /// First model whose domain contains `value`, in insertion order.
    fn model_for(&self, value: f64) -> Option<(usize, &RegressionModel)> {
        self.models
            .iter()
            .enumerate()
            .find(|(_, m)| m.domain_contains(value))
    }

    /// The homogenised measurement set: every filtered measure on the
    /// target scale passes through as measured; every native-scale measure
    /// is converted by the first model whose domain contains its value, or
    /// reported unconverted with its original value when none matches.
    /// Measures on other scales are not part of the homogenised set.
    pub async fn homogenised_measures(&mut self) -> DomainResult<Vec<HomogenisedRecord>> {
        let (native_scale, target_scale) = self.require_scales()?;
        let measures = self.measures().await?;

        let mut records = Vec::new();
        let mut unconverted = 0usize;
        for measure in &measures {
            if measure.scale == target_scale {
                records.push(HomogenisedRecord {
                    event_key: measure.event_key.clone(),
                    agency: measure.agency.clone(),
                    native_scale: measure.scale.clone(),
                    native_value: measure.value,
                    native_standard_error: measure.standard_error,
                    target_value: measure.value,
                    target_standard_error: measure.standard_error,
                    provenance: Provenance::Measured,
                });
            } else if measure.scale == native_scale {
                match self.model_for(measure.value) {
                    Some((index, model)) => {
                        let converted =
                            model.convert(measure, &target_scale, index, self.default_uncertainty);
                        records.push(HomogenisedRecord {
                            event_key: measure.event_key.clone(),
                            agency: measure.agency.clone(),
                            native_scale: measure.scale.clone(),
                            native_value: measure.value,
                            native_standard_error: measure.standard_error,
                            target_value: converted.value,
                            target_standard_error: Some(converted.standard_error),
                            provenance: Provenance::Converted(index),
                        });
                    }
                    None => {
                        unconverted += 1;
                        records.push(HomogenisedRecord {
                            event_key: measure.event_key.clone(),
                            agency: measure.agency.clone(),
                            native_scale: measure.scale.clone(),
                            native_value: measure.value,
                            native_standard_error: measure.standard_error,
                            target_value: measure.value,
                            target_standard_error: measure.standard_error,
                            provenance: Provenance::Unconverted,
                        });
                    }
                }
            }
        }
        if unconverted > 0 {
            warn!(unconverted, "native measures had no model domain match");
        }
        Ok(records)
    }

    /// Write the homogenised measurement set as CSV to `destination`.
    pub async fn serialize(&mut self, destination: &mut dyn Write) -> DomainResult<()> {
        let records = self.homogenised_measures().await?;
        info!(rows = records.len(), "serializing homogenised measures");
        export::write_csv(&records, destination)
    }

    /// Hand the selected pairs and active models to the plotting
    /// collaborator. Rendering failure is logged and never fails the
    /// pipeline.
    pub async fn plot(
        &mut self,
        plotter: &dyn MeasurePlotter,
        destination: &Path,
    ) -> DomainResult<()> {
        let (native, target) = self.selection().await?;

        // Align pairs on groups present on both sides.
        let mut native_pairs = Vec::new();
        let mut target_pairs = Vec::new();
        for (key, n) in &native {
            if let Some(t) = target.get(key) {
                native_pairs.push(n.clone());
                target_pairs.push(t.clone());
            }
        }

        if let Err(err) = plotter.plot(&native_pairs, &target_pairs, &self.models, destination) {
            warn!(%err, "plotting collaborator failed; pipeline state unaffected");
        }
        Ok(())
    }
}
