//! Implementation of the `magcat homogenise` command.
//!
//! Wires the configured pipeline together: criteria from flags, one
//! grouper, one selector, one uncertainty policy, one fitted model,
//! then a CSV export of the homogenised records.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteMeasureRepository};
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::{
    FormChoice, GrouperChoice, HomogeniseArgs, PolicyChoice, SelectorChoice,
};
use crate::domain::models::{
    Criteria, DistanceMetric, Grouper, MeasureSelector, MissingUncertaintyPolicy, ModelForm,
    Provenance,
};
use crate::domain::ports::MeasureRepository;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{export, Homogeniser};

#[derive(Debug, serde::Serialize)]
pub struct ModelSummary {
    pub form: String,
    pub coefficients: Vec<f64>,
    pub sample_size: usize,
    pub residual_variance: f64,
    pub akaike: Option<f64>,
    pub akaike_corrected: Option<f64>,
}

#[derive(Debug, serde::Serialize)]
pub struct HomogeniseOutput {
    pub success: bool,
    pub native_scale: String,
    pub target_scale: String,
    pub output: String,
    pub records: usize,
    pub measured: usize,
    pub converted: usize,
    pub unconverted: usize,
    pub model: ModelSummary,
}

impl CommandOutput for HomogeniseOutput {
    fn to_human(&self) -> String {
        let coeffs = self
            .model
            .coefficients
            .iter()
            .map(|c| format!("{c:.4}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut lines = vec![
            format!(
                "Homogenised {} record(s) from {} to {}: {} measured, {} converted, {} unconverted",
                self.records,
                self.native_scale,
                self.target_scale,
                self.measured,
                self.converted,
                self.unconverted,
            ),
            format!(
                "Model ({}, {} pair(s)): coefficients [{}], residual variance {:.6}",
                self.model.form, self.model.sample_size, coeffs, self.model.residual_variance,
            ),
        ];
        if let Some(aic) = self.model.akaike {
            let aicc = self
                .model
                .akaike_corrected
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
            lines.push(format!("AIC {aic:.4}, AICc {aicc}"));
        }
        lines.push(format!("Written to {}", self.output));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("Invalid RFC 3339 instant: {value}"))
}

pub async fn execute(args: HomogeniseArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let pool = initialize_database(&format!("sqlite:{}", config.database.path))
        .await
        .context("Failed to open catalogue database")?;
    let repo: Arc<dyn MeasureRepository> = Arc::new(SqliteMeasureRepository::new(pool));

    let native = args
        .native
        .unwrap_or_else(|| config.pipeline.native_scale.clone());
    let target = args
        .target
        .unwrap_or_else(|| config.pipeline.target_scale.clone());
    if native == target {
        bail!("Native and target scales must differ, both are '{native}'");
    }

    let mut homogeniser = Homogeniser::new(repo);
    homogeniser.set_scales(&native, &target);

    if !args.agencies.is_empty() {
        homogeniser.add_criteria(Criteria::with_agencies(args.agencies.clone()));
    }
    if let Some(after) = &args.after {
        homogeniser.add_criteria(Criteria::after(parse_instant(after)?));
    }
    if let Some(before) = &args.before {
        homogeniser.add_criteria(Criteria::before(parse_instant(before)?));
    }

    match args.grouper {
        GrouperChoice::EventKey => homogeniser.set_grouper(Grouper::ByEventSourceKey),
        GrouperChoice::Clustering => {
            homogeniser.set_grouper(Grouper::HierarchicalClustering {
                threshold: args
                    .threshold
                    .unwrap_or(config.pipeline.clustering_threshold),
                metric: DistanceMetric::OriginTimeSeconds,
            });
        }
    }

    match args.selector {
        SelectorChoice::Precise => homogeniser.set_selector(MeasureSelector::Precise),
        SelectorChoice::Random => {
            homogeniser.set_selector(MeasureSelector::Random { seed: args.seed });
        }
        SelectorChoice::Ranking => {
            if args.ranking.is_empty() {
                bail!("The ranking selector requires --ranking with at least one agency");
            }
            homogeniser.set_selector(MeasureSelector::AgencyRanking {
                ranking: args.ranking.clone(),
            });
        }
    }

    match args.policy {
        PolicyChoice::Discard => {
            homogeniser.set_missing_uncertainty_strategy(MissingUncertaintyPolicy::Discard);
        }
        PolicyChoice::EventMax => {
            homogeniser
                .set_missing_uncertainty_strategy(MissingUncertaintyPolicy::SetEventMaximum);
        }
        PolicyChoice::Default => {
            homogeniser.set_missing_uncertainty_strategy(MissingUncertaintyPolicy::SetDefault {
                value: args.default_uncertainty,
            });
        }
    }
    homogeniser.set_default_uncertainty(args.default_uncertainty);

    let form = match args.form {
        FormChoice::Linear => ModelForm::Linear,
        FormChoice::Polynomial => {
            if args.order < 1 {
                bail!("Polynomial order must be at least 1");
            }
            ModelForm::Polynomial { order: args.order }
        }
    };

    let model = homogeniser
        .fit_model(form)
        .await
        .context("Regression fit failed")?;
    let model_summary = ModelSummary {
        form: model.form().to_string(),
        coefficients: model.coefficients().to_vec(),
        sample_size: model.sample_size(),
        residual_variance: model.residual_variance(),
        akaike: model.akaike(),
        akaike_corrected: model.akaike_corrected(),
    };

    let records = homogeniser
        .homogenised_measures()
        .await
        .context("Homogenisation failed")?;
    let mut measured = 0usize;
    let mut converted = 0usize;
    let mut unconverted = 0usize;
    for record in &records {
        match record.provenance {
            Provenance::Measured => measured += 1,
            Provenance::Converted(_) => converted += 1,
            Provenance::Unconverted => unconverted += 1,
        }
    }

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {:?}", args.output))?;
    let mut writer = BufWriter::new(file);
    export::write_csv(&records, &mut writer).context("Failed to write CSV export")?;
    writer.flush().context("Failed to flush CSV export")?;

    let output_data = HomogeniseOutput {
        success: true,
        native_scale: native,
        target_scale: target,
        output: args.output.display().to_string(),
        records: records.len(),
        measured,
        converted,
        unconverted,
        model: model_summary,
    };
    output(&output_data, json_mode);
    Ok(())
}
