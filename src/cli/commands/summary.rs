//! Implementation of the `magcat summary` command.

use anyhow::{Context, Result};
use comfy_table::{presets, Cell, ContentArrangement, Table};
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteMeasureRepository};
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::SummaryArgs;
use crate::domain::models::CatalogueSummary;
use crate::domain::ports::MeasureRepository;
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, serde::Serialize)]
pub struct SummaryOutput {
    pub summary: CatalogueSummary,
}

impl CommandOutput for SummaryOutput {
    fn to_human(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![Cell::new("Field"), Cell::new("Value")]);
        table.add_row(vec![
            Cell::new("Measures"),
            Cell::new(self.summary.measure_count.to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Agencies"),
            Cell::new(join(&self.summary.agencies)),
        ]);
        table.add_row(vec![
            Cell::new("Scales"),
            Cell::new(join(&self.summary.scales)),
        ]);
        let range = match &self.summary.date_range {
            Some((start, end)) => format!("{} .. {}", start.to_rfc3339(), end.to_rfc3339()),
            None => "(empty catalogue)".to_string(),
        };
        table.add_row(vec![Cell::new("Date range"), Cell::new(range)]);
        table.to_string()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn join(values: &std::collections::BTreeSet<String>) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

pub async fn execute(_args: SummaryArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let pool = initialize_database(&format!("sqlite:{}", config.database.path))
        .await
        .context("Failed to open catalogue database")?;
    let repo = Arc::new(SqliteMeasureRepository::new(pool));

    let summary = repo.summary().await.context("Failed to summarize catalogue")?;
    output(&SummaryOutput { summary }, json_mode);
    Ok(())
}
