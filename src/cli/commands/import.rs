//! Implementation of the `magcat import` command.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crate::adapters::import::{IaspeiImporter, ImportSummary, IsfImporter};
use crate::adapters::sqlite::{initialize_database, SqliteMeasureRepository};
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ImportArgs;
use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, serde::Serialize)]
pub struct ImportOutput {
    pub success: bool,
    pub file: String,
    pub summary: ImportSummary,
}

impl CommandOutput for ImportOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Imported {} measure(s) from {} event(s) and {} agenc(ies) out of {}",
            self.summary.measures, self.summary.events, self.summary.agencies, self.file,
        )];
        if !self.summary.errors.is_empty() {
            lines.push(format!("\nSkipped {} line(s):", self.summary.errors.len()));
            for err in &self.summary.errors {
                lines.push(format!("  - {err}"));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ImportArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let pool = initialize_database(&format!("sqlite:{}", config.database.path))
        .await
        .context("Failed to open catalogue database")?;
    let repo = Arc::new(SqliteMeasureRepository::new(pool));

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {:?}", args.file))?;
    let reader = BufReader::new(file);
    let summary = match args.format.as_str() {
        "iaspei" => {
            IaspeiImporter::new(!args.no_header)
                .import(reader, repo.as_ref())
                .await
        }
        "isf" => IsfImporter::new().import(reader, repo.as_ref()).await,
        other => bail!("Unsupported bulletin format: {other}"),
    }
    .context("Import failed")?;

    let output_data = ImportOutput {
        success: true,
        file: args.file.display().to_string(),
        summary,
    };
    output(&output_data, json_mode);
    Ok(())
}
