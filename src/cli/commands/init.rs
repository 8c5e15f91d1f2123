//! Implementation of the `magcat init` command.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::cli::types::InitArgs;
use crate::domain::models::Config;

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.success {
            lines.push(format!("\nConfiguration written to {}", self.config_path.display()));
            lines.push(format!("Catalogue database at {}", self.database_path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let magcat_dir = PathBuf::from(".magcat");
    let config_path = magcat_dir.join("config.yaml");

    if magcat_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Catalogue already initialized. Use --force to reinitialize.".to_string(),
            config_path,
            database_path: PathBuf::from(Config::default().database.path),
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if args.force && magcat_dir.exists() {
        fs::remove_dir_all(&magcat_dir)
            .await
            .context("Failed to remove existing .magcat directory")?;
    }

    fs::create_dir_all(&magcat_dir)
        .await
        .context("Failed to create .magcat directory")?;

    let config = Config::default();
    let content = serde_yaml::to_string(&config).context("Failed to render default config")?;
    fs::write(&config_path, content)
        .await
        .with_context(|| format!("Failed to write {:?}", config_path))?;

    let db_url = format!("sqlite:{}", config.database.path);
    initialize_database(&db_url)
        .await
        .context("Failed to initialize catalogue database")?;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Catalogue reinitialized successfully.".to_string()
        } else {
            "Catalogue initialized successfully.".to_string()
        },
        config_path,
        database_path: PathBuf::from(config.database.path),
    };

    output(&output_data, json_mode);
    Ok(())
}
