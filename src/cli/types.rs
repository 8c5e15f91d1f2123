//! CLI type definitions.
//!
//! This module contains clap command structures that define the CLI
//! interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "magcat")]
#[command(about = "magcat - earthquake magnitude homogenisation toolkit", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize magcat configuration and catalogue database
    Init(InitArgs),

    /// Import a bulletin file into the catalogue
    Import(ImportArgs),

    /// Show catalogue summary: agencies, scales, date range
    Summary(SummaryArgs),

    /// Run the homogenisation pipeline and export the result
    Homogenise(HomogeniseArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Bulletin file to import
    pub file: PathBuf,

    /// Bulletin format: iaspei or isf
    #[arg(long, default_value = "iaspei")]
    pub format: String,

    /// The file has no header line
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {}

#[derive(Args, Debug)]
pub struct HomogeniseArgs {
    /// Native magnitude scale (defaults to the configured scale)
    #[arg(long)]
    pub native: Option<String>,

    /// Target magnitude scale (defaults to the configured scale)
    #[arg(long)]
    pub target: Option<String>,

    /// Restrict to these agencies (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub agencies: Vec<String>,

    /// Only measures with origin time after this instant (RFC 3339)
    #[arg(long)]
    pub after: Option<String>,

    /// Only measures with origin time before this instant (RFC 3339)
    #[arg(long)]
    pub before: Option<String>,

    /// Grouping strategy
    #[arg(long, value_enum, default_value_t = GrouperChoice::EventKey)]
    pub grouper: GrouperChoice,

    /// Clustering merge threshold in seconds (clustering grouper only;
    /// defaults to the configured threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Selection strategy
    #[arg(long, value_enum, default_value_t = SelectorChoice::Precise)]
    pub selector: SelectorChoice,

    /// Seed for the random selector
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Agency priority order for the ranking selector (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ranking: Vec<String>,

    /// Missing-uncertainty policy
    #[arg(long, value_enum, default_value_t = PolicyChoice::Discard)]
    pub policy: PolicyChoice,

    /// Fill value for the default-value policy
    #[arg(long, default_value_t = 0.2)]
    pub default_uncertainty: f64,

    /// Regression model form
    #[arg(long, value_enum, default_value_t = FormChoice::Linear)]
    pub form: FormChoice,

    /// Polynomial order (polynomial form only)
    #[arg(long, default_value_t = 2)]
    pub order: usize,

    /// Destination CSV file
    #[arg(short, long, default_value = "homogenised.csv")]
    pub output: PathBuf,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrouperChoice {
    EventKey,
    Clustering,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorChoice {
    Precise,
    Random,
    Ranking,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChoice {
    Discard,
    EventMax,
    Default,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormChoice {
    Linear,
    Polynomial,
}
