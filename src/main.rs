//! Magcat CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use magcat::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => magcat::cli::commands::init::execute(args, cli.json).await,
        Commands::Import(args) => magcat::cli::commands::import::execute(args, cli.json).await,
        Commands::Summary(args) => magcat::cli::commands::summary::execute(args, cli.json).await,
        Commands::Homogenise(args) => {
            magcat::cli::commands::homogenise::execute(args, cli.json).await
        }
    };

    if let Err(err) = result {
        magcat::cli::handle_error(err, cli.json);
    }
}
