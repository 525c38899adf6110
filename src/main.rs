use anyhow::Result;
use clap::Parser;
use places_search::commands::{execute, Cli};
use places_search::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let state = AppState::initialize(AppConfig::from_env())?;
    let output = execute(&state, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
