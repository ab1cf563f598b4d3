use anyhow::Result;
use clap::Parser;
use stowage_cli::{init_tracing, run, Cli};
use stowage_core::Config;
use stowage_storage::create_storage_router;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env()?;
    config.validate()?;

    let router = create_storage_router(&config).await?;
    let outcome = run(cli.command, &router).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}
