use clap::Parser;
use synthmon::config::ResolvedRunConfig;
use synthmon::{cli, commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("synthmon=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Init { url, force } => {
            commands::init(&url, force)?;
        }
        cli::Command::Check => {
            commands::check()?;
        }
        cli::Command::Run {
            filter,
            timings,
            insights,
            overrides,
        } => {
            let config = ResolvedRunConfig::new(overrides)?;
            let code = commands::run(config, filter.as_deref(), timings, insights).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}
