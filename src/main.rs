use clap::Parser;
use scalp_hub::cli::{Cli, Commands};
use scalp_hub::config::{Config, ConfigError};

const DEFAULT_CONFIG: &str = include_str!("../config.toml.example");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; a missing file falls back to the bundled example
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::from_toml_str(DEFAULT_CONFIG)?
        }
        Err(e) => return Err(e.into()),
    };

    // Only the server exports metrics
    let mut telemetry = config.telemetry.clone();
    if !matches!(cli.command, Commands::Serve(_)) {
        telemetry.metrics_port = None;
    }
    scalp_hub::telemetry::init_telemetry(&telemetry)?;

    match cli.command {
        Commands::Serve(args) => {
            tracing::info!(bind = %config.server.bind, "Starting scalp-hub server");
            args.execute(config).await?;
        }
        Commands::Watch(args) => {
            args.execute().await?;
        }
        Commands::Status(args) => {
            args.execute().await?;
        }
        Commands::Config => {
            println!("Current configuration ({}):", cli.config);
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
