use clap::Parser;
use tracing::info;

use authkeys::cli::{self, Cli, Commands, ServeArgs};
use authkeys::config::SystemConfig;
use authkeys::types::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is optional for everything but serve; it only shapes logging
    // and loader limits here
    let system_config = match &cli.command {
        Some(Commands::Version) => None,
        _ => SystemConfig::load_from_file(&cli.config).ok(),
    };

    let log_level_override = if cli.log_level.is_some() || cli.verbose || cli.quiet {
        Some(cli.log_level_to_str())
    } else {
        None
    };

    authkeys::logging::init(
        log_level_override,
        cli.log_format_override(),
        system_config.as_ref(),
    )?;

    if system_config
        .as_ref()
        .map_or(true, |config| config.monitoring.metrics_enabled)
    {
        authkeys::metrics::init_metrics();
    }

    info!("Starting authkeys");

    match cli.command.clone().unwrap_or_else(|| Commands::Serve(ServeArgs::default())) {
        Commands::Check(args) => cli::check_key_file(args, system_config).await,
        Commands::Serve(args) => cli::serve(cli, args, system_config).await,
        Commands::Validate => cli::validate_config(cli, system_config).await,
        Commands::Version => cli::show_version().await,
    }
}
