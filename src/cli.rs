use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, instrument, warn};

use crate::config::SystemConfig;
use crate::keys::{KeyLoader, KeySet, KeyStore, LoadOutcome, LoaderLimits};
use crate::reload::{self, ReloadConfig};
use crate::types::{Error, Result};

#[derive(Parser)]
#[command(name = "authkeys")]
#[command(about = "Symmetric authentication key-file loader")]
#[command(long_about = "
Reads an NTP-style symmetric key file, validates every entry and installs
the keys only when the whole file is well formed.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// System configuration file path
    #[arg(short, long, default_value = "/etc/authkeys/config.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Load a key file and report what it contains
    Check(CheckArgs),
    /// Load the configured key file and keep it fresh (default if no subcommand given)
    Serve(ServeArgs),
    /// Validate the configuration file
    Validate,
    /// Show detailed version and build information
    Version,
}

#[derive(Args, Clone)]
pub struct CheckArgs {
    /// Key file to check
    pub file: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the Prometheus metrics recorded by this run after the report
    #[arg(long)]
    pub metrics: bool,
}

#[derive(Args, Clone, Default)]
pub struct ServeArgs {
    /// Override the configured key file
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Set log format
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Get effective log level considering verbose/quiet flags
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            self.log_level.clone().unwrap_or(LogLevel::Info)
        }
    }

    /// Convert LogLevel enum to string for logging module
    pub fn log_level_to_str(&self) -> &'static str {
        match self.effective_log_level() {
            LogLevel::Trace => crate::logging::level::TRACE,
            LogLevel::Debug => crate::logging::level::DEBUG,
            LogLevel::Info => crate::logging::level::INFO,
            LogLevel::Warn => crate::logging::level::WARN,
            LogLevel::Error => crate::logging::level::ERROR,
        }
    }

    /// Get log format override from CLI arguments
    pub fn log_format_override(&self) -> Option<&'static str> {
        match &self.command {
            Some(Commands::Serve(args)) => args.log_format.as_ref().map(|fmt| match fmt {
                LogFormat::Json => crate::logging::format::JSON,
                LogFormat::Pretty => crate::logging::format::PRETTY,
            }),
            _ => None,
        }
    }
}

/// Summary of one key, without secret material
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct KeySummary {
    pub key_id: u32,
    pub algorithm: String,
    pub secret_len: usize,
    pub access_list: Vec<String>,
}

/// Result of `check`
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub file: String,
    pub committed: bool,
    pub accepted: usize,
    pub rejected: u32,
    pub lines_scanned: usize,
    pub abort_reason: Option<String>,
    pub keys: Vec<KeySummary>,
}

impl CheckReport {
    pub fn new(file: String, outcome: &LoadOutcome, keys: &KeySet) -> Self {
        Self {
            file,
            committed: outcome.committed,
            accepted: outcome.accepted_count,
            rejected: outcome.rejected_count,
            lines_scanned: outcome.lines_scanned,
            abort_reason: outcome.abort_reason.as_ref().map(ToString::to_string),
            keys: keys
                .iter()
                .map(|record| KeySummary {
                    key_id: record.key_id(),
                    algorithm: record.algorithm().to_string(),
                    secret_len: record.secret().len(),
                    access_list: record.access_list().iter().map(ToString::to_string).collect(),
                })
                .collect(),
        }
    }

    fn print_text(&self) {
        println!("Key file: {}", self.file);
        println!("Lines scanned: {}", self.lines_scanned);
        match &self.abort_reason {
            None => println!("Status: accepted ({} keys)", self.keys.len()),
            Some(reason) => println!("Status: rejected ({})", reason),
        }
        for key in &self.keys {
            let access = if key.access_list.is_empty() {
                "any".to_string()
            } else {
                key.access_list.join(",")
            };
            println!(
                "  {:>5}  {:<7} {:>2} bytes  {}",
                key.key_id, key.algorithm, key.secret_len, access
            );
        }
    }
}

/// Load a key file into a private store and print a summary
#[instrument(skip(system_config, args), fields(file = %args.file.display()))]
pub async fn check_key_file(args: CheckArgs, system_config: Option<SystemConfig>) -> Result<()> {
    let limits = system_config
        .as_ref()
        .map(|config| LoaderLimits::from(&config.limits))
        .unwrap_or_default();

    let file = args.file.display().to_string();
    let key_file = args.file.clone();
    let report_name = file.clone();
    let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

    let (outcome, report) = tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            let store = KeyStore::new();
            let outcome = KeyLoader::with_limits(&store, limits).load(&key_file);
            let report = CheckReport::new(report_name, &outcome, &store.snapshot());
            (outcome, report)
        })
    })
    .await
    .map_err(|e| Error::Application(format!("Key file check failed: {}", e)))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::Application(format!("Failed to encode report: {}", e)))?;
        println!("{}", json);
    } else {
        report.print_text();
    }

    if args.metrics {
        println!();
        print!("{}", render_metrics()?);
    }

    match outcome.abort_reason {
        None => Ok(()),
        Some(reason) => Err(Error::KeysRejected {
            path: file,
            reason: reason.to_string(),
        }),
    }
}

/// Prometheus text for every registered metric
pub fn render_metrics() -> Result<String> {
    crate::metrics::init_metrics();
    crate::metrics::gather_metrics().map_err(Error::Application)
}

/// Load the configured key file and reload it on SIGHUP or when it changes
#[instrument(skip(cli, args, system_config))]
pub async fn serve(cli: Cli, args: ServeArgs, system_config: Option<SystemConfig>) -> Result<()> {
    let mut system_config = match system_config {
        Some(config) => config,
        None => {
            info!("Loading system configuration...");
            SystemConfig::load_from_file(&cli.config)?
        }
    };
    if let Some(key_file) = args.key_file {
        system_config.keys.file = key_file;
    }
    system_config.validate().await?;

    let store = KeyStore::global();
    let reload_config = ReloadConfig::from(&system_config);

    info!(
        key_file = %reload_config.key_file.display(),
        config_path = %cli.config.display(),
        "Loading keys"
    );
    if let Some(outcome) = reload::reload(store, &reload_config, "startup").await {
        if !outcome.committed {
            warn!("Starting without keys until the key file is fixed");
        }
    }

    let mut handles = vec![reload::spawn_signal_task(store, reload_config.clone())?];
    handles.extend(reload::spawn_poll_task(store, reload_config));

    setup_shutdown_signal().await;

    for handle in handles {
        handle.abort();
    }
    info!("Shutting down");
    Ok(())
}

/// Validate the configuration file
#[instrument(skip(cli, system_config))]
pub async fn validate_config(cli: Cli, system_config: Option<SystemConfig>) -> Result<()> {
    info!("Validating configuration file...");

    let config = match system_config {
        Some(config) => config,
        None => SystemConfig::load_from_file(&cli.config)?,
    };

    match config.validate().await {
        Ok(()) => info!(
            config_path = %cli.config.display(),
            key_file = %config.keys.file.display(),
            "System configuration is valid"
        ),
        Err(e) => {
            error!(
                config_path = %cli.config.display(),
                error = %e,
                "System configuration validation failed"
            );
            return Err(e);
        }
    }

    Ok(())
}

/// Show version and build information
#[instrument]
pub async fn show_version() -> Result<()> {
    println!("authkeys {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();

    println!("Build Information:");
    println!(
        "  Build Profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
    println!(
        "  Digest Registry: {}",
        if cfg!(feature = "digest-registry") {
            "enabled"
        } else {
            "disabled (MD5 only)"
        }
    );
    println!();

    println!("Runtime Information:");
    println!("  Architecture: {}", std::env::consts::ARCH);

    Ok(())
}

/// Set up graceful shutdown signal handling
pub async fn setup_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
