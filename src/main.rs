//! campaign-aggregator - multi-platform ad campaign aggregation
//!
//! Lists campaigns from every configured Meta, Snapchat and NewsBreak ad
//! account, either behind an HTTP API or as a one-shot CLI fetch.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, credentials, bind failure, etc.)
//!   2 - `fetch` finished but at least one account failed

mod aggregator;
mod cli;
mod config;
mod error;
mod models;
mod platforms;
mod report;
mod server;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::StatusFilter;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::aggregator::Aggregator;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write a config file
    if let Some(Command::InitConfig) = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("campaign-aggregator v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle `init-config`: generate a default campaign-aggregator.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Add your ad accounts under [meta], [snapchat] and [newsbreak].");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let result = if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(args.log_level())
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch the subcommand. Returns the process exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Some(Command::Fetch {
            platform,
            status,
            format,
            output,
        }) => {
            let filter = StatusFilter::from_query(status.as_deref());
            run_fetch(&config, &platform, filter, format, output).await
        }
        Some(Command::Serve { .. }) | None => {
            run_server(&config).await?;
            Ok(0)
        }
        Some(Command::InitConfig) => {
            handle_init_config()?;
            Ok(0)
        }
    }
}

async fn run_server(config: &Config) -> Result<()> {
    let aggregator = Aggregator::new(config)?;

    let platforms = aggregator.configured_platforms();
    if platforms.is_empty() {
        warn!("No ad accounts configured; every platform will return an empty result");
    }
    for (platform, accounts) in &platforms {
        info!("{}: {} account(s)", platform.display_name(), accounts);
    }

    println!("🚀 Serving campaign API on http://{}", config.server.bind);
    server::serve(aggregator, &config.server).await
}

/// One-shot aggregation. Exit code 2 when any account failed.
async fn run_fetch(
    config: &Config,
    platform: &str,
    filter: StatusFilter,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<i32> {
    let start_time = Instant::now();
    let aggregator = Aggregator::new(config)?;

    let result = aggregator.aggregate(platform, filter).await?;

    let rendered = match format {
        OutputFormat::Json => report::generate_json_report(&result)?,
        OutputFormat::Markdown => report::generate_markdown_report(&result),
    };

    match output {
        Some(ref path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "✅ {} campaigns from {} accounts saved to {} ({:.1}s)",
                result.total_campaigns,
                result.accounts.len(),
                path.display(),
                start_time.elapsed().as_secs_f64()
            );
        }
        None => println!("{}", rendered),
    }

    let failed = result.failed_accounts();
    if failed > 0 {
        eprintln!("⛔ {} account(s) failed. Failing (exit code 2).", failed);
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
