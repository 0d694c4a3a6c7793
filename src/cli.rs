//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::{Platform, StatusFilter};

/// campaign-aggregator - ad campaign listings across platforms
///
/// Lists campaigns from every configured Meta, Snapchat and NewsBreak
/// ad account and serves them as one JSON document per platform.
///
/// Examples:
///   campaign-aggregator serve --bind 0.0.0.0:8080
///   campaign-aggregator fetch --platform meta
///   campaign-aggregator fetch --platform snapchat --status all --format markdown
///   campaign-aggregator init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for campaign-aggregator.toml in the current directory
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "CAMPAIGN_AGGREGATOR_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Upstream request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API (default when no command is given)
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8080
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Aggregate one platform and print or save the result
    ///
    /// Exit code 2 when any account failed.
    Fetch {
        /// Platform id: meta, snapchat or newsbreak
        #[arg(short, long)]
        platform: String,

        /// Pass `all` to include every status, not just active and paused
        #[arg(short, long)]
        status: Option<String>,

        /// Output format (json, markdown)
        #[arg(short, long, default_value = "json", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate a default campaign-aggregator.toml
    InitConfig,
}

/// Output format for the fetch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Some(Command::Fetch {
                platform, status, ..
            }) => {
                platform
                    .parse::<Platform>()
                    .map_err(|e| e.to_string())?;
                if let Some(status) = status {
                    if !StatusFilter::from_query(Some(status)).includes_all() {
                        return Err(format!(
                            "Unknown status '{}'. Omit --status or pass 'all'",
                            status
                        ));
                    }
                }
            }
            Some(Command::Serve { bind: Some(bind) }) => {
                if bind.parse::<std::net::SocketAddr>().is_err() {
                    return Err(format!("Invalid bind address: {}", bind));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn make_args() -> Args {
        Args {
            command: Some(Command::Fetch {
                platform: "meta".to_string(),
                status: None,
                format: OutputFormat::Json,
                output: None,
            }),
            config: None,
            verbose: false,
            quiet: false,
            timeout: None,
        }
    }

    #[test]
    fn test_parse_fetch() {
        let args = Args::try_parse_from([
            "campaign-aggregator",
            "fetch",
            "--platform",
            "snap",
            "--status",
            "all",
            "--format",
            "markdown",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(args.timeout, Some(5));
        match args.command {
            Some(Command::Fetch {
                platform,
                status,
                format,
                output,
            }) => {
                assert_eq!(platform, "snap");
                assert_eq!(status.as_deref(), Some("all"));
                assert_eq!(format, OutputFormat::Markdown);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_command_is_allowed() {
        let args = Args::try_parse_from(["campaign-aggregator"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_unknown_platform() {
        let mut args = make_args();
        args.command = Some(Command::Fetch {
            platform: "tiktok".to_string(),
            status: None,
            format: OutputFormat::Json,
            output: None,
        });
        let err = args.validate().unwrap_err();
        assert!(err.contains("Unsupported platform: tiktok"));
    }

    #[test]
    fn test_validation_unknown_status() {
        let mut args = make_args();
        args.command = Some(Command::Fetch {
            platform: "meta".to_string(),
            status: Some("archived".to_string()),
            format: OutputFormat::Json,
            output: None,
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_bind() {
        let mut args = make_args();
        args.command = Some(Command::Serve {
            bind: Some("localhost".to_string()),
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_merge_into_config() {
        let mut args = make_args();
        args.timeout = Some(7);
        args.command = Some(Command::Serve {
            bind: Some("0.0.0.0:9999".to_string()),
        });

        let mut config = Config::default();
        config.merge_with_args(&args);
        assert_eq!(config.http.timeout_seconds, 7);
        assert_eq!(config.server.bind, "0.0.0.0:9999");
    }
}
