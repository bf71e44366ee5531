mod commands;
mod config;
mod registry;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::PgbenConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// PGBEN benefit grant lifecycle service.
#[derive(Parser)]
#[command(name = "pgben", version, about = "PGBEN benefit grant lifecycle service")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive).
    /// RUST_LOG takes precedence when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP JSON API
    Serve {
        /// Path to a pgben.toml configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// List the active reasons for an operation
    Reasons {
        /// bloqueio, desbloqueio, suspensao, reativacao or cancelamento
        operation: String,
        /// Use the reason catalog from this configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the grant status transition table
    Transitions,

    /// Validate a pgben.toml configuration file
    CheckConfig {
        /// Path to the configuration file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Serve {
            config,
            port,
            tls_cert,
            tls_key,
        } => {
            if tls_cert.is_some() != tls_key.is_some() {
                report_error(
                    "--tls-cert and --tls-key must both be provided",
                    cli.output,
                    cli.quiet,
                );
                process::exit(1);
            }
            let mut settings = match config {
                Some(path) => match PgbenConfig::load(&path) {
                    Ok(c) => c,
                    Err(e) => {
                        report_error(&e.to_string(), cli.output, cli.quiet);
                        process::exit(1);
                    }
                },
                None => PgbenConfig::default(),
            };
            settings.apply_env_overrides();
            if let Some(port) = port {
                settings.server.port = port;
            }

            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(
                        &format!("failed to create tokio runtime: {e}"),
                        cli.output,
                        cli.quiet,
                    );
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(settings, tls_cert, tls_key)) {
                report_error(&format!("server error: {e}"), cli.output, cli.quiet);
                process::exit(1);
            }
        }
        Commands::Reasons { operation, config } => {
            commands::cmd_reasons(&operation, config.as_deref(), cli.output, cli.quiet);
        }
        Commands::Transitions => {
            commands::cmd_transitions(cli.output);
        }
        Commands::CheckConfig { file } => {
            commands::cmd_check_config(&file, cli.output, cli.quiet);
        }
    }
}

/// Report an error to stderr as text or JSON, unless `quiet`.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {msg}"),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
