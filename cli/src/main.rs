// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # hivemind CLI
//!
//! The `hivemind` binary hosts an embedded swarm orchestrator.
//!
//! ## Commands
//!
//! - `hivemind run <PROMPT>` - Execute a task on a swarm
//! - `hivemind mode list|select` - Inspect execution modes
//! - `hivemind credentials list|rotate` - Credential pool operations
//! - `hivemind config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use hivemind::commands::{self, ConfigCommand, CredentialsCommand, ModeCommand, RunCommand};
use hivemind_core::domain::config::SwarmConfigManifest;

/// hivemind - Adaptive swarm orchestration
#[derive(Parser)]
#[command(name = "hivemind")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "HIVEMIND_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "HIVEMIND_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a task on a swarm
    #[command(name = "run")]
    Run(RunCommand),

    /// Inspect execution modes
    #[command(name = "mode")]
    Mode {
        #[command(subcommand)]
        command: ModeCommand,
    },

    /// Credential pool operations
    #[command(name = "credentials")]
    Credentials {
        #[command(subcommand)]
        command: CredentialsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging and metrics follow the manifest; a broken manifest still gets defaults here
    // so that `config validate` can report it.
    let observability = SwarmConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.spec.observability)
        .unwrap_or_default();
    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&observability.logging.level);
    init_logging(level, &observability.logging.format)?;

    if observability.metrics.enabled {
        init_metrics(observability.metrics.port)?;
    }

    match cli.command {
        Some(Commands::Run(command)) => commands::run::execute(command, cli.config).await,
        Some(Commands::Mode { command }) => commands::mode::handle_command(command).await,
        Some(Commands::Credentials { command }) => {
            commands::credentials::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// Install the Prometheus scrape endpoint
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}
