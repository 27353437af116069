// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hivemind_core::domain::config::{CredentialEntry, SwarmConfigManifest, SwarmDefinition};
use hivemind_core::domain::mode::Mode;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./hivemind-config.yaml)
        #[arg(short, long, default_value = "./hivemind-config.yaml")]
        output: PathBuf,

        /// Include a sample credential pool and swarm
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = SwarmConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. HIVEMIND_CONFIG_PATH: {}",
            std::env::var("HIVEMIND_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./hivemind-config.yaml");
        println!("  4. ~/.hivemind/config.yaml");
        println!("  5. /etc/hivemind/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Scheduler:".bold());
    println!("  Queue capacity: {}", spec.scheduler.queue_capacity);
    println!(
        "  Requeue: every {}ms, at most {} times",
        spec.scheduler.requeue_delay_ms, spec.scheduler.max_requeue_attempts
    );
    println!("  Task timeout: {}s", spec.scheduler.task_timeout_secs);
    println!();

    println!("{}", "Concurrency:".bold());
    println!("  Max parallel steps: {}", spec.concurrency.max_parallel_steps);
    println!(
        "  Scale-up: x{} when the last {} rewards average above {}",
        spec.concurrency.scale_up_multiplier,
        spec.concurrency.recent_window,
        spec.concurrency.high_confidence_threshold
    );
    println!();

    println!("{}", "Credentials:".bold());
    println!("  Vault: {} (transit key '{}')", spec.vault.address, spec.credentials.namespace);
    println!("  Window: {}s", spec.credentials.usage_window_secs);
    for entry in &spec.credentials.pool {
        println!("    - {} (limit {})", entry.id.bold(), entry.rate_limit);
    }
    println!();

    println!("{}", "Completion:".bold());
    println!("  Endpoint: {}", spec.completion.endpoint);
    println!("  Model: {}", spec.completion.model);
    println!();

    println!("{}", "Swarms:".bold());
    if spec.swarms.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for swarm in &spec.swarms {
        println!("  {} → {} agents, {}", swarm.name.bold(), swarm.agents, swarm.mode);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SwarmConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Manifest written by `config generate`.
pub fn sample_config(with_examples: bool) -> SwarmConfigManifest {
    let mut config = SwarmConfigManifest::default();
    if with_examples {
        config.spec.credentials.pool = vec![CredentialEntry {
            id: "primary".to_string(),
            ciphertext: "vault:v1:REPLACE_WITH_TRANSIT_CIPHERTEXT".to_string(),
            rate_limit: 60,
        }];
        config.spec.swarms = vec![
            SwarmDefinition {
                name: "default".to_string(),
                agents: 4,
                mode: Mode::Instant,
            },
            SwarmDefinition {
                name: "research".to_string(),
                agents: 16,
                mode: Mode::AgentSwarm,
            },
        ];
    }
    config
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    sample_config(with_examples)
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
