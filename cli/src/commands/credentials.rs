// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Credential pool commands
//!
//! Commands: list, rotate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hivemind_core::domain::config::SwarmConfigManifest;
use hivemind_core::domain::credential::CredentialId;

use crate::embedded::EmbeddedOrchestrator;

#[derive(Subcommand)]
pub enum CredentialsCommand {
    /// Show pool usage (secrets are never printed)
    List,

    /// Issue a fresh secret for one credential
    Rotate {
        /// Credential ID
        #[arg(value_name = "ID")]
        id: String,
    },
}

pub async fn handle_command(
    command: CredentialsCommand,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = SwarmConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    let orchestrator = EmbeddedOrchestrator::new(&config).await?;

    let outcome = match command {
        CredentialsCommand::List => {
            list(&orchestrator);
            Ok(())
        }
        CredentialsCommand::Rotate { id } => rotate(&orchestrator, id).await,
    };
    orchestrator.shutdown().await;
    outcome
}

fn list(orchestrator: &EmbeddedOrchestrator) {
    let pool = orchestrator.credentials().pool_snapshot();
    if pool.is_empty() {
        println!("{}", "No credentials configured.".yellow());
        return;
    }
    println!("{}", format!("{:<24} {:>8} {:>8}  LAST ROTATED", "ID", "USAGE", "LIMIT").bold());
    for entry in pool {
        println!(
            "{:<24} {:>8} {:>8}  {}",
            entry.id.as_str(),
            entry.usage,
            entry.rate_limit,
            entry.last_rotated.to_rfc3339()
        );
    }
}

async fn rotate(orchestrator: &EmbeddedOrchestrator, id: String) -> Result<()> {
    let snapshot = orchestrator
        .credentials()
        .rotate(&CredentialId::new(id))
        .await
        .context("Rotation failed")?;
    println!(
        "{}",
        format!(
            "✓ Rotated {} at {}",
            snapshot.id,
            snapshot.last_rotated.to_rfc3339()
        )
        .green()
    );
    Ok(())
}
