// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Execute one task on an embedded orchestrator.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use hivemind_core::domain::config::SwarmConfigManifest;
use hivemind_core::domain::identity::SwarmId;
use hivemind_core::domain::mode::Mode;
use hivemind_core::domain::task::{Subtask, TaskResult};

use crate::commands::mode::build_task;
use crate::embedded::EmbeddedOrchestrator;

#[derive(Args)]
pub struct RunCommand {
    /// Task prompt
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Target swarm
    #[arg(short, long, default_value = "default")]
    pub swarm: String,

    /// Agents to create when the swarm is not in the configuration
    #[arg(long, default_value_t = 1)]
    pub agents: usize,

    /// Switch the swarm to this mode before executing
    #[arg(short, long, conflicts_with = "auto")]
    pub mode: Option<Mode>,

    /// Let the orchestrator pick the mode from the task
    #[arg(long)]
    pub auto: bool,

    /// Task complexity in [0, 1]
    #[arg(long, default_value_t = 0.0)]
    pub complexity: f64,

    /// Task needs image understanding
    #[arg(long)]
    pub vision: bool,

    /// Tool names the task may call (repeatable)
    #[arg(long = "tool", value_name = "NAME")]
    pub tools: Vec<String>,

    /// Subtask prompt for swarm mode, in priority order (repeatable)
    #[arg(long = "subtask", value_name = "PROMPT")]
    pub subtasks: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(command: RunCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = SwarmConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let orchestrator = EmbeddedOrchestrator::new(&config).await?;
    let outcome = run_on(&orchestrator, command).await;
    orchestrator.shutdown().await;
    outcome
}

async fn run_on(orchestrator: &EmbeddedOrchestrator, command: RunCommand) -> Result<()> {
    let swarm_id = SwarmId::new(command.swarm.clone());
    if orchestrator.scheduler().swarm_profile(&swarm_id).is_none() {
        let mode = command.mode.unwrap_or_default();
        orchestrator
            .scheduler()
            .initialize_swarm(swarm_id.clone(), command.agents, mode)?;
        orchestrator.controller().register_swarm(&swarm_id, mode)?;
    }

    let mut task = build_task(
        command.prompt,
        command.complexity,
        command.vision,
        command.tools,
    );
    for (priority, prompt) in command.subtasks.into_iter().enumerate() {
        task = task.with_subtask(Subtask::new(prompt, priority as u32));
    }

    let result = if command.auto {
        orchestrator.adapter().execute_auto(&swarm_id, task).await?
    } else {
        if let Some(mode) = command.mode {
            orchestrator
                .controller()
                .switch_mode(&swarm_id, mode, "requested from cli")?;
        }
        orchestrator.adapter().execute_task(&swarm_id, task).await?
    };

    if command.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(orchestrator, &swarm_id, &result)?;
    }
    Ok(())
}

fn print_result(
    orchestrator: &EmbeddedOrchestrator,
    swarm_id: &SwarmId,
    result: &TaskResult,
) -> Result<()> {
    let mode = orchestrator.controller().get_current_mode(swarm_id);
    println!("{} {} ({})", "✓ Task".green(), result.task_id, mode);
    if let Some(reasoning) = &result.reasoning {
        println!("{}", "Reasoning:".bold());
        println!("{}", reasoning.dimmed());
    }
    println!("{}", result.content);
    for call in &result.tool_calls {
        println!("  {} {}({})", "tool".cyan(), call.name, call.arguments);
    }
    println!();

    let metrics = orchestrator.scheduler().get_swarm_metrics(swarm_id)?;
    println!(
        "{} {} tokens, {}ms, swarm {}: {}/{} agents busy, {} pending, parallelism {}",
        "Stats:".bold(),
        result.usage.total_tokens,
        result.latency_ms,
        swarm_id,
        metrics.active_agents,
        metrics.total_agents,
        metrics.pending_tasks,
        metrics.parallelism
    );
    Ok(())
}
