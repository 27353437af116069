// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mode inspection commands
//!
//! Commands: list, select

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use hivemind_core::domain::mode::Mode;
use hivemind_core::domain::task::{Task, Tool};
use hivemind_swarm::application::ModeController;

#[derive(Subcommand)]
pub enum ModeCommand {
    /// List execution modes and their characteristics
    List,

    /// Show which mode a task would run under
    Select {
        /// Task prompt
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Task complexity in [0, 1]
        #[arg(long, default_value_t = 0.0)]
        complexity: f64,

        /// Task needs image understanding
        #[arg(long)]
        vision: bool,

        /// Tool names the task may call (repeatable)
        #[arg(long = "tool", value_name = "NAME")]
        tools: Vec<String>,
    },
}

pub async fn handle_command(command: ModeCommand) -> Result<()> {
    match command {
        ModeCommand::List => list(),
        ModeCommand::Select {
            prompt,
            complexity,
            vision,
            tools,
        } => select(build_task(prompt, complexity, vision, tools)),
    }
}

/// Builds a task from CLI flags; tool names become schema-less definitions.
pub fn build_task(prompt: String, complexity: f64, vision: bool, tools: Vec<String>) -> Task {
    let mut task = Task::new(prompt).with_complexity(complexity);
    if vision {
        task = task.with_vision();
    }
    if !tools.is_empty() {
        task = task.with_tools(
            tools
                .into_iter()
                .map(|name| Tool {
                    name,
                    description: String::new(),
                    parameters: serde_json::json!({"type": "object"}),
                })
                .collect(),
        );
    }
    task
}

fn list() -> Result<()> {
    let header = format!(
        "{:<12} {:>8} {:>6} {:>6} {:>9} {:>9} {:>6} {:>7}",
        "MODE", "LAT(ms)", "TPS", "ACC%", "$/1K", "CONTEXT", "TOOLS", "AGENTS"
    );
    println!("{}", header.bold());
    for mode in Mode::ALL {
        let m = mode.metrics();
        println!(
            "{:<12} {:>8.0} {:>6.0} {:>6.1} {:>9.3} {:>9} {:>6} {:>7}",
            mode.as_str(),
            m.avg_latency_ms,
            m.throughput_tps,
            m.accuracy_percent,
            m.cost_per_1k_tokens,
            m.max_context_tokens,
            if m.supports_tools { "yes" } else { "no" },
            m.max_parallel_agents
        );
    }
    Ok(())
}

fn select(task: Task) -> Result<()> {
    let mode = ModeController::auto_select_mode(&task);
    let capabilities = mode.capabilities();

    println!("{} {}", "Selected mode:".bold(), mode.to_string().green());
    println!("  Complexity: {:.2}", task.complexity);
    println!("  Requires vision: {}", task.requires_vision);
    println!("  Requires tools: {}", task.requires_tools);
    println!("  Max parallel agents: {}", capabilities.max_parallel_agents);
    println!("  Max context tokens: {}", capabilities.max_context_tokens);
    Ok(())
}
