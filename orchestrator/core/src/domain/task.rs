// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tasks, subtasks and their results.

use crate::domain::identity::TaskId;
use serde::{Deserialize, Serialize};

/// Unit of work submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: TaskId,
    pub prompt: String,
    #[serde(default)]
    pub requires_vision: bool,
    #[serde(default)]
    pub requires_tools: bool,
    /// Complexity score in `[0.0, 1.0]`.
    #[serde(default)]
    pub complexity: f64,
    #[serde(default)]
    pub tools: Vec<Tool>,
    /// Children executed by the swarm in distributed mode.
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            prompt: prompt.into(),
            requires_vision: false,
            requires_tools: false,
            complexity: 0.0,
            tools: Vec::new(),
            subtasks: Vec::new(),
        }
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_vision(mut self) -> Self {
        self.requires_vision = true;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.requires_tools = true;
        self.tools = tools;
        self
    }

    pub fn with_subtask(mut self, subtask: Subtask) -> Self {
        self.subtasks.push(subtask);
        self
    }
}

/// Child of a distributed [`Task`]. Lower `priority` values aggregate first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub id: TaskId,
    pub prompt: String,
    #[serde(default)]
    pub priority: u32,
}

impl Subtask {
    pub fn new(prompt: impl Into<String>, priority: u32) -> Self {
        Self {
            id: TaskId::new(),
            prompt: prompt.into(),
            priority,
        }
    }

    /// Wraps the subtask as a standalone task carrying the parent's tools.
    pub fn into_task(self, parent: &Task) -> Task {
        Task {
            id: self.id,
            prompt: self.prompt,
            requires_vision: parent.requires_vision,
            requires_tools: parent.requires_tools,
            complexity: parent.complexity,
            tools: parent.tools.clone(),
            subtasks: Vec::new(),
        }
    }
}

/// Tool definition forwarded to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the tool's arguments.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Outcome of executing a [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub latency_ms: u64,
}

impl TaskResult {
    pub fn new(task_id: TaskId, content: impl Into<String>) -> Self {
        Self {
            task_id,
            content: content.into(),
            reasoning: None,
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            latency_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtask_inherits_parent_tools() {
        let tool = Tool {
            name: "search".to_string(),
            description: "web search".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let parent = Task::new("research")
            .with_tools(vec![tool.clone()])
            .with_complexity(0.9);
        let child = Subtask::new("find sources", 1);
        let child_id = child.id;

        let task = child.into_task(&parent);
        assert_eq!(task.id, child_id);
        assert_eq!(task.tools, vec![tool]);
        assert!(task.requires_tools);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_task_yaml_defaults() {
        let task: Task = serde_yaml::from_str("prompt: hello").unwrap();
        assert_eq!(task.prompt, "hello");
        assert_eq!(task.complexity, 0.0);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.accumulate(&TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 4,
            total_tokens: 7,
        });
        total.accumulate(&TokenUsage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
        });
        assert_eq!(total.total_tokens, 9);
    }
}
