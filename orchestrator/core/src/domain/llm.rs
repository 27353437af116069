// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Completion Client
//!
//! Domain interface for the language-model completion service.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between the mode adapter and
//!   whatever provider answers completions. Implementations live in
//!   `infrastructure/llm/`.

use crate::domain::task::{TaskResult, Tool};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Completion service consumed by the mode adapter.
///
/// Every call carries the plaintext API key leased for it; implementations
/// must not cache keys between calls.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Plain completion with explicit options.
    async fn complete(
        &self,
        api_key: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TaskResult, CompletionError>;

    /// Completion that may answer with tool calls.
    async fn complete_with_tools(
        &self,
        api_key: &str,
        prompt: &str,
        tools: &[Tool],
    ) -> Result<TaskResult, CompletionError>;
}

/// Options for a single completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Ask the provider for deliberate reasoning before the answer
    pub reasoning: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl CompletionOptions {
    /// Options used for tool-augmented calls.
    pub fn tool_augmented(tools: &[Tool]) -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            reasoning: true,
            tools: tools.to_vec(),
        }
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            reasoning: false,
            tools: Vec::new(),
        }
    }
}

/// Errors that can occur during completion calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Whether the same request may succeed if tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::Network(_) | CompletionError::RateLimit)
    }
}
