// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Scheduler queue and requeue policy
// - Adaptive concurrency controller tuning
// - Credential pool and vault connection
// - Completion endpoint
// - Swarms created at startup
// - Logging and metrics

use crate::domain::mode::Mode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "hivemind.dev/v1";
pub const KIND: &str = "SwarmConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfigManifest {
    /// API version (must be "hivemind.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SwarmConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: SwarmConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwarmConfigSpec {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub vault: VaultConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    /// Swarms created when the orchestrator starts
    #[serde(default)]
    pub swarms: Vec<SwarmDefinition>,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Bounded task queue capacity; submissions beyond it fail with QueueFull
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delay before a task with no idle agent is re-submitted
    #[serde(default = "default_requeue_delay_ms")]
    pub requeue_delay_ms: u64,

    /// Requeue attempts before the task fails with NoAgentAvailable
    #[serde(default = "default_max_requeue_attempts")]
    pub max_requeue_attempts: u32,

    /// Upper bound on one task execution
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Reward history capacity (oldest sample evicted first)
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,

    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: usize,

    #[serde(default = "default_base_learning_rate")]
    pub base_learning_rate: f64,

    /// History length above which the learning rate is recomputed
    #[serde(default = "default_learning_rate_min_samples")]
    pub learning_rate_min_samples: usize,

    /// Number of most recent samples averaged for the scale-up decision
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    #[serde(default = "default_high_confidence_threshold")]
    pub high_confidence_threshold: f64,

    #[serde(default = "default_scale_up_multiplier")]
    pub scale_up_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Transit key used to encrypt and decrypt pool secrets
    #[serde(default = "default_credential_namespace")]
    pub namespace: String,

    #[serde(default = "default_kv_mount")]
    pub kv_mount: String,

    /// Rotated secrets are written to "{kv_path_prefix}/{credential id}"
    #[serde(default = "default_kv_path_prefix")]
    pub kv_path_prefix: String,

    /// Prefix prepended to freshly generated secrets
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,

    /// Length of the rate-limiting window
    #[serde(default = "default_usage_window_secs")]
    pub usage_window_secs: u64,

    #[serde(default)]
    pub pool: Vec<CredentialEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub id: String,

    /// Vault transit ciphertext (e.g. "vault:v1:...")
    pub ciphertext: String,

    /// Leases allowed per usage window
    pub rate_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_address")]
    pub address: String,

    /// Vault token (supports "env:VAR_NAME")
    #[serde(default = "default_vault_token")]
    pub token: String,

    #[serde(default = "default_transit_mount")]
    pub transit_mount: String,

    /// Submit `unseal_keys` when the vault reports sealed at startup
    #[serde(default)]
    pub auto_unseal: bool,

    /// Unseal key shares (each supports "env:VAR_NAME")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unseal_keys: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmDefinition {
    pub name: String,

    pub agents: usize,

    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Expose a Prometheus scrape endpoint
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_queue_capacity() -> usize {
    1024
}

fn default_requeue_delay_ms() -> u64 {
    100
}

fn default_max_requeue_attempts() -> u32 {
    600
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_history_capacity() -> usize {
    1000
}

fn default_max_parallel_steps() -> usize {
    1500
}

fn default_base_learning_rate() -> f64 {
    0.01
}

fn default_learning_rate_min_samples() -> usize {
    100
}

fn default_recent_window() -> usize {
    50
}

fn default_high_confidence_threshold() -> f64 {
    0.8
}

fn default_scale_up_multiplier() -> f64 {
    1.5
}

fn default_credential_namespace() -> String {
    "swarm-keys".to_string()
}

fn default_kv_mount() -> String {
    "secret".to_string()
}

fn default_kv_path_prefix() -> String {
    "swarm-keys".to_string()
}

fn default_secret_prefix() -> String {
    "sk_".to_string()
}

fn default_usage_window_secs() -> u64 {
    60
}

fn default_vault_address() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_vault_token() -> String {
    "env:VAULT_TOKEN".to_string()
}

fn default_transit_mount() -> String {
    "transit".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            requeue_delay_ms: default_requeue_delay_ms(),
            max_requeue_attempts: default_max_requeue_attempts(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
            max_parallel_steps: default_max_parallel_steps(),
            base_learning_rate: default_base_learning_rate(),
            learning_rate_min_samples: default_learning_rate_min_samples(),
            recent_window: default_recent_window(),
            high_confidence_threshold: default_high_confidence_threshold(),
            scale_up_multiplier: default_scale_up_multiplier(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            namespace: default_credential_namespace(),
            kv_mount: default_kv_mount(),
            kv_path_prefix: default_kv_path_prefix(),
            secret_prefix: default_secret_prefix(),
            usage_window_secs: default_usage_window_secs(),
            pool: Vec::new(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_vault_address(),
            token: default_vault_token(),
            transit_mount: default_transit_mount(),
            auto_unseal: false,
            unseal_keys: Vec::new(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            model: default_completion_model(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Default for SwarmConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "hivemind".to_string(),
                labels: None,
            },
            spec: SwarmConfigSpec::default(),
        }
    }
}

/// Resolve a secret reference (supports "env:VAR_NAME" syntax)
pub fn resolve_secret(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
        None => Ok(value.to_string()),
    }
}

impl SwarmConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HIVEMIND_CONFIG_PATH environment variable
    /// 2. ./hivemind-config.yaml (working directory)
    /// 3. ~/.hivemind/config.yaml (user home)
    /// 4. /etc/hivemind/config.yaml (system, Unix) or C:\ProgramData\Hivemind\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HIVEMIND_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hivemind-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hivemind").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/hivemind/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Hivemind\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HIVEMIND_QUEUE_CAPACITY") {
            match val.parse::<usize>() {
                Ok(capacity) => {
                    tracing::info!("Environment override: HIVEMIND_QUEUE_CAPACITY={}", capacity);
                    self.spec.scheduler.queue_capacity = capacity;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for HIVEMIND_QUEUE_CAPACITY: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(addr) = std::env::var("HIVEMIND_VAULT_ADDR") {
            tracing::info!("Environment override: HIVEMIND_VAULT_ADDR={}", addr);
            self.spec.vault.address = addr;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let scheduler = &self.spec.scheduler;
        if scheduler.queue_capacity == 0 {
            anyhow::bail!("spec.scheduler.queue_capacity must be greater than zero");
        }
        if scheduler.task_timeout_secs == 0 {
            anyhow::bail!("spec.scheduler.task_timeout_secs must be greater than zero");
        }

        let concurrency = &self.spec.concurrency;
        if concurrency.capacity == 0 {
            anyhow::bail!("spec.concurrency.capacity must be greater than zero");
        }
        if concurrency.max_parallel_steps == 0 {
            anyhow::bail!("spec.concurrency.max_parallel_steps must be greater than zero");
        }
        if concurrency.recent_window == 0 || concurrency.recent_window > concurrency.capacity {
            anyhow::bail!(
                "spec.concurrency.recent_window must be between 1 and capacity ({})",
                concurrency.capacity
            );
        }
        if !(0.0..=1.0).contains(&concurrency.high_confidence_threshold) {
            anyhow::bail!("spec.concurrency.high_confidence_threshold must be within [0, 1]");
        }
        if concurrency.base_learning_rate <= 0.0 {
            anyhow::bail!("spec.concurrency.base_learning_rate must be positive");
        }
        if concurrency.scale_up_multiplier < 1.0 {
            anyhow::bail!("spec.concurrency.scale_up_multiplier must be at least 1.0");
        }

        let credentials = &self.spec.credentials;
        if credentials.usage_window_secs == 0 {
            anyhow::bail!("spec.credentials.usage_window_secs must be greater than zero");
        }
        let mut seen = HashSet::new();
        for entry in &credentials.pool {
            if entry.id.is_empty() {
                anyhow::bail!("Credential id cannot be empty");
            }
            if !seen.insert(entry.id.as_str()) {
                anyhow::bail!("Duplicate credential id: {}", entry.id);
            }
            if entry.ciphertext.is_empty() {
                anyhow::bail!("Credential ciphertext cannot be empty for: {}", entry.id);
            }
            if entry.rate_limit == 0 {
                anyhow::bail!("Credential rate_limit must be greater than zero for: {}", entry.id);
            }
        }

        if self.spec.vault.auto_unseal && self.spec.vault.unseal_keys.is_empty() {
            anyhow::bail!("spec.vault.auto_unseal requires at least one unseal key");
        }

        let mut names = HashSet::new();
        for swarm in &self.spec.swarms {
            if swarm.name.is_empty() {
                anyhow::bail!("Swarm name cannot be empty");
            }
            if !names.insert(swarm.name.as_str()) {
                anyhow::bail!("Duplicate swarm name: {}", swarm.name);
            }
            if swarm.agents == 0 {
                anyhow::bail!("Swarm '{}' must have at least one agent", swarm.name);
            }
        }

        Ok(())
    }
}
