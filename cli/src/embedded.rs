// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedded orchestrator
//!
//! Wires the credential manager, scheduler, mode controller and mode adapter
//! in-process from one [`SwarmConfigManifest`], creates the configured swarms
//! and runs the background loops until [`EmbeddedOrchestrator::shutdown`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use hivemind_core::{
    application::credential_manager::CredentialManager,
    domain::{
        config::{resolve_secret, SwarmConfigManifest},
        identity::SwarmId,
        llm::CompletionClient,
        vault::SecretVault,
    },
    infrastructure::{event_bus::EventBus, llm::OpenAiCompatibleClient, vault::OpenBaoVault},
};
use hivemind_swarm::application::{
    AdaptiveConcurrencyController, AgentExecutor, ModeAdapter, ModeController, SwarmScheduler,
};

pub struct EmbeddedOrchestrator {
    controller: Arc<ModeController>,
    scheduler: Arc<SwarmScheduler>,
    credentials: Arc<CredentialManager>,
    concurrency: Arc<AdaptiveConcurrencyController>,
    adapter: ModeAdapter,
    event_bus: EventBus,
    cancel: CancellationToken,
    background: Vec<JoinHandle<()>>,
}

impl EmbeddedOrchestrator {
    /// Connects to the configured vault and completion endpoint.
    pub async fn new(config: &SwarmConfigManifest) -> Result<Self> {
        let vault = Arc::new(
            OpenBaoVault::from_config(&config.spec.vault)
                .context("Failed to initialize vault client")?,
        );
        let client = Arc::new(
            OpenAiCompatibleClient::from_config(&config.spec.completion)
                .context("Failed to initialize completion client")?,
        );
        Self::with_backends(config, vault, client).await
    }

    pub async fn with_backends(
        config: &SwarmConfigManifest,
        vault: Arc<dyn SecretVault>,
        client: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        let spec = &config.spec;
        let event_bus = EventBus::with_default_capacity();

        let unseal_keys = if spec.vault.auto_unseal {
            spec.vault
                .unseal_keys
                .iter()
                .map(|key| resolve_secret(key))
                .collect::<Result<Vec<_>>>()
                .context("Failed to resolve unseal keys")?
        } else {
            Vec::new()
        };
        let credentials = Arc::new(
            CredentialManager::connect(vault, spec.credentials.clone(), &unseal_keys)
                .await
                .context("Failed to connect credential manager")?
                .with_event_bus(event_bus.clone()),
        );

        let concurrency = Arc::new(AdaptiveConcurrencyController::new(spec.concurrency.clone()));
        let executor = Arc::new(AgentExecutor::new(credentials.clone(), client.clone()));
        let scheduler = Arc::new(
            SwarmScheduler::new(spec.scheduler.clone(), executor, concurrency.clone())
                .with_event_bus(event_bus.clone()),
        );
        let controller = Arc::new(
            ModeController::new()
                .with_config_sink(scheduler.clone())
                .with_event_bus(event_bus.clone()),
        );

        for definition in &spec.swarms {
            let swarm_id = SwarmId::new(definition.name.clone());
            scheduler
                .initialize_swarm(swarm_id.clone(), definition.agents, definition.mode)
                .with_context(|| format!("Failed to create swarm '{}'", definition.name))?;
            controller
                .register_swarm(&swarm_id, definition.mode)
                .with_context(|| format!("Failed to register swarm '{}'", definition.name))?;
        }

        let cancel = CancellationToken::new();
        let background = vec![
            scheduler.spawn(cancel.clone()),
            credentials.spawn_window_reset(cancel.clone()),
        ];

        let adapter = ModeAdapter::new(
            controller.clone(),
            scheduler.clone(),
            credentials.clone(),
            client,
        );

        info!(
            swarms = spec.swarms.len(),
            credentials = credentials.len(),
            "Embedded orchestrator started"
        );

        Ok(Self {
            controller,
            scheduler,
            credentials,
            concurrency,
            adapter,
            event_bus,
            cancel,
            background,
        })
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn scheduler(&self) -> &SwarmScheduler {
        &self.scheduler
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn concurrency(&self) -> &AdaptiveConcurrencyController {
        &self.concurrency
    }

    pub fn adapter(&self) -> &ModeAdapter {
        &self.adapter
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Removes a swarm from the scheduler and drops its mode state. Returns
    /// the number of agents released immediately.
    pub fn teardown_swarm(&self, swarm_id: &SwarmId) -> Result<usize> {
        let removed = self
            .scheduler
            .teardown_swarm(swarm_id)
            .with_context(|| format!("Failed to tear down swarm '{}'", swarm_id))?;
        self.controller.remove_swarm(swarm_id);
        Ok(removed)
    }

    /// Stops the background loops and waits for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.background {
            let _ = handle.await;
        }
        info!("Embedded orchestrator stopped");
    }
}
