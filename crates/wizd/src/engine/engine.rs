use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::entity::TurnOnParams;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::services::ServiceName;
use super::services::ServiceRegistry;
use super::state::State;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("No such service: {domain}.{service}")]
    UnknownService { domain: String, service: String },

    #[error("Integration channel not found: {0}")]
    IntegrationUnavailable(String),

    #[error("Engine routing table lock poisoned")]
    Poisoned,
}

/// wizd engine
///
/// This structure handles the flow of events, sending commands to the
/// correct integration, and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for routing messages
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Services exposed by integrations
    services: std::sync::Mutex<ServiceRegistry>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            services: std::sync::Mutex::new(ServiceRegistry::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every factory in the integration registry; factories return
    /// `None` when their config section is absent.
    pub fn register_integrations_from_config(&self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integration = match constr(&ctx) {
                Ok(Some(i)) => i,
                Err(e) => {
                    error!("failed to setup integration: {:#}", e);
                    continue;
                }
                Ok(None) => continue,
            };
            let name = integration.name().to_string();
            self.register_integration(name, integration);
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        match self.integration_channels.lock() {
            Ok(mut channels) => {
                channels.insert(name.clone(), to_integration_tx);
            }
            Err(_) => {
                error!("Integration '{}' not registered: channel map poisoned", name);
                return;
            }
        }

        let handle = tokio::spawn(async move {
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Commands are handled one at a time, in arrival order
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        if let Ok(mut handles) = self.integration_handles.lock() {
            handles.push(handle);
        }
    }

    /// Send a command to an integration
    ///
    /// Entity commands are routed by entity_id, service calls by the
    /// service registry.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), EngineError> {
        let integration_name = match &msg {
            ToIntegrationMessage::ServiceCall { domain, service } => self
                .services
                .lock()
                .map_err(|_| EngineError::Poisoned)?
                .lookup(domain, service)
                .map(str::to_string)
                .ok_or_else(|| EngineError::UnknownService {
                    domain: domain.clone(),
                    service: service.clone(),
                })?,
            other => {
                let entity_id = other.entity_id().unwrap_or_default();
                self.entity_integration_map
                    .lock()
                    .map_err(|_| EngineError::Poisoned)?
                    .get(entity_id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_string()))?
            }
        };

        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| EngineError::Poisoned)?;
        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| EngineError::IntegrationUnavailable(integration_name.clone()))?;

        tx.send(msg)
            .map_err(|_| EngineError::IntegrationUnavailable(integration_name))
    }

    pub fn turn_on(&self, entity_id: String, params: TurnOnParams) -> Result<(), EngineError> {
        self.send_command(ToIntegrationMessage::LightTurnOn { entity_id, params })
    }

    pub fn turn_off(&self, entity_id: String) -> Result<(), EngineError> {
        self.send_command(ToIntegrationMessage::LightTurnOff { entity_id })
    }

    pub fn call_service(&self, domain: String, service: String) -> Result<(), EngineError> {
        self.send_command(ToIntegrationMessage::ServiceCall { domain, service })
    }

    /// All registered services, sorted by domain then name.
    pub fn services(&self) -> Vec<ServiceName> {
        self.services
            .lock()
            .map(|registry| registry.services())
            .unwrap_or_default()
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send>> {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
        Ok(())
    }

    /// Close every integration channel and wait for the tasks to finish.
    pub async fn shutdown(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }
        let handles = match self.integration_handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task ended abnormally: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Handle an event from an integration
    fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
            } => {
                info!(
                    "Entity discovered: {} (from {})",
                    entity_id, integration_name
                );

                // State is not populated until the first state-change message arrives.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id, integration_name);
                }
            }
            FromIntegrationMessage::LightStateChanged { entity_id, state } => {
                debug!(
                    "Light state changed: {} -> available={}, on={}, brightness={:?}",
                    entity_id, state.available, state.on, state.brightness
                );

                let mut snapshot = State::clone(&self.state.load());
                snapshot.lights.insert(entity_id, state);
                self.state.store(Arc::new(snapshot));
            }
            FromIntegrationMessage::ServiceRegistered {
                domain,
                service,
                integration_name,
            } => {
                info!(
                    "Service registered: {}.{} (from {})",
                    domain, service, integration_name
                );
                if let Ok(mut services) = self.services.lock() {
                    services.register(&domain, &service, &integration_name);
                }
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::RecordingIntegration;
    use crate::engine::test_support::wait_for;

    #[tokio::test]
    async fn test_unknown_entity_is_rejected() {
        let engine = Engine::new();
        let err = engine.turn_off("light.nowhere".to_string()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(id) if id == "light.nowhere"));
    }

    #[tokio::test]
    async fn test_unknown_service_is_rejected() {
        let engine = Engine::new();
        let err = engine
            .call_service("wiz_light".to_string(), "nope".to_string())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownService { .. }));
    }

    #[tokio::test]
    async fn test_discovery_state_and_command_routing() {
        let engine = Arc::new(Engine::new());
        let (integration, commands) = RecordingIntegration::new("fake", "light.desk");
        engine.register_integration("fake".to_string(), Box::new(integration));

        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        wait_for(|| engine.state_snapshot().lights.contains_key("light.desk")).await;
        wait_for(|| !engine.services().is_empty()).await;

        let state = engine.state_snapshot();
        assert_eq!(state.lights["light.desk"].name, "Desk");

        engine.turn_off("light.desk".to_string()).unwrap();
        engine
            .call_service("fake".to_string(), "refresh".to_string())
            .unwrap();

        wait_for(|| commands.lock().unwrap().len() == 2).await;
        let commands = commands.lock().unwrap();
        assert!(matches!(
            &commands[0],
            ToIntegrationMessage::LightTurnOff { entity_id } if entity_id == "light.desk"
        ));
        assert!(matches!(
            &commands[1],
            ToIntegrationMessage::ServiceCall { service, .. } if service == "refresh"
        ));
    }

    #[tokio::test]
    async fn test_shutdown_closes_integrations() {
        let engine = Engine::new();
        let (integration, _commands) = RecordingIntegration::new("fake", "light.desk");
        engine.register_integration("fake".to_string(), Box::new(integration));

        tokio::time::timeout(std::time::Duration::from_secs(5), engine.shutdown())
            .await
            .unwrap();
        assert!(matches!(
            engine.turn_off("light.desk".to_string()),
            Err(EngineError::UnknownEntity(_))
        ));
    }
}
