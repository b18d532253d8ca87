use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DOMAIN;
use super::WizConfig;
use super::client::WizConnector;
use super::light::WizBulb;
use crate::engine::Entity;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::LightEntity;
use crate::engine::ToIntegrationMessage;
use crate::engine::slugify;

/// A bulb shared between its poll task and command handling. The lock keeps
/// a poll and a command from interleaving on one bulb.
type SharedBulb<C> = Arc<Mutex<WizBulb<C>>>;

/// WiZ integration for wizd
///
/// Connects every configured bulb during setup, then polls each one on the
/// scan interval and forwards the resulting state to the engine.
pub struct WizIntegration<K: WizConnector> {
    connector: K,
    config: WizConfig,
    /// Entity id -> bulb
    bulbs: BTreeMap<String, SharedBulb<K::Client>>,
    /// Service name -> entity id
    services: BTreeMap<String, String>,
    to_engine: Option<FromIntegrationSender>,
    poll_tasks: Vec<JoinHandle<()>>,
}

impl<K: WizConnector> WizIntegration<K> {
    pub fn new(connector: K, config: &WizConfig) -> Self {
        Self {
            connector,
            config: config.clone(),
            bulbs: BTreeMap::new(),
            services: BTreeMap::new(),
            to_engine: None,
            poll_tasks: Vec::new(),
        }
    }

    /// Register an entity with the engine
    async fn register_entity(entity_id: &str, to_engine: &FromIntegrationSender) {
        let msg = FromIntegrationMessage::EntityDiscovered {
            entity_id: entity_id.to_string(),
            integration_name: DOMAIN.to_string(),
        };

        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send EntityDiscovered message: {}", e);
        } else {
            info!("Registered entity: {}", entity_id);
        }
    }

    async fn register_service(service: &str, to_engine: &FromIntegrationSender) {
        let msg = FromIntegrationMessage::ServiceRegistered {
            domain: DOMAIN.to_string(),
            service: service.to_string(),
            integration_name: DOMAIN.to_string(),
        };

        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send ServiceRegistered message: {}", e);
        }
    }

    /// Report the bulb's current attributes. Returns false once the engine
    /// has gone away.
    async fn report_state(
        entity_id: &str,
        bulb: &WizBulb<K::Client>,
        to_engine: &FromIntegrationSender,
    ) -> bool {
        debug!(
            "Reporting {} {}: {}",
            bulb.platform(),
            entity_id,
            bulb.state_json()
        );
        let msg = FromIntegrationMessage::LightStateChanged {
            entity_id: entity_id.to_string(),
            state: bulb.light_state(),
        };

        match to_engine.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send LightStateChanged message: {}", e);
                false
            }
        }
    }

    /// Update one bulb and report the result
    async fn refresh(
        entity_id: &str,
        bulb: &SharedBulb<K::Client>,
        to_engine: &FromIntegrationSender,
    ) -> bool {
        let mut bulb = bulb.lock().await;
        bulb.update().await;
        Self::report_state(entity_id, &bulb, to_engine).await
    }

    /// Poll one bulb forever.
    ///
    /// Runs as its own task so a bulb that keeps timing out does not hold
    /// back the others.
    async fn poll_task(
        entity_id: String,
        bulb: SharedBulb<K::Client>,
        scan_interval: Duration,
        to_engine: FromIntegrationSender,
    ) {
        let mut ticker = tokio::time::interval(scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; setup has just updated the bulb
        ticker.tick().await;

        loop {
            ticker.tick().await;
            debug!("Polling {}", entity_id);
            if !Self::refresh(&entity_id, &bulb, &to_engine).await {
                info!("Engine gone, stopping poll of {}", entity_id);
                return;
            }
        }
    }

    fn bulb(&self, entity_id: &str) -> Result<&SharedBulb<K::Client>, Box<dyn Error + Send>> {
        self.bulbs.get(entity_id).ok_or_else(|| -> Box<dyn Error + Send> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Light not found: {}", entity_id),
            ))
        })
    }

    fn to_engine(&self) -> Result<&FromIntegrationSender, Box<dyn Error + Send>> {
        self.to_engine.as_ref().ok_or_else(|| -> Box<dyn Error + Send> {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "WiZ integration is not set up",
            ))
        })
    }
}

#[async_trait]
impl<K: WizConnector + 'static> Integration for WizIntegration<K> {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_engine = Some(tx.clone());

        for (entry_id, bulb_config) in &self.config.bulbs {
            let client = match self.connector.connect(&bulb_config.host).await {
                Ok(client) => client,
                Err(e) => {
                    error!("Can't add bulb with ip {}.", bulb_config.host);
                    debug!("Connecting to {} failed: {}", bulb_config.host, e);
                    continue;
                }
            };

            let mut bulb = WizBulb::new(client, bulb_config.name.clone());
            bulb.update().await;

            let entity_id = format!("light.{}", entry_id);
            Self::register_entity(&entity_id, &tx).await;
            Self::report_state(&entity_id, &bulb, &tx).await;

            let service = slugify(&format!("{} updateService", bulb_config.name));
            Self::register_service(&service, &tx).await;
            if let Some(previous) = self.services.insert(service.clone(), entity_id.clone()) {
                warn!(
                    "Service {}.{} now refreshes {} instead of {}",
                    DOMAIN, service, entity_id, previous
                );
            }

            self.bulbs.insert(entity_id, Arc::new(Mutex::new(bulb)));
        }

        let scan_interval = self.config.scan_interval();
        for (entity_id, bulb) in &self.bulbs {
            let task = tokio::spawn(Self::poll_task(
                entity_id.clone(),
                bulb.clone(),
                scan_interval,
                tx.clone(),
            ));
            self.poll_tasks.push(task);
        }

        info!(
            "WiZ integration ready with {} of {} bulbs, polling every {:?}",
            self.bulbs.len(),
            self.config.bulbs.len(),
            scan_interval
        );
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let to_engine = self.to_engine()?;

        match msg {
            ToIntegrationMessage::LightTurnOn { entity_id, params } => {
                info!("Turning on {}: {:?}", entity_id, params);
                let mut bulb = self.bulb(&entity_id)?.lock().await;
                bulb.turn_on(params).await;
                bulb.update().await;
                Self::report_state(&entity_id, &bulb, to_engine).await;
            }
            ToIntegrationMessage::LightTurnOff { entity_id } => {
                info!("Turning off {}", entity_id);
                let mut bulb = self.bulb(&entity_id)?.lock().await;
                bulb.turn_off().await;
                bulb.update().await;
                Self::report_state(&entity_id, &bulb, to_engine).await;
            }
            ToIntegrationMessage::ServiceCall { domain, service } => {
                let entity_id = self
                    .services
                    .get(&service)
                    .filter(|_| domain == DOMAIN)
                    .ok_or_else(|| -> Box<dyn Error + Send> {
                        Box::new(std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("Service not found: {}.{}", domain, service),
                        ))
                    })?;
                info!("Service {}.{} refreshing {}", domain, service, entity_id);
                Self::refresh(entity_id, self.bulb(entity_id)?, to_engine).await;
            }
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("WiZ integration shutting down");
        for task in self.poll_tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}
