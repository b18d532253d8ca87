//! Type-safe message system for wizd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::entity::TurnOnParams;
use super::state::LightState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was set up and can receive commands
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
    },

    /// A light finished an update; `state` replaces the previous snapshot
    LightStateChanged { entity_id: String, state: LightState },

    /// An integration exposes a callable service
    ServiceRegistered {
        domain: String,
        service: String,
        integration_name: String,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    LightTurnOn {
        entity_id: String,
        params: TurnOnParams,
    },

    LightTurnOff { entity_id: String },

    /// Invoke a registered service. Services take no arguments.
    ServiceCall { domain: String, service: String },
}

impl ToIntegrationMessage {
    /// Entity the command targets, if it targets one.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ToIntegrationMessage::LightTurnOn { entity_id, .. }
            | ToIntegrationMessage::LightTurnOff { entity_id } => Some(entity_id),
            ToIntegrationMessage::ServiceCall { .. } => None,
        }
    }
}
