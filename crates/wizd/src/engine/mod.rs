mod device;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod integration;
mod message;
mod services;
pub mod state;

pub use device::DeviceInfo;
pub use engine::Engine;
pub use engine::EngineError;
pub use entity::Entity;
pub use entity::LightEntity;
pub use entity::TurnOnParams;
pub use integration::FromIntegrationSender;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use services::ServiceName;
pub use services::slugify;
pub use state::LightFeatures;
pub use state::LightState;
pub use state::State;
