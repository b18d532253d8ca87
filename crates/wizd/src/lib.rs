pub mod api;
pub mod color;
pub mod config;
mod engine;
mod integrations;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::DeviceInfo;
pub use engine::Engine;
pub use engine::EngineError;
pub use engine::LightFeatures;
pub use engine::LightState;
pub use engine::ServiceName;
pub use engine::State;
pub use engine::TurnOnParams;
pub use integrations::wiz::WizConfig;
