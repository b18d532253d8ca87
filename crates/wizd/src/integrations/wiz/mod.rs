mod bulb;
mod client;
mod config;
mod error;
mod light;
mod protocol;
mod scenes;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod wiz;

pub use config::Config as WizConfig;
use linkme::distributed_slice;
pub use wiz::WizIntegration;

use crate::engine;

/// Domain of the integration, its services and device identifiers
pub const DOMAIN: &str = "wiz_light";

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_wiz(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let wiz_config = if let Some(c) = &ctx.config.integrations.wiz_light {
        c
    } else {
        return Ok(None);
    };

    let connector = client::UdpConnector::new(wiz_config.timeout());
    Ok(Some(Box::new(WizIntegration::new(connector, wiz_config))))
}
