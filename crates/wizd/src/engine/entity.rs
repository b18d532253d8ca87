//! Entity abstraction for wizd
//!
//! Integrations expose each controllable light through the `LightEntity`
//! trait. The engine never talks to an entity directly; integrations call
//! `light_state()` after every update and forward the snapshot.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use super::device::DeviceInfo;
use super::state::LightFeatures;
use super::state::LightState;

/// Parameters accepted by a turn-on command. Every field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnOnParams {
    pub rgb_color: Option<(u8, u8, u8)>,

    /// Hue in degrees and saturation in percent. Wins over `rgb_color`.
    pub hs_color: Option<(f64, f64)>,

    pub brightness: Option<u8>,

    /// Color temperature in mired.
    pub color_temp: Option<u32>,

    /// Scene name.
    pub effect: Option<String>,
}

/// Base trait that all entities implement
pub trait Entity: Send + Sync {
    /// Serialize current state to JSON
    fn state_json(&self) -> serde_json::Value;

    /// Return the platform type of this entity (e.g. "light")
    fn platform(&self) -> &'static str;
}

/// Contract every light entity satisfies.
///
/// Attribute getters return cached values only; network I/O happens in
/// `update`, `turn_on` and `turn_off`.
#[async_trait]
pub trait LightEntity: Send + Sync {
    fn name(&self) -> &str;
    fn unique_id(&self) -> Option<&str>;
    fn available(&self) -> bool;
    fn is_on(&self) -> bool;
    fn brightness(&self) -> Option<u8>;
    fn rgb_color(&self) -> Option<(u8, u8, u8)>;
    fn hs_color(&self) -> Option<(f64, f64)>;
    fn color_temp(&self) -> Option<u32>;

    /// Coldest supported color temperature, in mired.
    fn min_mireds(&self) -> u32;

    /// Warmest supported color temperature, in mired.
    fn max_mireds(&self) -> u32;

    fn supported_features(&self) -> LightFeatures;
    fn effect(&self) -> Option<&str>;
    fn effect_list(&self) -> Vec<String>;
    fn device_info(&self) -> Option<DeviceInfo>;

    /// Fetch fresh state from the device.
    async fn update(&mut self);

    async fn turn_on(&mut self, params: TurnOnParams);

    async fn turn_off(&mut self);

    /// Snapshot of every exposed attribute.
    fn light_state(&self) -> LightState {
        LightState {
            name: self.name().to_string(),
            unique_id: self.unique_id().map(str::to_string),
            available: self.available(),
            on: self.is_on(),
            brightness: self.brightness(),
            rgb_color: self.rgb_color(),
            hs_color: self.hs_color(),
            color_temp: self.color_temp(),
            min_mireds: self.min_mireds(),
            max_mireds: self.max_mireds(),
            supported_features: self.supported_features(),
            effect: self.effect().map(str::to_string),
            effect_list: self.effect_list(),
            device_info: self.device_info(),
        }
    }
}

impl<T: LightEntity> Entity for T {
    fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(self.light_state()).unwrap_or_default()
    }

    fn platform(&self) -> &'static str {
        "light"
    }
}
