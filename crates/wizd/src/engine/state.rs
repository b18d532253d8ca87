use std::collections::BTreeMap;
use std::ops::BitOr;
use std::ops::BitOrAssign;

use serde::Deserialize;
use serde::Serialize;

use super::device::DeviceInfo;

/// Bitmask of optional light capabilities.
///
/// Bit values match the wire convention used by Home Assistant light entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightFeatures(u32);

impl LightFeatures {
    pub const BRIGHTNESS: Self = Self(1);
    pub const COLOR_TEMP: Self = Self(2);
    pub const EFFECT: Self = Self(4);
    pub const COLOR: Self = Self(16);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(Self::BRIGHTNESS.0 | Self::COLOR_TEMP.0 | Self::EFFECT.0 | Self::COLOR.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LightFeatures {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LightFeatures {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// State of a light entity, as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightState {
    /// Display name.
    pub name: String,

    /// Stable identifier, once the device has reported one.
    pub unique_id: Option<String>,

    /// Whether the device answered the most recent poll.
    pub available: bool,

    /// Whether the light is on or off.
    pub on: bool,

    /// Brightness level (0-255), if known.
    pub brightness: Option<u8>,

    pub rgb_color: Option<(u8, u8, u8)>,

    /// Hue in degrees and saturation in percent.
    pub hs_color: Option<(f64, f64)>,

    /// Color temperature in mired.
    pub color_temp: Option<u32>,

    pub min_mireds: u32,
    pub max_mireds: u32,

    pub supported_features: LightFeatures,

    /// Name of the active scene.
    pub effect: Option<String>,

    pub effect_list: Vec<String>,

    pub device_info: Option<DeviceInfo>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub lights: BTreeMap<String, LightState>,
}
