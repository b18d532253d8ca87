//! WiZ bulb as a light entity.
//!
//! `WizBulb` mirrors the bulb's state locally. Each `update` fetches the
//! pilot, then fills in the capability descriptor and MAC if they are still
//! missing. Display attributes are only recomputed from a successful poll
//! of a bulb that is on; anything else leaves them as they were.

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DOMAIN;
use super::bulb::BulbType;
use super::client::WizClient;
use super::error::WizError;
use super::protocol::PilotBuilder;
use super::protocol::PilotState;
use super::scenes;
use super::scenes::RHYTHM_SCENE_ID;
use crate::color;
use crate::color::Hs;
use crate::color::Rgb;
use crate::engine::DeviceInfo;
use crate::engine::LightEntity;
use crate::engine::LightFeatures;
use crate::engine::TurnOnParams;

const MANUFACTURER: &str = "WiZ Light Platform";

/// Range assumed for bulbs whose model is not known.
const FALLBACK_KELVIN_MIN: u32 = 2500;
const FALLBACK_KELVIN_MAX: u32 = 6500;

/// Representation of a WiZ light bulb
pub struct WizBulb<C: WizClient> {
    light: C,
    name: String,
    state: Option<bool>,
    available: bool,
    brightness: Option<u8>,
    rgb_color: Option<Rgb>,
    hs_color: Option<Hs>,
    /// Mired
    temperature: Option<u32>,
    effect: Option<&'static str>,
    bulb_type: Option<BulbType>,
    mac: Option<String>,
}

impl<C: WizClient> WizBulb<C> {
    pub fn new(light: C, name: String) -> Self {
        Self {
            light,
            name,
            state: None,
            available: false,
            brightness: None,
            rgb_color: None,
            hs_color: None,
            temperature: None,
            effect: None,
            bulb_type: None,
            mac: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &C {
        &self.light
    }

    #[cfg(test)]
    pub(crate) fn client_mut(&mut self) -> &mut C {
        &mut self.light
    }

    /// Fetch the pilot and record availability. Returns the pilot only when
    /// the bulb answered with data.
    async fn update_state(&mut self) -> Option<PilotState> {
        let pilot = match self.light.update_state().await {
            Ok(Some(pilot)) => {
                self.state = Some(pilot.state);
                self.available = true;
                Some(pilot)
            }
            Ok(None) => {
                debug!("[wizlight {}] state unavailable", self.light.ip());
                self.set_unavailable();
                None
            }
            Err(WizError::Timeout) => {
                debug!("[wizlight {}] state update timed out", self.light.ip());
                self.set_unavailable();
                None
            }
            Err(e) => {
                warn!("[wizlight {}] state update failed: {}", self.light.ip(), e);
                self.set_unavailable();
                None
            }
        };
        debug!("[wizlight {}] updated state: {:?}", self.light.ip(), self.state);
        pilot
    }

    /// On/off is forced off even if the bulb was last seen on.
    fn set_unavailable(&mut self) {
        self.state = Some(false);
        self.available = false;
    }

    async fn fetch_bulb_type(&mut self) {
        if self.bulb_type.is_some() {
            return;
        }
        match self.light.get_bulb_type().await {
            Ok(bulb_type) => {
                info!(
                    "[wizlight {}] Initiate the WiZ bulb as {}",
                    self.light.ip(),
                    bulb_type.name
                );
                if !bulb_type.is_known() {
                    warn!(
                        "[wizlight {}] Bulb {} is not in the bulb library, assuming full capabilities",
                        self.light.ip(),
                        bulb_type.name
                    );
                }
                self.bulb_type = Some(bulb_type);
            }
            Err(e) => {
                debug!("[wizlight {}] Bulbtype update failed - {}", self.light.ip(), e);
            }
        }
    }

    async fn fetch_mac(&mut self) {
        if self.mac.is_some() {
            return;
        }
        match self.light.get_mac().await {
            Ok(mac) => self.mac = Some(mac),
            Err(e) => debug!("[wizlight {}] Mac update failed - {}", self.light.ip(), e),
        }
    }

    fn update_brightness(&mut self, pilot: &PilotState) {
        let Some(brightness) = pilot.brightness() else {
            return;
        };
        match u8::try_from(brightness) {
            Ok(brightness) => self.brightness = Some(brightness),
            Err(_) => error!(
                "Received invalid brightness : {}. Expected: 0-255",
                brightness
            ),
        }
    }

    fn update_temperature(&mut self, pilot: &PilotState) {
        let kelvin = match pilot.colortemp() {
            None | Some(0) => return,
            Some(kelvin) => kelvin,
        };
        debug!("[wizlight {}] kelvin from the bulb: {}", self.light.ip(), kelvin);
        self.temperature = Some(color::kelvin_to_mired(kelvin));
    }

    fn update_color(&mut self, pilot: &PilotState) {
        // No red channel means the last change was a white temperature; keep
        // the previous color until the bulb reports one again.
        let (Some(r), Some(g), Some(b)) = pilot.rgb() else {
            return;
        };
        self.rgb_color = Some((r, g, b));
        self.hs_color = Some(color::rgb_to_hs(r, g, b));
    }

    fn update_effect(&mut self, pilot: &PilotState) {
        self.effect = pilot.scene_name();
    }

    fn model(&self) -> Option<&str> {
        self.bulb_type.as_ref().map(|bulb_type| bulb_type.name.as_str())
    }

    fn kelvin_max(&self) -> u32 {
        match self.bulb_type.as_ref().map(BulbType::kelvin_range) {
            Some(Ok(range)) => range.max,
            Some(Err(e)) => {
                debug!("{}. Fallback to {}", e, FALLBACK_KELVIN_MAX);
                FALLBACK_KELVIN_MAX
            }
            None => FALLBACK_KELVIN_MAX,
        }
    }

    fn kelvin_min(&self) -> u32 {
        match self.bulb_type.as_ref().map(BulbType::kelvin_range) {
            Some(Ok(range)) => range.min,
            Some(Err(e)) => {
                debug!("{}. Fallback to {}", e, FALLBACK_KELVIN_MIN);
                FALLBACK_KELVIN_MIN
            }
            None => FALLBACK_KELVIN_MIN,
        }
    }
}

#[async_trait]
impl<C: WizClient> LightEntity for WizBulb<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn unique_id(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    fn available(&self) -> bool {
        self.available
    }

    fn is_on(&self) -> bool {
        self.state.unwrap_or(false)
    }

    fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    fn rgb_color(&self) -> Option<Rgb> {
        self.rgb_color
    }

    fn hs_color(&self) -> Option<Hs> {
        self.hs_color
    }

    fn color_temp(&self) -> Option<u32> {
        self.temperature
    }

    fn min_mireds(&self) -> u32 {
        color::kelvin_to_mired(self.kelvin_max())
    }

    fn max_mireds(&self) -> u32 {
        color::kelvin_to_mired(self.kelvin_min())
    }

    fn supported_features(&self) -> LightFeatures {
        let features = match self.bulb_type.as_ref().map(BulbType::features) {
            Some(Ok(features)) => features,
            Some(Err(e)) => {
                debug!("{}. Fallback to full feature.", e);
                return LightFeatures::all();
            }
            None => return LightFeatures::all(),
        };

        let mut supported = LightFeatures::empty();
        if features.brightness {
            supported |= LightFeatures::BRIGHTNESS;
        }
        if features.color {
            supported |= LightFeatures::COLOR;
        }
        if features.effect {
            supported |= LightFeatures::EFFECT;
        }
        if features.color_tmp {
            supported |= LightFeatures::COLOR_TEMP;
        }
        supported
    }

    fn effect(&self) -> Option<&str> {
        self.effect
    }

    fn effect_list(&self) -> Vec<String> {
        scenes::effect_list(self.model())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        let mut info = DeviceInfo::new(self.name.clone());
        if let Some(mac) = &self.mac {
            info = info.with_identifier(DOMAIN, mac);
        }
        info.manufacturer = Some(MANUFACTURER.to_string());
        info.model = self.model().map(str::to_string);
        Some(info)
    }

    async fn update(&mut self) {
        let pilot = self.update_state().await;
        self.fetch_bulb_type().await;
        self.fetch_mac().await;

        if let Some(pilot) = pilot {
            if self.state == Some(true) {
                self.update_brightness(&pilot);
                self.update_temperature(&pilot);
                self.update_color(&pilot);
                self.update_effect(&pilot);
            }
        }
    }

    async fn turn_on(&mut self, params: TurnOnParams) {
        let mut rgb = params.rgb_color;
        if let Some((hue, saturation)) = params.hs_color {
            rgb = Some(color::hs_to_rgb(hue, saturation));
        }

        let colortemp = params.color_temp.map(|mired| {
            let kelvin = color::mired_to_kelvin(mired)
                .max(self.kelvin_min())
                .min(self.kelvin_max());
            debug!(
                "[wizlight {}] kelvin changed and send to bulb: {}",
                self.light.ip(),
                kelvin
            );
            kelvin
        });

        let scene_id = params.effect.as_deref().and_then(|name| {
            let id = scenes::scene_id(name);
            if id.is_none() {
                warn!("[wizlight {}] unknown effect {:?} ignored", self.light.ip(), name);
            }
            id
        });

        let pilot = if scene_id == Some(RHYTHM_SCENE_ID) {
            // Rhythm is driven by the bulb itself and takes no parameters
            PilotBuilder::new()
        } else {
            PilotBuilder::new()
                .with_rgb(rgb)
                .with_brightness(params.brightness)
                .with_colortemp(colortemp)
                .with_scene(scene_id)
        };

        if let Err(e) = self.light.turn_on(pilot).await {
            warn!("[wizlight {}] turn on failed: {}", self.light.ip(), e);
        }
    }

    async fn turn_off(&mut self) {
        if let Err(e) = self.light.turn_off().await {
            warn!("[wizlight {}] turn off failed: {}", self.light.ip(), e);
        }
    }
}
