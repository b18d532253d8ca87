//! WiZ local control protocol.
//!
//! Bulbs listen on UDP port 38899 for JSON messages of the form
//! `{"method": "...", "params": {...}}` and answer with either a `result`
//! or an `error` object.

use serde::Deserialize;
use serde::Serialize;

use super::error::WizError;
use super::scenes;
use super::scenes::RHYTHM_SCENE_ID;
use crate::color;
use crate::color::Rgb;

pub const PORT: u16 = 38899;

pub const METHOD_GET_PILOT: &str = "getPilot";
pub const METHOD_SET_PILOT: &str = "setPilot";
pub const METHOD_GET_SYSTEM_CONFIG: &str = "getSystemConfig";

/// Lowest dimming level a bulb accepts, in percent.
const MIN_DIMMING: u8 = 10;

/// White temperature range the firmware accepts, in kelvin.
const MIN_COLORTEMP: u32 = 1000;
const MAX_COLORTEMP: u32 = 10000;

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub method: &'a str,
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub result: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseError {
    pub code: i64,

    #[serde(default)]
    pub message: String,
}

impl Response {
    /// The `result` payload, or the bulb's error.
    pub fn into_result(self) -> Result<Option<serde_json::Value>, WizError> {
        match self.error {
            Some(err) => Err(WizError::Device {
                code: err.code,
                message: err.message,
            }),
            None => Ok(self.result),
        }
    }
}

/// Parsed `getPilot` result: what the bulb is doing right now.
///
/// Color fields are only present while the bulb is in RGB mode, `temp` only
/// in white mode.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PilotState {
    #[serde(default)]
    pub state: bool,
    pub mac: Option<String>,

    /// Brightness in percent, 10-100
    pub dimming: Option<i64>,

    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,

    /// White temperature in kelvin
    pub temp: Option<u32>,

    pub scene_id: Option<u32>,

    /// Present while a rhythm schedule drives the bulb
    pub schd_pset_id: Option<u32>,
}

impl PilotState {
    /// Brightness on the 0-255 scale. Not range-checked.
    pub fn brightness(&self) -> Option<i64> {
        self.dimming.map(color::percent_to_brightness)
    }

    pub fn rgb(&self) -> (Option<u8>, Option<u8>, Option<u8>) {
        (self.r, self.g, self.b)
    }

    pub fn colortemp(&self) -> Option<u32> {
        self.temp
    }

    pub fn scene_name(&self) -> Option<&'static str> {
        if self.schd_pset_id.is_some() {
            return scenes::scene_name(RHYTHM_SCENE_ID);
        }
        self.scene_id.and_then(scenes::scene_name)
    }
}

/// Parsed `getSystemConfig` result.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    pub mac: Option<String>,
    pub module_name: Option<String>,
    pub fw_version: Option<String>,
}

/// A set of light parameters sent to the bulb in one `setPilot`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PilotBuilder {
    rgb: Option<Rgb>,
    brightness: Option<u8>,
    colortemp: Option<u32>,
    scene: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetPilotParams {
    state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    r: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    g: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    b: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimming: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene_id: Option<u32>,
}

impl PilotBuilder {
    /// An empty pilot: turns the bulb on and changes nothing else.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rgb(mut self, rgb: Option<Rgb>) -> Self {
        self.rgb = rgb;
        self
    }

    /// Brightness on the 0-255 scale.
    pub fn with_brightness(mut self, brightness: Option<u8>) -> Self {
        self.brightness = brightness;
        self
    }

    /// White temperature in kelvin.
    pub fn with_colortemp(mut self, kelvin: Option<u32>) -> Self {
        self.colortemp = kelvin;
        self
    }

    pub fn with_scene(mut self, scene_id: Option<u32>) -> Self {
        self.scene = scene_id;
        self
    }

    #[cfg(test)]
    pub fn rgb(&self) -> Option<Rgb> {
        self.rgb
    }

    #[cfg(test)]
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    #[cfg(test)]
    pub fn colortemp(&self) -> Option<u32> {
        self.colortemp
    }

    #[cfg(test)]
    pub fn scene(&self) -> Option<u32> {
        self.scene
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `setPilot` params. Brightness becomes a dimming percent, never below 10,
    /// and the temperature is kept within 1000-10000 K.
    pub fn params(&self) -> serde_json::Value {
        let params = SetPilotParams {
            state: true,
            r: self.rgb.map(|(r, _, _)| r),
            g: self.rgb.map(|(_, g, _)| g),
            b: self.rgb.map(|(_, _, b)| b),
            dimming: self
                .brightness
                .map(|brightness| color::brightness_to_percent(brightness).max(MIN_DIMMING)),
            temp: self
                .colortemp
                .map(|kelvin| kelvin.clamp(MIN_COLORTEMP, MAX_COLORTEMP)),
            scene_id: self.scene,
        };
        serde_json::to_value(params).unwrap_or_default()
    }
}

/// `setPilot` params that switch the bulb off.
pub fn off_params() -> serde_json::Value {
    serde_json::json!({ "state": false })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_rgb_pilot() {
        let response: Response = serde_json::from_value(json!({
            "method": "getPilot",
            "env": "pro",
            "result": {
                "mac": "a8bb5006033d",
                "rssi": -64,
                "src": "",
                "state": true,
                "sceneId": 0,
                "r": 255,
                "g": 64,
                "b": 0,
                "c": 0,
                "w": 0,
                "dimming": 50
            }
        }))
        .unwrap();

        let result = response.into_result().unwrap().unwrap();
        let pilot: PilotState = serde_json::from_value(result).unwrap();
        assert!(pilot.state);
        assert_eq!(pilot.mac.as_deref(), Some("a8bb5006033d"));
        assert_eq!(pilot.brightness(), Some(128));
        assert_eq!(pilot.rgb(), (Some(255), Some(64), Some(0)));
        assert_eq!(pilot.colortemp(), None);
        assert_eq!(pilot.scene_name(), None);
    }

    #[test]
    fn test_parse_white_pilot_with_scene() {
        let pilot: PilotState = serde_json::from_value(json!({
            "state": true,
            "sceneId": 11,
            "temp": 2700,
            "dimming": 100
        }))
        .unwrap();
        assert_eq!(pilot.rgb(), (None, None, None));
        assert_eq!(pilot.colortemp(), Some(2700));
        assert_eq!(pilot.brightness(), Some(255));
        assert_eq!(pilot.scene_name(), Some("Warm White"));
    }

    #[test]
    fn test_rhythm_schedule_reports_rhythm_scene() {
        let pilot: PilotState = serde_json::from_value(json!({
            "state": true,
            "schdPsetId": 3,
            "sceneId": 0
        }))
        .unwrap();
        assert_eq!(pilot.scene_name(), Some("Rhythm"));
    }

    #[test]
    fn test_error_response() {
        let response: Response = serde_json::from_value(json!({
            "method": "setPilot",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        assert!(matches!(
            response.into_result(),
            Err(WizError::Device { code: -32601, .. })
        ));
    }

    #[test]
    fn test_empty_pilot_only_turns_on() {
        let pilot = PilotBuilder::new();
        assert!(pilot.is_empty());
        assert_eq!(pilot.params(), json!({"state": true}));
    }

    #[test]
    fn test_full_pilot_params() {
        let pilot = PilotBuilder::new()
            .with_rgb(Some((255, 0, 10)))
            .with_brightness(Some(128))
            .with_colortemp(Some(4000))
            .with_scene(Some(4));
        assert_eq!(
            pilot.params(),
            json!({
                "state": true,
                "r": 255,
                "g": 0,
                "b": 10,
                "dimming": 50,
                "temp": 4000,
                "sceneId": 4
            })
        );
    }

    #[test]
    fn test_low_brightness_is_clamped_to_min_dimming() {
        let pilot = PilotBuilder::new().with_brightness(Some(3));
        assert_eq!(pilot.params()["dimming"], 10);
    }

    #[test]
    fn test_colortemp_is_clamped_to_firmware_range() {
        let pilot = PilotBuilder::new().with_colortemp(Some(1_000_000));
        assert_eq!(pilot.params()["temp"], 10000);

        let pilot = PilotBuilder::new().with_colortemp(Some(500));
        assert_eq!(pilot.params()["temp"], 1000);
    }

    #[test]
    fn test_off_params() {
        assert_eq!(off_params(), json!({"state": false}));
    }
}
