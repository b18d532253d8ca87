//! Color and unit conversions shared by light entities.
//!
//! Hue is expressed in degrees (0-360) and saturation in percent (0-100), the
//! same scale the light entity contract exposes. Color temperature moves
//! between kelvin (what bulbs speak) and mired (what entities expose).

use palette::FromColor;
use palette::Srgb;

type Hsv64 = palette::Hsv<palette::encoding::Srgb, f64>;

/// An (red, green, blue) triple.
pub type Rgb = (u8, u8, u8);

/// A (hue degrees, saturation percent) pair.
pub type Hs = (f64, f64);

/// Convert kelvin to mired, rounding down.
pub fn kelvin_to_mired(kelvin: u32) -> u32 {
    1_000_000 / kelvin.max(1)
}

/// Convert mired to kelvin, rounding down.
pub fn mired_to_kelvin(mired: u32) -> u32 {
    1_000_000 / mired.max(1)
}

/// Convert an RGB triple to hue/saturation, rounded to three decimals.
pub fn rgb_to_hs(r: u8, g: u8, b: u8) -> Hs {
    let (h, s, _v) = rgb_to_hsv(r, g, b);
    (h, s)
}

/// Convert an RGB triple to (hue degrees, saturation %, value %).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let rgb: Srgb<f64> = Srgb::new(r, g, b).into_format();
    let hsv = Hsv64::from_color(rgb);

    (
        round3(hsv.hue.into_positive_degrees()),
        round3(hsv.saturation * 100.0),
        round3(hsv.value * 100.0),
    )
}

/// Convert hue/saturation to an RGB triple at full value.
pub fn hs_to_rgb(hue: f64, saturation: f64) -> Rgb {
    hsv_to_rgb(hue, saturation, 100.0)
}

/// Convert (hue degrees, saturation %, value %) to an RGB triple.
///
/// Channels are truncated, not rounded.
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let hsv = Hsv64::new(hue, saturation / 100.0, value / 100.0);
    let rgb = Srgb::<f64>::from_color(hsv);

    (to_channel(rgb.red), to_channel(rgb.green), to_channel(rgb.blue))
}

/// Map a 0-255 brightness onto the 0-100 percent scale.
pub fn brightness_to_percent(brightness: u8) -> u8 {
    (f64::from(brightness) / 255.0 * 100.0).round_ties_even() as u8
}

/// Map a 0-100 percent dimming level onto the 0-255 brightness scale.
///
/// Out-of-range input is passed through scaled, so callers can detect it.
pub fn percent_to_brightness(percent: i64) -> i64 {
    (percent as f64 / 100.0 * 255.0).round_ties_even() as i64
}

fn to_channel(x: f64) -> u8 {
    (x * 255.0).clamp(0.0, 255.0) as u8
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round_ties_even() / 1000.0
}
