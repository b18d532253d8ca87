//! Static per-model capability data.
//!
//! A bulb reports its module name in `getSystemConfig`; everything else about
//! what it can do comes from the table below.

use super::error::WizError;

/// Which light parameters a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub brightness: bool,
    pub color: bool,
    pub color_tmp: bool,
    pub effect: bool,
}

/// Supported white range in kelvin, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KelvinRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BulbClass {
    features: Features,
    kelvin_range: KelvinRange,
}

const RGB: BulbClass = BulbClass {
    features: Features {
        brightness: true,
        color: true,
        color_tmp: true,
        effect: true,
    },
    kelvin_range: KelvinRange {
        min: 2200,
        max: 6500,
    },
};

const TUNABLE_WHITE: BulbClass = BulbClass {
    features: Features {
        brightness: true,
        color: false,
        color_tmp: true,
        effect: true,
    },
    kelvin_range: KelvinRange {
        min: 2700,
        max: 6500,
    },
};

const DIMMABLE_WHITE: BulbClass = BulbClass {
    features: Features {
        brightness: true,
        color: false,
        color_tmp: false,
        effect: true,
    },
    kelvin_range: KelvinRange {
        min: 2700,
        max: 2700,
    },
};

static BULB_LIBRARY: &[(&str, BulbClass)] = &[
    ("ESP01_SHRGB1C_31", RGB),
    ("ESP01_SHRGB_03", RGB),
    ("ESP03_SHRGB1C_01", RGB),
    ("ESP03_SHRGB1W_01", RGB),
    ("ESP03_SHRGBP_31", RGB),
    ("ESP01_SHTW1C_31", TUNABLE_WHITE),
    ("ESP15_SHTW1_01I", TUNABLE_WHITE),
    ("ESP17_SHTW9_01", TUNABLE_WHITE),
    ("ESP56_SHTW3_01", TUNABLE_WHITE),
    ("ESP01_SHDW_01", DIMMABLE_WHITE),
    ("ESP01_SHDW1_31", DIMMABLE_WHITE),
    ("ESP06_SHDW1_01", DIMMABLE_WHITE),
    ("ESP06_SHDW9_01", DIMMABLE_WHITE),
];

/// Capability descriptor of one bulb, identified by module name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulbType {
    pub name: String,
    class: Option<BulbClass>,
}

impl BulbType {
    /// Resolve a module name against the bulb library. Unknown names are
    /// kept; their capability lookups fail with `NotKnownBulb`.
    pub fn from_module_name(name: &str) -> Self {
        let class = BULB_LIBRARY
            .iter()
            .find(|(module, _)| *module == name)
            .map(|(_, class)| *class);

        Self {
            name: name.to_string(),
            class,
        }
    }

    pub fn is_known(&self) -> bool {
        self.class.is_some()
    }

    pub fn features(&self) -> Result<Features, WizError> {
        self.class
            .map(|class| class.features)
            .ok_or_else(|| WizError::NotKnownBulb(self.name.clone()))
    }

    pub fn kelvin_range(&self) -> Result<KelvinRange, WizError> {
        self.class
            .map(|class| class.kelvin_range)
            .ok_or_else(|| WizError::NotKnownBulb(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_rgb_bulb() {
        let bulb = BulbType::from_module_name("ESP01_SHRGB_03");
        assert!(bulb.is_known());
        assert!(bulb.features().unwrap().color);
        assert_eq!(
            bulb.kelvin_range().unwrap(),
            KelvinRange {
                min: 2200,
                max: 6500
            }
        );
    }

    #[test]
    fn test_filament_has_no_color() {
        let features = BulbType::from_module_name("ESP06_SHDW9_01")
            .features()
            .unwrap();
        assert!(features.brightness);
        assert!(features.effect);
        assert!(!features.color);
        assert!(!features.color_tmp);
    }

    #[test]
    fn test_unknown_bulb() {
        let bulb = BulbType::from_module_name("ESP99_FUTURE_01");
        assert!(!bulb.is_known());
        assert_eq!(bulb.name, "ESP99_FUTURE_01");
        assert!(matches!(
            bulb.features(),
            Err(WizError::NotKnownBulb(name)) if name == "ESP99_FUTURE_01"
        ));
        assert!(bulb.kelvin_range().is_err());
    }
}
