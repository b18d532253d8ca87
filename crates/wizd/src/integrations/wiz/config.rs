use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

fn default_scan_interval_secs() -> u64 {
    15
}

fn default_timeout_secs() -> u64 {
    5
}

/// Configuration for the WiZ light integration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds between polls. Bulbs can be changed from outside (app, wall
    /// switch), so state is re-read on this interval.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,

    /// Seconds to wait for a bulb to answer a single request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Bulbs keyed by entry id; the key becomes the entity id `light.<key>`
    #[serde(default)]
    pub bulbs: BTreeMap<String, BulbConfig>,
}

/// A single bulb
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulbConfig {
    /// IP address or hostname of the bulb
    pub host: String,

    /// Display name
    pub name: String,
}

impl Config {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Problems with this section, each prefixed with its field path.
    pub fn validate(&self, path: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if self.scan_interval_secs == 0 {
            problems.push(format!("{path}.scan_interval_secs: must be at least 1"));
        }
        if self.timeout_secs == 0 {
            problems.push(format!("{path}.timeout_secs: must be at least 1"));
        }
        for (entry_id, bulb) in &self.bulbs {
            if bulb.host.trim().is_empty() {
                problems.push(format!("{path}.bulbs.{entry_id}.host: must not be empty"));
            }
            if bulb.name.trim().is_empty() {
                problems.push(format!("{path}.bulbs.{entry_id}.name: must not be empty"));
            }
        }

        problems
    }
}
