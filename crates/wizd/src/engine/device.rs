use serde::Deserialize;
use serde::Serialize;

/// Metadata about the physical device backing an entity.
///
/// A device may carry several entities; for lights it is usually one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device across restarts
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

impl DeviceInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, domain: &str, id: &str) -> Self {
        let pair = (domain.to_string(), id.to_string());
        if !self.identifiers.contains(&pair) {
            self.identifiers.push(pair);
        }
        self
    }
}
