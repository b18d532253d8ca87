use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

/// A registered service, addressed as `domain.service`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ServiceName {
    pub domain: String,
    pub service: String,
}

/// Maps services to the integration that handles them.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<ServiceName, String>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `domain.service` as handled by `integration_name`.
    ///
    /// A second registration under the same name replaces the first.
    pub fn register(&mut self, domain: &str, service: &str, integration_name: &str) {
        let name = ServiceName {
            domain: domain.to_string(),
            service: service.to_string(),
        };
        if let Some(previous) = self
            .services
            .insert(name, integration_name.to_string())
        {
            warn!(
                "Service {}.{} re-registered (was owned by {})",
                domain, service, previous
            );
        }
    }

    /// Integration owning `domain.service`, if registered.
    pub fn lookup(&self, domain: &str, service: &str) -> Option<&str> {
        let name = ServiceName {
            domain: domain.to_string(),
            service: service.to_string(),
        };
        self.services.get(&name).map(String::as_str)
    }

    pub fn services(&self) -> Vec<ServiceName> {
        self.services.keys().cloned().collect()
    }
}

/// Turn free text into a lowercase identifier joined by underscores.
///
/// Returns "unknown" when nothing usable is left.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Living Room updateService"), "living_room_updateservice");
        assert_eq!(slugify("  Kitchen -- Lamp!  "), "kitchen_lamp");
        assert_eq!(slugify("desk_lamp"), "desk_lamp");
        assert_eq!(slugify("!!!"), "unknown");
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ServiceRegistry::new();
        registry.register("wiz_light", "desk_updateservice", "wiz_light");

        assert_eq!(
            registry.lookup("wiz_light", "desk_updateservice"),
            Some("wiz_light")
        );
        assert_eq!(registry.lookup("wiz_light", "other"), None);
        assert_eq!(registry.lookup("light", "desk_updateservice"), None);
    }

    #[test]
    fn test_reregister_replaces_owner() {
        let mut registry = ServiceRegistry::new();
        registry.register("wiz_light", "update", "first");
        registry.register("wiz_light", "update", "second");

        assert_eq!(registry.lookup("wiz_light", "update"), Some("second"));
        assert_eq!(registry.services().len(), 1);
    }
}
