//! Immutable option descriptors and the six-step resolution chain (spec
//! §4.2). The registry itself is a single-writer/many-reader map initialized
//! once at [`crate::connection::ConnectionManager::bootstrap`] (spec §9:
//! "Global static registries ... initialize once at bootstrap via explicit
//! configuration").

use jdbcx_templates::PropertyBag;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct OptionDescriptor {
    #[builder(setter(transform = |n: &str| n.to_lowercase()))]
    pub name: String,
    #[builder(default, setter(into))]
    pub description: String,
    #[builder(default)]
    pub default_value: Option<String>,
    #[builder(default)]
    pub choices: Vec<String>,
}

/// Resolves a live value for `descriptor` given a property bag, a lowercased
/// key prefix, and an optional explicit default — spec's six-step chain:
/// bag → choices filter → explicit default → env var → sysprop → descriptor
/// default.
pub fn resolve(
    descriptor: &OptionDescriptor,
    bag: &PropertyBag,
    prefix: &str,
    explicit_default: Option<&str>,
) -> Option<String> {
    let prefix = prefix.to_lowercase();
    let key = format!("{prefix}{}", descriptor.name);

    if let Some(v) = bag.get(&key) {
        if descriptor.choices.is_empty() || descriptor.choices.iter().any(|c| c == v) {
            return Some(v.clone());
        }
        // invalid choice: treated as if the bag entry weren't there at all.
    }

    if let Some(d) = explicit_default {
        return Some(d.to_string());
    }

    let env_key = key.to_uppercase().replace('.', "_");
    if let Ok(v) = std::env::var(&env_key) {
        return Some(v);
    }

    if let Some(v) = get_system_property(&key) {
        return Some(v);
    }

    descriptor.default_value.clone()
}

/// A process-global stand-in for a JVM-style system property table — the
/// closest Rust analogue, since there is no ambient per-process property
/// store in the standard library. Single-writer/many-reader, like every
/// other static registry in this module.
static SYSTEM_PROPERTIES: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn properties() -> &'static RwLock<HashMap<String, String>> {
    SYSTEM_PROPERTIES.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn set_system_property(key: &str, value: &str) {
    properties()
        .write()
        .unwrap()
        .insert(key.to_lowercase(), value.to_string());
}

pub fn get_system_property(key: &str) -> Option<String> {
    properties().read().unwrap().get(&key.to_lowercase()).cloned()
}

/// Registered option descriptors, keyed by lowercased name.
pub struct OptionRegistry {
    descriptors: RwLock<HashMap<String, OptionDescriptor>>,
}

impl Default for OptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, descriptor: OptionDescriptor) {
        self.descriptors
            .write()
            .unwrap()
            .insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<OptionDescriptor> {
        self.descriptors.read().unwrap().get(&name.to_lowercase()).cloned()
    }

    pub fn resolve(
        &self,
        name: &str,
        bag: &PropertyBag,
        prefix: &str,
        explicit_default: Option<&str>,
    ) -> Option<String> {
        let descriptor = self.get(name)?;
        resolve(&descriptor, bag, prefix, explicit_default)
    }

    /// The core options spec §6 names as governing behavior, pre-registered
    /// the way the connection manager's bootstrap step is expected to.
    pub fn with_core_options() -> Self {
        let registry = Self::new();
        for (name, default, choices) in [
            ("exec.error", Some("throw"), vec!["ignore", "warn", "return", "throw"]),
            ("exec.timeout", Some("0"), vec![]),
            ("exec.parallelism", Some("0"), vec![]),
            ("exec.dryrun", Some("false"), vec![]),
            ("exec.priority", Some("0"), vec![]),
            ("tag", Some("{"), vec!["{", "<", "["]),
        ] {
            registry.register(
                OptionDescriptor::builder()
                    .name(name)
                    .default_value(default.map(str::to_string))
                    .choices(choices.into_iter().map(str::to_string).collect())
                    .build(),
            );
        }
        registry
    }
}

static REGISTRY: OnceLock<OptionRegistry> = OnceLock::new();

/// Bootstraps the process-wide option registry exactly once.
pub fn registry() -> &'static OptionRegistry {
    REGISTRY.get_or_init(OptionRegistry::with_core_options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> OptionDescriptor {
        OptionDescriptor::builder()
            .name("exec.error")
            .default_value(Some("throw".into()))
            .choices(vec!["ignore".into(), "warn".into(), "return".into(), "throw".into()])
            .build()
    }

    #[test]
    fn bag_wins_over_everything() {
        let d = descriptor();
        let mut bag = PropertyBag::new();
        bag.insert("exec.error".into(), "warn".into());
        assert_eq!(resolve(&d, &bag, "", None), Some("warn".into()));
    }

    #[test]
    fn invalid_choice_falls_through_to_default() {
        let d = descriptor();
        let mut bag = PropertyBag::new();
        bag.insert("exec.error".into(), "bogus".into());
        assert_eq!(resolve(&d, &bag, "", None), Some("throw".into()));
    }

    #[test]
    fn explicit_default_beats_descriptor_default() {
        let d = descriptor();
        let bag = PropertyBag::new();
        assert_eq!(resolve(&d, &bag, "", Some("return")), Some("return".into()));
    }

    #[test]
    fn descriptor_default_is_last_resort() {
        let d = descriptor();
        let bag = PropertyBag::new();
        assert_eq!(resolve(&d, &bag, "", None), Some("throw".into()));
    }

    #[test]
    fn sysprop_resolved_before_descriptor_default() {
        let d = OptionDescriptor::builder()
            .name("test.sysprop.key")
            .default_value(Some("fallback".into()))
            .build();
        set_system_property("test.sysprop.key", "from-sysprop");
        let bag = PropertyBag::new();
        assert_eq!(resolve(&d, &bag, "", None), Some("from-sysprop".into()));
    }
}
