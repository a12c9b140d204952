//! Target identifier to converter mapping.
//!
//! Each target module exposes a `register` function; [`targets::REGISTRARS`]
//! lists them and [`registry()`] runs them once to build the process-wide
//! instance. After that the registry is only read.
//!
//! [`targets::REGISTRARS`]: crate::targets::REGISTRARS

use std::collections::BTreeMap;
use std::sync::LazyLock;

use agentbridge_shared::{BridgeError, Result};
use tracing::{debug, warn};

use crate::converter::{Converter, TargetInfo};
use crate::targets::REGISTRARS;

/// A function that registers one or more converters.
pub type Registrar = fn(&mut ConverterRegistry);

/// Holds converters keyed by lowercase target identifier.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: BTreeMap<String, Box<dyn Converter>>,
}

impl ConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated by every registrar in `registrars`.
    pub fn with_registrars(registrars: &[Registrar]) -> Self {
        let mut registry = Self::new();
        for register in registrars {
            register(&mut registry);
        }
        registry
    }

    /// Register a converter under `id`. A later registration for the same id wins.
    pub fn register(&mut self, id: &str, converter: Box<dyn Converter>) {
        let key = id.to_ascii_lowercase();
        debug!(target_id = %key, "registering converter");
        if self.converters.insert(key.clone(), converter).is_some() {
            warn!(target_id = %key, "converter registered twice, keeping the last one");
        }
    }

    /// Look up a converter; identifiers are case-insensitive.
    pub fn get(&self, id: &str) -> Result<&dyn Converter> {
        self.converters
            .get(&id.to_ascii_lowercase())
            .map(|c| c.as_ref())
            .ok_or_else(|| BridgeError::not_found(format!("target '{id}'")))
    }

    /// Registered identifiers in lexicographic order.
    pub fn list(&self) -> Vec<&str> {
        self.converters.keys().map(String::as_str).collect()
    }

    /// Target descriptions in identifier order.
    pub fn infos(&self) -> Vec<&TargetInfo> {
        self.converters.values().map(|c| c.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

static REGISTRY: LazyLock<ConverterRegistry> =
    LazyLock::new(|| ConverterRegistry::with_registrars(REGISTRARS));

/// The process-wide registry, built on first use.
pub fn registry() -> &'static ConverterRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_targets_registered() {
        assert_eq!(
            registry().list(),
            vec!["agent", "copilot", "cursor", "kiro", "opencode", "windsurf"]
        );
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let converter = registry().get("Copilot").expect("copilot");
        assert_eq!(converter.info().name, "copilot");
        assert!(registry().get("CURSOR").is_ok());
    }

    #[test]
    fn unknown_target_is_not_found() {
        let err = registry().get("emacs").err().expect("error");
        assert!(matches!(err, BridgeError::NotFound { .. }));
    }

    #[test]
    fn infos_are_complete() {
        for info in registry().infos() {
            assert!(!info.display_name.is_empty());
            assert!(!info.output_dir.is_empty());
            assert_eq!(info.name, info.name.to_ascii_lowercase());
        }
    }

    #[test]
    fn registrar_subset() {
        let registry = ConverterRegistry::with_registrars(&[crate::targets::cursor::register]);
        assert_eq!(registry.list(), vec!["cursor"]);
        assert!(registry.get("copilot").is_err());
    }
}
